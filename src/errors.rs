use crate::traps::{Trap, WasmBacktrace};
use alloc::string::String;

/// A WebAssembly translation error.
#[derive(Debug, onlyerror::Error)]
pub enum TranslationError {
    /// The input WebAssembly code is invalid.
    ///
    /// This error code is used when the section-level decoder encounters
    /// invalid WebAssembly code.
    #[error("invalid WASM input at {offset}: {message}")]
    InvalidWebAssembly {
        /// A string describing the validation error.
        message: String,
        /// The bytecode offset where the error occurred.
        offset: usize,
    },
    #[error("Feature used by the WebAssembly code is not supported: {0}")]
    Unsupported(String),
}

impl From<wasmparser::BinaryReaderError> for TranslationError {
    fn from(e: wasmparser::BinaryReaderError) -> Self {
        Self::InvalidWebAssembly {
            message: e.message().into(),
            offset: e.offset(),
        }
    }
}

#[macro_export]
macro_rules! wasm_unsupported {
    ($($arg:tt)*) => { $crate::TranslationError::Unsupported(alloc::format!($($arg)*)) }
}

/// An error produced while lowering a function body to the internal
/// operation sequence.
///
/// Compile errors are only ever returned from module construction; they are
/// never surfaced from runtime dispatch.
#[derive(Debug, onlyerror::Error)]
pub enum CompileError {
    /// The function body failed validation.
    #[error("invalid function at offset {offset}: {message}")]
    InvalidFunction {
        /// A string describing the validation error.
        message: String,
        /// The bytecode offset where the error occurred.
        offset: usize,
    },
    /// A branch label was never resolved to a program counter.
    ///
    /// This indicates a structurally malformed function: a forward branch
    /// whose destination was not emitted before the end of the body.
    #[error("unresolved branch target at operation {operation}")]
    UnresolvedLabel { operation: usize },
    #[error("operator not supported by the interpreter: {0}")]
    Unsupported(String),
}

impl From<wasmparser::BinaryReaderError> for CompileError {
    fn from(e: wasmparser::BinaryReaderError) -> Self {
        Self::InvalidFunction {
            message: e.message().into(),
            offset: e.offset(),
        }
    }
}

/// The crate-wide error type.
#[derive(Debug, onlyerror::Error)]
pub enum Error {
    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),
    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("wasm trap: {trap}\nwasm backtrace:\n{backtrace}")]
    Trap {
        trap: Trap,
        backtrace: WasmBacktrace,
    },
    /// The instance was closed while (or before) the call was running.
    #[error("module closed with exit code {exit_code}")]
    ModuleClosed { exit_code: u32 },
    #[error("unknown import: {module}::{name}")]
    UnknownImport { module: String, name: String },
    #[error("incompatible import {module}::{name}: {reason}")]
    IncompatibleImport {
        module: String,
        name: String,
        reason: String,
    },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid WAT: {0}")]
    Wat(#[from] wat::Error),
}

impl Error {
    /// The trap that caused this error, if it is a trap.
    pub fn trap(&self) -> Option<Trap> {
        match self {
            Error::Trap { trap, .. } => Some(*trap),
            _ => None,
        }
    }

    /// The backtrace captured while unwinding, if this error is a trap.
    pub fn backtrace(&self) -> Option<&WasmBacktrace> {
        match self {
            Error::Trap { backtrace, .. } => Some(backtrace),
            _ => None,
        }
    }
}
