use crate::translate::WasmValType;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// An abrupt, deterministic termination of a WebAssembly execution.
///
/// Traps unwind the entire call stack of the current invocation and are
/// surfaced to the embedder wrapped in [`crate::Error::Trap`] together with a
/// [`WasmBacktrace`].
#[derive(onlyerror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// Code that was supposed to have been unreachable was reached.
    #[error("unreachable code executed")]
    Unreachable,
    /// An out-of-bounds linear-memory access.
    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,
    /// An integer division by zero.
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    /// An integer arithmetic operation caused an overflow.
    #[error("integer overflow")]
    IntegerOverflow,
    /// Failed float-to-int conversion.
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    /// Out-of-bounds or null table access.
    #[error("invalid table access")]
    InvalidTableAccess,
    /// Signature mismatch on indirect call.
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    /// The call frame stack ceiling was exceeded.
    #[error("call stack exhausted")]
    CallStackOverflow,
}

/// A captured stack of WebAssembly frames, reconstructed while unwinding
/// after a trap.
///
/// Frames are ordered innermost first.
#[derive(Debug)]
pub struct WasmBacktrace {
    wasm_trace: Vec<FrameInfo>,
}

impl WasmBacktrace {
    pub(crate) fn from_frames(wasm_trace: Vec<FrameInfo>) -> Self {
        Self { wasm_trace }
    }

    /// An empty backtrace, used for faults raised outside any wasm frame
    /// (e.g. during instantiation).
    pub(crate) fn empty() -> Self {
        Self {
            wasm_trace: Vec::new(),
        }
    }

    pub fn frames(&self) -> &[FrameInfo] {
        &self.wasm_trace
    }
}

impl fmt::Display for WasmBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.wasm_trace.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let name = frame.module_name().unwrap_or("<unknown>");
            write!(f, "  {i:>3}: {name}::")?;

            match frame.func_name() {
                Some(func_name) => write!(f, "{func_name}")?,
                None => write!(f, "<wasm function {}>", frame.func_index())?,
            }

            write!(f, "(")?;
            write_types(f, frame.params())?;
            write!(f, ") -> (")?;
            write_types(f, frame.results())?;
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn write_types(f: &mut fmt::Formatter<'_>, types: &[WasmValType]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

/// Description of one frame in a [`WasmBacktrace`].
#[derive(Debug)]
pub struct FrameInfo {
    module_name: Option<String>,
    func_name: Option<String>,
    func_index: u32,
    params: Vec<WasmValType>,
    results: Vec<WasmValType>,
}

impl FrameInfo {
    pub(crate) fn new(
        module_name: Option<String>,
        func_name: Option<String>,
        func_index: u32,
        params: Vec<WasmValType>,
        results: Vec<WasmValType>,
    ) -> Self {
        Self {
            module_name,
            func_name,
            func_index,
            params,
            results,
        }
    }

    /// The name of the module this frame's function was defined in, if the
    /// module was named.
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// The function name from the module's name section or export table.
    ///
    /// Note that this may not be present with malformed or stripped name
    /// information.
    pub fn func_name(&self) -> Option<&str> {
        self.func_name.as_deref()
    }

    pub fn func_index(&self) -> u32 {
        self.func_index
    }

    pub fn params(&self) -> &[WasmValType] {
        &self.params
    }

    pub fn results(&self) -> &[WasmValType] {
        &self.results
    }
}
