use crate::wasm_unsupported;
use alloc::boxed::Box;
use core::fmt;

/// The type of a WebAssembly value as seen by the runtime.
///
/// Every runtime value occupies one 64-bit stack slot except `V128`, which
/// occupies two adjacent slots (low half pushed first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasmValType {
    I32,
    I64,
    F32,
    F64,
    V128,
    FuncRef,
    ExternRef,
}

impl WasmValType {
    /// Number of 64-bit value-stack slots a value of this type occupies.
    #[inline]
    pub fn slot_count(&self) -> u32 {
        match self {
            WasmValType::V128 => 2,
            _ => 1,
        }
    }

    pub(crate) fn from_wasmparser(
        ty: wasmparser::ValType,
    ) -> Result<Self, crate::TranslationError> {
        match ty {
            wasmparser::ValType::I32 => Ok(Self::I32),
            wasmparser::ValType::I64 => Ok(Self::I64),
            wasmparser::ValType::F32 => Ok(Self::F32),
            wasmparser::ValType::F64 => Ok(Self::F64),
            wasmparser::ValType::V128 => Ok(Self::V128),
            wasmparser::ValType::Ref(ty) if ty.is_func_ref() => Ok(Self::FuncRef),
            wasmparser::ValType::Ref(ty) if ty.is_extern_ref() => Ok(Self::ExternRef),
            wasmparser::ValType::Ref(ty) => Err(wasm_unsupported!("reference type {ty:?}")),
        }
    }
}

impl fmt::Display for WasmValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WasmValType::I32 => "i32",
            WasmValType::I64 => "i64",
            WasmValType::F32 => "f32",
            WasmValType::F64 => "f64",
            WasmValType::V128 => "v128",
            WasmValType::FuncRef => "funcref",
            WasmValType::ExternRef => "externref",
        };
        f.write_str(s)
    }
}

/// The type of a WebAssembly function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WasmFuncType {
    pub params: Box<[WasmValType]>,
    pub results: Box<[WasmValType]>,
}

impl WasmFuncType {
    pub fn new(
        params: impl IntoIterator<Item = WasmValType>,
        results: impl IntoIterator<Item = WasmValType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    pub(crate) fn from_wasmparser(
        ty: &wasmparser::FuncType,
    ) -> Result<Self, crate::TranslationError> {
        let params = ty
            .params()
            .iter()
            .map(|ty| WasmValType::from_wasmparser(*ty))
            .collect::<Result<Box<[_]>, _>>()?;
        let results = ty
            .results()
            .iter()
            .map(|ty| WasmValType::from_wasmparser(*ty))
            .collect::<Result<Box<[_]>, _>>()?;
        Ok(Self { params, results })
    }

    /// Total number of 64-bit slots occupied by the parameters.
    pub fn param_slots(&self) -> u32 {
        self.params.iter().map(WasmValType::slot_count).sum()
    }

    /// Total number of 64-bit slots occupied by the results.
    pub fn result_slots(&self) -> u32 {
        self.results.iter().map(WasmValType::slot_count).sum()
    }
}

impl fmt::Display for WasmFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ") -> (")?;
        for (i, ty) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ")")
    }
}
