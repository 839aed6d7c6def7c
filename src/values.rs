use crate::enum_accessors;
use crate::func::Func;
use crate::translate::WasmValType;

/// A value that a WebAssembly module can consume or produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Val {
    /// A 32-bit integer.
    I32(i32),
    /// A 64-bit integer.
    I64(i64),
    /// A 32-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f32::from_bits` to create an `f32` value.
    F32(u32),
    /// A 64-bit float.
    ///
    /// Note that the raw bits of the float are stored here, and you can use
    /// `f64::from_bits` to create an `f64` value.
    F64(u64),
    /// A 128-bit number.
    V128(u128),
    /// A function reference.
    FuncRef(Option<Func>),
    /// An opaque, embedder-managed external reference.
    ExternRef(Option<u64>),
}

impl Val {
    /// Returns the null function reference value.
    #[inline]
    pub const fn null_func_ref() -> Self {
        Self::FuncRef(None)
    }

    /// Returns the null external reference value.
    #[inline]
    pub const fn null_extern_ref() -> Self {
        Self::ExternRef(None)
    }

    /// The runtime type of this value.
    pub fn ty(&self) -> WasmValType {
        match self {
            Val::I32(_) => WasmValType::I32,
            Val::I64(_) => WasmValType::I64,
            Val::F32(_) => WasmValType::F32,
            Val::F64(_) => WasmValType::F64,
            Val::V128(_) => WasmValType::V128,
            Val::FuncRef(_) => WasmValType::FuncRef,
            Val::ExternRef(_) => WasmValType::ExternRef,
        }
    }

    /// Lower this value onto a stack of 64-bit slots.
    ///
    /// `V128` pushes two slots, low half first; everything else pushes one.
    pub(crate) fn push_slots(&self, out: &mut alloc::vec::Vec<u64>) {
        match *self {
            Val::I32(v) => out.push(u64::from(v as u32)),
            Val::I64(v) => out.push(v as u64),
            Val::F32(bits) => out.push(u64::from(bits)),
            Val::F64(bits) => out.push(bits),
            Val::V128(v) => {
                out.push(v as u64);
                out.push((v >> 64) as u64);
            }
            Val::FuncRef(f) => out.push(match f {
                Some(f) => crate::store::funcref_to_raw(f.id()),
                None => 0,
            }),
            Val::ExternRef(v) => out.push(v.unwrap_or(0)),
        }
    }

    /// Reassemble a value of type `ty` from slots, returning the value and
    /// the number of slots consumed.
    pub(crate) fn from_slots(slots: &[u64], ty: WasmValType) -> (Self, usize) {
        match ty {
            WasmValType::I32 => (Val::I32(slots[0] as u32 as i32), 1),
            WasmValType::I64 => (Val::I64(slots[0] as i64), 1),
            WasmValType::F32 => (Val::F32(slots[0] as u32), 1),
            WasmValType::F64 => (Val::F64(slots[0]), 1),
            WasmValType::V128 => {
                let v = u128::from(slots[0]) | (u128::from(slots[1]) << 64);
                (Val::V128(v), 2)
            }
            WasmValType::FuncRef => {
                let f = crate::store::funcref_from_raw(slots[0]).map(Func::from_id);
                (Val::FuncRef(f), 1)
            }
            WasmValType::ExternRef => {
                let v = slots[0];
                (Val::ExternRef((v != 0).then_some(v)), 1)
            }
        }
    }

    enum_accessors! {
        e
        (I32(i32) is_i32 i32 unwrap_i32 *e)
        (I64(i64) is_i64 i64 unwrap_i64 *e)
        (F32(f32) is_f32 f32 unwrap_f32 f32::from_bits(*e))
        (F64(f64) is_f64 f64 unwrap_f64 f64::from_bits(*e))
        (V128(u128) is_v128 v128 unwrap_v128 *e)
    }
}

impl From<i32> for Val {
    #[inline]
    fn from(val: i32) -> Val {
        Val::I32(val)
    }
}

impl From<i64> for Val {
    #[inline]
    fn from(val: i64) -> Val {
        Val::I64(val)
    }
}

impl From<f32> for Val {
    #[inline]
    fn from(val: f32) -> Val {
        Val::F32(val.to_bits())
    }
}

impl From<f64> for Val {
    #[inline]
    fn from(val: f64) -> Val {
        Val::F64(val.to_bits())
    }
}

impl From<Ref> for Val {
    #[inline]
    fn from(val: Ref) -> Val {
        match val {
            Ref::Func(f) => Val::FuncRef(f),
            Ref::Extern(v) => Val::ExternRef(v),
        }
    }
}

/// A reference value that a WebAssembly module can consume or produce.
#[derive(Debug, Clone, Copy)]
pub enum Ref {
    /// A function reference.
    Func(Option<Func>),
    /// An external reference.
    Extern(Option<u64>),
}

impl Ref {
    /// Is this a null reference?
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Func(None) | Self::Extern(None))
    }

    /// Is this a non-null reference?
    #[inline]
    pub fn is_non_null(&self) -> bool {
        !self.is_null()
    }
}
