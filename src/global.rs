use crate::store::{GlobalId, Store};
use crate::translate::WasmValType;
use crate::values::Val;
use wasmparser::GlobalType;

/// A global variable in a [`Store`].
#[derive(Debug, Clone, Copy)]
pub struct Global(pub(crate) GlobalId);

impl Global {
    pub fn get(&self, store: &Store) -> Val {
        let data = &store.globals[self.0];
        let slots = [data.value, data.value_hi];
        Val::from_slots(&slots, data.val_type).0
    }

    /// Write a new value. The caller is responsible for respecting wasm
    /// mutability; instance-internal writes are validated at compile time.
    pub fn set(&self, store: &mut Store, value: Val) -> crate::Result<()> {
        let data = &store.globals[self.0];
        if value.ty() != data.val_type {
            return Err(crate::Error::TypeMismatch(alloc::format!(
                "global is {}, got {}",
                data.val_type,
                value.ty()
            )));
        }
        let mut slots = alloc::vec::Vec::with_capacity(2);
        value.push_slots(&mut slots);
        let data = &mut store.globals[self.0];
        data.value = slots[0];
        data.value_hi = slots.get(1).copied().unwrap_or(0);
        Ok(())
    }
}

/// Backing storage for one global: up to two 64-bit slots (v128 globals use
/// both).
#[derive(Debug)]
pub(crate) struct GlobalData {
    pub value: u64,
    pub value_hi: u64,
    pub val_type: WasmValType,
    /// Declared type, kept for import compatibility checks.
    pub ty: GlobalType,
}

impl GlobalData {
    pub fn new(ty: GlobalType, val_type: WasmValType, value: u64, value_hi: u64) -> Self {
        Self {
            value,
            value_hi,
            val_type,
            ty,
        }
    }

    #[inline]
    pub fn slot_count(&self) -> u32 {
        self.val_type.slot_count()
    }
}
