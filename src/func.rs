use crate::indices::MemoryIndex;
use crate::store::{ContextValue, FuncId, InstanceId, Store};
use crate::translate::WasmFuncType;
use crate::values::Val;
use crate::vm;
use alloc::format;

/// A function in a [`Store`]: a wasm function of some instance, or a host
/// function registered through the [`Linker`](crate::Linker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Func(pub(crate) FuncId);

impl Func {
    pub(crate) fn from_id(id: FuncId) -> Self {
        Self(id)
    }

    pub(crate) fn id(self) -> FuncId {
        self.0
    }

    /// The function's type.
    pub fn ty(&self, store: &Store) -> WasmFuncType {
        let record = &store.funcs[self.0];
        store
            .engine
            .type_registry()
            .get(record.ty)
            .expect("function type is registered with its engine")
    }

    /// Call the function with typed parameters and results.
    ///
    /// `results` must have exactly the arity of the function type; it is
    /// overwritten on success. Traps, including those raised deep in callees
    /// or in host functions, surface as [`crate::Error::Trap`].
    pub fn call(
        &self,
        store: &mut Store,
        params: &[Val],
        results: &mut [Val],
    ) -> crate::Result<()> {
        let ty = self.ty(store);
        if params.len() != ty.params.len() {
            return Err(crate::Error::TypeMismatch(format!(
                "expected {} parameters, got {}",
                ty.params.len(),
                params.len()
            )));
        }
        for (value, expected) in params.iter().zip(ty.params.iter()) {
            if value.ty() != *expected {
                return Err(crate::Error::TypeMismatch(format!(
                    "expected {expected} parameter, got {}",
                    value.ty()
                )));
            }
        }
        if results.len() != ty.results.len() {
            return Err(crate::Error::TypeMismatch(format!(
                "expected buffer for {} results, got {}",
                ty.results.len(),
                results.len()
            )));
        }

        let mut slots = store.take_call_scratch();
        for value in params {
            value.push_slots(&mut slots);
        }

        let outcome = vm::invoke(store, self.0, &mut slots);

        if outcome.is_ok() {
            let mut offset = 0;
            for (slot, ty) in results.iter_mut().zip(ty.results.iter()) {
                let (value, consumed) = Val::from_slots(&slots[offset..], *ty);
                *slot = value;
                offset += consumed;
            }
        }

        store.return_call_scratch(slots);
        outcome
    }
}

/// The view a host function gets of its caller.
///
/// The memory exposed here is the *calling* instance's memory: a host
/// function reached through an imported function observes the importing
/// module's memory, not the memory of whatever module re-exported it.
pub struct Caller<'a> {
    pub(crate) store: &'a mut Store,
    pub(crate) instance: Option<InstanceId>,
}

impl Caller<'_> {
    /// The caller's linear memory (memory index 0), if it has one.
    pub fn memory(&mut self) -> Option<&mut [u8]> {
        let instance = self.instance?;
        let memory = self.store.instances[instance]
            .memories
            .get(MemoryIndex::from_u32(0))
            .copied()?;
        Some(&mut self.store.memories[memory].data)
    }

    /// The store's current context value.
    pub fn context(&self) -> ContextValue {
        self.store.context.clone()
    }

    pub fn store(&mut self) -> &mut Store {
        &mut *self.store
    }
}

/// Identity of the function a [`FunctionListener`] is observing.
#[derive(Debug)]
pub struct FuncInfo<'a> {
    /// Name from the module's name section or export table, when present.
    pub name: Option<&'a str>,
    /// Function index within the defining module, or `u32::MAX` for host
    /// functions.
    pub index: u32,
}

/// An observer invoked around every function call.
pub trait FunctionListener: Send + Sync {
    /// Called with the current context value and the raw parameter slots
    /// before the function body runs. Returning `Some` replaces the context
    /// value for the duration of this call.
    fn before(
        &self,
        context: &ContextValue,
        func: &FuncInfo<'_>,
        params: &[u64],
    ) -> Option<ContextValue>;

    /// Called with the result slots after the function returns normally.
    ///
    /// Not invoked when the call traps; the trap value is not observable
    /// from the listener.
    fn after(&self, context: &ContextValue, func: &FuncInfo<'_>, results: &[u64]);
}
