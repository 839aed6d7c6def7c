use crate::indices::{SharedTypeIndex, TypeIndex};
use crate::translate::{TranslatedModule, WasmFuncType};
use cranelift_entity::PrimaryMap;
use hashbrown::HashMap;
use spin::RwLock;

/// Engine-wide interner for function types.
///
/// `call_indirect` compares [`SharedTypeIndex`]es, so all modules loaded into
/// one engine must agree on them; the registry is the single source of that
/// agreement. Lookups vastly outnumber insertions, hence the reader-writer
/// lock.
#[derive(Debug, Default)]
pub(crate) struct TypeRegistry {
    inner: RwLock<TypeRegistryInner>,
}

#[derive(Debug, Default)]
struct TypeRegistryInner {
    map: HashMap<WasmFuncType, SharedTypeIndex>,
    types: PrimaryMap<SharedTypeIndex, WasmFuncType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `ty`, returning its engine-wide index.
    pub fn register(&self, ty: &WasmFuncType) -> SharedTypeIndex {
        if let Some(index) = self.inner.read().map.get(ty) {
            return *index;
        }

        let mut inner = self.inner.write();
        // Racing registrations of the same type must converge on one index.
        if let Some(index) = inner.map.get(ty) {
            return *index;
        }
        let index = inner.types.push(ty.clone());
        inner.map.insert(ty.clone(), index);
        index
    }

    /// The function type behind `index`.
    pub fn get(&self, index: SharedTypeIndex) -> Option<WasmFuncType> {
        self.inner.read().types.get(index).cloned()
    }

    /// Intern every type of `module`, producing its per-module mapping.
    pub fn register_module_types(&self, module: &TranslatedModule) -> RuntimeTypeCollection {
        let mut type_map = PrimaryMap::with_capacity(module.types.len());
        for (_, ty) in module.types.iter() {
            type_map.push(self.register(ty));
        }
        RuntimeTypeCollection { type_map }
    }
}

/// A module's view into the engine type registry: module-local type index →
/// engine-wide shared index.
#[derive(Debug)]
pub(crate) struct RuntimeTypeCollection {
    type_map: PrimaryMap<TypeIndex, SharedTypeIndex>,
}

impl RuntimeTypeCollection {
    #[inline]
    pub fn shared_type(&self, index: TypeIndex) -> SharedTypeIndex {
        self.type_map[index]
    }

    #[inline]
    pub fn type_map(&self) -> &PrimaryMap<TypeIndex, SharedTypeIndex> {
        &self.type_map
    }
}
