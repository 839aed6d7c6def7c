use crate::func::Func;
use crate::global::Global;
use crate::instance::{self, Imports, Instance, InstanceData};
use crate::memory::Memory;
use crate::module::Module;
use crate::store::{FunctionKind, FunctionRecord, HostFuncData, Store};
use crate::table::Table;
use crate::translate::{EntityType, WasmFuncType};
use crate::traps::Trap;
use crate::Caller;
use alloc::format;
use alloc::string::{String, ToString};
use hashbrown::HashMap;

/// An entity that can satisfy a module import.
#[derive(Debug, Clone, Copy)]
pub enum Extern {
    Func(Func),
    Table(Table),
    Memory(Memory),
    Global(Global),
}

/// Resolves a module's imports by `(module, name)` pairs.
///
/// Cross-module linking policy beyond this name lookup (shadowing,
/// namespacing conventions and the like) is the embedder's business.
#[derive(Debug, Default)]
pub struct Linker {
    definitions: HashMap<(String, String), Extern>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define an entity under `module::name`, replacing any previous
    /// definition.
    pub fn define(&mut self, module: &str, name: &str, item: Extern) -> &mut Self {
        self.definitions
            .insert((module.to_string(), name.to_string()), item);
        self
    }

    /// Register a host function under `module::name`.
    ///
    /// The callback receives the caller view plus raw parameter and result
    /// slots (one per scalar, two per v128) and may trap.
    pub fn func_new(
        &mut self,
        store: &mut Store,
        module: &str,
        name: &str,
        ty: WasmFuncType,
        callback: impl Fn(Caller<'_>, &[u64], &mut [u64]) -> Result<(), Trap> + Send + Sync + 'static,
    ) -> Func {
        let shared = store.engine.type_registry().register(&ty);
        let id = store.funcs.push(FunctionRecord {
            kind: FunctionKind::Host(HostFuncData {
                ty,
                name: format!("{module}::{name}"),
                callback: alloc::sync::Arc::new(callback),
            }),
            ty: shared,
            instance: None,
        });
        let func = Func::from_id(id);
        self.define(module, name, Extern::Func(func));
        func
    }

    /// Make every export of `instance` available under the `module`
    /// namespace.
    pub fn define_instance(
        &mut self,
        store: &Store,
        module: &str,
        instance: Instance,
    ) -> &mut Self {
        for (name, item) in instance.exports(store) {
            self.define(module, &name, item);
        }
        self
    }

    /// Instantiate `module`, resolving its imports from this linker's
    /// definitions.
    ///
    /// Import types are checked here; active segment application and the
    /// start function run as part of instantiation and may trap.
    pub fn instantiate(&self, store: &mut Store, module: &Module) -> crate::Result<Instance> {
        let mut imports = Imports::default();

        for import in module.imports() {
            let key = (import.module.clone(), import.name.clone());
            let Some(item) = self.definitions.get(&key) else {
                return Err(crate::Error::UnknownImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                });
            };

            self.check_import(store, module, import.ty, *item)
                .map_err(|reason| crate::Error::IncompatibleImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                    reason,
                })?;

            match item {
                Extern::Func(f) => imports.functions.push(f.id()),
                Extern::Table(t) => imports.tables.push(t.0),
                Extern::Memory(m) => imports.memories.push(m.0),
                Extern::Global(g) => imports.globals.push(g.0),
            }
        }

        instance::instantiate(store, module, imports)
    }

    fn check_import(
        &self,
        store: &Store,
        module: &Module,
        expected: EntityType,
        actual: Extern,
    ) -> Result<(), String> {
        match (expected, actual) {
            (EntityType::Function(type_index), Extern::Func(func)) => {
                let expected_ty = module.type_collection().shared_type(type_index);
                let actual_ty = store.funcs[func.id()].ty;
                if expected_ty != actual_ty {
                    let want = &module.translated().types[type_index];
                    return Err(format!("function type mismatch, expected {want}"));
                }
                Ok(())
            }
            (EntityType::Memory(index), Extern::Memory(memory)) => {
                let want = module.translated().memories[index];
                let have = &store.memories[memory.0];
                if have.size_pages() < want.initial {
                    return Err(format!(
                        "memory has {} pages, import requires at least {}",
                        have.size_pages(),
                        want.initial
                    ));
                }
                if let Some(want_max) = want.maximum {
                    match have.ty.maximum {
                        Some(have_max) if have_max <= want_max => {}
                        _ => return Err("memory maximum incompatible with import".to_string()),
                    }
                }
                Ok(())
            }
            (EntityType::Table(index), Extern::Table(table)) => {
                let want = module.translated().tables[index];
                let have = &store.tables[table.0];
                if have.ty.element_type != want.element_type {
                    return Err("table element type mismatch".to_string());
                }
                if (have.elements.len() as u64) < want.initial {
                    return Err(format!(
                        "table has {} elements, import requires at least {}",
                        have.elements.len(),
                        want.initial
                    ));
                }
                if let Some(want_max) = want.maximum {
                    match have.ty.maximum {
                        Some(have_max) if have_max <= want_max => {}
                        _ => return Err("table maximum incompatible with import".to_string()),
                    }
                }
                Ok(())
            }
            (EntityType::Global(index), Extern::Global(global)) => {
                let want = module.translated().globals[index];
                let have = &store.globals[global.0];
                if have.ty.content_type != want.content_type || have.ty.mutable != want.mutable {
                    return Err("global type mismatch".to_string());
                }
                Ok(())
            }
            (expected, _) => Err(format!("import kind mismatch, expected {expected:?}")),
        }
    }
}

pub(crate) fn export_to_extern(data: &InstanceData, index: crate::indices::EntityIndex) -> Extern {
    use crate::indices::EntityIndex;
    match index {
        EntityIndex::Function(i) => Extern::Func(Func::from_id(data.functions[i])),
        EntityIndex::Table(i) => Extern::Table(Table(data.tables[i])),
        EntityIndex::Memory(i) => Extern::Memory(Memory(data.memories[i])),
        EntityIndex::Global(i) => Extern::Global(Global(data.globals[i])),
    }
}
