use crate::const_eval::ConstExprEvaluator;
use crate::func::Func;
use crate::global::GlobalData;
use crate::indices::{DataIndex, ElemIndex, FuncIndex, GlobalIndex, MemoryIndex, TableIndex};
use crate::linker::{export_to_extern, Extern};
use crate::memory::MemoryData;
use crate::module::Module;
use crate::store::{
    funcref_to_raw, CloseHandle, FuncId, FunctionKind, FunctionRecord, GlobalId, InstanceId,
    MemoryId, Store, TableId,
};
use crate::table::TableData;
use crate::translate::{TableInitialValue, TableSegmentElements, WasmValType};
use crate::traps::{Trap, WasmBacktrace};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::AtomicU64;
use cranelift_entity::{EntitySet, PrimaryMap};
use hashbrown::HashMap;

/// An instantiated module in a [`Store`].
#[derive(Debug, Clone, Copy)]
pub struct Instance(pub(crate) InstanceId);

/// Per-instance runtime state: dense maps from module index spaces to store
/// arenas, the materialized passive element segments, and the close flag.
pub(crate) struct InstanceData {
    pub module: Module,
    pub functions: PrimaryMap<FuncIndex, FuncId>,
    pub tables: PrimaryMap<TableIndex, TableId>,
    pub memories: PrimaryMap<MemoryIndex, MemoryId>,
    pub globals: PrimaryMap<GlobalIndex, GlobalId>,
    /// Passive element segments resolved to raw funcref slots.
    /// `elem.drop` removes entries; active segments never appear here.
    pub passive_elements: HashMap<ElemIndex, Box<[u64]>>,
    /// Passive data segments dropped at runtime by `data.drop`.
    pub dropped_data: EntitySet<DataIndex>,
    pub closed: Arc<AtomicU64>,
}

/// Resolved imports in module declaration order, one vector per index space.
#[derive(Debug, Default)]
pub(crate) struct Imports {
    pub functions: Vec<FuncId>,
    pub tables: Vec<TableId>,
    pub memories: Vec<MemoryId>,
    pub globals: Vec<GlobalId>,
}

/// Bind `module` to concrete per-instance state.
///
/// Imported entities come first in each index space, then the locally
/// defined ones; active element and data segments are applied with bounds
/// checks, and the start function (if any) runs before the instance is
/// handed back.
pub(crate) fn instantiate(
    store: &mut Store,
    module: &Module,
    imports: Imports,
) -> crate::Result<Instance> {
    let translated = module.translated();

    let id = store.instances.push(InstanceData {
        module: module.clone(),
        functions: PrimaryMap::new(),
        tables: PrimaryMap::new(),
        memories: PrimaryMap::new(),
        globals: PrimaryMap::new(),
        passive_elements: HashMap::new(),
        dropped_data: EntitySet::new(),
        closed: Arc::new(AtomicU64::new(0)),
    });

    // Functions: imports first, then records over the shared compiled code.
    let mut functions = PrimaryMap::with_capacity(translated.functions.len());
    for import in &imports.functions {
        functions.push(*import);
    }
    for def_index in 0..translated.num_defined_functions() {
        let def_index = crate::indices::DefinedFuncIndex::from_u32(def_index);
        let func_index = translated.func_index(def_index);
        let compiled = module.code().functions[def_index].clone();
        let ty = module
            .type_collection()
            .shared_type(translated.functions[func_index]);
        functions.push(store.funcs.push(FunctionRecord {
            kind: FunctionKind::Wasm(compiled),
            ty,
            instance: Some(id),
        }));
    }

    let mut const_eval = ConstExprEvaluator::new();

    // Globals: imports first, then evaluated initializers. A funcref global
    // initialized with `ref.func` materializes to the funcref handle here;
    // `ref.null` becomes the zero slot.
    let mut globals = PrimaryMap::with_capacity(translated.globals.len());
    for import in &imports.globals {
        globals.push(*import);
    }
    for (def_index, init) in translated.global_initializers.iter() {
        let global_index = translated.global_index(def_index);
        let ty = translated.globals[global_index];
        let val_type = WasmValType::from_wasmparser(ty.content_type)?;
        let value = const_eval.eval(store, &functions, &globals, init);
        globals.push(store.globals.push(GlobalData::new(
            ty,
            val_type,
            value as u64,
            (value >> 64) as u64,
        )));
    }

    // Memories.
    let mut memories = PrimaryMap::with_capacity(translated.memories.len());
    for import in &imports.memories {
        memories.push(*import);
    }
    for def_index in translated.num_imported_memories..translated.memories.len() as u32 {
        let ty = translated.memories[MemoryIndex::from_u32(def_index)];
        memories.push(store.memories.push(MemoryData::new(ty)));
    }

    // Tables, with their initial fill value.
    let mut tables = PrimaryMap::with_capacity(translated.tables.len());
    for import in &imports.tables {
        tables.push(*import);
    }
    for (def_index, init) in translated.table_initializers.initial_values.iter() {
        let table_index = translated.table_index(def_index);
        let ty = translated.tables[table_index];
        let init = match init {
            TableInitialValue::RefNull => 0,
            TableInitialValue::ConstExpr(expr) => {
                const_eval.eval(store, &functions, &globals, expr) as u64
            }
        };
        tables.push(store.tables.push(TableData::new(ty, init)));
    }

    // Passive element segments resolve to funcref slots once, up front.
    let mut passive_elements = HashMap::new();
    for (elem_index, elements) in &translated.passive_table_initializers {
        let resolved =
            resolve_segment_elements(store, &mut const_eval, &functions, &globals, elements);
        passive_elements.insert(*elem_index, resolved);
    }

    // Active element segments.
    for segment in &translated.table_initializers.segments {
        let offset = const_eval.eval(store, &functions, &globals, &segment.offset) as u32;
        let elements =
            resolve_segment_elements(store, &mut const_eval, &functions, &globals, &segment.elements);

        let table = &mut store.tables[tables[segment.table_index]];
        let end = u64::from(offset) + elements.len() as u64;
        if end > table.elements.len() as u64 {
            return Err(instantiation_trap(Trap::InvalidTableAccess));
        }
        table.elements[offset as usize..end as usize].copy_from_slice(&elements);
    }

    // Active data segments.
    for initializer in &translated.memory_initializers {
        let offset = const_eval.eval(store, &functions, &globals, &initializer.offset) as u32;
        let memory = &mut store.memories[memories[initializer.memory_index]];
        let end = u64::from(offset) + initializer.bytes.len() as u64;
        if end > memory.data.len() as u64 {
            return Err(instantiation_trap(Trap::OutOfBoundsMemoryAccess));
        }
        memory.data[offset as usize..end as usize].copy_from_slice(&initializer.bytes);
    }

    let data = &mut store.instances[id];
    data.functions = functions;
    data.tables = tables;
    data.memories = memories;
    data.globals = globals;
    data.passive_elements = passive_elements;

    if let Some(start) = translated.start {
        let func = store.instances[id].functions[start];
        let mut stack = Vec::new();
        crate::vm::invoke(store, func, &mut stack)?;
    }

    Ok(Instance(id))
}

fn resolve_segment_elements(
    store: &Store,
    const_eval: &mut ConstExprEvaluator,
    functions: &PrimaryMap<FuncIndex, FuncId>,
    globals: &PrimaryMap<GlobalIndex, GlobalId>,
    elements: &TableSegmentElements,
) -> Box<[u64]> {
    match elements {
        TableSegmentElements::Functions(indices) => indices
            .iter()
            .map(|index| funcref_to_raw(functions[*index]))
            .collect(),
        TableSegmentElements::Expressions(exprs) => exprs
            .iter()
            .map(|expr| const_eval.eval(store, functions, globals, expr) as u64)
            .collect(),
    }
}

fn instantiation_trap(trap: Trap) -> crate::Error {
    crate::Error::Trap {
        trap,
        backtrace: WasmBacktrace::empty(),
    }
}

impl Instance {
    /// The module this instance was created from.
    pub fn module(&self, store: &Store) -> Module {
        store.instances[self.0].module.clone()
    }

    /// Look up an exported entity by name.
    pub fn get_export(&self, store: &Store, name: &str) -> Option<Extern> {
        let data = &store.instances[self.0];
        let index = data.module.get_export(name)?;
        Some(export_to_extern(data, index))
    }

    /// Look up an exported function by name.
    pub fn get_func(&self, store: &Store, name: &str) -> Option<Func> {
        match self.get_export(store, name)? {
            Extern::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Look up an exported memory by name.
    pub fn get_memory(&self, store: &Store, name: &str) -> Option<crate::Memory> {
        match self.get_export(store, name)? {
            Extern::Memory(m) => Some(m),
            _ => None,
        }
    }

    /// Look up an exported table by name.
    pub fn get_table(&self, store: &Store, name: &str) -> Option<crate::Table> {
        match self.get_export(store, name)? {
            Extern::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Look up an exported global by name.
    pub fn get_global(&self, store: &Store, name: &str) -> Option<crate::Global> {
        match self.get_export(store, name)? {
            Extern::Global(g) => Some(g),
            _ => None,
        }
    }

    /// All exports of this instance.
    pub fn exports(&self, store: &Store) -> Vec<(String, Extern)> {
        let data = &store.instances[self.0];
        data.module
            .translated()
            .exports
            .iter()
            .map(|(name, index)| (name.clone(), export_to_extern(data, *index)))
            .collect()
    }

    /// Mark this instance closed.
    ///
    /// In-flight calls observe the flag cooperatively and unwind with
    /// [`Error::ModuleClosed`](crate::Error::ModuleClosed); new calls fail
    /// immediately.
    pub fn close_with_exit_code(&self, store: &Store, exit_code: u32) {
        self.close_handle(store).close_with_exit_code(exit_code);
    }

    /// A handle for closing this instance from another thread.
    pub fn close_handle(&self, store: &Store) -> CloseHandle {
        CloseHandle {
            flag: store.instances[self.0].closed.clone(),
        }
    }
}
