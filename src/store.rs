use crate::compile::CompiledFunction;
use crate::engine::Engine;
use crate::global::GlobalData;
use crate::indices::SharedTypeIndex;
use crate::instance::InstanceData;
use crate::memory::MemoryData;
use crate::table::TableData;
use crate::translate::WasmFuncType;
use crate::traps::Trap;
use crate::func::Caller;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use cranelift_entity::{entity_impl, PrimaryMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);
entity_impl!(InstanceId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);
entity_impl!(FuncId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryId(u32);
entity_impl!(MemoryId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);
entity_impl!(TableId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(u32);
entity_impl!(GlobalId);

/// The context value handed to host functions and listeners.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Encode a function-record id as the 64-bit funcref slot value.
///
/// Funcrefs are the record's arena index plus one, so the all-zero slot is
/// the null reference.
#[inline]
pub(crate) fn funcref_to_raw(id: FuncId) -> u64 {
    u64::from(id.as_u32()) + 1
}

#[inline]
pub(crate) fn funcref_from_raw(raw: u64) -> Option<FuncId> {
    if raw == 0 {
        None
    } else {
        Some(FuncId::from_u32((raw - 1) as u32))
    }
}

/// The callback type for host functions: parameter slots in, result slots
/// out, one 64-bit slot per scalar and two per v128.
pub(crate) type HostFn =
    dyn Fn(Caller<'_>, &[u64], &mut [u64]) -> Result<(), Trap> + Send + Sync;

/// The runtime identity of one function within this store: either a wasm
/// function bound to its instance, or a host callback.
pub(crate) struct FunctionRecord {
    pub kind: FunctionKind,
    /// Engine-interned type, compared by `call_indirect`.
    pub ty: SharedTypeIndex,
    /// The owning instance; `None` for host functions.
    pub instance: Option<InstanceId>,
}

pub(crate) enum FunctionKind {
    Wasm(Arc<CompiledFunction>),
    Host(HostFuncData),
}

pub(crate) struct HostFuncData {
    pub ty: WasmFuncType,
    /// `module::name` the function was registered under, for diagnostics.
    pub name: String,
    pub callback: Arc<HostFn>,
}

impl fmt::Debug for FunctionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            FunctionKind::Wasm(_) => "wasm",
            FunctionKind::Host(_) => "host",
        };
        f.debug_struct("FunctionRecord")
            .field("kind", &kind)
            .field("ty", &self.ty)
            .field("instance", &self.instance)
            .finish()
    }
}

/// Owner of all runtime state: instances, function records, memories,
/// tables and globals live in arenas here and are addressed by dense ids.
///
/// A store is used by at most one invocation at a time (`&mut` access
/// enforces this); engines and modules may be shared across stores freely.
pub struct Store {
    pub(crate) engine: Engine,
    pub(crate) instances: PrimaryMap<InstanceId, InstanceData>,
    pub(crate) funcs: PrimaryMap<FuncId, FunctionRecord>,
    pub(crate) memories: PrimaryMap<MemoryId, MemoryData>,
    pub(crate) tables: PrimaryMap<TableId, TableData>,
    pub(crate) globals: PrimaryMap<GlobalId, GlobalData>,
    pub(crate) context: ContextValue,
    /// Reusable slot buffer for call marshalling.
    call_scratch: Vec<u64>,
}

impl Store {
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
            instances: PrimaryMap::new(),
            funcs: PrimaryMap::new(),
            memories: PrimaryMap::new(),
            tables: PrimaryMap::new(),
            globals: PrimaryMap::new(),
            context: Arc::new(()),
            call_scratch: Vec::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Install the context value observed by host functions and listeners.
    pub fn set_context(&mut self, context: ContextValue) {
        self.context = context;
    }

    pub fn context(&self) -> &ContextValue {
        &self.context
    }

    pub(crate) fn take_call_scratch(&mut self) -> Vec<u64> {
        let mut scratch = core::mem::take(&mut self.call_scratch);
        scratch.clear();
        scratch
    }

    pub(crate) fn return_call_scratch(&mut self, scratch: Vec<u64>) {
        self.call_scratch = scratch;
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("instances", &self.instances.len())
            .field("funcs", &self.funcs.len())
            .field("memories", &self.memories.len())
            .field("tables", &self.tables.len())
            .field("globals", &self.globals.len())
            .finish()
    }
}

const CLOSED_BIT: u64 = 1 << 63;

/// A cloneable handle for closing an instance from another thread while a
/// call may be in flight.
///
/// Closing is cooperative: the running invocation observes the flag at its
/// next call boundary (or loop header, when the engine was configured with
/// `ensure_termination`) and unwinds with
/// [`Error::ModuleClosed`](crate::Error::ModuleClosed).
#[derive(Debug, Clone)]
pub struct CloseHandle {
    pub(crate) flag: Arc<AtomicU64>,
}

impl CloseHandle {
    pub fn close_with_exit_code(&self, exit_code: u32) {
        // First close wins; later exit codes are ignored.
        let _ = self.flag.compare_exchange(
            0,
            CLOSED_BIT | u64::from(exit_code),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn is_closed(&self) -> bool {
        self.flag.load(Ordering::Acquire) != 0
    }
}

/// Decode a close flag into its exit code, if the flag is set.
#[inline]
pub(crate) fn closed_exit_code(flag: &AtomicU64) -> Option<u32> {
    let v = flag.load(Ordering::Acquire);
    if v == 0 {
        None
    } else {
        Some((v & !CLOSED_BIT) as u32)
    }
}
