//! The operation dispatcher: a stack machine over 64-bit value slots and
//! explicit call frames.
//!
//! Execution of one invocation is strictly sequential; the engine never
//! yields. Traps are threaded as `Result`s out of every handler, not
//! panics, and unwind the whole invocation while collecting the backtrace.

mod dispatch;
pub(crate) mod numeric;
pub(crate) mod simd;

use crate::compile::CompiledFunction;
use crate::store::{ContextValue, FuncId, InstanceId, MemoryId, Store};
use crate::traps::{FrameInfo, Trap, WasmBacktrace};
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// One active WebAssembly call.
pub(crate) struct Frame {
    pub func: FuncId,
    pub code: Arc<CompiledFunction>,
    pub instance: InstanceId,
    /// Memory index 0 of the owning instance, resolved once per call.
    pub memory: Option<MemoryId>,
    pub pc: u32,
    /// Value-stack index of the frame's first local slot.
    pub base: u32,
    /// Context value displaced by the listener's `before` hook, restored
    /// when the frame is popped.
    pub saved_context: Option<ContextValue>,
}

/// Per-invocation execution state. Created per top-level call, never
/// shared.
pub(crate) struct CallEngine {
    pub stack: Vec<u64>,
    pub frames: Vec<Frame>,
}

/// A fault raised by the dispatcher: a wasm trap, or the distinguished
/// module-closed condition (which is not a trap).
#[derive(Debug)]
pub(crate) enum VmFault {
    Trap(Trap),
    Closed { exit_code: u32 },
}

impl From<Trap> for VmFault {
    fn from(trap: Trap) -> Self {
        VmFault::Trap(trap)
    }
}

/// Run `func` with the given parameter slots; on success `stack` holds
/// exactly the result slots.
pub(crate) fn invoke(store: &mut Store, func: FuncId, stack: &mut Vec<u64>) -> crate::Result<()> {
    let mut engine = CallEngine {
        stack: core::mem::take(stack),
        frames: Vec::new(),
    };

    let result = dispatch::call_function(store, &mut engine, func, None)
        .and_then(|()| dispatch::run(store, &mut engine));

    match result {
        Ok(()) => {
            *stack = engine.stack;
            Ok(())
        }
        Err(fault) => {
            let error = fault_to_error(store, &engine, fault);
            // Unwind: restore any listener-replaced context values, then
            // abandon the value stack.
            for frame in engine.frames.drain(..).rev() {
                if let Some(context) = frame.saved_context {
                    store.context = context;
                }
            }
            engine.stack.clear();
            *stack = engine.stack;
            Err(error)
        }
    }
}

fn fault_to_error(store: &Store, engine: &CallEngine, fault: VmFault) -> crate::Error {
    match fault {
        VmFault::Closed { exit_code } => crate::Error::ModuleClosed { exit_code },
        VmFault::Trap(trap) => {
            let mut frames = Vec::with_capacity(engine.frames.len());
            for frame in engine.frames.iter().rev() {
                frames.push(frame_info(store, frame));
            }
            crate::Error::Trap {
                trap,
                backtrace: WasmBacktrace::from_frames(frames),
            }
        }
    }
}

/// Describe one frame for the backtrace: function name (name section or
/// export table) plus its parameter and result types.
fn frame_info(store: &Store, frame: &Frame) -> FrameInfo {
    let record = &store.funcs[frame.func];
    let ty = store
        .engine
        .type_registry()
        .get(record.ty)
        .expect("function type is registered with its engine");

    let module = &store.instances[frame.instance].module;
    let index = frame.code.index;
    FrameInfo::new(
        module.name().map(ToString::to_string),
        module.func_name(index).map(ToString::to_string),
        index.as_u32(),
        ty.params.to_vec(),
        ty.results.to_vec(),
    )
}
