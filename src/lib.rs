extern crate alloc;

mod compile;
mod const_eval;
mod engine;
mod errors;
mod func;
mod global;
mod indices;
mod instance;
mod linker;
mod memory;
mod module;
mod store;
mod table;
mod translate;
mod traps;
mod type_registry;
mod utils;
mod values;
mod vm;

pub use engine::{Config, Engine};
pub use errors::{CompileError, Error, TranslationError};
pub use func::{Caller, Func, FuncInfo, FunctionListener};
pub use global::Global;
pub use instance::Instance;
pub use linker::{Extern, Linker};
pub use memory::Memory;
pub use module::Module;
pub use store::{CloseHandle, ContextValue, Store};
pub use table::Table;
pub use translate::{WasmFuncType, WasmValType};
pub use traps::{FrameInfo, Trap, WasmBacktrace};
pub use values::{Ref, Val};

pub type Result<T> = core::result::Result<T, Error>;

/// WebAssembly page sizes are defined to be 64KiB.
pub const WASM_PAGE_SIZE: u32 = 0x10000;

/// The number of pages (for 32-bit modules) we can have before we run out of
/// byte index space.
pub const WASM32_MAX_PAGES: u64 = 1 << 16;
/// Maximum size, in bytes, of 32-bit memories (4G)
pub const WASM32_MAX_SIZE: u64 = 1 << 32;

/// Default ceiling for the call frame stack, in frames.
///
/// Each active WebAssembly call occupies one frame; exceeding the ceiling
/// raises [`Trap::CallStackOverflow`]. Override with
/// [`Config::call_stack_ceiling`].
pub const DEFAULT_CALL_STACK_CEILING: u32 = 2000;
