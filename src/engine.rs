use crate::compile::CompiledFunction;
use crate::func::FunctionListener;
use crate::indices::DefinedFuncIndex;
use crate::type_registry::TypeRegistry;
use alloc::sync::Arc;
use core::fmt;
use core::hash::BuildHasher;
use cranelift_entity::PrimaryMap;
use hashbrown::HashMap;
use spin::RwLock;
use wasmparser::WasmFeatures;

/// Engine construction options.
///
/// There is deliberately no package-level configuration; everything an
/// engine needs is carried here.
#[derive(Clone)]
pub struct Config {
    pub(crate) call_stack_ceiling: u32,
    pub(crate) ensure_termination: bool,
    pub(crate) features: WasmFeatures,
    pub(crate) listener: Option<Arc<dyn FunctionListener>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of concurrently active call frames per invocation.
    ///
    /// Exceeding the ceiling traps with
    /// [`Trap::CallStackOverflow`](crate::Trap::CallStackOverflow).
    pub fn call_stack_ceiling(mut self, ceiling: u32) -> Self {
        self.call_stack_ceiling = ceiling;
        self
    }

    /// When set, the compiler plants a cancellation check at every loop
    /// header so that closing an instance interrupts even call-free loops.
    pub fn ensure_termination(mut self, enabled: bool) -> Self {
        self.ensure_termination = enabled;
        self
    }

    /// Override the enabled WebAssembly feature set.
    pub fn features(mut self, features: WasmFeatures) -> Self {
        self.features = features;
        self
    }

    /// Install an observer invoked around every function call.
    pub fn listener(mut self, listener: Arc<dyn FunctionListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            call_stack_ceiling: crate::DEFAULT_CALL_STACK_CEILING,
            ensure_termination: false,
            features: default_features(),
            listener: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("call_stack_ceiling", &self.call_stack_ceiling)
            .field("ensure_termination", &self.ensure_termination)
            .field("features", &self.features)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

fn default_features() -> WasmFeatures {
    // Wasm 2.0 numeric/memory/control/SIMD semantics plus the standardized
    // extensions the dispatcher implements; no threads, tail calls, GC or
    // 64-bit memories.
    let mut features = WasmFeatures::default();
    features.remove(
        WasmFeatures::THREADS
            | WasmFeatures::SHARED_EVERYTHING_THREADS
            | WasmFeatures::TAIL_CALL
            | WasmFeatures::MULTI_MEMORY
            | WasmFeatures::MEMORY64
            | WasmFeatures::EXCEPTIONS
            | WasmFeatures::RELAXED_SIMD
            | WasmFeatures::GC,
    );
    features
}

/// The engine: shared, immutable-after-construction state for compiling and
/// running modules.
///
/// Cheap to clone; all clones share the compiled-code cache and the type
/// registry.
#[derive(Clone)]
pub struct Engine(Arc<EngineInner>);

pub(crate) struct EngineInner {
    config: Config,
    type_registry: TypeRegistry,
    /// Compiled code keyed by the wasm blob's `(length, hash)`. Reads are
    /// frequent (every `Module::from_bytes`), writes happen on first-time
    /// compilation only.
    code_cache: RwLock<HashMap<CacheKey, Arc<CodeBundle>>>,
}

pub(crate) type CacheKey = (u64, u64);

/// The compiled bodies of one module's defined functions.
#[derive(Debug)]
pub(crate) struct CodeBundle {
    pub functions: PrimaryMap<DefinedFuncIndex, Arc<CompiledFunction>>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self(Arc::new(EngineInner {
            config,
            type_registry: TypeRegistry::new(),
            code_cache: RwLock::new(HashMap::new()),
        }))
    }

    pub(crate) fn config(&self) -> &Config {
        &self.0.config
    }

    pub(crate) fn features(&self) -> WasmFeatures {
        self.0.config.features
    }

    pub(crate) fn type_registry(&self) -> &TypeRegistry {
        &self.0.type_registry
    }

    pub(crate) fn cache_key(bytes: &[u8]) -> CacheKey {
        let hasher = hashbrown::DefaultHashBuilder::default();
        (bytes.len() as u64, hasher.hash_one(bytes))
    }

    pub(crate) fn cached_code(&self, key: CacheKey) -> Option<Arc<CodeBundle>> {
        self.0.code_cache.read().get(&key).cloned()
    }

    pub(crate) fn insert_code(&self, key: CacheKey, code: Arc<CodeBundle>) {
        self.0.code_cache.write().insert(key, code);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.0.config)
            .finish()
    }
}
