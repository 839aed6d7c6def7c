use crate::compile::compile_function;
use crate::engine::CodeBundle;
use crate::indices::{EntityIndex, FuncIndex};
use crate::translate::{Import, ModuleTranslator, TranslatedModule};
use crate::type_registry::RuntimeTypeCollection;
use crate::Engine;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;
use cranelift_entity::PrimaryMap;
use wasmparser::{FuncValidatorAllocations, Validator};

/// A compiled WebAssembly module: the translated section data plus every
/// defined function lowered to the interpreter's operation sequence.
///
/// Cheap to clone and safe to instantiate any number of times.
#[derive(Debug, Clone)]
pub struct Module(Arc<ModuleInner>);

#[derive(Debug)]
struct ModuleInner {
    translated: TranslatedModule,
    code: Arc<CodeBundle>,
    type_collection: RuntimeTypeCollection,
    engine: Engine,
}

impl Module {
    /// Compile a module from WebAssembly text format.
    pub fn from_wat(engine: &Engine, wat: &str) -> crate::Result<Self> {
        let bytes = wat::parse_str(wat)?;
        Self::from_bytes(engine, &bytes)
    }

    /// Compile a module from its binary encoding.
    ///
    /// The blob is decoded and validated section-by-section, its types are
    /// interned in the engine, and each function body is lowered; lowered
    /// code is cached in the engine, keyed by the blob's content, so
    /// re-loading the same bytes skips compilation.
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> crate::Result<Self> {
        let mut validator = Validator::new_with_features(engine.features());
        let mut translation = ModuleTranslator::new(&mut validator).translate(bytes)?;

        let type_collection = engine
            .type_registry()
            .register_module_types(&translation.module);

        let key = Engine::cache_key(bytes);
        let code = match engine.cached_code(key) {
            Some(code) => {
                tracing::trace!("code cache hit for {} byte module", bytes.len());
                code
            }
            None => {
                let inputs = mem::take(&mut translation.func_compile_inputs);
                let mut functions = PrimaryMap::with_capacity(inputs.len());
                let mut allocs = FuncValidatorAllocations::default();
                for (def_index, input) in inputs.into_iter() {
                    let (compiled, returned) = compile_function(
                        &translation.module,
                        type_collection.type_map(),
                        def_index,
                        input,
                        engine.config().ensure_termination,
                        allocs,
                    )?;
                    allocs = returned;
                    functions.push(Arc::new(compiled));
                }
                let code = Arc::new(CodeBundle { functions });
                engine.insert_code(key, code.clone());
                code
            }
        };

        Ok(Self(Arc::new(ModuleInner {
            translated: translation.module,
            code,
            type_collection,
            engine: engine.clone(),
        })))
    }

    /// The imports this module requires, in declaration order.
    pub fn imports(&self) -> impl ExactSizeIterator<Item = &Import> {
        self.0.translated.imports.iter()
    }

    /// The entities this module exports.
    pub fn exports(&self) -> impl Iterator<Item = (&str, EntityIndex)> + '_ {
        self.0
            .translated
            .exports
            .iter()
            .map(|(name, index)| (name.as_str(), *index))
    }

    /// The module's name from the name section, if present.
    pub fn name(&self) -> Option<&str> {
        self.0.translated.name.as_deref()
    }

    pub(crate) fn get_export(&self, name: &str) -> Option<EntityIndex> {
        self.0.translated.exports.get(name).copied()
    }

    pub(crate) fn func_name(&self, index: FuncIndex) -> Option<&str> {
        self.0.translated.func_names.get(&index).map(|s| s.as_str())
    }

    pub(crate) fn translated(&self) -> &TranslatedModule {
        &self.0.translated
    }

    pub(crate) fn code(&self) -> &CodeBundle {
        &self.0.code
    }

    pub(crate) fn type_collection(&self) -> &RuntimeTypeCollection {
        &self.0.type_collection
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.0.engine
    }

    /// Exported function names, mostly for diagnostics.
    pub fn export_names(&self) -> Vec<&str> {
        self.0
            .translated
            .exports
            .keys()
            .map(|s| s.as_str())
            .collect()
    }
}
