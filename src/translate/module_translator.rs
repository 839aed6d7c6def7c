use crate::indices::{DataIndex, ElemIndex, EntityIndex, FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::translate::const_expr::ConstExpr;
use crate::translate::{
    EntityType, FuncCompileInput, Import, MemoryInitializer, TableInitialValue, TableSegment,
    TableSegmentElements, Translation, WasmFuncType,
};
use crate::wasm_unsupported;
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;
use wasmparser::{
    BinaryReader, DataKind, DataSectionReader, ElementItems, ElementKind, ElementSectionReader,
    ExportSectionReader, ExternalKind, FunctionSectionReader, GlobalSectionReader,
    ImportSectionReader, MemorySectionReader, Name, NameSectionReader, Parser, Payload,
    TableInit, TableSectionReader, TypeRef, TypeSectionReader, Validator,
};

/// Reads a module's sections into a [`Translation`], feeding every payload
/// through the section-level validator first.
///
/// Function bodies are collected but not compiled here; the IR compiler
/// consumes them together with their [`wasmparser::FuncToValidate`].
pub struct ModuleTranslator<'a, 'wasm> {
    result: Translation<'wasm>,
    validator: &'a mut Validator,
}

impl<'a, 'wasm> ModuleTranslator<'a, 'wasm> {
    pub fn new(validator: &'a mut Validator) -> Self {
        Self {
            result: Translation::default(),
            validator,
        }
    }

    pub fn translate(
        mut self,
        data: &'wasm [u8],
    ) -> Result<Translation<'wasm>, crate::TranslationError> {
        let mut parser = Parser::default();
        parser.set_features(*self.validator.features());

        for payload in parser.parse_all(data) {
            self.translate_payload(payload?)?;
        }

        self.validator.reset();
        Ok(self.result)
    }

    fn translate_payload(
        &mut self,
        payload: Payload<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        match payload {
            Payload::Version {
                num,
                encoding,
                range,
            } => {
                self.validator.version(num, encoding, &range)?;
            }
            Payload::End(offset) => {
                self.validator.end(offset)?;
            }
            Payload::TypeSection(types) => {
                self.validator.type_section(&types)?;
                self.read_type_section(types)?;
            }
            Payload::ImportSection(imports) => {
                self.validator.import_section(&imports)?;
                self.read_import_section(imports)?;
            }
            Payload::FunctionSection(functions) => {
                self.validator.function_section(&functions)?;
                self.read_function_section(functions)?;
            }
            Payload::TableSection(tables) => {
                self.validator.table_section(&tables)?;
                self.read_table_section(tables)?;
            }
            Payload::MemorySection(memories) => {
                self.validator.memory_section(&memories)?;
                self.read_memory_section(memories)?;
            }
            Payload::TagSection(tags) => {
                self.validator.tag_section(&tags)?;
                return Err(wasm_unsupported!("exception handling"));
            }
            Payload::GlobalSection(globals) => {
                self.validator.global_section(&globals)?;
                self.read_global_section(globals)?;
            }
            Payload::ExportSection(exports) => {
                self.validator.export_section(&exports)?;
                self.read_export_section(exports)?;
            }
            Payload::StartSection { func, range } => {
                self.validator.start_section(func, &range)?;
                self.result.module.start = Some(FuncIndex::from_u32(func));
            }
            Payload::ElementSection(elements) => {
                self.validator.element_section(&elements)?;
                self.read_element_section(elements)?;
            }
            Payload::DataCountSection { count, range } => {
                self.validator.data_count_section(count, &range)?;
            }
            Payload::DataSection(section) => {
                self.validator.data_section(&section)?;
                self.read_data_section(section)?;
            }
            Payload::CodeSectionStart { count, range, .. } => {
                self.validator.code_section_start(count, &range)?;
                self.result
                    .func_compile_inputs
                    .reserve_exact(count as usize);
            }
            Payload::CodeSectionEntry(body) => {
                let validator = self.validator.code_section_entry(&body)?;
                self.result
                    .func_compile_inputs
                    .push(FuncCompileInput { body, validator });
            }
            Payload::CustomSection(sec) if sec.name() == "name" => {
                self.read_name_section(NameSectionReader::new(BinaryReader::new(
                    sec.data(),
                    sec.data_offset(),
                )))?;
            }
            Payload::CustomSection(sec) => {
                tracing::warn!("ignoring custom section {:?}", sec.name());
            }
            Payload::ModuleSection { .. }
            | Payload::InstanceSection(_)
            | Payload::CoreTypeSection(_)
            | Payload::ComponentSection { .. }
            | Payload::ComponentInstanceSection(_)
            | Payload::ComponentAliasSection(_)
            | Payload::ComponentTypeSection(_)
            | Payload::ComponentCanonicalSection(_)
            | Payload::ComponentStartSection { .. }
            | Payload::ComponentImportSection(_)
            | Payload::ComponentExportSection(_) => {
                return Err(wasm_unsupported!("component module"));
            }
            p => tracing::warn!("unknown section {p:?}"),
        }

        Ok(())
    }

    fn read_type_section(
        &mut self,
        types: TypeSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        let count = types.count();
        self.result.module.types.reserve_exact(count as usize);

        for ty in types.into_iter_err_on_gc_types() {
            let ty = WasmFuncType::from_wasmparser(&ty?)?;
            self.result.module.types.push(ty);
        }

        Ok(())
    }

    fn read_import_section(
        &mut self,
        imports: ImportSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        self.result
            .module
            .imports
            .reserve_exact(imports.count() as usize);

        for import in imports {
            let import = import?;
            let ty = match import.ty {
                TypeRef::Func(index) => {
                    let index = TypeIndex::from_u32(index);
                    self.result.module.num_imported_functions += 1;
                    self.result.module.functions.push(index);
                    EntityType::Function(index)
                }
                TypeRef::Table(ty) => {
                    self.result.module.num_imported_tables += 1;
                    EntityType::Table(self.result.module.tables.push(ty))
                }
                TypeRef::Memory(ty) => {
                    self.result.module.num_imported_memories += 1;
                    EntityType::Memory(self.result.module.memories.push(ty))
                }
                TypeRef::Global(ty) => {
                    self.result.module.num_imported_globals += 1;
                    EntityType::Global(self.result.module.globals.push(ty))
                }

                // doesn't get past validation
                TypeRef::Tag(_) => unreachable!(),
            };

            self.result.module.imports.push(Import {
                module: import.module.to_string(),
                name: import.name.to_string(),
                ty,
            });
        }

        Ok(())
    }

    fn read_function_section(
        &mut self,
        functions: FunctionSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        self.result
            .module
            .functions
            .reserve_exact(functions.count() as usize);

        for index in functions {
            let signature = TypeIndex::from_u32(index?);
            self.result.module.functions.push(signature);
        }

        Ok(())
    }

    fn read_table_section(
        &mut self,
        tables: TableSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        self.result
            .module
            .tables
            .reserve_exact(tables.count() as usize);
        self.result
            .module
            .table_initializers
            .initial_values
            .reserve_exact(tables.count() as usize);

        for table in tables {
            let table = table?;
            self.result.module.tables.push(table.ty);

            let init = match table.init {
                TableInit::RefNull => TableInitialValue::RefNull,
                TableInit::Expr(expr) => {
                    TableInitialValue::ConstExpr(ConstExpr::from_wasmparser(expr)?)
                }
            };
            self.result
                .module
                .table_initializers
                .initial_values
                .push(init);
        }

        Ok(())
    }

    fn read_memory_section(
        &mut self,
        memories: MemorySectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        self.result
            .module
            .memories
            .reserve_exact(memories.count() as usize);

        for ty in memories {
            self.result.module.memories.push(ty?);
        }

        Ok(())
    }

    fn read_global_section(
        &mut self,
        globals: GlobalSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        self.result
            .module
            .globals
            .reserve_exact(globals.count() as usize);
        self.result
            .module
            .global_initializers
            .reserve_exact(globals.count() as usize);

        for global in globals {
            let global = global?;
            self.result.module.globals.push(global.ty);

            let init_expr = ConstExpr::from_wasmparser(global.init_expr)?;
            self.result.module.global_initializers.push(init_expr);
        }

        Ok(())
    }

    fn read_export_section(
        &mut self,
        exports: ExportSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        for export in exports {
            let export = export?;
            let index = match export.kind {
                ExternalKind::Func => {
                    let index = FuncIndex::from_u32(export.index);
                    self.result
                        .module
                        .func_names
                        .entry(index)
                        .or_insert_with(|| export.name.to_string());
                    EntityIndex::Function(index)
                }
                ExternalKind::Table => EntityIndex::Table(TableIndex::from_u32(export.index)),
                ExternalKind::Memory => EntityIndex::Memory(MemoryIndex::from_u32(export.index)),
                ExternalKind::Global => EntityIndex::Global(GlobalIndex::from_u32(export.index)),
                // doesn't get past validation
                ExternalKind::Tag => unreachable!(),
            };

            self.result
                .module
                .exports
                .insert(export.name.to_string(), index);
        }

        Ok(())
    }

    fn read_element_section(
        &mut self,
        elements: ElementSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        for (elem_index, element) in elements.into_iter().enumerate() {
            let element = element?;
            let elem_index = ElemIndex::from_u32(elem_index as u32);

            let elements = match element.items {
                ElementItems::Functions(funcs) => {
                    let mut out = Vec::with_capacity(funcs.count() as usize);
                    for func_idx in funcs {
                        out.push(FuncIndex::from_u32(func_idx?));
                    }
                    TableSegmentElements::Functions(out.into_boxed_slice())
                }
                ElementItems::Expressions(_, exprs) => {
                    let mut out = Vec::with_capacity(exprs.count() as usize);
                    for expr in exprs {
                        out.push(ConstExpr::from_wasmparser(expr?)?);
                    }
                    TableSegmentElements::Expressions(out.into_boxed_slice())
                }
            };

            match element.kind {
                ElementKind::Active {
                    table_index,
                    offset_expr,
                } => {
                    let table_index = TableIndex::from_u32(table_index.unwrap_or(0));
                    let offset = ConstExpr::from_wasmparser(offset_expr)?;

                    self.result
                        .module
                        .table_initializers
                        .segments
                        .push(TableSegment {
                            table_index,
                            offset,
                            elements,
                        });
                    self.result
                        .module
                        .active_table_initializers
                        .insert(elem_index);
                }
                ElementKind::Passive => {
                    self.result
                        .module
                        .passive_table_initializers
                        .insert(elem_index, elements);
                }
                ElementKind::Declared => {}
            }
        }

        Ok(())
    }

    fn read_data_section(
        &mut self,
        section: DataSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        for (data_index, entry) in section.into_iter().enumerate() {
            let entry = entry?;
            let data_index = DataIndex::from_u32(data_index as u32);

            match entry.kind {
                DataKind::Active {
                    memory_index,
                    offset_expr,
                } => {
                    let memory_index = MemoryIndex::from_u32(memory_index);
                    let offset = ConstExpr::from_wasmparser(offset_expr)?;

                    self.result
                        .module
                        .memory_initializers
                        .push(MemoryInitializer {
                            memory_index,
                            offset,
                            bytes: Box::from(entry.data),
                        });
                    self.result
                        .module
                        .active_memory_initializers
                        .insert(data_index);
                }
                DataKind::Passive => {
                    self.result
                        .module
                        .passive_memory_initializers
                        .insert(data_index, Box::from(entry.data));
                }
            }
        }

        Ok(())
    }

    fn read_name_section(
        &mut self,
        reader: NameSectionReader<'wasm>,
    ) -> Result<(), crate::TranslationError> {
        for subsection in reader {
            match subsection? {
                Name::Module { name, .. } => {
                    self.result.module.name = Some(name.to_string());
                }
                Name::Function(names) => {
                    for name in names {
                        let name = name?;
                        // Skip this naming if it's naming a function that
                        // doesn't actually exist.
                        if (name.index as usize) < self.result.module.functions.len() {
                            self.result
                                .module
                                .func_names
                                .insert(FuncIndex::from_u32(name.index), name.name.to_string());
                        }
                    }
                }
                // Only module and function names matter for backtraces.
                _ => {}
            }
        }

        Ok(())
    }
}
