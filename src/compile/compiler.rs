use crate::compile::ir::{
    BranchTarget, FloatType, InclusiveRange, Operation, Shape, SignedInt, SignedType,
    UnsignedInt, UnsignedType, V128CmpKind, V128LoadKind, RETURN_PC,
};
use crate::compile::signature::{operator_signature, OpSignature, SlotType};
use crate::compile::CompiledFunction;
use crate::errors::CompileError;
use crate::indices::{
    DataIndex, DefinedFuncIndex, ElemIndex, FuncIndex, GlobalIndex, SharedTypeIndex, TableIndex,
    TypeIndex,
};
use crate::translate::{FuncCompileInput, TranslatedModule, WasmValType};
use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;
use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;
use wasmparser::{BlockType, FuncValidator, FuncValidatorAllocations, Operator, ValidatorResources};

/// Placeholder program counter for a forward branch whose destination has not
/// been emitted yet. Every occurrence must be patched before compilation
/// finishes; any survivor is a compile error.
const PENDING_PC: u32 = u32::MAX - 1;

#[derive(Debug, Clone, Copy)]
enum FixupKind {
    Br,
    BrIfThen,
    BrIfElse,
    BrTable(usize),
}

#[derive(Debug, Clone, Copy)]
struct Fixup {
    op: usize,
    kind: FixupKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    /// The implicit frame wrapping the whole function body. Branches to it
    /// return from the function.
    Function,
    Block,
    Loop {
        header: u32,
    },
    If {
        has_else: bool,
    },
}

struct ControlFrame {
    kind: FrameKind,
    /// Abstract stack height at block entry, in slots, params excluded.
    height: u32,
    params: SmallVec<[SlotType; 4]>,
    results: SmallVec<[SlotType; 4]>,
    /// Code is currently unreachable within this frame (after an
    /// unconditional branch, `return` or `unreachable`).
    unreachable: bool,
    /// The whole frame was entered from unreachable code; it produces no
    /// operations and no labels.
    dead: bool,
    /// Forward branches waiting for this frame's continuation.
    fixups: Vec<Fixup>,
    /// Branches waiting for this frame's `else` label (`if` frames only).
    else_fixups: Vec<Fixup>,
}

#[derive(Debug, Clone, Copy)]
struct Local {
    ty: WasmValType,
    /// Slot height of the local's first (low) slot within the frame.
    height: u32,
}

/// Lowers one validated function body into a [`CompiledFunction`].
///
/// This runs the single forward pass described in the module docs: every
/// operator is fed through the [`FuncValidator`] (which produces precise
/// offsets for malformed input), applied to the abstract slot stack, and
/// translated into zero or more operations with resolved branch targets.
pub(crate) fn compile_function(
    module: &TranslatedModule,
    type_map: &PrimaryMap<TypeIndex, SharedTypeIndex>,
    def_index: DefinedFuncIndex,
    input: FuncCompileInput<'_>,
    ensure_termination: bool,
    allocs: FuncValidatorAllocations,
) -> Result<(CompiledFunction, FuncValidatorAllocations), CompileError> {
    let func_index = module.func_index(def_index);
    let func_ty = module.func_type(func_index).clone();

    let mut validator = input.validator.into_validator(allocs);
    let mut compiler = FuncCompiler::new(module, type_map, &func_ty, ensure_termination);

    // Parameters first, then the declared locals.
    for ty in func_ty.params.iter() {
        compiler.declare_local(*ty);
    }
    compiler.param_slots = compiler.local_slots;

    let mut locals_reader = input.body.get_locals_reader()?;
    for _ in 0..locals_reader.get_count() {
        let offset = locals_reader.original_position();
        let (count, ty) = locals_reader.read()?;
        validator.define_locals(offset, count, ty)?;

        let ty = WasmValType::from_wasmparser(ty)
            .map_err(|_| CompileError::Unsupported("GC reference types".to_string()))?;
        for _ in 0..count {
            compiler.declare_local(ty);
        }
    }

    let mut reader = input.body.get_operators_reader()?;
    while !reader.eof() {
        let offset = reader.original_position();
        let op = reader.read()?;
        validator.op(offset, &op)?;
        compiler.offset = offset;
        compiler.translate_operator(&op)?;
    }
    validator.finish(reader.original_position())?;

    let compiled = compiler.finish(func_index, &func_ty)?;
    Ok((compiled, validator.into_allocations()))
}

struct FuncCompiler<'a> {
    module: &'a TranslatedModule,
    type_map: &'a PrimaryMap<TypeIndex, SharedTypeIndex>,
    ensure_termination: bool,

    ops: Vec<Operation>,
    stack: Vec<SlotType>,
    frames: Vec<ControlFrame>,
    locals: Vec<Local>,

    param_slots: u32,
    local_slots: u32,
    result_slots: u32,

    /// Byte offset of the operator currently being translated, for errors.
    offset: usize,
}

impl<'a> FuncCompiler<'a> {
    fn new(
        module: &'a TranslatedModule,
        type_map: &'a PrimaryMap<TypeIndex, SharedTypeIndex>,
        func_ty: &crate::translate::WasmFuncType,
        ensure_termination: bool,
    ) -> Self {
        let mut results = SmallVec::new();
        for ty in func_ty.results.iter() {
            SlotType::push_for(*ty, &mut results);
        }
        let result_slots = results.len() as u32;

        let frames = alloc::vec![ControlFrame {
            kind: FrameKind::Function,
            height: 0,
            params: SmallVec::new(),
            results,
            unreachable: false,
            dead: false,
            fixups: Vec::new(),
            else_fixups: Vec::new(),
        }];

        Self {
            module,
            type_map,
            ensure_termination,
            ops: Vec::new(),
            stack: Vec::new(),
            frames,
            locals: Vec::new(),
            param_slots: 0,
            local_slots: 0,
            result_slots,
            offset: 0,
        }
    }

    fn declare_local(&mut self, ty: WasmValType) {
        self.locals.push(Local {
            ty,
            height: self.local_slots,
        });
        SlotType::push_for(ty, &mut self.stack);
        self.local_slots += ty.slot_count();
    }

    fn finish(
        mut self,
        func_index: FuncIndex,
        func_ty: &crate::translate::WasmFuncType,
    ) -> Result<CompiledFunction, CompileError> {
        debug_assert!(self.frames.is_empty(), "unbalanced control frames");

        // Every forward branch must have been patched when its frame was
        // finalized; a survivor means a label was never resolved.
        for (i, op) in self.ops.iter().enumerate() {
            let unresolved = match op {
                Operation::Br { target } => target.pc == PENDING_PC,
                Operation::BrIf {
                    then_target,
                    else_target,
                } => then_target.pc == PENDING_PC || else_target.pc == PENDING_PC,
                Operation::BrTable { targets } => targets.iter().any(|t| t.pc == PENDING_PC),
                _ => false,
            };
            if unresolved {
                return Err(CompileError::UnresolvedLabel { operation: i });
            }
        }

        let local_types = self.locals.iter().map(|l| l.ty).collect();
        tracing::trace!(
            "compiled function {}: {} operations, {} local slots",
            func_index.as_u32(),
            self.ops.len(),
            self.local_slots,
        );

        Ok(CompiledFunction {
            body: core::mem::take(&mut self.ops).into_boxed_slice(),
            local_types,
            param_slots: self.param_slots,
            local_slots: self.local_slots,
            result_slots: func_ty.result_slots(),
            index: func_index,
        })
    }

    // ------------------------- stack helpers -------------------------

    fn internal_error(&self, message: &str) -> CompileError {
        CompileError::InvalidFunction {
            message: message.to_string(),
            offset: self.offset,
        }
    }

    fn pop_slot(&mut self) -> Result<SlotType, CompileError> {
        self.stack
            .pop()
            .ok_or_else(|| self.internal_error("value stack underflow"))
    }

    fn apply_signature(&mut self, sig: &OpSignature) -> Result<(), CompileError> {
        for expect in &sig.pops {
            let got = self.pop_slot()?;
            debug_assert_eq!(got, *expect, "slot type mismatch at offset {}", self.offset);
        }
        self.stack.extend(sig.pushes.iter().copied());
        Ok(())
    }

    fn is_unreachable(&self) -> bool {
        self.frames
            .last()
            .map(|f| f.unreachable || f.dead)
            .unwrap_or(true)
    }

    fn set_unreachable(&mut self) {
        let frame = self.frames.last_mut().expect("no control frame");
        frame.unreachable = true;
        self.stack.truncate(frame.height as usize);
    }

    fn emit(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// The drop range for a branch out to a frame at entry height
    /// `frame_height`, preserving the top `preserve` slots.
    fn drop_range(&self, preserve: u32, frame_height: u32) -> Option<InclusiveRange> {
        let height = self.stack.len() as u32;
        if height <= frame_height + preserve {
            return None;
        }
        Some(InclusiveRange {
            start: preserve,
            end: height - frame_height - 1,
        })
    }

    /// Resolve the destination of a branch to relative depth `depth`.
    ///
    /// Loops resolve immediately to their header and the outermost frame to
    /// the return sentinel; everything else is enqueued for patching when the
    /// frame's `end` is reached.
    fn branch_target(&mut self, depth: u32, kind: FixupKind) -> Result<BranchTarget, CompileError> {
        let idx = self
            .frames
            .len()
            .checked_sub(1 + depth as usize)
            .ok_or_else(|| self.internal_error("branch depth out of range"))?;

        if idx == 0 {
            let drop = self.drop_range(self.result_slots, 0);
            return Ok(BranchTarget {
                pc: RETURN_PC,
                drop,
            });
        }

        let (pc, preserve, height, needs_fixup) = {
            let frame = &self.frames[idx];
            match frame.kind {
                FrameKind::Loop { header } => {
                    (header, frame.params.len() as u32, frame.height, false)
                }
                _ => (PENDING_PC, frame.results.len() as u32, frame.height, true),
            }
        };
        let drop = self.drop_range(preserve, height);
        if needs_fixup {
            let op = self.ops.len();
            self.frames[idx].fixups.push(Fixup { op, kind });
        }
        Ok(BranchTarget { pc, drop })
    }

    fn patch(&mut self, fixups: &[Fixup], pc: u32) -> Result<(), CompileError> {
        for fixup in fixups {
            let op = &mut self.ops[fixup.op];
            match (op, fixup.kind) {
                (Operation::Br { target }, FixupKind::Br) => target.pc = pc,
                (Operation::BrIf { then_target, .. }, FixupKind::BrIfThen) => then_target.pc = pc,
                (Operation::BrIf { else_target, .. }, FixupKind::BrIfElse) => else_target.pc = pc,
                (Operation::BrTable { targets }, FixupKind::BrTable(i)) => targets[i].pc = pc,
                _ => return Err(self.internal_error("fixup does not match operation")),
            }
        }
        Ok(())
    }

    fn block_signature(
        &self,
        blockty: BlockType,
    ) -> Result<(SmallVec<[SlotType; 4]>, SmallVec<[SlotType; 4]>), CompileError> {
        let mut params = SmallVec::new();
        let mut results = SmallVec::new();
        match blockty {
            BlockType::Empty => {}
            BlockType::Type(ty) => {
                let ty = WasmValType::from_wasmparser(ty)
                    .map_err(|e| CompileError::Unsupported(format!("{e}")))?;
                SlotType::push_for(ty, &mut results);
            }
            BlockType::FuncType(index) => {
                let ty = &self.module.types[TypeIndex::from_u32(index)];
                for p in ty.params.iter() {
                    SlotType::push_for(*p, &mut params);
                }
                for r in ty.results.iter() {
                    SlotType::push_for(*r, &mut results);
                }
            }
        }
        Ok((params, results))
    }

    fn push_frame(
        &mut self,
        kind: FrameKind,
        params: SmallVec<[SlotType; 4]>,
        results: SmallVec<[SlotType; 4]>,
        else_fixups: Vec<Fixup>,
    ) {
        let dead = self.is_unreachable();
        let height = self.stack.len() as u32 - if dead { 0 } else { params.len() as u32 };
        self.frames.push(ControlFrame {
            kind,
            height,
            params,
            results,
            unreachable: dead,
            dead,
            fixups: Vec::new(),
            else_fixups,
        });
    }

    // ------------------------- operator translation ------------------

    fn translate_operator(&mut self, op: &Operator<'_>) -> Result<(), CompileError> {
        match op {
            Operator::Nop => return Ok(()),

            Operator::Block { blockty } => {
                let (params, results) = self.block_signature(*blockty)?;
                self.push_frame(FrameKind::Block, params, results, Vec::new());
                return Ok(());
            }
            Operator::Loop { blockty } => {
                let (params, results) = self.block_signature(*blockty)?;
                if self.is_unreachable() {
                    self.push_frame(FrameKind::Loop { header: 0 }, params, results, Vec::new());
                    return Ok(());
                }
                let header = self.ops.len() as u32;
                if self.ensure_termination {
                    // Backward branches re-enter through the header, so every
                    // iteration observes the check.
                    self.emit(Operation::CheckInterrupt);
                }
                self.push_frame(FrameKind::Loop { header }, params, results, Vec::new());
                return Ok(());
            }
            Operator::If { blockty } => {
                let (params, results) = self.block_signature(*blockty)?;
                if self.is_unreachable() {
                    self.push_frame(FrameKind::If { has_else: false }, params, results, Vec::new());
                    return Ok(());
                }
                self.pop_slot()?;
                let op_index = self.ops.len();
                self.emit(Operation::BrIf {
                    then_target: BranchTarget {
                        pc: op_index as u32 + 1,
                        drop: None,
                    },
                    else_target: BranchTarget {
                        pc: PENDING_PC,
                        drop: None,
                    },
                });
                let else_fixups = alloc::vec![Fixup {
                    op: op_index,
                    kind: FixupKind::BrIfElse,
                }];
                self.push_frame(FrameKind::If { has_else: false }, params, results, else_fixups);
                return Ok(());
            }
            Operator::Else => {
                let reachable_arm = !self.is_unreachable();
                let (dead, is_if, preserve, height) = match self.frames.last() {
                    Some(f) => (
                        f.dead,
                        matches!(f.kind, FrameKind::If { .. }),
                        f.results.len() as u32,
                        f.height,
                    ),
                    None => return Err(self.internal_error("else outside of if")),
                };
                if dead {
                    return Ok(());
                }
                if !is_if {
                    return Err(self.internal_error("else outside of if"));
                }
                self.frames.last_mut().expect("if frame").kind = FrameKind::If { has_else: true };

                if reachable_arm {
                    // Jump from the end of the then-arm over the else-arm.
                    let op = self.ops.len();
                    let drop = self.drop_range(preserve, height);
                    self.frames.last_mut().expect("if frame").fixups.push(Fixup {
                        op,
                        kind: FixupKind::Br,
                    });
                    self.emit(Operation::Br {
                        target: BranchTarget {
                            pc: PENDING_PC,
                            drop,
                        },
                    });
                }

                let else_pc = self.ops.len() as u32;
                let else_fixups =
                    core::mem::take(&mut self.frames.last_mut().expect("if frame").else_fixups);
                self.patch(&else_fixups, else_pc)?;

                let frame = self.frames.last_mut().expect("if frame");
                frame.unreachable = false;
                let params = frame.params.clone();
                self.stack.truncate(height as usize);
                self.stack.extend(params);
                return Ok(());
            }
            Operator::End => return self.translate_end(),

            Operator::Br { relative_depth } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                let target = self.branch_target(*relative_depth, FixupKind::Br)?;
                self.emit(Operation::Br { target });
                self.set_unreachable();
                return Ok(());
            }
            Operator::BrIf { relative_depth } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                self.pop_slot()?;
                let then_target = self.branch_target(*relative_depth, FixupKind::BrIfThen)?;
                let else_target = BranchTarget {
                    pc: self.ops.len() as u32 + 1,
                    drop: None,
                };
                self.emit(Operation::BrIf {
                    then_target,
                    else_target,
                });
                return Ok(());
            }
            Operator::BrTable { targets } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                self.pop_slot()?;
                let mut out = Vec::with_capacity(targets.len() as usize + 1);
                out.push(self.branch_target(targets.default(), FixupKind::BrTable(0))?);
                for (i, depth) in targets.targets().enumerate() {
                    out.push(self.branch_target(depth?, FixupKind::BrTable(i + 1))?);
                }
                self.emit(Operation::BrTable {
                    targets: out.into_boxed_slice(),
                });
                self.set_unreachable();
                return Ok(());
            }
            Operator::Return => {
                if self.is_unreachable() {
                    return Ok(());
                }
                let drop = self.drop_range(self.result_slots, 0);
                self.emit(Operation::Br {
                    target: BranchTarget {
                        pc: RETURN_PC,
                        drop,
                    },
                });
                self.set_unreachable();
                return Ok(());
            }
            Operator::Unreachable => {
                if self.is_unreachable() {
                    return Ok(());
                }
                self.emit(Operation::Unreachable);
                self.set_unreachable();
                return Ok(());
            }

            Operator::Call { function_index } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                let function = FuncIndex::from_u32(*function_index);
                let ty = self.module.func_type(function).clone();
                for _ in 0..ty.param_slots() {
                    self.pop_slot()?;
                }
                let mut pushes: SmallVec<[SlotType; 4]> = SmallVec::new();
                for r in ty.results.iter() {
                    SlotType::push_for(*r, &mut pushes);
                }
                self.stack.extend(pushes);
                self.emit(Operation::Call { function });
                return Ok(());
            }
            Operator::CallIndirect {
                type_index,
                table_index,
            } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                let type_index = TypeIndex::from_u32(*type_index);
                let ty = self.module.types[type_index].clone();
                // table offset operand
                self.pop_slot()?;
                for _ in 0..ty.param_slots() {
                    self.pop_slot()?;
                }
                let mut pushes: SmallVec<[SlotType; 4]> = SmallVec::new();
                for r in ty.results.iter() {
                    SlotType::push_for(*r, &mut pushes);
                }
                self.stack.extend(pushes);
                self.emit(Operation::CallIndirect {
                    type_index: self.type_map[type_index],
                    table: TableIndex::from_u32(*table_index),
                });
                return Ok(());
            }

            Operator::Drop => {
                if self.is_unreachable() {
                    return Ok(());
                }
                let slots = match self.stack.last() {
                    Some(SlotType::V128Hi) => 2,
                    _ => 1,
                };
                for _ in 0..slots {
                    self.pop_slot()?;
                }
                self.emit(Operation::Drop {
                    range: InclusiveRange {
                        start: 0,
                        end: slots - 1,
                    },
                });
                return Ok(());
            }
            Operator::Select | Operator::TypedSelect { .. } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                self.pop_slot()?;
                let is_v128 = matches!(self.stack.last(), Some(SlotType::V128Hi));
                let slots = if is_v128 { 2 } else { 1 };
                let mut kept: SmallVec<[SlotType; 2]> = SmallVec::new();
                for _ in 0..slots {
                    kept.push(self.pop_slot()?);
                }
                for _ in 0..slots {
                    self.pop_slot()?;
                }
                kept.reverse();
                self.stack.extend(kept);
                self.emit(Operation::Select { is_v128 });
                return Ok(());
            }

            Operator::LocalGet { local_index } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                self.translate_local_get(*local_index)?;
                return Ok(());
            }
            Operator::LocalSet { local_index } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                self.translate_local_set(*local_index)?;
                return Ok(());
            }
            Operator::LocalTee { local_index } => {
                if self.is_unreachable() {
                    return Ok(());
                }
                // tee = duplicate the top value, then store the copy.
                let local = self.local(*local_index)?;
                let is_v128 = local.ty == WasmValType::V128;
                self.translate_local_pick_top(is_v128)?;
                self.translate_local_set(*local_index)?;
                return Ok(());
            }

            _ => {}
        }

        // Everything else runs through the signature table.
        let Some(sig) = operator_signature(op, self.module)? else {
            return Err(self.internal_error("operator missing a stack signature"));
        };
        if self.is_unreachable() {
            return Ok(());
        }
        self.apply_signature(&sig)?;
        if let Some(operation) = translate_simple_operator(op)? {
            self.emit(operation);
        }
        Ok(())
    }

    fn translate_end(&mut self) -> Result<(), CompileError> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| self.internal_error("unbalanced end"))?;
        if frame.dead {
            return Ok(());
        }

        if self.frames.is_empty() {
            // The end of the function body doubles as a return.
            if !frame.unreachable {
                let drop = self.drop_range(self.result_slots, 0);
                self.emit(Operation::Br {
                    target: BranchTarget {
                        pc: RETURN_PC,
                        drop,
                    },
                });
            }
            self.stack.clear();
            return Ok(());
        }

        let continuation = self.ops.len() as u32;
        self.patch(&frame.fixups, continuation)?;
        // An `if` without an `else` arm: the false edge falls through to the
        // continuation.
        self.patch(&frame.else_fixups, continuation)?;

        self.stack.truncate(frame.height as usize);
        self.stack.extend(frame.results);
        Ok(())
    }

    fn local(&self, index: u32) -> Result<Local, CompileError> {
        self.locals
            .get(index as usize)
            .copied()
            .ok_or_else(|| self.internal_error("local index out of range"))
    }

    fn translate_local_get(&mut self, index: u32) -> Result<(), CompileError> {
        let local = self.local(index)?;
        let height = self.stack.len() as u32;
        let depth = height - 1 - local.height;
        let is_v128 = local.ty == WasmValType::V128;
        self.emit(Operation::Pick { depth, is_v128 });
        SlotType::push_for(local.ty, &mut self.stack);
        Ok(())
    }

    /// Duplicate the value on top of the stack via `Pick`.
    fn translate_local_pick_top(&mut self, is_v128: bool) -> Result<(), CompileError> {
        let (depth, tags): (u32, SmallVec<[SlotType; 2]>) = if is_v128 {
            (1, SmallVec::from_slice(&[SlotType::V128Lo, SlotType::V128Hi]))
        } else {
            let top = *self
                .stack
                .last()
                .ok_or_else(|| self.internal_error("value stack underflow"))?;
            (0, SmallVec::from_slice(&[top]))
        };
        self.emit(Operation::Pick {
            depth,
            is_v128,
        });
        self.stack.extend(tags);
        Ok(())
    }

    fn translate_local_set(&mut self, index: u32) -> Result<(), CompileError> {
        let local = self.local(index)?;
        let slots = local.ty.slot_count();
        for _ in 0..slots {
            self.pop_slot()?;
        }
        let height = self.stack.len() as u32;
        let depth = height - 1 - local.height;
        self.emit(Operation::Set {
            depth,
            is_v128: slots == 2,
        });
        Ok(())
    }
}

/// Translate one operator with a static stack signature into its operation,
/// or `None` for operators that vanish at the 64-bit slot level
/// (reinterprets and similar no-ops).
fn translate_simple_operator(op: &Operator<'_>) -> Result<Option<Operation>, CompileError> {
    use Operation as O;

    let operation = match op {
        // ------------------------- constants -------------------------
        Operator::I32Const { value } => O::ConstI32 {
            value: *value as u32,
        },
        Operator::I64Const { value } => O::ConstI64 {
            value: *value as u64,
        },
        Operator::F32Const { value } => O::ConstF32 {
            value: value.bits(),
        },
        Operator::F64Const { value } => O::ConstF64 {
            value: value.bits(),
        },

        // ------------------------- globals ---------------------------
        Operator::GlobalGet { global_index } => O::GlobalGet {
            index: GlobalIndex::from_u32(*global_index),
        },
        Operator::GlobalSet { global_index } => O::GlobalSet {
            index: GlobalIndex::from_u32(*global_index),
        },

        // ------------------------- comparisons -----------------------
        Operator::I32Eqz => O::Eqz {
            ty: UnsignedInt::I32,
        },
        Operator::I64Eqz => O::Eqz {
            ty: UnsignedInt::I64,
        },
        Operator::I32Eq => O::Eq {
            ty: UnsignedType::I32,
        },
        Operator::I64Eq => O::Eq {
            ty: UnsignedType::I64,
        },
        Operator::F32Eq => O::Eq {
            ty: UnsignedType::F32,
        },
        Operator::F64Eq => O::Eq {
            ty: UnsignedType::F64,
        },
        Operator::I32Ne => O::Ne {
            ty: UnsignedType::I32,
        },
        Operator::I64Ne => O::Ne {
            ty: UnsignedType::I64,
        },
        Operator::F32Ne => O::Ne {
            ty: UnsignedType::F32,
        },
        Operator::F64Ne => O::Ne {
            ty: UnsignedType::F64,
        },
        Operator::I32LtS => O::Lt { ty: SignedType::I32 },
        Operator::I32LtU => O::Lt { ty: SignedType::U32 },
        Operator::I64LtS => O::Lt { ty: SignedType::I64 },
        Operator::I64LtU => O::Lt { ty: SignedType::U64 },
        Operator::F32Lt => O::Lt { ty: SignedType::F32 },
        Operator::F64Lt => O::Lt { ty: SignedType::F64 },
        Operator::I32GtS => O::Gt { ty: SignedType::I32 },
        Operator::I32GtU => O::Gt { ty: SignedType::U32 },
        Operator::I64GtS => O::Gt { ty: SignedType::I64 },
        Operator::I64GtU => O::Gt { ty: SignedType::U64 },
        Operator::F32Gt => O::Gt { ty: SignedType::F32 },
        Operator::F64Gt => O::Gt { ty: SignedType::F64 },
        Operator::I32LeS => O::Le { ty: SignedType::I32 },
        Operator::I32LeU => O::Le { ty: SignedType::U32 },
        Operator::I64LeS => O::Le { ty: SignedType::I64 },
        Operator::I64LeU => O::Le { ty: SignedType::U64 },
        Operator::F32Le => O::Le { ty: SignedType::F32 },
        Operator::F64Le => O::Le { ty: SignedType::F64 },
        Operator::I32GeS => O::Ge { ty: SignedType::I32 },
        Operator::I32GeU => O::Ge { ty: SignedType::U32 },
        Operator::I64GeS => O::Ge { ty: SignedType::I64 },
        Operator::I64GeU => O::Ge { ty: SignedType::U64 },
        Operator::F32Ge => O::Ge { ty: SignedType::F32 },
        Operator::F64Ge => O::Ge { ty: SignedType::F64 },

        // ------------------------- integer arithmetic ----------------
        Operator::I32Add => O::Add {
            ty: UnsignedType::I32,
        },
        Operator::I64Add => O::Add {
            ty: UnsignedType::I64,
        },
        Operator::F32Add => O::Add {
            ty: UnsignedType::F32,
        },
        Operator::F64Add => O::Add {
            ty: UnsignedType::F64,
        },
        Operator::I32Sub => O::Sub {
            ty: UnsignedType::I32,
        },
        Operator::I64Sub => O::Sub {
            ty: UnsignedType::I64,
        },
        Operator::F32Sub => O::Sub {
            ty: UnsignedType::F32,
        },
        Operator::F64Sub => O::Sub {
            ty: UnsignedType::F64,
        },
        Operator::I32Mul => O::Mul {
            ty: UnsignedType::I32,
        },
        Operator::I64Mul => O::Mul {
            ty: UnsignedType::I64,
        },
        Operator::F32Mul => O::Mul {
            ty: UnsignedType::F32,
        },
        Operator::F64Mul => O::Mul {
            ty: UnsignedType::F64,
        },
        Operator::I32Clz => O::Clz {
            ty: UnsignedInt::I32,
        },
        Operator::I64Clz => O::Clz {
            ty: UnsignedInt::I64,
        },
        Operator::I32Ctz => O::Ctz {
            ty: UnsignedInt::I32,
        },
        Operator::I64Ctz => O::Ctz {
            ty: UnsignedInt::I64,
        },
        Operator::I32Popcnt => O::Popcnt {
            ty: UnsignedInt::I32,
        },
        Operator::I64Popcnt => O::Popcnt {
            ty: UnsignedInt::I64,
        },
        Operator::I32DivS => O::Div { ty: SignedType::I32 },
        Operator::I32DivU => O::Div { ty: SignedType::U32 },
        Operator::I64DivS => O::Div { ty: SignedType::I64 },
        Operator::I64DivU => O::Div { ty: SignedType::U64 },
        Operator::F32Div => O::Div { ty: SignedType::F32 },
        Operator::F64Div => O::Div { ty: SignedType::F64 },
        Operator::I32RemS => O::Rem { ty: SignedInt::I32 },
        Operator::I32RemU => O::Rem { ty: SignedInt::U32 },
        Operator::I64RemS => O::Rem { ty: SignedInt::I64 },
        Operator::I64RemU => O::Rem { ty: SignedInt::U64 },
        Operator::I32And => O::And {
            ty: UnsignedInt::I32,
        },
        Operator::I64And => O::And {
            ty: UnsignedInt::I64,
        },
        Operator::I32Or => O::Or {
            ty: UnsignedInt::I32,
        },
        Operator::I64Or => O::Or {
            ty: UnsignedInt::I64,
        },
        Operator::I32Xor => O::Xor {
            ty: UnsignedInt::I32,
        },
        Operator::I64Xor => O::Xor {
            ty: UnsignedInt::I64,
        },
        Operator::I32Shl => O::Shl {
            ty: UnsignedInt::I32,
        },
        Operator::I64Shl => O::Shl {
            ty: UnsignedInt::I64,
        },
        Operator::I32ShrS => O::Shr { ty: SignedInt::I32 },
        Operator::I32ShrU => O::Shr { ty: SignedInt::U32 },
        Operator::I64ShrS => O::Shr { ty: SignedInt::I64 },
        Operator::I64ShrU => O::Shr { ty: SignedInt::U64 },
        Operator::I32Rotl => O::Rotl {
            ty: UnsignedInt::I32,
        },
        Operator::I64Rotl => O::Rotl {
            ty: UnsignedInt::I64,
        },
        Operator::I32Rotr => O::Rotr {
            ty: UnsignedInt::I32,
        },
        Operator::I64Rotr => O::Rotr {
            ty: UnsignedInt::I64,
        },

        // ------------------------- float arithmetic ------------------
        Operator::F32Abs => O::Abs { ty: FloatType::F32 },
        Operator::F64Abs => O::Abs { ty: FloatType::F64 },
        Operator::F32Neg => O::Neg { ty: FloatType::F32 },
        Operator::F64Neg => O::Neg { ty: FloatType::F64 },
        Operator::F32Ceil => O::Ceil { ty: FloatType::F32 },
        Operator::F64Ceil => O::Ceil { ty: FloatType::F64 },
        Operator::F32Floor => O::Floor { ty: FloatType::F32 },
        Operator::F64Floor => O::Floor { ty: FloatType::F64 },
        Operator::F32Trunc => O::Trunc { ty: FloatType::F32 },
        Operator::F64Trunc => O::Trunc { ty: FloatType::F64 },
        Operator::F32Nearest => O::Nearest { ty: FloatType::F32 },
        Operator::F64Nearest => O::Nearest { ty: FloatType::F64 },
        Operator::F32Sqrt => O::Sqrt { ty: FloatType::F32 },
        Operator::F64Sqrt => O::Sqrt { ty: FloatType::F64 },
        Operator::F32Min => O::Min { ty: FloatType::F32 },
        Operator::F64Min => O::Min { ty: FloatType::F64 },
        Operator::F32Max => O::Max { ty: FloatType::F32 },
        Operator::F64Max => O::Max { ty: FloatType::F64 },
        Operator::F32Copysign => O::Copysign { ty: FloatType::F32 },
        Operator::F64Copysign => O::Copysign { ty: FloatType::F64 },

        // ------------------------- conversions -----------------------
        Operator::I32WrapI64 => O::I32WrapFromI64,
        Operator::I32TruncF32S => trunc(FloatType::F32, SignedInt::I32, false),
        Operator::I32TruncF32U => trunc(FloatType::F32, SignedInt::U32, false),
        Operator::I32TruncF64S => trunc(FloatType::F64, SignedInt::I32, false),
        Operator::I32TruncF64U => trunc(FloatType::F64, SignedInt::U32, false),
        Operator::I64TruncF32S => trunc(FloatType::F32, SignedInt::I64, false),
        Operator::I64TruncF32U => trunc(FloatType::F32, SignedInt::U64, false),
        Operator::I64TruncF64S => trunc(FloatType::F64, SignedInt::I64, false),
        Operator::I64TruncF64U => trunc(FloatType::F64, SignedInt::U64, false),
        Operator::I32TruncSatF32S => trunc(FloatType::F32, SignedInt::I32, true),
        Operator::I32TruncSatF32U => trunc(FloatType::F32, SignedInt::U32, true),
        Operator::I32TruncSatF64S => trunc(FloatType::F64, SignedInt::I32, true),
        Operator::I32TruncSatF64U => trunc(FloatType::F64, SignedInt::U32, true),
        Operator::I64TruncSatF32S => trunc(FloatType::F32, SignedInt::I64, true),
        Operator::I64TruncSatF32U => trunc(FloatType::F32, SignedInt::U64, true),
        Operator::I64TruncSatF64S => trunc(FloatType::F64, SignedInt::I64, true),
        Operator::I64TruncSatF64U => trunc(FloatType::F64, SignedInt::U64, true),
        Operator::I64ExtendI32S => O::Extend { signed: true },
        Operator::I64ExtendI32U => O::Extend { signed: false },
        Operator::F32ConvertI32S => convert(SignedInt::I32, FloatType::F32),
        Operator::F32ConvertI32U => convert(SignedInt::U32, FloatType::F32),
        Operator::F32ConvertI64S => convert(SignedInt::I64, FloatType::F32),
        Operator::F32ConvertI64U => convert(SignedInt::U64, FloatType::F32),
        Operator::F64ConvertI32S => convert(SignedInt::I32, FloatType::F64),
        Operator::F64ConvertI32U => convert(SignedInt::U32, FloatType::F64),
        Operator::F64ConvertI64S => convert(SignedInt::I64, FloatType::F64),
        Operator::F64ConvertI64U => convert(SignedInt::U64, FloatType::F64),
        Operator::F32DemoteF64 => O::F32DemoteFromF64,
        Operator::F64PromoteF32 => O::F64PromoteFromF32,
        Operator::I32Extend8S => O::SignExtend32From8,
        Operator::I32Extend16S => O::SignExtend32From16,
        Operator::I64Extend8S => O::SignExtend64From8,
        Operator::I64Extend16S => O::SignExtend64From16,
        Operator::I64Extend32S => O::SignExtend64From32,

        // Reinterpretations are no-ops on the 64-bit value stack.
        Operator::I32ReinterpretF32
        | Operator::I64ReinterpretF64
        | Operator::F32ReinterpretI32
        | Operator::F64ReinterpretI64 => return Ok(None),

        // ------------------------- memory ----------------------------
        Operator::I32Load { memarg } => O::Load {
            ty: UnsignedType::I32,
            offset: memarg.offset,
        },
        Operator::I64Load { memarg } => O::Load {
            ty: UnsignedType::I64,
            offset: memarg.offset,
        },
        Operator::F32Load { memarg } => O::Load {
            ty: UnsignedType::F32,
            offset: memarg.offset,
        },
        Operator::F64Load { memarg } => O::Load {
            ty: UnsignedType::F64,
            offset: memarg.offset,
        },
        Operator::I32Load8S { memarg } => O::Load8 {
            ty: SignedInt::I32,
            offset: memarg.offset,
        },
        Operator::I32Load8U { memarg } => O::Load8 {
            ty: SignedInt::U32,
            offset: memarg.offset,
        },
        Operator::I64Load8S { memarg } => O::Load8 {
            ty: SignedInt::I64,
            offset: memarg.offset,
        },
        Operator::I64Load8U { memarg } => O::Load8 {
            ty: SignedInt::U64,
            offset: memarg.offset,
        },
        Operator::I32Load16S { memarg } => O::Load16 {
            ty: SignedInt::I32,
            offset: memarg.offset,
        },
        Operator::I32Load16U { memarg } => O::Load16 {
            ty: SignedInt::U32,
            offset: memarg.offset,
        },
        Operator::I64Load16S { memarg } => O::Load16 {
            ty: SignedInt::I64,
            offset: memarg.offset,
        },
        Operator::I64Load16U { memarg } => O::Load16 {
            ty: SignedInt::U64,
            offset: memarg.offset,
        },
        Operator::I64Load32S { memarg } => O::Load32 {
            signed: true,
            offset: memarg.offset,
        },
        Operator::I64Load32U { memarg } => O::Load32 {
            signed: false,
            offset: memarg.offset,
        },
        Operator::I32Store { memarg } => O::Store {
            ty: UnsignedType::I32,
            offset: memarg.offset,
        },
        Operator::I64Store { memarg } => O::Store {
            ty: UnsignedType::I64,
            offset: memarg.offset,
        },
        Operator::F32Store { memarg } => O::Store {
            ty: UnsignedType::F32,
            offset: memarg.offset,
        },
        Operator::F64Store { memarg } => O::Store {
            ty: UnsignedType::F64,
            offset: memarg.offset,
        },
        Operator::I32Store8 { memarg } | Operator::I64Store8 { memarg } => O::Store8 {
            offset: memarg.offset,
        },
        Operator::I32Store16 { memarg } | Operator::I64Store16 { memarg } => O::Store16 {
            offset: memarg.offset,
        },
        Operator::I64Store32 { memarg } => O::Store32 {
            offset: memarg.offset,
        },
        Operator::MemorySize { .. } => O::MemorySize,
        Operator::MemoryGrow { .. } => O::MemoryGrow,
        Operator::MemoryInit { data_index, .. } => O::MemoryInit {
            data: DataIndex::from_u32(*data_index),
        },
        Operator::DataDrop { data_index } => O::DataDrop {
            data: DataIndex::from_u32(*data_index),
        },
        Operator::MemoryCopy { .. } => O::MemoryCopy,
        Operator::MemoryFill { .. } => O::MemoryFill,

        // ------------------------- references ------------------------
        // Null references are all-zero slots; `ref.is_null` is an integer
        // equality with zero.
        Operator::RefNull { .. } => O::ConstI64 { value: 0 },
        Operator::RefIsNull => O::Eqz {
            ty: UnsignedInt::I64,
        },
        Operator::RefFunc { function_index } => O::RefFunc {
            function: FuncIndex::from_u32(*function_index),
        },

        // ------------------------- tables ----------------------------
        Operator::TableGet { table } => O::TableGet {
            table: TableIndex::from_u32(*table),
        },
        Operator::TableSet { table } => O::TableSet {
            table: TableIndex::from_u32(*table),
        },
        Operator::TableSize { table } => O::TableSize {
            table: TableIndex::from_u32(*table),
        },
        Operator::TableGrow { table } => O::TableGrow {
            table: TableIndex::from_u32(*table),
        },
        Operator::TableFill { table } => O::TableFill {
            table: TableIndex::from_u32(*table),
        },
        Operator::TableCopy {
            dst_table,
            src_table,
        } => O::TableCopy {
            dst: TableIndex::from_u32(*dst_table),
            src: TableIndex::from_u32(*src_table),
        },
        Operator::TableInit { elem_index, table } => O::TableInit {
            elem: ElemIndex::from_u32(*elem_index),
            table: TableIndex::from_u32(*table),
        },
        Operator::ElemDrop { elem_index } => O::ElemDrop {
            elem: ElemIndex::from_u32(*elem_index),
        },

        // ------------------------- SIMD ------------------------------
        Operator::V128Const { value } => {
            let bits = value.i128() as u128;
            O::V128Const {
                lo: bits as u64,
                hi: (bits >> 64) as u64,
            }
        }
        Operator::V128Load { memarg } => v128_load(V128LoadKind::V128, memarg.offset),
        Operator::V128Load8x8S { memarg } => v128_load(V128LoadKind::S8x8, memarg.offset),
        Operator::V128Load8x8U { memarg } => v128_load(V128LoadKind::U8x8, memarg.offset),
        Operator::V128Load16x4S { memarg } => v128_load(V128LoadKind::S16x4, memarg.offset),
        Operator::V128Load16x4U { memarg } => v128_load(V128LoadKind::U16x4, memarg.offset),
        Operator::V128Load32x2S { memarg } => v128_load(V128LoadKind::S32x2, memarg.offset),
        Operator::V128Load32x2U { memarg } => v128_load(V128LoadKind::U32x2, memarg.offset),
        Operator::V128Load8Splat { memarg } => v128_load(V128LoadKind::Splat8, memarg.offset),
        Operator::V128Load16Splat { memarg } => v128_load(V128LoadKind::Splat16, memarg.offset),
        Operator::V128Load32Splat { memarg } => v128_load(V128LoadKind::Splat32, memarg.offset),
        Operator::V128Load64Splat { memarg } => v128_load(V128LoadKind::Splat64, memarg.offset),
        Operator::V128Load32Zero { memarg } => v128_load(V128LoadKind::Zero32, memarg.offset),
        Operator::V128Load64Zero { memarg } => v128_load(V128LoadKind::Zero64, memarg.offset),
        Operator::V128Load8Lane { memarg, lane } => O::V128LoadLane {
            lane_width: 8,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::V128Load16Lane { memarg, lane } => O::V128LoadLane {
            lane_width: 16,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::V128Load32Lane { memarg, lane } => O::V128LoadLane {
            lane_width: 32,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::V128Load64Lane { memarg, lane } => O::V128LoadLane {
            lane_width: 64,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::V128Store { memarg } => O::V128Store {
            offset: memarg.offset,
        },
        Operator::V128Store8Lane { memarg, lane } => O::V128StoreLane {
            lane_width: 8,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::V128Store16Lane { memarg, lane } => O::V128StoreLane {
            lane_width: 16,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::V128Store32Lane { memarg, lane } => O::V128StoreLane {
            lane_width: 32,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::V128Store64Lane { memarg, lane } => O::V128StoreLane {
            lane_width: 64,
            lane: *lane,
            offset: memarg.offset,
        },
        Operator::I8x16ExtractLaneS { lane } => extract(Shape::I8x16, *lane, true),
        Operator::I8x16ExtractLaneU { lane } => extract(Shape::I8x16, *lane, false),
        Operator::I16x8ExtractLaneS { lane } => extract(Shape::I16x8, *lane, true),
        Operator::I16x8ExtractLaneU { lane } => extract(Shape::I16x8, *lane, false),
        Operator::I32x4ExtractLane { lane } => extract(Shape::I32x4, *lane, false),
        Operator::I64x2ExtractLane { lane } => extract(Shape::I64x2, *lane, false),
        Operator::F32x4ExtractLane { lane } => extract(Shape::F32x4, *lane, false),
        Operator::F64x2ExtractLane { lane } => extract(Shape::F64x2, *lane, false),
        Operator::I8x16ReplaceLane { lane } => replace(Shape::I8x16, *lane),
        Operator::I16x8ReplaceLane { lane } => replace(Shape::I16x8, *lane),
        Operator::I32x4ReplaceLane { lane } => replace(Shape::I32x4, *lane),
        Operator::I64x2ReplaceLane { lane } => replace(Shape::I64x2, *lane),
        Operator::F32x4ReplaceLane { lane } => replace(Shape::F32x4, *lane),
        Operator::F64x2ReplaceLane { lane } => replace(Shape::F64x2, *lane),
        Operator::I8x16Splat => O::V128Splat { shape: Shape::I8x16 },
        Operator::I16x8Splat => O::V128Splat { shape: Shape::I16x8 },
        Operator::I32x4Splat => O::V128Splat { shape: Shape::I32x4 },
        Operator::I64x2Splat => O::V128Splat { shape: Shape::I64x2 },
        Operator::F32x4Splat => O::V128Splat { shape: Shape::F32x4 },
        Operator::F64x2Splat => O::V128Splat { shape: Shape::F64x2 },
        Operator::I8x16Shuffle { lanes } => O::V128Shuffle { lanes: *lanes },
        Operator::I8x16Swizzle => O::V128Swizzle,
        Operator::V128AnyTrue => O::V128AnyTrue,
        Operator::I8x16AllTrue => O::V128AllTrue { shape: Shape::I8x16 },
        Operator::I16x8AllTrue => O::V128AllTrue { shape: Shape::I16x8 },
        Operator::I32x4AllTrue => O::V128AllTrue { shape: Shape::I32x4 },
        Operator::I64x2AllTrue => O::V128AllTrue { shape: Shape::I64x2 },
        Operator::I8x16Bitmask => O::V128BitMask { shape: Shape::I8x16 },
        Operator::I16x8Bitmask => O::V128BitMask { shape: Shape::I16x8 },
        Operator::I32x4Bitmask => O::V128BitMask { shape: Shape::I32x4 },
        Operator::I64x2Bitmask => O::V128BitMask { shape: Shape::I64x2 },
        Operator::V128And => O::V128And,
        Operator::V128Or => O::V128Or,
        Operator::V128Xor => O::V128Xor,
        Operator::V128Not => O::V128Not,
        Operator::V128Bitselect => O::V128Bitselect,
        Operator::V128AndNot => O::V128AndNot,
        Operator::I8x16Shl => O::V128Shl { shape: Shape::I8x16 },
        Operator::I16x8Shl => O::V128Shl { shape: Shape::I16x8 },
        Operator::I32x4Shl => O::V128Shl { shape: Shape::I32x4 },
        Operator::I64x2Shl => O::V128Shl { shape: Shape::I64x2 },
        Operator::I8x16ShrS => shr(Shape::I8x16, true),
        Operator::I8x16ShrU => shr(Shape::I8x16, false),
        Operator::I16x8ShrS => shr(Shape::I16x8, true),
        Operator::I16x8ShrU => shr(Shape::I16x8, false),
        Operator::I32x4ShrS => shr(Shape::I32x4, true),
        Operator::I32x4ShrU => shr(Shape::I32x4, false),
        Operator::I64x2ShrS => shr(Shape::I64x2, true),
        Operator::I64x2ShrU => shr(Shape::I64x2, false),
        Operator::I8x16Add => O::V128Add { shape: Shape::I8x16 },
        Operator::I16x8Add => O::V128Add { shape: Shape::I16x8 },
        Operator::I32x4Add => O::V128Add { shape: Shape::I32x4 },
        Operator::I64x2Add => O::V128Add { shape: Shape::I64x2 },
        Operator::F32x4Add => O::V128Add { shape: Shape::F32x4 },
        Operator::F64x2Add => O::V128Add { shape: Shape::F64x2 },
        Operator::I8x16Sub => O::V128Sub { shape: Shape::I8x16 },
        Operator::I16x8Sub => O::V128Sub { shape: Shape::I16x8 },
        Operator::I32x4Sub => O::V128Sub { shape: Shape::I32x4 },
        Operator::I64x2Sub => O::V128Sub { shape: Shape::I64x2 },
        Operator::F32x4Sub => O::V128Sub { shape: Shape::F32x4 },
        Operator::F64x2Sub => O::V128Sub { shape: Shape::F64x2 },
        Operator::I16x8Mul => O::V128Mul { shape: Shape::I16x8 },
        Operator::I32x4Mul => O::V128Mul { shape: Shape::I32x4 },
        Operator::I64x2Mul => O::V128Mul { shape: Shape::I64x2 },
        Operator::F32x4Mul => O::V128Mul { shape: Shape::F32x4 },
        Operator::F64x2Mul => O::V128Mul { shape: Shape::F64x2 },
        Operator::I8x16AddSatS => O::V128AddSat {
            shape: Shape::I8x16,
            signed: true,
        },
        Operator::I8x16AddSatU => O::V128AddSat {
            shape: Shape::I8x16,
            signed: false,
        },
        Operator::I16x8AddSatS => O::V128AddSat {
            shape: Shape::I16x8,
            signed: true,
        },
        Operator::I16x8AddSatU => O::V128AddSat {
            shape: Shape::I16x8,
            signed: false,
        },
        Operator::I8x16SubSatS => O::V128SubSat {
            shape: Shape::I8x16,
            signed: true,
        },
        Operator::I8x16SubSatU => O::V128SubSat {
            shape: Shape::I8x16,
            signed: false,
        },
        Operator::I16x8SubSatS => O::V128SubSat {
            shape: Shape::I16x8,
            signed: true,
        },
        Operator::I16x8SubSatU => O::V128SubSat {
            shape: Shape::I16x8,
            signed: false,
        },
        Operator::I8x16Neg => O::V128Neg { shape: Shape::I8x16 },
        Operator::I16x8Neg => O::V128Neg { shape: Shape::I16x8 },
        Operator::I32x4Neg => O::V128Neg { shape: Shape::I32x4 },
        Operator::I64x2Neg => O::V128Neg { shape: Shape::I64x2 },
        Operator::F32x4Neg => O::V128Neg { shape: Shape::F32x4 },
        Operator::F64x2Neg => O::V128Neg { shape: Shape::F64x2 },
        Operator::I8x16Abs => O::V128Abs { shape: Shape::I8x16 },
        Operator::I16x8Abs => O::V128Abs { shape: Shape::I16x8 },
        Operator::I32x4Abs => O::V128Abs { shape: Shape::I32x4 },
        Operator::I64x2Abs => O::V128Abs { shape: Shape::I64x2 },
        Operator::F32x4Abs => O::V128Abs { shape: Shape::F32x4 },
        Operator::F64x2Abs => O::V128Abs { shape: Shape::F64x2 },
        Operator::F32x4Sqrt => O::V128Sqrt { shape: Shape::F32x4 },
        Operator::F64x2Sqrt => O::V128Sqrt { shape: Shape::F64x2 },
        Operator::I8x16Eq => cmp(V128CmpKind::I8x16Eq),
        Operator::I8x16Ne => cmp(V128CmpKind::I8x16Ne),
        Operator::I8x16LtS => cmp(V128CmpKind::I8x16LtS),
        Operator::I8x16LtU => cmp(V128CmpKind::I8x16LtU),
        Operator::I8x16GtS => cmp(V128CmpKind::I8x16GtS),
        Operator::I8x16GtU => cmp(V128CmpKind::I8x16GtU),
        Operator::I8x16LeS => cmp(V128CmpKind::I8x16LeS),
        Operator::I8x16LeU => cmp(V128CmpKind::I8x16LeU),
        Operator::I8x16GeS => cmp(V128CmpKind::I8x16GeS),
        Operator::I8x16GeU => cmp(V128CmpKind::I8x16GeU),
        Operator::I16x8Eq => cmp(V128CmpKind::I16x8Eq),
        Operator::I16x8Ne => cmp(V128CmpKind::I16x8Ne),
        Operator::I16x8LtS => cmp(V128CmpKind::I16x8LtS),
        Operator::I16x8LtU => cmp(V128CmpKind::I16x8LtU),
        Operator::I16x8GtS => cmp(V128CmpKind::I16x8GtS),
        Operator::I16x8GtU => cmp(V128CmpKind::I16x8GtU),
        Operator::I16x8LeS => cmp(V128CmpKind::I16x8LeS),
        Operator::I16x8LeU => cmp(V128CmpKind::I16x8LeU),
        Operator::I16x8GeS => cmp(V128CmpKind::I16x8GeS),
        Operator::I16x8GeU => cmp(V128CmpKind::I16x8GeU),
        Operator::I32x4Eq => cmp(V128CmpKind::I32x4Eq),
        Operator::I32x4Ne => cmp(V128CmpKind::I32x4Ne),
        Operator::I32x4LtS => cmp(V128CmpKind::I32x4LtS),
        Operator::I32x4LtU => cmp(V128CmpKind::I32x4LtU),
        Operator::I32x4GtS => cmp(V128CmpKind::I32x4GtS),
        Operator::I32x4GtU => cmp(V128CmpKind::I32x4GtU),
        Operator::I32x4LeS => cmp(V128CmpKind::I32x4LeS),
        Operator::I32x4LeU => cmp(V128CmpKind::I32x4LeU),
        Operator::I32x4GeS => cmp(V128CmpKind::I32x4GeS),
        Operator::I32x4GeU => cmp(V128CmpKind::I32x4GeU),
        Operator::I64x2Eq => cmp(V128CmpKind::I64x2Eq),
        Operator::I64x2Ne => cmp(V128CmpKind::I64x2Ne),
        Operator::I64x2LtS => cmp(V128CmpKind::I64x2LtS),
        Operator::I64x2GtS => cmp(V128CmpKind::I64x2GtS),
        Operator::I64x2LeS => cmp(V128CmpKind::I64x2LeS),
        Operator::I64x2GeS => cmp(V128CmpKind::I64x2GeS),
        Operator::F32x4Eq => cmp(V128CmpKind::F32x4Eq),
        Operator::F32x4Ne => cmp(V128CmpKind::F32x4Ne),
        Operator::F32x4Lt => cmp(V128CmpKind::F32x4Lt),
        Operator::F32x4Gt => cmp(V128CmpKind::F32x4Gt),
        Operator::F32x4Le => cmp(V128CmpKind::F32x4Le),
        Operator::F32x4Ge => cmp(V128CmpKind::F32x4Ge),
        Operator::F64x2Eq => cmp(V128CmpKind::F64x2Eq),
        Operator::F64x2Ne => cmp(V128CmpKind::F64x2Ne),
        Operator::F64x2Lt => cmp(V128CmpKind::F64x2Lt),
        Operator::F64x2Gt => cmp(V128CmpKind::F64x2Gt),
        Operator::F64x2Le => cmp(V128CmpKind::F64x2Le),
        Operator::F64x2Ge => cmp(V128CmpKind::F64x2Ge),

        op => {
            return Err(CompileError::Unsupported(format!(
                "operator not supported by the interpreter: {op:?}"
            )))
        }
    };

    Ok(Some(operation))
}

fn trunc(input: FloatType, output: SignedInt, non_trapping: bool) -> Operation {
    Operation::ITruncFromF {
        input,
        output,
        non_trapping,
    }
}

fn convert(input: SignedInt, output: FloatType) -> Operation {
    Operation::FConvertFromI { input, output }
}

fn v128_load(kind: V128LoadKind, offset: u64) -> Operation {
    Operation::V128Load { kind, offset }
}

fn extract(shape: Shape, lane: u8, signed: bool) -> Operation {
    Operation::V128ExtractLane {
        shape,
        lane,
        signed,
    }
}

fn replace(shape: Shape, lane: u8) -> Operation {
    Operation::V128ReplaceLane { shape, lane }
}

fn shr(shape: Shape, signed: bool) -> Operation {
    Operation::V128Shr { shape, signed }
}

fn cmp(kind: V128CmpKind) -> Operation {
    Operation::V128Cmp { kind }
}
