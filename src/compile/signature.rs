use crate::errors::CompileError;
use crate::indices::GlobalIndex;
use crate::translate::{TranslatedModule, WasmValType};
use alloc::format;
use cranelift_entity::EntityRef;
use smallvec::SmallVec;
use wasmparser::Operator;

/// Abstract type of one 64-bit value-stack slot.
///
/// A v128 value is modelled as two slots so that drop ranges and local
/// offsets fall out in slot units directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotType {
    I32,
    I64,
    F32,
    F64,
    V128Lo,
    V128Hi,
}

impl SlotType {
    pub(crate) fn push_for(ty: WasmValType, out: &mut impl Extend<SlotType>) {
        match ty {
            WasmValType::I32 => out.extend([SlotType::I32]),
            WasmValType::I64 | WasmValType::FuncRef | WasmValType::ExternRef => {
                out.extend([SlotType::I64]);
            }
            WasmValType::F32 => out.extend([SlotType::F32]),
            WasmValType::F64 => out.extend([SlotType::F64]),
            WasmValType::V128 => out.extend([SlotType::V128Lo, SlotType::V128Hi]),
        }
    }
}

/// The canonical stack effect of one operator: slots popped (top of stack
/// first) and slots pushed (push order).
#[derive(Debug, Default)]
pub(crate) struct OpSignature {
    pub pops: SmallVec<[SlotType; 4]>,
    pub pushes: SmallVec<[SlotType; 4]>,
}

fn sig(pops: &[SlotType], pushes: &[SlotType]) -> OpSignature {
    OpSignature {
        pops: SmallVec::from_slice(pops),
        pushes: SmallVec::from_slice(pushes),
    }
}

fn global_slots(module: &TranslatedModule, index: u32) -> SmallVec<[SlotType; 4]> {
    let ty = module.globals[GlobalIndex::new(index as usize)].content_type;
    let mut out = SmallVec::new();
    // Validation guarantees the global's type is representable.
    let ty = WasmValType::from_wasmparser(ty).unwrap_or(WasmValType::I64);
    SlotType::push_for(ty, &mut out);
    out
}

use SlotType::{F32, F64, I32, I64, V128Hi, V128Lo};

const V128: &[SlotType] = &[V128Lo, V128Hi];
const V128_POP: &[SlotType] = &[V128Hi, V128Lo];
const V128X2_POP: &[SlotType] = &[V128Hi, V128Lo, V128Hi, V128Lo];

/// The stack signature of `op`, or `None` for operators whose stack effect
/// the compiler computes itself (control flow, calls, locals, parametric
/// operators).
///
/// Returns an error for operators outside the supported instruction set.
pub(crate) fn operator_signature(
    op: &Operator<'_>,
    module: &TranslatedModule,
) -> Result<Option<OpSignature>, CompileError> {
    let sig = match op {
        // Handled entirely by the compiler's control-frame logic.
        Operator::Unreachable
        | Operator::Nop
        | Operator::Block { .. }
        | Operator::Loop { .. }
        | Operator::If { .. }
        | Operator::Else
        | Operator::End
        | Operator::Br { .. }
        | Operator::BrIf { .. }
        | Operator::BrTable { .. }
        | Operator::Return
        | Operator::Call { .. }
        | Operator::CallIndirect { .. }
        | Operator::Drop
        | Operator::Select
        | Operator::TypedSelect { .. }
        | Operator::LocalGet { .. }
        | Operator::LocalSet { .. }
        | Operator::LocalTee { .. } => return Ok(None),

        Operator::GlobalGet { global_index } => OpSignature {
            pops: SmallVec::new(),
            pushes: global_slots(module, *global_index),
        },
        Operator::GlobalSet { global_index } => {
            let mut pops = global_slots(module, *global_index);
            pops.reverse();
            OpSignature {
                pops,
                pushes: SmallVec::new(),
            }
        }

        // ------------------------- constants -------------------------
        Operator::I32Const { .. } => sig(&[], &[I32]),
        Operator::I64Const { .. } => sig(&[], &[I64]),
        Operator::F32Const { .. } => sig(&[], &[F32]),
        Operator::F64Const { .. } => sig(&[], &[F64]),

        // ------------------------- i32 -------------------------------
        Operator::I32Eqz => sig(&[I32], &[I32]),
        Operator::I32Eq
        | Operator::I32Ne
        | Operator::I32LtS
        | Operator::I32LtU
        | Operator::I32GtS
        | Operator::I32GtU
        | Operator::I32LeS
        | Operator::I32LeU
        | Operator::I32GeS
        | Operator::I32GeU
        | Operator::I32Add
        | Operator::I32Sub
        | Operator::I32Mul
        | Operator::I32DivS
        | Operator::I32DivU
        | Operator::I32RemS
        | Operator::I32RemU
        | Operator::I32And
        | Operator::I32Or
        | Operator::I32Xor
        | Operator::I32Shl
        | Operator::I32ShrS
        | Operator::I32ShrU
        | Operator::I32Rotl
        | Operator::I32Rotr => sig(&[I32, I32], &[I32]),
        Operator::I32Clz
        | Operator::I32Ctz
        | Operator::I32Popcnt
        | Operator::I32Extend8S
        | Operator::I32Extend16S => sig(&[I32], &[I32]),

        // ------------------------- i64 -------------------------------
        Operator::I64Eqz => sig(&[I64], &[I32]),
        Operator::I64Eq
        | Operator::I64Ne
        | Operator::I64LtS
        | Operator::I64LtU
        | Operator::I64GtS
        | Operator::I64GtU
        | Operator::I64LeS
        | Operator::I64LeU
        | Operator::I64GeS
        | Operator::I64GeU => sig(&[I64, I64], &[I32]),
        Operator::I64Add
        | Operator::I64Sub
        | Operator::I64Mul
        | Operator::I64DivS
        | Operator::I64DivU
        | Operator::I64RemS
        | Operator::I64RemU
        | Operator::I64And
        | Operator::I64Or
        | Operator::I64Xor
        | Operator::I64Shl
        | Operator::I64ShrS
        | Operator::I64ShrU
        | Operator::I64Rotl
        | Operator::I64Rotr => sig(&[I64, I64], &[I64]),
        Operator::I64Clz
        | Operator::I64Ctz
        | Operator::I64Popcnt
        | Operator::I64Extend8S
        | Operator::I64Extend16S
        | Operator::I64Extend32S => sig(&[I64], &[I64]),

        // ------------------------- f32 -------------------------------
        Operator::F32Eq
        | Operator::F32Ne
        | Operator::F32Lt
        | Operator::F32Gt
        | Operator::F32Le
        | Operator::F32Ge => sig(&[F32, F32], &[I32]),
        Operator::F32Abs
        | Operator::F32Neg
        | Operator::F32Ceil
        | Operator::F32Floor
        | Operator::F32Trunc
        | Operator::F32Nearest
        | Operator::F32Sqrt => sig(&[F32], &[F32]),
        Operator::F32Add
        | Operator::F32Sub
        | Operator::F32Mul
        | Operator::F32Div
        | Operator::F32Min
        | Operator::F32Max
        | Operator::F32Copysign => sig(&[F32, F32], &[F32]),

        // ------------------------- f64 -------------------------------
        Operator::F64Eq
        | Operator::F64Ne
        | Operator::F64Lt
        | Operator::F64Gt
        | Operator::F64Le
        | Operator::F64Ge => sig(&[F64, F64], &[I32]),
        Operator::F64Abs
        | Operator::F64Neg
        | Operator::F64Ceil
        | Operator::F64Floor
        | Operator::F64Trunc
        | Operator::F64Nearest
        | Operator::F64Sqrt => sig(&[F64], &[F64]),
        Operator::F64Add
        | Operator::F64Sub
        | Operator::F64Mul
        | Operator::F64Div
        | Operator::F64Min
        | Operator::F64Max
        | Operator::F64Copysign => sig(&[F64, F64], &[F64]),

        // ------------------------- conversions -----------------------
        Operator::I32WrapI64 => sig(&[I64], &[I32]),
        Operator::I32TruncF32S
        | Operator::I32TruncF32U
        | Operator::I32TruncSatF32S
        | Operator::I32TruncSatF32U => sig(&[F32], &[I32]),
        Operator::I32TruncF64S
        | Operator::I32TruncF64U
        | Operator::I32TruncSatF64S
        | Operator::I32TruncSatF64U => sig(&[F64], &[I32]),
        Operator::I64ExtendI32S | Operator::I64ExtendI32U => sig(&[I32], &[I64]),
        Operator::I64TruncF32S
        | Operator::I64TruncF32U
        | Operator::I64TruncSatF32S
        | Operator::I64TruncSatF32U => sig(&[F32], &[I64]),
        Operator::I64TruncF64S
        | Operator::I64TruncF64U
        | Operator::I64TruncSatF64S
        | Operator::I64TruncSatF64U => sig(&[F64], &[I64]),
        Operator::F32ConvertI32S | Operator::F32ConvertI32U => sig(&[I32], &[F32]),
        Operator::F32ConvertI64S | Operator::F32ConvertI64U => sig(&[I64], &[F32]),
        Operator::F32DemoteF64 => sig(&[F64], &[F32]),
        Operator::F64ConvertI32S | Operator::F64ConvertI32U => sig(&[I32], &[F64]),
        Operator::F64ConvertI64S | Operator::F64ConvertI64U => sig(&[I64], &[F64]),
        Operator::F64PromoteF32 => sig(&[F32], &[F64]),
        Operator::I32ReinterpretF32 => sig(&[F32], &[I32]),
        Operator::I64ReinterpretF64 => sig(&[F64], &[I64]),
        Operator::F32ReinterpretI32 => sig(&[I32], &[F32]),
        Operator::F64ReinterpretI64 => sig(&[I64], &[F64]),

        // ------------------------- memory ----------------------------
        Operator::I32Load { .. }
        | Operator::I32Load8S { .. }
        | Operator::I32Load8U { .. }
        | Operator::I32Load16S { .. }
        | Operator::I32Load16U { .. } => sig(&[I32], &[I32]),
        Operator::I64Load { .. }
        | Operator::I64Load8S { .. }
        | Operator::I64Load8U { .. }
        | Operator::I64Load16S { .. }
        | Operator::I64Load16U { .. }
        | Operator::I64Load32S { .. }
        | Operator::I64Load32U { .. } => sig(&[I32], &[I64]),
        Operator::F32Load { .. } => sig(&[I32], &[F32]),
        Operator::F64Load { .. } => sig(&[I32], &[F64]),
        Operator::I32Store { .. } | Operator::I32Store8 { .. } | Operator::I32Store16 { .. } => {
            sig(&[I32, I32], &[])
        }
        Operator::I64Store { .. }
        | Operator::I64Store8 { .. }
        | Operator::I64Store16 { .. }
        | Operator::I64Store32 { .. } => sig(&[I64, I32], &[]),
        Operator::F32Store { .. } => sig(&[F32, I32], &[]),
        Operator::F64Store { .. } => sig(&[F64, I32], &[]),
        Operator::MemorySize { .. } => sig(&[], &[I32]),
        Operator::MemoryGrow { .. } => sig(&[I32], &[I32]),
        Operator::MemoryInit { .. } | Operator::MemoryCopy { .. } | Operator::MemoryFill { .. } => {
            sig(&[I32, I32, I32], &[])
        }
        Operator::DataDrop { .. } => sig(&[], &[]),

        // ------------------------- references ------------------------
        Operator::RefNull { .. } => sig(&[], &[I64]),
        Operator::RefIsNull => sig(&[I64], &[I32]),
        Operator::RefFunc { .. } => sig(&[], &[I64]),

        // ------------------------- tables ----------------------------
        Operator::TableGet { .. } => sig(&[I32], &[I64]),
        Operator::TableSet { .. } => sig(&[I64, I32], &[]),
        Operator::TableSize { .. } => sig(&[], &[I32]),
        Operator::TableGrow { .. } => sig(&[I32, I64], &[I32]),
        Operator::TableFill { .. } => sig(&[I32, I64, I32], &[]),
        Operator::TableCopy { .. } | Operator::TableInit { .. } => sig(&[I32, I32, I32], &[]),
        Operator::ElemDrop { .. } => sig(&[], &[]),

        // ------------------------- SIMD ------------------------------
        Operator::V128Const { .. } => sig(&[], V128),
        Operator::V128Load { .. }
        | Operator::V128Load8x8S { .. }
        | Operator::V128Load8x8U { .. }
        | Operator::V128Load16x4S { .. }
        | Operator::V128Load16x4U { .. }
        | Operator::V128Load32x2S { .. }
        | Operator::V128Load32x2U { .. }
        | Operator::V128Load8Splat { .. }
        | Operator::V128Load16Splat { .. }
        | Operator::V128Load32Splat { .. }
        | Operator::V128Load64Splat { .. }
        | Operator::V128Load32Zero { .. }
        | Operator::V128Load64Zero { .. } => sig(&[I32], V128),
        Operator::V128Load8Lane { .. }
        | Operator::V128Load16Lane { .. }
        | Operator::V128Load32Lane { .. }
        | Operator::V128Load64Lane { .. } => sig(&[V128Hi, V128Lo, I32], V128),
        Operator::V128Store { .. }
        | Operator::V128Store8Lane { .. }
        | Operator::V128Store16Lane { .. }
        | Operator::V128Store32Lane { .. }
        | Operator::V128Store64Lane { .. } => sig(&[V128Hi, V128Lo, I32], &[]),
        Operator::I8x16ExtractLaneS { .. }
        | Operator::I8x16ExtractLaneU { .. }
        | Operator::I16x8ExtractLaneS { .. }
        | Operator::I16x8ExtractLaneU { .. }
        | Operator::I32x4ExtractLane { .. } => sig(V128_POP, &[I32]),
        Operator::I64x2ExtractLane { .. } => sig(V128_POP, &[I64]),
        Operator::F32x4ExtractLane { .. } => sig(V128_POP, &[F32]),
        Operator::F64x2ExtractLane { .. } => sig(V128_POP, &[F64]),
        Operator::I8x16ReplaceLane { .. }
        | Operator::I16x8ReplaceLane { .. }
        | Operator::I32x4ReplaceLane { .. } => sig(&[I32, V128Hi, V128Lo], V128),
        Operator::I64x2ReplaceLane { .. } => sig(&[I64, V128Hi, V128Lo], V128),
        Operator::F32x4ReplaceLane { .. } => sig(&[F32, V128Hi, V128Lo], V128),
        Operator::F64x2ReplaceLane { .. } => sig(&[F64, V128Hi, V128Lo], V128),
        Operator::I8x16Splat | Operator::I16x8Splat | Operator::I32x4Splat => sig(&[I32], V128),
        Operator::I64x2Splat => sig(&[I64], V128),
        Operator::F32x4Splat => sig(&[F32], V128),
        Operator::F64x2Splat => sig(&[F64], V128),
        Operator::I8x16Shuffle { .. } | Operator::I8x16Swizzle => sig(V128X2_POP, V128),
        Operator::V128AnyTrue
        | Operator::I8x16AllTrue
        | Operator::I16x8AllTrue
        | Operator::I32x4AllTrue
        | Operator::I64x2AllTrue
        | Operator::I8x16Bitmask
        | Operator::I16x8Bitmask
        | Operator::I32x4Bitmask
        | Operator::I64x2Bitmask => sig(V128_POP, &[I32]),
        Operator::V128And | Operator::V128Or | Operator::V128Xor | Operator::V128AndNot => {
            sig(V128X2_POP, V128)
        }
        Operator::V128Not => sig(V128_POP, V128),
        Operator::V128Bitselect => sig(&[V128Hi, V128Lo, V128Hi, V128Lo, V128Hi, V128Lo], V128),
        Operator::I8x16Shl
        | Operator::I8x16ShrS
        | Operator::I8x16ShrU
        | Operator::I16x8Shl
        | Operator::I16x8ShrS
        | Operator::I16x8ShrU
        | Operator::I32x4Shl
        | Operator::I32x4ShrS
        | Operator::I32x4ShrU
        | Operator::I64x2Shl
        | Operator::I64x2ShrS
        | Operator::I64x2ShrU => sig(&[I32, V128Hi, V128Lo], V128),
        Operator::I8x16Add
        | Operator::I8x16AddSatS
        | Operator::I8x16AddSatU
        | Operator::I8x16Sub
        | Operator::I8x16SubSatS
        | Operator::I8x16SubSatU
        | Operator::I16x8Add
        | Operator::I16x8AddSatS
        | Operator::I16x8AddSatU
        | Operator::I16x8Sub
        | Operator::I16x8SubSatS
        | Operator::I16x8SubSatU
        | Operator::I16x8Mul
        | Operator::I32x4Add
        | Operator::I32x4Sub
        | Operator::I32x4Mul
        | Operator::I64x2Add
        | Operator::I64x2Sub
        | Operator::I64x2Mul
        | Operator::F32x4Add
        | Operator::F32x4Sub
        | Operator::F32x4Mul
        | Operator::F64x2Add
        | Operator::F64x2Sub
        | Operator::F64x2Mul => sig(V128X2_POP, V128),
        Operator::I8x16Neg
        | Operator::I8x16Abs
        | Operator::I16x8Neg
        | Operator::I16x8Abs
        | Operator::I32x4Neg
        | Operator::I32x4Abs
        | Operator::I64x2Neg
        | Operator::I64x2Abs
        | Operator::F32x4Neg
        | Operator::F32x4Abs
        | Operator::F32x4Sqrt
        | Operator::F64x2Neg
        | Operator::F64x2Abs
        | Operator::F64x2Sqrt => sig(V128_POP, V128),
        Operator::I8x16Eq
        | Operator::I8x16Ne
        | Operator::I8x16LtS
        | Operator::I8x16LtU
        | Operator::I8x16GtS
        | Operator::I8x16GtU
        | Operator::I8x16LeS
        | Operator::I8x16LeU
        | Operator::I8x16GeS
        | Operator::I8x16GeU
        | Operator::I16x8Eq
        | Operator::I16x8Ne
        | Operator::I16x8LtS
        | Operator::I16x8LtU
        | Operator::I16x8GtS
        | Operator::I16x8GtU
        | Operator::I16x8LeS
        | Operator::I16x8LeU
        | Operator::I16x8GeS
        | Operator::I16x8GeU
        | Operator::I32x4Eq
        | Operator::I32x4Ne
        | Operator::I32x4LtS
        | Operator::I32x4LtU
        | Operator::I32x4GtS
        | Operator::I32x4GtU
        | Operator::I32x4LeS
        | Operator::I32x4LeU
        | Operator::I32x4GeS
        | Operator::I32x4GeU
        | Operator::I64x2Eq
        | Operator::I64x2Ne
        | Operator::I64x2LtS
        | Operator::I64x2GtS
        | Operator::I64x2LeS
        | Operator::I64x2GeS
        | Operator::F32x4Eq
        | Operator::F32x4Ne
        | Operator::F32x4Lt
        | Operator::F32x4Gt
        | Operator::F32x4Le
        | Operator::F32x4Ge
        | Operator::F64x2Eq
        | Operator::F64x2Ne
        | Operator::F64x2Lt
        | Operator::F64x2Gt
        | Operator::F64x2Le
        | Operator::F64x2Ge => sig(V128X2_POP, V128),

        op => {
            return Err(CompileError::Unsupported(format!(
                "operator not supported by the interpreter: {op:?}"
            )))
        }
    };

    Ok(Some(sig))
}
