use crate::indices::{FuncIndex, GlobalIndex};
use crate::store::{funcref_to_raw, FuncId, GlobalId, Store};
use crate::translate::{ConstExpr, ConstOp};
use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

/// Evaluates the constant-expression subset used by global, table and
/// element initializers.
///
/// Values are 128-bit so a v128 constant fits; scalars and references live
/// in the low 64 bits.
#[derive(Debug, Default)]
pub(crate) struct ConstExprEvaluator {
    stack: SmallVec<[u128; 2]>,
}

impl ConstExprEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `expr` in the context of a partially-built instance.
    ///
    /// `functions` and `globals` are the instance's (possibly still growing)
    /// entity maps; validation guarantees every index an initializer names
    /// is already present.
    pub fn eval(
        &mut self,
        store: &Store,
        functions: &PrimaryMap<FuncIndex, FuncId>,
        globals: &PrimaryMap<GlobalIndex, GlobalId>,
        expr: &ConstExpr,
    ) -> u128 {
        self.stack.clear();

        for op in expr.ops() {
            match op {
                ConstOp::I32Const(v) => self.stack.push(u128::from(v as u32)),
                ConstOp::I64Const(v) => self.stack.push(u128::from(v as u64)),
                ConstOp::F32Const(bits) => self.stack.push(u128::from(bits)),
                ConstOp::F64Const(bits) => self.stack.push(u128::from(bits)),
                ConstOp::V128Const(bytes) => self.stack.push(u128::from_le_bytes(bytes)),
                ConstOp::RefNull => self.stack.push(0),
                ConstOp::RefFunc(index) => {
                    self.stack.push(u128::from(funcref_to_raw(functions[index])));
                }
                ConstOp::GlobalGet(index) => {
                    let global = &store.globals[globals[index]];
                    let value =
                        u128::from(global.value) | (u128::from(global.value_hi) << 64);
                    self.stack.push(value);
                }
                ConstOp::I32Add => self.binop32(|a, b| a.wrapping_add(b)),
                ConstOp::I32Sub => self.binop32(|a, b| a.wrapping_sub(b)),
                ConstOp::I32Mul => self.binop32(|a, b| a.wrapping_mul(b)),
                ConstOp::I64Add => self.binop64(|a, b| a.wrapping_add(b)),
                ConstOp::I64Sub => self.binop64(|a, b| a.wrapping_sub(b)),
                ConstOp::I64Mul => self.binop64(|a, b| a.wrapping_mul(b)),
            }
        }

        self.stack.pop().expect("const expression left no value")
    }

    fn binop32(&mut self, f: impl FnOnce(u32, u32) -> u32) {
        let b = self.stack.pop().expect("const expression underflow") as u32;
        let a = self.stack.pop().expect("const expression underflow") as u32;
        self.stack.push(u128::from(f(a, b)));
    }

    fn binop64(&mut self, f: impl FnOnce(u64, u64) -> u64) {
        let b = self.stack.pop().expect("const expression underflow") as u64;
        let a = self.stack.pop().expect("const expression underflow") as u64;
        self.stack.push(u128::from(f(a, b)));
    }
}
