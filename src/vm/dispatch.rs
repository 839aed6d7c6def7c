use crate::compile::ir::{
    BranchTarget, FloatType, InclusiveRange, Operation, SignedInt, SignedType, UnsignedInt,
    UnsignedType, V128LoadKind, RETURN_PC,
};
use crate::compile::CompiledFunction;
use crate::func::{Caller, FuncInfo};
use crate::indices::MemoryIndex;
use crate::store::{
    closed_exit_code, funcref_from_raw, funcref_to_raw, FuncId, FunctionKind, HostFn, InstanceId,
    Store,
};
use crate::translate::WasmFuncType;
use crate::traps::Trap;
use crate::vm::numeric::{
    canonicalize_f32, canonicalize_f64, fmax_f32, fmax_f64, fmin_f32, fmin_f64,
    is_canonical_nan_f32, is_canonical_nan_f64, trunc_float_to_int, ARITH_NAN_F32, ARITH_NAN_F64,
    CANON_NAN_F32, CANON_NAN_F64,
};
use crate::vm::{simd, CallEngine, Frame, VmFault};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use smallvec::{smallvec, SmallVec};

#[inline]
fn pop(stack: &mut Vec<u64>) -> u64 {
    // Stack balance is proven at compile time; underflow here is a
    // compiler bug, not a guest-observable condition.
    stack.pop().expect("value stack underflow")
}

#[inline]
fn push(stack: &mut Vec<u64>, value: u64) {
    stack.push(value);
}

#[inline]
fn pop_v128(stack: &mut Vec<u64>) -> simd::V128 {
    let hi = pop(stack);
    let lo = pop(stack);
    (lo, hi)
}

#[inline]
fn push_v128(stack: &mut Vec<u64>, v: simd::V128) {
    stack.push(v.0);
    stack.push(v.1);
}

/// Remove the slots described by `range` (counted from the top, inclusive),
/// sliding the preserved top slots down over them.
#[inline]
fn drop_slots(stack: &mut Vec<u64>, range: InclusiveRange) {
    let keep = range.start as usize;
    let count = range.len() as usize;
    let len = stack.len();
    stack.copy_within(len - keep.., len - keep - count);
    stack.truncate(len - count);
}

#[inline]
fn take_branch(stack: &mut Vec<u64>, target: &BranchTarget) -> u32 {
    if let Some(range) = target.drop {
        drop_slots(stack, range);
    }
    target.pc
}

/// Effective address of a memory access: the 64-bit sum of the dynamic
/// operand and the static offset, checked against the 32-bit index space
/// first and the current memory size second.
#[inline]
fn mem_ea(addr: u32, offset: u64, size: u64, len: usize) -> Result<usize, Trap> {
    let ea = u64::from(addr) + offset;
    if ea > u64::from(u32::MAX) {
        return Err(Trap::OutOfBoundsMemoryAccess);
    }
    if ea + size > len as u64 {
        return Err(Trap::OutOfBoundsMemoryAccess);
    }
    Ok(ea as usize)
}

#[inline]
fn load_bytes<const N: usize>(data: &[u8], addr: u32, offset: u64) -> Result<[u8; N], Trap> {
    let ea = mem_ea(addr, offset, N as u64, data.len())?;
    let mut out = [0; N];
    out.copy_from_slice(&data[ea..ea + N]);
    Ok(out)
}

#[inline]
fn store_bytes(data: &mut [u8], addr: u32, offset: u64, bytes: &[u8]) -> Result<(), Trap> {
    let ea = mem_ea(addr, offset, bytes.len() as u64, data.len())?;
    data[ea..ea + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

#[inline]
fn fbin32(a: u64, b: u64, f: impl Fn(f32, f32) -> f32) -> u64 {
    let (x, y) = (f32::from_bits(a as u32), f32::from_bits(b as u32));
    u64::from(canonicalize_f32(f(x, y), &[x, y]).to_bits())
}

#[inline]
fn fbin64(a: u64, b: u64, f: impl Fn(f64, f64) -> f64) -> u64 {
    let (x, y) = (f64::from_bits(a), f64::from_bits(b));
    canonicalize_f64(f(x, y), &[x, y]).to_bits()
}

#[inline]
fn funary32(a: u64, f: impl Fn(f32) -> f32) -> u64 {
    let x = f32::from_bits(a as u32);
    u64::from(canonicalize_f32(f(x), &[x]).to_bits())
}

#[inline]
fn funary64(a: u64, f: impl Fn(f64) -> f64) -> u64 {
    let x = f64::from_bits(a);
    canonicalize_f64(f(x), &[x]).to_bits()
}

/// Invoke `func`. Wasm functions get a frame pushed (the caller's saved
/// `pc` must already point past the call); host functions run inline and
/// leave their results on the stack before this returns.
pub(crate) fn call_function(
    store: &mut Store,
    engine: &mut CallEngine,
    func: FuncId,
    caller: Option<InstanceId>,
) -> Result<(), VmFault> {
    enum Target {
        Wasm(Arc<CompiledFunction>, InstanceId),
        Host(Arc<HostFn>, WasmFuncType, String),
    }

    let record = &store.funcs[func];
    let target = match &record.kind {
        FunctionKind::Wasm(code) => Target::Wasm(
            code.clone(),
            record.instance.expect("wasm function has an instance"),
        ),
        FunctionKind::Host(host) => {
            Target::Host(host.callback.clone(), host.ty.clone(), host.name.clone())
        }
    };

    match target {
        Target::Wasm(code, instance) => {
            if let Some(exit_code) = closed_exit_code(&store.instances[instance].closed) {
                return Err(VmFault::Closed { exit_code });
            }
            if engine.frames.len() as u32 >= store.engine.config().call_stack_ceiling {
                return Err(Trap::CallStackOverflow.into());
            }

            tracing::trace!(
                "entering wasm function {} ({} locals, {} body ops)",
                code.index.as_u32(),
                code.local_types.len(),
                code.body.len(),
            );

            let base = engine.stack.len() as u32 - code.param_slots;
            // Declared locals start zeroed.
            engine
                .stack
                .resize(base as usize + code.local_slots as usize, 0);
            let memory = store.instances[instance]
                .memories
                .get(MemoryIndex::from_u32(0))
                .copied();

            let saved_context = match store.engine.config().listener.clone() {
                Some(listener) => {
                    let module = store.instances[instance].module.clone();
                    let info = FuncInfo {
                        name: module.func_name(code.index),
                        index: code.index.as_u32(),
                    };
                    let params =
                        &engine.stack[base as usize..(base + code.param_slots) as usize];
                    listener
                        .before(&store.context, &info, params)
                        .map(|new| core::mem::replace(&mut store.context, new))
                }
                None => None,
            };

            engine.frames.push(Frame {
                func,
                code,
                instance,
                memory,
                pc: 0,
                base,
                saved_context,
            });
            Ok(())
        }
        Target::Host(callback, ty, name) => {
            let param_slots = ty.param_slots() as usize;
            let result_slots = ty.result_slots() as usize;
            let params_start = engine.stack.len() - param_slots;

            let saved_context = match store.engine.config().listener.clone() {
                Some(listener) => {
                    let info = FuncInfo {
                        name: Some(&name),
                        index: u32::MAX,
                    };
                    listener
                        .before(&store.context, &info, &engine.stack[params_start..])
                        .map(|new| core::mem::replace(&mut store.context, new))
                }
                None => None,
            };

            let params: SmallVec<[u64; 8]> = SmallVec::from_slice(&engine.stack[params_start..]);
            engine.stack.truncate(params_start);
            let mut results: SmallVec<[u64; 4]> = smallvec![0; result_slots];

            let outcome = callback(
                Caller {
                    store,
                    instance: caller,
                },
                &params,
                &mut results,
            );

            let outcome = match outcome {
                Ok(()) => {
                    engine.stack.extend_from_slice(&results);
                    if let Some(listener) = store.engine.config().listener.clone() {
                        let info = FuncInfo {
                            name: Some(&name),
                            index: u32::MAX,
                        };
                        listener.after(&store.context, &info, &results);
                    }
                    Ok(())
                }
                // The after hook is not called on the trap path and does not
                // observe the trap.
                Err(trap) => Err(trap.into()),
            };

            if let Some(context) = saved_context {
                store.context = context;
            }
            outcome
        }
    }
}

/// Pop the finished frame, handing its results to the listener and
/// restoring a listener-replaced context.
fn finish_frame(store: &mut Store, engine: &mut CallEngine) {
    let frame = engine.frames.pop().expect("no frame to finish");
    let result_slots = frame.code.result_slots as usize;
    debug_assert_eq!(engine.stack.len(), frame.base as usize + result_slots);

    if let Some(listener) = store.engine.config().listener.clone() {
        let module = store.instances[frame.instance].module.clone();
        let info = FuncInfo {
            name: module.func_name(frame.code.index),
            index: frame.code.index.as_u32(),
        };
        let results = &engine.stack[engine.stack.len() - result_slots..];
        listener.after(&store.context, &info, results);
    }
    if let Some(context) = frame.saved_context {
        store.context = context;
    }
}

/// The dispatch loop: executes frames until the frame stack drains.
pub(crate) fn run(store: &mut Store, engine: &mut CallEngine) -> Result<(), VmFault> {
    'call: while let Some(frame) = engine.frames.last() {
        let code = frame.code.clone();
        let instance = frame.instance;
        let memory = frame.memory;
        let mut pc = frame.pc as usize;
        let body = &code.body[..];

        loop {
            match &body[pc] {
                // ------------------------- control -----------------------
                Operation::Unreachable => return Err(Trap::Unreachable.into()),
                Operation::Br { target } => {
                    let next = take_branch(&mut engine.stack, target);
                    if next == RETURN_PC {
                        finish_frame(store, engine);
                        continue 'call;
                    }
                    pc = next as usize;
                    continue;
                }
                Operation::BrIf {
                    then_target,
                    else_target,
                } => {
                    let condition = pop(&mut engine.stack);
                    let target = if condition != 0 {
                        then_target
                    } else {
                        else_target
                    };
                    let next = take_branch(&mut engine.stack, target);
                    if next == RETURN_PC {
                        finish_frame(store, engine);
                        continue 'call;
                    }
                    pc = next as usize;
                    continue;
                }
                Operation::BrTable { targets } => {
                    let index = pop(&mut engine.stack) as u32 as usize;
                    let target = if index + 1 < targets.len() {
                        &targets[index + 1]
                    } else {
                        &targets[0]
                    };
                    let next = take_branch(&mut engine.stack, target);
                    if next == RETURN_PC {
                        finish_frame(store, engine);
                        continue 'call;
                    }
                    pc = next as usize;
                    continue;
                }
                Operation::Call { function } => {
                    let callee = store.instances[instance].functions[*function];
                    engine.frames.last_mut().expect("frame").pc = (pc + 1) as u32;
                    call_function(store, engine, callee, Some(instance))?;
                    continue 'call;
                }
                Operation::CallIndirect { type_index, table } => {
                    let index = pop(&mut engine.stack) as u32;
                    let table_id = store.instances[instance].tables[*table];
                    let elements = &store.tables[table_id].elements;
                    let raw = *elements
                        .get(index as usize)
                        .ok_or(Trap::InvalidTableAccess)?;
                    let callee = funcref_from_raw(raw).ok_or(Trap::InvalidTableAccess)?;
                    if store.funcs[callee].ty != *type_index {
                        return Err(Trap::IndirectCallTypeMismatch.into());
                    }
                    engine.frames.last_mut().expect("frame").pc = (pc + 1) as u32;
                    call_function(store, engine, callee, Some(instance))?;
                    continue 'call;
                }
                Operation::CheckInterrupt => {
                    if let Some(exit_code) = closed_exit_code(&store.instances[instance].closed) {
                        return Err(VmFault::Closed { exit_code });
                    }
                }
                Operation::Drop { range } => drop_slots(&mut engine.stack, *range),
                Operation::Select { is_v128 } => {
                    let condition = pop(&mut engine.stack);
                    if *is_v128 {
                        let second = pop_v128(&mut engine.stack);
                        let first = pop_v128(&mut engine.stack);
                        push_v128(
                            &mut engine.stack,
                            if condition != 0 { first } else { second },
                        );
                    } else {
                        let second = pop(&mut engine.stack);
                        let first = pop(&mut engine.stack);
                        push(
                            &mut engine.stack,
                            if condition != 0 { first } else { second },
                        );
                    }
                }

                // ------------------------- stack -------------------------
                Operation::Pick { depth, is_v128 } => {
                    let len = engine.stack.len();
                    let lo = engine.stack[len - 1 - *depth as usize];
                    if *is_v128 {
                        let hi = engine.stack[len - *depth as usize];
                        push(&mut engine.stack, lo);
                        push(&mut engine.stack, hi);
                    } else {
                        push(&mut engine.stack, lo);
                    }
                }
                Operation::Set { depth, is_v128 } => {
                    if *is_v128 {
                        let hi = pop(&mut engine.stack);
                        let lo = pop(&mut engine.stack);
                        let len = engine.stack.len();
                        engine.stack[len - 1 - *depth as usize] = lo;
                        engine.stack[len - *depth as usize] = hi;
                    } else {
                        let value = pop(&mut engine.stack);
                        let len = engine.stack.len();
                        engine.stack[len - 1 - *depth as usize] = value;
                    }
                }

                // ------------------------- variables ---------------------
                Operation::GlobalGet { index } => {
                    let id = store.instances[instance].globals[*index];
                    let global = &store.globals[id];
                    let (lo, hi, slots) = (global.value, global.value_hi, global.slot_count());
                    push(&mut engine.stack, lo);
                    if slots == 2 {
                        push(&mut engine.stack, hi);
                    }
                }
                Operation::GlobalSet { index } => {
                    let id = store.instances[instance].globals[*index];
                    let slots = store.globals[id].slot_count();
                    let hi = if slots == 2 { pop(&mut engine.stack) } else { 0 };
                    let lo = pop(&mut engine.stack);
                    let global = &mut store.globals[id];
                    global.value = lo;
                    global.value_hi = hi;
                }

                // ------------------------- memory ------------------------
                Operation::Load { ty, offset } => {
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &store.memories[memory.expect("module has a memory")].data;
                    let value = match ty {
                        UnsignedType::I32 | UnsignedType::F32 => {
                            u64::from(u32::from_le_bytes(load_bytes(data, addr, *offset)?))
                        }
                        UnsignedType::I64 | UnsignedType::F64 => {
                            u64::from_le_bytes(load_bytes(data, addr, *offset)?)
                        }
                    };
                    push(&mut engine.stack, value);
                }
                Operation::Load8 { ty, offset } => {
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &store.memories[memory.expect("module has a memory")].data;
                    let [byte] = load_bytes(data, addr, *offset)?;
                    let value = match ty {
                        SignedInt::I32 => u64::from(byte as i8 as i32 as u32),
                        SignedInt::U32 | SignedInt::U64 => u64::from(byte),
                        SignedInt::I64 => (byte as i8 as i64) as u64,
                    };
                    push(&mut engine.stack, value);
                }
                Operation::Load16 { ty, offset } => {
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &store.memories[memory.expect("module has a memory")].data;
                    let raw = u16::from_le_bytes(load_bytes(data, addr, *offset)?);
                    let value = match ty {
                        SignedInt::I32 => u64::from(raw as i16 as i32 as u32),
                        SignedInt::U32 | SignedInt::U64 => u64::from(raw),
                        SignedInt::I64 => (raw as i16 as i64) as u64,
                    };
                    push(&mut engine.stack, value);
                }
                Operation::Load32 { signed, offset } => {
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &store.memories[memory.expect("module has a memory")].data;
                    let raw = u32::from_le_bytes(load_bytes(data, addr, *offset)?);
                    let value = if *signed {
                        (raw as i32 as i64) as u64
                    } else {
                        u64::from(raw)
                    };
                    push(&mut engine.stack, value);
                }
                Operation::Store { ty, offset } => {
                    let value = pop(&mut engine.stack);
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &mut store.memories[memory.expect("module has a memory")].data;
                    match ty {
                        UnsignedType::I32 | UnsignedType::F32 => {
                            store_bytes(data, addr, *offset, &(value as u32).to_le_bytes())?;
                        }
                        UnsignedType::I64 | UnsignedType::F64 => {
                            store_bytes(data, addr, *offset, &value.to_le_bytes())?;
                        }
                    }
                }
                Operation::Store8 { offset } => {
                    let value = pop(&mut engine.stack);
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &mut store.memories[memory.expect("module has a memory")].data;
                    store_bytes(data, addr, *offset, &[value as u8])?;
                }
                Operation::Store16 { offset } => {
                    let value = pop(&mut engine.stack);
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &mut store.memories[memory.expect("module has a memory")].data;
                    store_bytes(data, addr, *offset, &(value as u16).to_le_bytes())?;
                }
                Operation::Store32 { offset } => {
                    let value = pop(&mut engine.stack);
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &mut store.memories[memory.expect("module has a memory")].data;
                    store_bytes(data, addr, *offset, &(value as u32).to_le_bytes())?;
                }
                Operation::MemorySize => {
                    let pages = store.memories[memory.expect("module has a memory")].size_pages();
                    push(&mut engine.stack, pages);
                }
                Operation::MemoryGrow => {
                    let delta = pop(&mut engine.stack) as u32;
                    let result = store.memories[memory.expect("module has a memory")]
                        .grow(u64::from(delta))
                        .unwrap_or(u64::from(u32::MAX));
                    push(&mut engine.stack, result & 0xffff_ffff);
                }
                Operation::MemoryInit { data } => {
                    let count = pop(&mut engine.stack) as u32;
                    let src = pop(&mut engine.stack) as u32;
                    let dst = pop(&mut engine.stack) as u32;
                    let module = store.instances[instance].module.clone();
                    let dropped = store.instances[instance].dropped_data.contains(*data);
                    let bytes: &[u8] = if dropped {
                        &[]
                    } else {
                        module
                            .translated()
                            .passive_memory_initializers
                            .get(data)
                            .map(|b| &b[..])
                            .unwrap_or(&[])
                    };
                    let mem = &mut store.memories[memory.expect("module has a memory")].data;
                    let src_end = u64::from(src) + u64::from(count);
                    let dst_end = u64::from(dst) + u64::from(count);
                    if src_end > bytes.len() as u64 || dst_end > mem.len() as u64 {
                        return Err(Trap::OutOfBoundsMemoryAccess.into());
                    }
                    mem[dst as usize..dst_end as usize]
                        .copy_from_slice(&bytes[src as usize..src_end as usize]);
                }
                Operation::DataDrop { data } => {
                    store.instances[instance].dropped_data.insert(*data);
                }
                Operation::MemoryCopy => {
                    let count = pop(&mut engine.stack) as u32;
                    let src = pop(&mut engine.stack) as u32;
                    let dst = pop(&mut engine.stack) as u32;
                    let mem = &mut store.memories[memory.expect("module has a memory")].data;
                    let src_end = u64::from(src) + u64::from(count);
                    let dst_end = u64::from(dst) + u64::from(count);
                    if src_end > mem.len() as u64 || dst_end > mem.len() as u64 {
                        return Err(Trap::OutOfBoundsMemoryAccess.into());
                    }
                    mem.copy_within(src as usize..src_end as usize, dst as usize);
                }
                Operation::MemoryFill => {
                    let count = pop(&mut engine.stack) as u32;
                    let value = pop(&mut engine.stack) as u8;
                    let dst = pop(&mut engine.stack) as u32;
                    let mem = &mut store.memories[memory.expect("module has a memory")].data;
                    let dst_end = u64::from(dst) + u64::from(count);
                    if dst_end > mem.len() as u64 {
                        return Err(Trap::OutOfBoundsMemoryAccess.into());
                    }
                    mem[dst as usize..dst_end as usize].fill(value);
                }

                // ------------------------- constants ---------------------
                Operation::ConstI32 { value } => push(&mut engine.stack, u64::from(*value)),
                Operation::ConstI64 { value } => push(&mut engine.stack, *value),
                Operation::ConstF32 { value } => push(&mut engine.stack, u64::from(*value)),
                Operation::ConstF64 { value } => push(&mut engine.stack, *value),

                // ------------------------- comparisons -------------------
                Operation::Eq { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedType::I32 | UnsignedType::I64 => a == b,
                        UnsignedType::F32 => {
                            f32::from_bits(a as u32) == f32::from_bits(b as u32)
                        }
                        UnsignedType::F64 => f64::from_bits(a) == f64::from_bits(b),
                    };
                    push(&mut engine.stack, u64::from(result));
                }
                Operation::Ne { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedType::I32 | UnsignedType::I64 => a != b,
                        UnsignedType::F32 => {
                            f32::from_bits(a as u32) != f32::from_bits(b as u32)
                        }
                        UnsignedType::F64 => f64::from_bits(a) != f64::from_bits(b),
                    };
                    push(&mut engine.stack, u64::from(result));
                }
                Operation::Eqz { .. } => {
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, u64::from(a == 0));
                }
                Operation::Lt { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, u64::from(scmp(*ty, a, b) == Cmp::Lt));
                }
                Operation::Gt { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, u64::from(scmp(*ty, a, b) == Cmp::Gt));
                }
                Operation::Le { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let c = scmp(*ty, a, b);
                    push(&mut engine.stack, u64::from(c == Cmp::Lt || c == Cmp::Eq));
                }
                Operation::Ge { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let c = scmp(*ty, a, b);
                    push(&mut engine.stack, u64::from(c == Cmp::Gt || c == Cmp::Eq));
                }

                // ------------------------- arithmetic --------------------
                Operation::Add { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedType::I32 => u64::from((a as u32).wrapping_add(b as u32)),
                        UnsignedType::I64 => a.wrapping_add(b),
                        UnsignedType::F32 => fbin32(a, b, |x, y| x + y),
                        UnsignedType::F64 => fbin64(a, b, |x, y| x + y),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Sub { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedType::I32 => u64::from((a as u32).wrapping_sub(b as u32)),
                        UnsignedType::I64 => a.wrapping_sub(b),
                        UnsignedType::F32 => fbin32(a, b, |x, y| x - y),
                        UnsignedType::F64 => fbin64(a, b, |x, y| x - y),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Mul { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedType::I32 => u64::from((a as u32).wrapping_mul(b as u32)),
                        UnsignedType::I64 => a.wrapping_mul(b),
                        UnsignedType::F32 => fbin32(a, b, |x, y| x * y),
                        UnsignedType::F64 => fbin64(a, b, |x, y| x * y),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Clz { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedInt::I32 => u64::from((a as u32).leading_zeros()),
                        UnsignedInt::I64 => u64::from(a.leading_zeros()),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Ctz { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedInt::I32 => u64::from((a as u32).trailing_zeros()),
                        UnsignedInt::I64 => u64::from(a.trailing_zeros()),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Popcnt { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedInt::I32 => u64::from((a as u32).count_ones()),
                        UnsignedInt::I64 => u64::from(a.count_ones()),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Div { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = div(*ty, a, b)?;
                    push(&mut engine.stack, result);
                }
                Operation::Rem { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = rem(*ty, a, b)?;
                    push(&mut engine.stack, result);
                }
                Operation::And { .. } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, a & b);
                }
                Operation::Or { .. } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, a | b);
                }
                Operation::Xor { .. } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, a ^ b);
                }
                Operation::Shl { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedInt::I32 => u64::from((a as u32) << (b as u32 % 32)),
                        UnsignedInt::I64 => a << (b % 64),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Shr { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        SignedInt::I32 => u64::from((((a as u32) as i32) >> (b as u32 % 32)) as u32),
                        SignedInt::U32 => u64::from((a as u32) >> (b as u32 % 32)),
                        SignedInt::I64 => ((a as i64) >> (b % 64)) as u64,
                        SignedInt::U64 => a >> (b % 64),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Rotl { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedInt::I32 => u64::from((a as u32).rotate_left(b as u32 % 32)),
                        UnsignedInt::I64 => a.rotate_left((b % 64) as u32),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Rotr { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        UnsignedInt::I32 => u64::from((a as u32).rotate_right(b as u32 % 32)),
                        UnsignedInt::I64 => a.rotate_right((b % 64) as u32),
                    };
                    push(&mut engine.stack, result);
                }

                // ------------------------- float unary/binary ------------
                Operation::Abs { ty } => {
                    // Sign-bit manipulation, not arithmetic: NaN payloads
                    // pass through untouched.
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => a & 0x7fff_ffff,
                        FloatType::F64 => a & !(1 << 63),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Neg { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => a ^ 0x8000_0000,
                        FloatType::F64 => a ^ (1 << 63),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Ceil { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => funary32(a, f32::ceil),
                        FloatType::F64 => funary64(a, f64::ceil),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Floor { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => funary32(a, f32::floor),
                        FloatType::F64 => funary64(a, f64::floor),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Trunc { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => funary32(a, f32::trunc),
                        FloatType::F64 => funary64(a, f64::trunc),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Nearest { ty } => {
                    // Round half to even, unlike the standard library's
                    // `round`.
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => funary32(a, f32::round_ties_even),
                        FloatType::F64 => funary64(a, f64::round_ties_even),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Sqrt { ty } => {
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => funary32(a, f32::sqrt),
                        FloatType::F64 => funary64(a, f64::sqrt),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Min { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => u64::from(
                            fmin_f32(f32::from_bits(a as u32), f32::from_bits(b as u32)).to_bits(),
                        ),
                        FloatType::F64 => {
                            fmin_f64(f64::from_bits(a), f64::from_bits(b)).to_bits()
                        }
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Max { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => u64::from(
                            fmax_f32(f32::from_bits(a as u32), f32::from_bits(b as u32)).to_bits(),
                        ),
                        FloatType::F64 => {
                            fmax_f64(f64::from_bits(a), f64::from_bits(b)).to_bits()
                        }
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Copysign { ty } => {
                    let b = pop(&mut engine.stack);
                    let a = pop(&mut engine.stack);
                    let result = match ty {
                        FloatType::F32 => {
                            u64::from((a as u32 & 0x7fff_ffff) | (b as u32 & 0x8000_0000))
                        }
                        FloatType::F64 => (a & !(1 << 63)) | (b & (1 << 63)),
                    };
                    push(&mut engine.stack, result);
                }

                // ------------------------- conversions -------------------
                Operation::I32WrapFromI64 => {
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, a & 0xffff_ffff);
                }
                Operation::ITruncFromF {
                    input,
                    output,
                    non_trapping,
                } => {
                    let a = pop(&mut engine.stack);
                    let value = match input {
                        FloatType::F32 => f64::from(f32::from_bits(a as u32)),
                        FloatType::F64 => f64::from_bits(a),
                    };
                    let result = trunc_float_to_int(value, *output, *non_trapping)?;
                    push(&mut engine.stack, result);
                }
                Operation::FConvertFromI { input, output } => {
                    let a = pop(&mut engine.stack);
                    let result = match (input, output) {
                        (SignedInt::I32, FloatType::F32) => {
                            u64::from(((a as u32 as i32) as f32).to_bits())
                        }
                        (SignedInt::U32, FloatType::F32) => {
                            u64::from(((a as u32) as f32).to_bits())
                        }
                        (SignedInt::I64, FloatType::F32) => {
                            u64::from(((a as i64) as f32).to_bits())
                        }
                        (SignedInt::U64, FloatType::F32) => u64::from((a as f32).to_bits()),
                        (SignedInt::I32, FloatType::F64) => {
                            f64::from(a as u32 as i32).to_bits()
                        }
                        (SignedInt::U32, FloatType::F64) => f64::from(a as u32).to_bits(),
                        (SignedInt::I64, FloatType::F64) => ((a as i64) as f64).to_bits(),
                        (SignedInt::U64, FloatType::F64) => (a as f64).to_bits(),
                    };
                    push(&mut engine.stack, result);
                }
                Operation::F32DemoteFromF64 => {
                    let a = pop(&mut engine.stack);
                    let x = f64::from_bits(a);
                    let narrowed = x as f32;
                    let result = if narrowed.is_nan() {
                        if is_canonical_nan_f64(a) {
                            CANON_NAN_F32
                        } else {
                            ARITH_NAN_F32
                        }
                    } else {
                        narrowed.to_bits()
                    };
                    push(&mut engine.stack, u64::from(result));
                }
                Operation::F64PromoteFromF32 => {
                    let a = pop(&mut engine.stack);
                    let x = f32::from_bits(a as u32);
                    let widened = f64::from(x);
                    let result = if widened.is_nan() {
                        if is_canonical_nan_f32(a as u32) {
                            CANON_NAN_F64
                        } else {
                            ARITH_NAN_F64
                        }
                    } else {
                        widened.to_bits()
                    };
                    push(&mut engine.stack, result);
                }
                Operation::Extend { signed } => {
                    let a = pop(&mut engine.stack);
                    let result = if *signed {
                        (a as u32 as i32 as i64) as u64
                    } else {
                        a & 0xffff_ffff
                    };
                    push(&mut engine.stack, result);
                }
                Operation::SignExtend32From8 => {
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, u64::from(a as u8 as i8 as i32 as u32));
                }
                Operation::SignExtend32From16 => {
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, u64::from(a as u16 as i16 as i32 as u32));
                }
                Operation::SignExtend64From8 => {
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, (a as u8 as i8 as i64) as u64);
                }
                Operation::SignExtend64From16 => {
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, (a as u16 as i16 as i64) as u64);
                }
                Operation::SignExtend64From32 => {
                    let a = pop(&mut engine.stack);
                    push(&mut engine.stack, (a as u32 as i32 as i64) as u64);
                }

                // ------------------------- tables & references -----------
                Operation::TableInit { elem, table } => {
                    let count = pop(&mut engine.stack) as u32;
                    let src = pop(&mut engine.stack) as u32;
                    let dst = pop(&mut engine.stack) as u32;
                    let table_id = store.instances[instance].tables[*table];
                    let segment: &[u64] = store.instances[instance]
                        .passive_elements
                        .get(elem)
                        .map(|s| &s[..])
                        .unwrap_or(&[]);
                    let segment: SmallVec<[u64; 8]> = SmallVec::from_slice(segment);
                    let elements = &mut store.tables[table_id].elements;
                    if u64::from(src) + u64::from(count) > segment.len() as u64
                        || u64::from(dst) + u64::from(count) > elements.len() as u64
                    {
                        return Err(Trap::InvalidTableAccess.into());
                    }
                    elements[dst as usize..(dst + count) as usize]
                        .copy_from_slice(&segment[src as usize..(src + count) as usize]);
                }
                Operation::ElemDrop { elem } => {
                    store.instances[instance].passive_elements.remove(elem);
                }
                Operation::TableCopy { dst, src } => {
                    let count = pop(&mut engine.stack) as u32;
                    let src_offset = pop(&mut engine.stack) as u32;
                    let dst_offset = pop(&mut engine.stack) as u32;
                    let dst_id = store.instances[instance].tables[*dst];
                    let src_id = store.instances[instance].tables[*src];
                    let src_len = store.tables[src_id].elements.len() as u64;
                    let dst_len = store.tables[dst_id].elements.len() as u64;
                    if u64::from(src_offset) + u64::from(count) > src_len
                        || u64::from(dst_offset) + u64::from(count) > dst_len
                    {
                        return Err(Trap::InvalidTableAccess.into());
                    }
                    if dst_id == src_id {
                        store.tables[dst_id].elements.copy_within(
                            src_offset as usize..(src_offset + count) as usize,
                            dst_offset as usize,
                        );
                    } else {
                        let copied: Vec<u64> = store.tables[src_id].elements
                            [src_offset as usize..(src_offset + count) as usize]
                            .to_vec();
                        store.tables[dst_id].elements
                            [dst_offset as usize..(dst_offset + count) as usize]
                            .copy_from_slice(&copied);
                    }
                }
                Operation::TableGet { table } => {
                    let index = pop(&mut engine.stack) as u32;
                    let table_id = store.instances[instance].tables[*table];
                    let value = *store.tables[table_id]
                        .elements
                        .get(index as usize)
                        .ok_or(Trap::InvalidTableAccess)?;
                    push(&mut engine.stack, value);
                }
                Operation::TableSet { table } => {
                    let value = pop(&mut engine.stack);
                    let index = pop(&mut engine.stack) as u32;
                    let table_id = store.instances[instance].tables[*table];
                    let slot = store.tables[table_id]
                        .elements
                        .get_mut(index as usize)
                        .ok_or(Trap::InvalidTableAccess)?;
                    *slot = value;
                }
                Operation::TableSize { table } => {
                    let table_id = store.instances[instance].tables[*table];
                    push(
                        &mut engine.stack,
                        store.tables[table_id].elements.len() as u64,
                    );
                }
                Operation::TableGrow { table } => {
                    let delta = pop(&mut engine.stack) as u32;
                    let init = pop(&mut engine.stack);
                    let table_id = store.instances[instance].tables[*table];
                    let result = store.tables[table_id]
                        .grow(delta, init)
                        .unwrap_or(u32::MAX);
                    push(&mut engine.stack, u64::from(result));
                }
                Operation::TableFill { table } => {
                    let count = pop(&mut engine.stack) as u32;
                    let value = pop(&mut engine.stack);
                    let start = pop(&mut engine.stack) as u32;
                    let table_id = store.instances[instance].tables[*table];
                    let elements = &mut store.tables[table_id].elements;
                    if u64::from(start) + u64::from(count) > elements.len() as u64 {
                        return Err(Trap::InvalidTableAccess.into());
                    }
                    elements[start as usize..(start + count) as usize].fill(value);
                }
                Operation::RefFunc { function } => {
                    let id = store.instances[instance].functions[*function];
                    push(&mut engine.stack, funcref_to_raw(id));
                }

                // ------------------------- SIMD --------------------------
                Operation::V128Const { lo, hi } => {
                    push_v128(&mut engine.stack, (*lo, *hi));
                }
                Operation::V128Load { kind, offset } => {
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &store.memories[memory.expect("module has a memory")].data;
                    let value = v128_load(data, addr, *offset, *kind)?;
                    push_v128(&mut engine.stack, value);
                }
                Operation::V128LoadLane {
                    lane_width,
                    lane,
                    offset,
                } => {
                    let v = pop_v128(&mut engine.stack);
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &store.memories[memory.expect("module has a memory")].data;
                    let value = match lane_width {
                        8 => {
                            let [b] = load_bytes(data, addr, *offset)?;
                            simd::replace_lane(crate::compile::ir::Shape::I8x16, *lane, v, b.into())
                        }
                        16 => {
                            let raw = u16::from_le_bytes(load_bytes(data, addr, *offset)?);
                            simd::replace_lane(crate::compile::ir::Shape::I16x8, *lane, v, raw.into())
                        }
                        32 => {
                            let raw = u32::from_le_bytes(load_bytes(data, addr, *offset)?);
                            simd::replace_lane(crate::compile::ir::Shape::I32x4, *lane, v, raw.into())
                        }
                        _ => {
                            let raw = u64::from_le_bytes(load_bytes(data, addr, *offset)?);
                            simd::replace_lane(crate::compile::ir::Shape::I64x2, *lane, v, raw)
                        }
                    };
                    push_v128(&mut engine.stack, value);
                }
                Operation::V128Store { offset } => {
                    let v = pop_v128(&mut engine.stack);
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &mut store.memories[memory.expect("module has a memory")].data;
                    store_bytes(data, addr, *offset, &simd::to_bytes(v))?;
                }
                Operation::V128StoreLane {
                    lane_width,
                    lane,
                    offset,
                } => {
                    let v = pop_v128(&mut engine.stack);
                    let addr = pop(&mut engine.stack) as u32;
                    let data = &mut store.memories[memory.expect("module has a memory")].data;
                    let bytes = simd::to_bytes(v);
                    let width = (*lane_width / 8) as usize;
                    let start = *lane as usize * width;
                    store_bytes(data, addr, *offset, &bytes[start..start + width])?;
                }
                Operation::V128ExtractLane {
                    shape,
                    lane,
                    signed,
                } => {
                    let v = pop_v128(&mut engine.stack);
                    push(
                        &mut engine.stack,
                        simd::extract_lane(*shape, *lane, *signed, v),
                    );
                }
                Operation::V128ReplaceLane { shape, lane } => {
                    let scalar = pop(&mut engine.stack);
                    let v = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::replace_lane(*shape, *lane, v, scalar));
                }
                Operation::V128Splat { shape } => {
                    let scalar = pop(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::splat(*shape, scalar));
                }
                Operation::V128Shuffle { lanes } => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::shuffle(lanes, a, b));
                }
                Operation::V128Swizzle => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::swizzle(a, b));
                }
                Operation::V128AnyTrue => {
                    let v = pop_v128(&mut engine.stack);
                    push(&mut engine.stack, u64::from(simd::any_true(v)));
                }
                Operation::V128AllTrue { shape } => {
                    let v = pop_v128(&mut engine.stack);
                    push(&mut engine.stack, u64::from(simd::all_true(*shape, v)));
                }
                Operation::V128BitMask { shape } => {
                    let v = pop_v128(&mut engine.stack);
                    push(&mut engine.stack, u64::from(simd::bitmask(*shape, v)));
                }
                Operation::V128And => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::and(a, b));
                }
                Operation::V128Or => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::or(a, b));
                }
                Operation::V128Xor => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::xor(a, b));
                }
                Operation::V128Not => {
                    let v = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::not(v));
                }
                Operation::V128Bitselect => {
                    let c = pop_v128(&mut engine.stack);
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::bitselect(a, b, c));
                }
                Operation::V128AndNot => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::andnot(a, b));
                }
                Operation::V128Shl { shape } => {
                    let amount = pop(&mut engine.stack) as u32;
                    let v = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::shl(*shape, v, amount));
                }
                Operation::V128Shr { shape, signed } => {
                    let amount = pop(&mut engine.stack) as u32;
                    let v = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::shr(*shape, *signed, v, amount));
                }
                Operation::V128Add { shape } => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::add(*shape, a, b));
                }
                Operation::V128AddSat { shape, signed } => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::add_sat(*shape, *signed, a, b));
                }
                Operation::V128Sub { shape } => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::sub(*shape, a, b));
                }
                Operation::V128SubSat { shape, signed } => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::sub_sat(*shape, *signed, a, b));
                }
                Operation::V128Mul { shape } => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::mul(*shape, a, b));
                }
                Operation::V128Neg { shape } => {
                    let v = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::neg(*shape, v));
                }
                Operation::V128Abs { shape } => {
                    let v = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::abs(*shape, v));
                }
                Operation::V128Sqrt { shape } => {
                    let v = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::sqrt(*shape, v));
                }
                Operation::V128Cmp { kind } => {
                    let b = pop_v128(&mut engine.stack);
                    let a = pop_v128(&mut engine.stack);
                    push_v128(&mut engine.stack, simd::cmp(*kind, a, b));
                }
            }

            pc += 1;
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Lt,
    Eq,
    Gt,
    /// Unordered (a NaN operand); every ordered comparison is false.
    Un,
}

/// Three-way comparison over slot values at the tagged width.
fn scmp(ty: SignedType, a: u64, b: u64) -> Cmp {
    fn of_ord(o: core::cmp::Ordering) -> Cmp {
        match o {
            core::cmp::Ordering::Less => Cmp::Lt,
            core::cmp::Ordering::Equal => Cmp::Eq,
            core::cmp::Ordering::Greater => Cmp::Gt,
        }
    }
    fn of_float(o: Option<core::cmp::Ordering>) -> Cmp {
        o.map(of_ord).unwrap_or(Cmp::Un)
    }

    match ty {
        SignedType::I32 => of_ord((a as u32 as i32).cmp(&(b as u32 as i32))),
        SignedType::U32 => of_ord((a as u32).cmp(&(b as u32))),
        SignedType::I64 => of_ord((a as i64).cmp(&(b as i64))),
        SignedType::U64 => of_ord(a.cmp(&b)),
        SignedType::F32 => of_float(
            f32::from_bits(a as u32).partial_cmp(&f32::from_bits(b as u32)),
        ),
        SignedType::F64 => of_float(f64::from_bits(a).partial_cmp(&f64::from_bits(b))),
    }
}

fn div(ty: SignedType, a: u64, b: u64) -> Result<u64, Trap> {
    match ty {
        SignedType::I32 => {
            let (a, b) = (a as u32 as i32, b as u32 as i32);
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            if a == i32::MIN && b == -1 {
                return Err(Trap::IntegerOverflow);
            }
            Ok(u64::from((a / b) as u32))
        }
        SignedType::U32 => {
            let (a, b) = (a as u32, b as u32);
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            Ok(u64::from(a / b))
        }
        SignedType::I64 => {
            let (a, b) = (a as i64, b as i64);
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            if a == i64::MIN && b == -1 {
                return Err(Trap::IntegerOverflow);
            }
            Ok((a / b) as u64)
        }
        SignedType::U64 => {
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            Ok(a / b)
        }
        SignedType::F32 => Ok(fbin32(a, b, |x, y| x / y)),
        SignedType::F64 => Ok(fbin64(a, b, |x, y| x / y)),
    }
}

fn rem(ty: SignedInt, a: u64, b: u64) -> Result<u64, Trap> {
    match ty {
        SignedInt::I32 => {
            let (a, b) = (a as u32 as i32, b as u32 as i32);
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            // i32::MIN % -1 is 0, not an overflow.
            Ok(u64::from(a.wrapping_rem(b) as u32))
        }
        SignedInt::U32 => {
            let (a, b) = (a as u32, b as u32);
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            Ok(u64::from(a % b))
        }
        SignedInt::I64 => {
            let (a, b) = (a as i64, b as i64);
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            Ok(a.wrapping_rem(b) as u64)
        }
        SignedInt::U64 => {
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            Ok(a % b)
        }
    }
}

fn v128_load(data: &[u8], addr: u32, offset: u64, kind: V128LoadKind) -> Result<simd::V128, Trap> {
    use crate::compile::ir::Shape;

    Ok(match kind {
        V128LoadKind::V128 => simd::from_bytes(load_bytes(data, addr, offset)?),
        V128LoadKind::S8x8 | V128LoadKind::U8x8 => {
            let bytes: [u8; 8] = load_bytes(data, addr, offset)?;
            let mut out = [0u8; 16];
            for (i, b) in bytes.iter().enumerate() {
                let wide: u16 = if matches!(kind, V128LoadKind::S8x8) {
                    *b as i8 as i16 as u16
                } else {
                    u16::from(*b)
                };
                out[i * 2..i * 2 + 2].copy_from_slice(&wide.to_le_bytes());
            }
            simd::from_bytes(out)
        }
        V128LoadKind::S16x4 | V128LoadKind::U16x4 => {
            let bytes: [u8; 8] = load_bytes(data, addr, offset)?;
            let mut out = [0u8; 16];
            for i in 0..4 {
                let raw = u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
                let wide: u32 = if matches!(kind, V128LoadKind::S16x4) {
                    raw as i16 as i32 as u32
                } else {
                    u32::from(raw)
                };
                out[i * 4..i * 4 + 4].copy_from_slice(&wide.to_le_bytes());
            }
            simd::from_bytes(out)
        }
        V128LoadKind::S32x2 | V128LoadKind::U32x2 => {
            let bytes: [u8; 8] = load_bytes(data, addr, offset)?;
            let mut out = [0u8; 16];
            for i in 0..2 {
                let raw = u32::from_le_bytes([
                    bytes[i * 4],
                    bytes[i * 4 + 1],
                    bytes[i * 4 + 2],
                    bytes[i * 4 + 3],
                ]);
                let wide: u64 = if matches!(kind, V128LoadKind::S32x2) {
                    raw as i32 as i64 as u64
                } else {
                    u64::from(raw)
                };
                out[i * 8..i * 8 + 8].copy_from_slice(&wide.to_le_bytes());
            }
            simd::from_bytes(out)
        }
        V128LoadKind::Splat8 => {
            let [b] = load_bytes(data, addr, offset)?;
            simd::splat(Shape::I8x16, u64::from(b))
        }
        V128LoadKind::Splat16 => {
            let raw = u16::from_le_bytes(load_bytes(data, addr, offset)?);
            simd::splat(Shape::I16x8, u64::from(raw))
        }
        V128LoadKind::Splat32 => {
            let raw = u32::from_le_bytes(load_bytes(data, addr, offset)?);
            simd::splat(Shape::I32x4, u64::from(raw))
        }
        V128LoadKind::Splat64 => {
            let raw = u64::from_le_bytes(load_bytes(data, addr, offset)?);
            simd::splat(Shape::I64x2, raw)
        }
        V128LoadKind::Zero32 => {
            let raw = u32::from_le_bytes(load_bytes(data, addr, offset)?);
            (u64::from(raw), 0)
        }
        V128LoadKind::Zero64 => {
            let raw = u64::from_le_bytes(load_bytes(data, addr, offset)?);
            (raw, 0)
        }
    })
}
