use anyhow::Result;
use silt::{Engine, Instance, Linker, Module, Store, Val};

fn instantiate(wat: &str) -> Result<(Store, Instance)> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let module = Module::from_wat(&engine, wat)?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    Ok((store, instance))
}

fn call1(store: &mut Store, instance: Instance, name: &str, args: &[Val]) -> silt::Result<Val> {
    let func = instance
        .get_func(store, name)
        .unwrap_or_else(|| panic!("export `{name}`"));
    let mut results = [Val::I32(0)];
    func.call(store, args, &mut results)?;
    Ok(results[0])
}

fn v128_from_i32x4(lanes: [u32; 4]) -> u128 {
    let mut out = 0u128;
    for (i, lane) in lanes.iter().enumerate() {
        out |= u128::from(*lane) << (i * 32);
    }
    out
}

#[test_log::test]
fn i32x4_add_lanes() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module (func (export "add") (param v128 v128) (result v128)
            local.get 0 local.get 1 i32x4.add))"#,
    )?;
    let a = v128_from_i32x4([1, 2, 3, 4]);
    let b = v128_from_i32x4([10, 20, 30, 40]);
    let out = call1(&mut store, instance, "add", &[Val::V128(a), Val::V128(b)])?;
    assert_eq!(out, Val::V128(v128_from_i32x4([11, 22, 33, 44])));

    // Lanes wrap modulo 2^32.
    let a = v128_from_i32x4([u32::MAX, 0, u32::MAX, 1]);
    let b = v128_from_i32x4([2, 0, 1, 1]);
    let out = call1(&mut store, instance, "add", &[Val::V128(a), Val::V128(b)])?;
    assert_eq!(out, Val::V128(v128_from_i32x4([1, 0, 0, 2])));
    Ok(())
}

#[test_log::test]
fn v128_const_and_extract() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "third") (result i32)
                v128.const i32x4 101 102 103 104
                i32x4.extract_lane 2)
            (func (export "low64") (result i64)
                v128.const i64x2 0x1122334455667788 -1
                i64x2.extract_lane 0)
            (func (export "s8") (result i32)
                v128.const i8x16 0x80 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                i8x16.extract_lane_s 0)
            (func (export "u8") (result i32)
                v128.const i8x16 0x80 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                i8x16.extract_lane_u 0))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "third", &[])?, Val::I32(103));
    assert_eq!(
        call1(&mut store, instance, "low64", &[])?,
        Val::I64(0x1122_3344_5566_7788)
    );
    assert_eq!(call1(&mut store, instance, "s8", &[])?, Val::I32(-128));
    assert_eq!(call1(&mut store, instance, "u8", &[])?, Val::I32(128));
    Ok(())
}

#[test_log::test]
fn splat_and_replace() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "splat_sum") (param i32) (result i32)
                local.get 0
                i32x4.splat
                i32x4.extract_lane 0
                local.get 0
                i32x4.splat
                i32x4.extract_lane 3
                i32.add)
            (func (export "replaced") (param i64) (result i64)
                v128.const i64x2 1 2
                local.get 0
                i64x2.replace_lane 1
                i64x2.extract_lane 1))"#,
    )?;
    assert_eq!(
        call1(&mut store, instance, "splat_sum", &[Val::I32(21)])?,
        Val::I32(42)
    );
    assert_eq!(
        call1(&mut store, instance, "replaced", &[Val::I64(-5)])?,
        Val::I64(-5)
    );
    Ok(())
}

#[test_log::test]
fn saturating_arithmetic() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "sat_s") (result i32)
                v128.const i8x16 127 127 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                v128.const i8x16 1 100 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                i8x16.add_sat_s
                i8x16.extract_lane_s 0)
            (func (export "sub_sat_u") (result i32)
                v128.const i8x16 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                v128.const i8x16 5 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
                i8x16.sub_sat_u
                i8x16.extract_lane_u 0))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "sat_s", &[])?, Val::I32(127));
    assert_eq!(call1(&mut store, instance, "sub_sat_u", &[])?, Val::I32(0));
    Ok(())
}

#[test_log::test]
fn shifts_mask_amount_per_lane_width() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "shl8") (param i32) (result i32)
                v128.const i8x16 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1
                local.get 0
                i8x16.shl
                i8x16.extract_lane_u 0)
            (func (export "shr_s") (result i32)
                v128.const i32x4 -8 0 0 0
                i32.const 2
                i32x4.shr_s
                i32x4.extract_lane 0))"#,
    )?;
    // Shift by 9 on 8-bit lanes is a shift by 1.
    assert_eq!(call1(&mut store, instance, "shl8", &[Val::I32(9)])?, Val::I32(2));
    assert_eq!(call1(&mut store, instance, "shr_s", &[])?, Val::I32(-2));
    Ok(())
}

#[test_log::test]
fn comparisons_produce_lane_masks() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "lt_mask") (result i32)
                v128.const i32x4 1 5 3 0
                v128.const i32x4 2 4 3 -1
                i32x4.lt_s
                i32x4.bitmask)
            (func (export "first_lane") (result i32)
                v128.const i32x4 1 0 0 0
                v128.const i32x4 2 0 0 0
                i32x4.lt_s
                i32x4.extract_lane 0)
            (func (export "f64_ge") (result i32)
                v128.const f64x2 1.5 2.5
                v128.const f64x2 1.5 9.0
                f64x2.ge
                i64x2.bitmask))"#,
    )?;
    // lanes: 1<2 true, 5<4 false, 3<3 false, 0<-1 false -> bit 0 only.
    assert_eq!(call1(&mut store, instance, "lt_mask", &[])?, Val::I32(0b0001));
    assert_eq!(call1(&mut store, instance, "first_lane", &[])?, Val::I32(-1));
    // 1.5 >= 1.5 true, 2.5 >= 9.0 false -> bit 0.
    assert_eq!(call1(&mut store, instance, "f64_ge", &[])?, Val::I32(0b01));
    Ok(())
}

#[test_log::test]
fn any_true_all_true() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "any") (param v128) (result i32)
                local.get 0 v128.any_true)
            (func (export "all8") (param v128) (result i32)
                local.get 0 i8x16.all_true))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "any", &[Val::V128(0)])?, Val::I32(0));
    assert_eq!(call1(&mut store, instance, "any", &[Val::V128(1 << 100)])?, Val::I32(1));
    let ones = u128::from_le_bytes([1; 16]);
    assert_eq!(call1(&mut store, instance, "all8", &[Val::V128(ones)])?, Val::I32(1));
    assert_eq!(
        call1(&mut store, instance, "all8", &[Val::V128(ones & !0xff)])?,
        Val::I32(0)
    );
    Ok(())
}

#[test_log::test]
fn bitwise_and_bitselect() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "bitselect") (param v128 v128 v128) (result v128)
                local.get 0 local.get 1 local.get 2 v128.bitselect)
            (func (export "andnot") (param v128 v128) (result v128)
                local.get 0 local.get 1 v128.andnot)
            (func (export "not") (param v128) (result v128)
                local.get 0 v128.not))"#,
    )?;
    let a = 0xffff_0000_ffff_0000_u128;
    let b = 0x1234_5678_1234_5678_u128;
    let mask = 0xff00_ff00_ff00_ff00_u128;
    let out = call1(
        &mut store,
        instance,
        "bitselect",
        &[Val::V128(a), Val::V128(b), Val::V128(mask)],
    )?;
    assert_eq!(out, Val::V128((a & mask) | (b & !mask)));

    let out = call1(&mut store, instance, "andnot", &[Val::V128(a), Val::V128(mask)])?;
    assert_eq!(out, Val::V128(a & !mask));

    let out = call1(&mut store, instance, "not", &[Val::V128(0)])?;
    assert_eq!(out, Val::V128(u128::MAX));
    Ok(())
}

#[test_log::test]
fn swizzle_selects_table_bytes() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module (func (export "swizzle") (result v128)
            v128.const i8x16 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25
            v128.const i8x16 0 15 16 255 1 0 0 0 0 0 0 0 0 0 0 0
            i8x16.swizzle))"#,
    )?;
    let func = instance.get_func(&store, "swizzle").expect("export");
    let mut results = [Val::I32(0)];
    func.call(&mut store, &[], &mut results)?;
    let out = results[0].v128().expect("v128 result");
    let bytes = out.to_le_bytes();
    assert_eq!(bytes[0], 10);
    assert_eq!(bytes[1], 25);
    // Out-of-range indices produce zero lanes.
    assert_eq!(bytes[2], 0);
    assert_eq!(bytes[3], 0);
    assert_eq!(bytes[4], 11);
    Ok(())
}

#[test_log::test]
fn float_lane_arithmetic() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "mul_lane0") (result f32)
                v128.const f32x4 1.5 2.0 3.0 4.0
                v128.const f32x4 2.0 2.0 2.0 2.0
                f32x4.mul
                f32x4.extract_lane 0)
            (func (export "sqrt_lane1") (result f64)
                v128.const f64x2 4.0 9.0
                f64x2.sqrt
                f64x2.extract_lane 1)
            (func (export "neg_abs") (result f64)
                v128.const f64x2 -2.5 0
                f64x2.abs
                f64x2.neg
                f64x2.extract_lane 0))"#,
    )?;
    assert_eq!(
        call1(&mut store, instance, "mul_lane0", &[])?,
        Val::F32(3.0f32.to_bits())
    );
    assert_eq!(
        call1(&mut store, instance, "sqrt_lane1", &[])?,
        Val::F64(3.0f64.to_bits())
    );
    assert_eq!(
        call1(&mut store, instance, "neg_abs", &[])?,
        Val::F64((-2.5f64).to_bits())
    );
    Ok(())
}

#[test_log::test]
fn v128_memory_roundtrip_and_load_variants() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory 1)
            (func (export "rt") (param i32 v128) (result v128)
                local.get 0 local.get 1 v128.store
                local.get 0 v128.load)
            (func (export "widen8") (result i32)
                i32.const 0 i32.const 0x80 i32.store8
                i32.const 0 v128.load8x8_s
                i16x8.extract_lane_s 0)
            (func (export "splat_load") (result i32)
                i32.const 8 i32.const 0x7b i32.store8
                i32.const 8 v128.load8_splat
                i8x16.extract_lane_u 15)
            (func (export "zero_load") (result i64)
                i32.const 16 i64.const -1 i64.store
                i32.const 16 v128.load32_zero
                i64x2.extract_lane 1))"#,
    )?;
    let v = 0x0011_2233_4455_6677_8899_aabb_ccdd_eeff_u128;
    let out = call1(&mut store, instance, "rt", &[Val::I32(32), Val::V128(v)])?;
    assert_eq!(out, Val::V128(v));
    assert_eq!(call1(&mut store, instance, "widen8", &[])?, Val::I32(-128));
    assert_eq!(call1(&mut store, instance, "splat_load", &[])?, Val::I32(0x7b));
    assert_eq!(call1(&mut store, instance, "zero_load", &[])?, Val::I64(0));
    Ok(())
}

#[test_log::test]
fn v128_locals_select_and_globals() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (global $acc (mut v128) (v128.const i32x4 0 0 0 0))
            (func (export "pick") (param i32) (result i32)
                (local v128)
                v128.const i32x4 1 1 1 1
                v128.const i32x4 2 2 2 2
                local.get 0
                select
                local.set 1
                local.get 1
                i32x4.extract_lane 0)
            (func (export "bump") (result i32)
                global.get $acc
                v128.const i32x4 1 2 3 4
                i32x4.add
                global.set $acc
                global.get $acc
                i32x4.extract_lane 3))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "pick", &[Val::I32(1)])?, Val::I32(1));
    assert_eq!(call1(&mut store, instance, "pick", &[Val::I32(0)])?, Val::I32(2));
    assert_eq!(call1(&mut store, instance, "bump", &[])?, Val::I32(4));
    assert_eq!(call1(&mut store, instance, "bump", &[])?, Val::I32(8));
    Ok(())
}

#[test_log::test]
fn shuffle_concatenation_rules() -> Result<()> {
    // Identity indices pick the second operand; 16..31 pick the first.
    let (mut store, instance) = instantiate(
        r#"(module
            (func (export "low") (result i32)
                v128.const i8x16 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1
                v128.const i8x16 2 2 2 2 2 2 2 2 2 2 2 2 2 2 2 2
                i8x16.shuffle 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
                i8x16.extract_lane_u 0)
            (func (export "high") (result i32)
                v128.const i8x16 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1
                v128.const i8x16 2 2 2 2 2 2 2 2 2 2 2 2 2 2 2 2
                i8x16.shuffle 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
                i8x16.extract_lane_u 0))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "low", &[])?, Val::I32(2));
    assert_eq!(call1(&mut store, instance, "high", &[])?, Val::I32(1));
    Ok(())
}
