use anyhow::Result;
use silt::{Engine, Instance, Linker, Module, Store, Trap, Val};

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

#[test_log::test]
fn store_load_roundtrip() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory 1)
            (func (export "rt32") (param i32 i32) (result i32)
                local.get 0 local.get 1 i32.store
                local.get 0 i32.load)
            (func (export "rt64") (param i32 i64) (result i64)
                local.get 0 local.get 1 i64.store
                local.get 0 i64.load)
            (func (export "rtf64") (param i32 f64) (result f64)
                local.get 0 local.get 1 f64.store
                local.get 0 f64.load))"#,
    )?;
    assert_eq!(
        call1(&mut store, instance, "rt32", &[Val::I32(16), Val::I32(-7)])?,
        Val::I32(-7)
    );
    assert_eq!(
        call1(
            &mut store,
            instance,
            "rt64",
            &[Val::I32(40), Val::I64(i64::MIN + 3)]
        )?,
        Val::I64(i64::MIN + 3)
    );
    assert_eq!(
        call1(
            &mut store,
            instance,
            "rtf64",
            &[Val::I32(64), Val::F64(6.25f64.to_bits())]
        )?,
        Val::F64(6.25f64.to_bits())
    );
    Ok(())
}

#[test_log::test]
fn multi_byte_accesses_are_little_endian() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory (export "mem") 1)
            (func (export "put") (param i32 i32)
                local.get 0 local.get 1 i32.store)
            (func (export "byte") (param i32) (result i32)
                local.get 0 i32.load8_u))"#,
    )?;
    let put = instance.get_func(&store, "put").expect("export");
    put.call(&mut store, &[Val::I32(0), Val::I32(0x0102_0304)], &mut [])?;
    for (addr, expect) in [(0, 4), (1, 3), (2, 2), (3, 1)] {
        assert_eq!(
            call1(&mut store, instance, "byte", &[Val::I32(addr)])?,
            Val::I32(expect)
        );
    }
    let memory = instance.get_memory(&store, "mem").expect("export");
    assert_eq!(&memory.data(&store)[..4], &[4, 3, 2, 1]);
    Ok(())
}

#[test_log::test]
fn subwidth_loads_extend_correctly() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory 1)
            (func $put8 (param i32 i32) local.get 0 local.get 1 i32.store8)
            (func (export "s8") (param i32) (result i32)
                (call $put8 (i32.const 0) (local.get 0))
                i32.const 0 i32.load8_s)
            (func (export "u8") (param i32) (result i32)
                (call $put8 (i32.const 0) (local.get 0))
                i32.const 0 i32.load8_u)
            (func (export "s16_64") (param i32) (result i64)
                (call $put8 (i32.const 0) (local.get 0))
                (call $put8 (i32.const 1) (i32.const 0xff))
                i32.const 0 i64.load16_s)
            (func (export "u32_64") (result i64)
                i32.const 0 i32.const -1 i32.store
                i32.const 0 i64.load32_u))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "s8", &[Val::I32(0x80)])?, Val::I32(-128));
    assert_eq!(call1(&mut store, instance, "u8", &[Val::I32(0x80)])?, Val::I32(128));
    assert_eq!(
        call1(&mut store, instance, "s16_64", &[Val::I32(0xcd)])?,
        Val::I64(0xffcd_u16 as i16 as i64)
    );
    assert_eq!(
        call1(&mut store, instance, "u32_64", &[])?,
        Val::I64(0xffff_ffff)
    );
    Ok(())
}

#[test_log::test]
fn bounds_checks_trap() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory 1)
            (func (export "load") (param i32) (result i32)
                local.get 0 i32.load)
            (func (export "load_far") (param i32) (result i32)
                local.get 0 i32.load offset=0xffffffff)
            (func (export "store8") (param i32)
                local.get 0 i32.const 1 i32.store8))"#,
    )?;

    // Last in-bounds word of a one-page memory.
    assert_eq!(
        call1(&mut store, instance, "load", &[Val::I32(65532)])?,
        Val::I32(0)
    );
    let err = call1(&mut store, instance, "load", &[Val::I32(65533)]).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));
    let err = call1(&mut store, instance, "load", &[Val::I32(-1)]).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));

    // Effective address beyond the 32-bit index space traps even before
    // the size comparison.
    let err = call1(&mut store, instance, "load_far", &[Val::I32(2)]).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));

    let store8 = instance.get_func(&store, "store8").expect("export");
    store8.call(&mut store, &[Val::I32(65535)], &mut [])?;
    let err = store8.call(&mut store, &[Val::I32(65536)], &mut []).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));
    Ok(())
}

#[test_log::test]
fn memory_size_and_grow() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory (export "mem") 1 3)
            (func (export "size") (result i32) memory.size)
            (func (export "grow") (param i32) (result i32)
                local.get 0 memory.grow))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "size", &[])?, Val::I32(1));
    assert_eq!(call1(&mut store, instance, "grow", &[Val::I32(2)])?, Val::I32(1));
    assert_eq!(call1(&mut store, instance, "size", &[])?, Val::I32(3));
    // Past the declared maximum: failure is -1, size unchanged.
    assert_eq!(call1(&mut store, instance, "grow", &[Val::I32(1)])?, Val::I32(-1));
    assert_eq!(call1(&mut store, instance, "size", &[])?, Val::I32(3));

    // Grown region is zeroed and accessible.
    let memory = instance.get_memory(&store, "mem").expect("export");
    assert_eq!(memory.size(&store), 3);
    assert_eq!(memory.data(&store)[3 * 65536 - 1], 0);
    Ok(())
}

#[test_log::test]
fn bulk_memory_fill_and_copy() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory (export "mem") 1)
            (func (export "fill") (param i32 i32 i32)
                local.get 0 local.get 1 local.get 2 memory.fill)
            (func (export "copy") (param i32 i32 i32)
                local.get 0 local.get 1 local.get 2 memory.copy))"#,
    )?;
    let fill = instance.get_func(&store, "fill").expect("export");
    let copy = instance.get_func(&store, "copy").expect("export");

    fill.call(
        &mut store,
        &[Val::I32(8), Val::I32(0xab), Val::I32(4)],
        &mut [],
    )?;
    let memory = instance.get_memory(&store, "mem").expect("export");
    assert_eq!(&memory.data(&store)[7..13], &[0, 0xab, 0xab, 0xab, 0xab, 0]);

    // Overlapping copy behaves like memmove.
    copy.call(
        &mut store,
        &[Val::I32(10), Val::I32(8), Val::I32(4)],
        &mut [],
    )?;
    assert_eq!(&memory.data(&store)[10..14], &[0xab, 0xab, 0xab, 0xab]);

    // Zero length at the boundary is checked but has no effect.
    fill.call(
        &mut store,
        &[Val::I32(65536), Val::I32(1), Val::I32(0)],
        &mut [],
    )?;
    let err = fill
        .call(
            &mut store,
            &[Val::I32(65537), Val::I32(1), Val::I32(0)],
            &mut [],
        )
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));

    let err = copy
        .call(
            &mut store,
            &[Val::I32(65533), Val::I32(0), Val::I32(4)],
            &mut [],
        )
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));
    Ok(())
}

#[test_log::test]
fn memory_init_and_data_drop() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (memory (export "mem") 1)
            (data $seg "hello!")
            (func (export "init") (param i32 i32 i32)
                local.get 0 local.get 1 local.get 2
                memory.init $seg)
            (func (export "drop_seg") data.drop $seg))"#,
    )?;
    let init = instance.get_func(&store, "init").expect("export");
    init.call(
        &mut store,
        &[Val::I32(100), Val::I32(1), Val::I32(4)],
        &mut [],
    )?;
    let memory = instance.get_memory(&store, "mem").expect("export");
    assert_eq!(&memory.data(&store)[100..104], b"ello");

    // Source range past the segment traps.
    let err = init
        .call(&mut store, &[Val::I32(0), Val::I32(4), Val::I32(3)], &mut [])
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));

    // Dropping empties the segment permanently.
    let drop_seg = instance.get_func(&store, "drop_seg").expect("export");
    drop_seg.call(&mut store, &[], &mut [])?;
    init.call(&mut store, &[Val::I32(0), Val::I32(0), Val::I32(0)], &mut [])?;
    let err = init
        .call(&mut store, &[Val::I32(0), Val::I32(0), Val::I32(1)], &mut [])
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));
    Ok(())
}

#[test_log::test]
fn active_data_segments_apply_at_instantiation() -> Result<()> {
    let (store, instance) = instantiate(
        r#"(module
            (memory (export "mem") 1)
            (data (i32.const 10) "wasm"))"#,
    )?;
    let memory = instance.get_memory(&store, "mem").expect("export");
    assert_eq!(&memory.data(&store)[10..14], b"wasm");
    Ok(())
}

#[test_log::test]
fn active_data_segment_out_of_bounds_fails_instantiation() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let module = Module::from_wat(
        &engine,
        r#"(module (memory 1) (data (i32.const 65535) "toolong"))"#,
    )?;
    let err = Linker::new().instantiate(&mut store, &module).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::OutOfBoundsMemoryAccess));
    Ok(())
}
