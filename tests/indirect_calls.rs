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

const DISPATCH: &str = r#"(module
    (type $binop (func (param i32 i32) (result i32)))
    (type $nullary (func (result i32)))
    (table 5 funcref)
    (func $add (type $binop) local.get 0 local.get 1 i32.add)
    (func $sub (type $binop) local.get 0 local.get 1 i32.sub)
    (func $forty (type $nullary) i32.const 40)
    (elem (i32.const 0) $add $sub $forty)
    (func (export "dispatch") (param i32 i32 i32) (result i32)
        local.get 1
        local.get 2
        local.get 0
        call_indirect (type $binop)))"#;

#[test_log::test]
fn dispatch_through_table() -> Result<()> {
    let (mut store, instance) = instantiate(DISPATCH)?;
    assert_eq!(
        call1(
            &mut store,
            instance,
            "dispatch",
            &[Val::I32(0), Val::I32(30), Val::I32(12)]
        )?,
        Val::I32(42)
    );
    assert_eq!(
        call1(
            &mut store,
            instance,
            "dispatch",
            &[Val::I32(1), Val::I32(30), Val::I32(12)]
        )?,
        Val::I32(18)
    );
    Ok(())
}

#[test_log::test]
fn type_mismatch_traps() -> Result<()> {
    let (mut store, instance) = instantiate(DISPATCH)?;
    // Slot 2 holds a nullary function; calling it as a binop must trap.
    let err = call1(
        &mut store,
        instance,
        "dispatch",
        &[Val::I32(2), Val::I32(1), Val::I32(2)],
    )
    .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::IndirectCallTypeMismatch));
    Ok(())
}

#[test_log::test]
fn null_entry_traps() -> Result<()> {
    let (mut store, instance) = instantiate(DISPATCH)?;
    let err = call1(
        &mut store,
        instance,
        "dispatch",
        &[Val::I32(4), Val::I32(1), Val::I32(2)],
    )
    .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::InvalidTableAccess));
    Ok(())
}

#[test_log::test]
fn out_of_bounds_index_traps() -> Result<()> {
    let (mut store, instance) = instantiate(DISPATCH)?;
    for index in [5, -1] {
        let err = call1(
            &mut store,
            instance,
            "dispatch",
            &[Val::I32(index), Val::I32(1), Val::I32(2)],
        )
        .unwrap_err();
        assert_eq!(err.trap(), Some(Trap::InvalidTableAccess));
    }
    Ok(())
}

#[test_log::test]
fn table_get_set_and_funcref_params() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (type $nullary (func (result i32)))
            (table (export "tab") 2 funcref)
            (func $seven (export "seven") (type $nullary) i32.const 7)
            (func (export "put") (param i32 funcref)
                local.get 0 local.get 1 table.set)
            (func (export "invoke") (param i32) (result i32)
                local.get 0 call_indirect (type $nullary))
            (func (export "probe") (param i32) (result i32)
                local.get 0 table.get ref.is_null))"#,
    )?;

    // Initially every slot is null.
    assert_eq!(call1(&mut store, instance, "probe", &[Val::I32(0)])?, Val::I32(1));

    let seven = instance.get_func(&store, "seven").expect("export");
    let put = instance.get_func(&store, "put").expect("export");
    put.call(
        &mut store,
        &[Val::I32(0), Val::FuncRef(Some(seven))],
        &mut [],
    )?;

    assert_eq!(call1(&mut store, instance, "probe", &[Val::I32(0)])?, Val::I32(0));
    assert_eq!(call1(&mut store, instance, "invoke", &[Val::I32(0)])?, Val::I32(7));

    // Null funcref can be written back.
    put.call(&mut store, &[Val::I32(0), Val::FuncRef(None)], &mut [])?;
    assert_eq!(call1(&mut store, instance, "probe", &[Val::I32(0)])?, Val::I32(1));

    let err = call1(&mut store, instance, "invoke", &[Val::I32(0)]).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::InvalidTableAccess));
    Ok(())
}

#[test_log::test]
fn table_size_grow_fill() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (table 2 4 funcref)
            (func $f (export "f") (result i32) i32.const 1)
            (elem declare func $f)
            (func (export "size") (result i32) table.size)
            (func (export "grow") (param i32) (result i32)
                ref.func $f
                local.get 0
                table.grow)
            (func (export "fill") (param i32 i32)
                local.get 0
                ref.func $f
                local.get 1
                table.fill)
            (func (export "is_null") (param i32) (result i32)
                local.get 0 table.get ref.is_null))"#,
    )?;

    assert_eq!(call1(&mut store, instance, "size", &[])?, Val::I32(2));
    // Growing by 1 returns the old size.
    assert_eq!(call1(&mut store, instance, "grow", &[Val::I32(1)])?, Val::I32(2));
    assert_eq!(call1(&mut store, instance, "size", &[])?, Val::I32(3));
    // Growing past the declared maximum reports failure as -1.
    assert_eq!(call1(&mut store, instance, "grow", &[Val::I32(5)])?, Val::I32(-1));

    call1(&mut store, instance, "is_null", &[Val::I32(0)])?;
    let fill = instance.get_func(&store, "fill").expect("export");
    fill.call(&mut store, &[Val::I32(0), Val::I32(2)], &mut [])?;
    assert_eq!(call1(&mut store, instance, "is_null", &[Val::I32(0)])?, Val::I32(0));
    assert_eq!(call1(&mut store, instance, "is_null", &[Val::I32(1)])?, Val::I32(0));
    assert_eq!(call1(&mut store, instance, "is_null", &[Val::I32(2)])?, Val::I32(1));

    // Zero-length fill at the boundary is fine, one past traps.
    fill.call(&mut store, &[Val::I32(3), Val::I32(0)], &mut [])?;
    let err = fill
        .call(&mut store, &[Val::I32(4), Val::I32(0)], &mut [])
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::InvalidTableAccess));
    Ok(())
}

#[test_log::test]
fn table_init_and_elem_drop() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (table 4 funcref)
            (func $a (result i32) i32.const 10)
            (func $b (result i32) i32.const 20)
            (elem $seg func $a $b)
            (type $nullary (func (result i32)))
            (func (export "init") (param i32 i32 i32)
                local.get 0 local.get 1 local.get 2
                table.init $seg)
            (func (export "drop_seg") elem.drop $seg)
            (func (export "invoke") (param i32) (result i32)
                local.get 0 call_indirect (type $nullary)))"#,
    )?;

    let init = instance.get_func(&store, "init").expect("export");
    init.call(
        &mut store,
        &[Val::I32(1), Val::I32(0), Val::I32(2)],
        &mut [],
    )?;
    assert_eq!(call1(&mut store, instance, "invoke", &[Val::I32(1)])?, Val::I32(10));
    assert_eq!(call1(&mut store, instance, "invoke", &[Val::I32(2)])?, Val::I32(20));

    // Out-of-bounds source range traps.
    let err = init
        .call(&mut store, &[Val::I32(0), Val::I32(1), Val::I32(2)], &mut [])
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::InvalidTableAccess));

    // After the drop the segment is permanently empty: zero-length init
    // still succeeds, anything else traps.
    let drop_seg = instance.get_func(&store, "drop_seg").expect("export");
    drop_seg.call(&mut store, &[], &mut [])?;
    init.call(&mut store, &[Val::I32(0), Val::I32(0), Val::I32(0)], &mut [])?;
    let err = init
        .call(&mut store, &[Val::I32(0), Val::I32(0), Val::I32(1)], &mut [])
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::InvalidTableAccess));
    Ok(())
}

#[test_log::test]
fn table_copy_between_tables() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (type $nullary (func (result i32)))
            (table $t0 4 funcref)
            (table $t1 4 funcref)
            (func $x (result i32) i32.const 123)
            (elem (table $t0) (i32.const 0) func $x)
            (func (export "copy") (param i32 i32 i32)
                local.get 0 local.get 1 local.get 2
                table.copy $t1 $t0)
            (func (export "invoke1") (param i32) (result i32)
                local.get 0 call_indirect $t1 (type $nullary)))"#,
    )?;

    let copy = instance.get_func(&store, "copy").expect("export");
    copy.call(
        &mut store,
        &[Val::I32(2), Val::I32(0), Val::I32(1)],
        &mut [],
    )?;
    assert_eq!(
        call1(&mut store, instance, "invoke1", &[Val::I32(2)])?,
        Val::I32(123)
    );

    let err = copy
        .call(&mut store, &[Val::I32(3), Val::I32(0), Val::I32(2)], &mut [])
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::InvalidTableAccess));
    Ok(())
}
