use anyhow::Result;
use silt::{Config, Engine, Instance, Linker, Module, Store, Trap, Val};

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
fn direct_call_chain() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func $inc (param i32) (result i32)
                local.get 0 i32.const 1 i32.add)
            (func $twice (param i32) (result i32)
                local.get 0 call $inc call $inc)
            (func (export "f") (param i32) (result i32)
                local.get 0 call $twice call $twice))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "f", &[Val::I32(10)])?, Val::I32(14));
    Ok(())
}

#[test_log::test]
fn multi_value_returns() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func $divmod (param i32 i32) (result i32 i32)
                local.get 0 local.get 1 i32.div_u
                local.get 0 local.get 1 i32.rem_u)
            (func (export "sum_divmod") (param i32 i32) (result i32)
                local.get 0 local.get 1 call $divmod i32.add))"#,
    )?;
    // 17 / 5 = 3 rem 2
    assert_eq!(
        call1(&mut store, instance, "sum_divmod", &[Val::I32(17), Val::I32(5)])?,
        Val::I32(5)
    );
    Ok(())
}

#[test_log::test]
fn multi_value_through_public_api() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module (func (export "pair") (param i64) (result i64 i64)
            local.get 0
            local.get 0 i64.const 1 i64.add))"#,
    )?;
    let func = instance.get_func(&store, "pair").expect("export");
    let mut results = [Val::I32(0), Val::I32(0)];
    func.call(&mut store, &[Val::I64(41)], &mut results)?;
    assert_eq!(results, [Val::I64(41), Val::I64(42)]);
    Ok(())
}

#[test_log::test]
fn fibonacci_recursion() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module (func $fib (export "fib") (param i32) (result i32)
            (if (result i32) (i32.lt_u (local.get 0) (i32.const 2))
                (then (local.get 0))
                (else
                    (i32.add
                        (call $fib (i32.sub (local.get 0) (i32.const 1)))
                        (call $fib (i32.sub (local.get 0) (i32.const 2))))))))"#,
    )?;
    assert_eq!(call1(&mut store, instance, "fib", &[Val::I32(15)])?, Val::I32(610));
    Ok(())
}

#[test_log::test]
fn call_stack_ceiling_traps() -> Result<()> {
    let engine = Engine::new(Config::new().call_stack_ceiling(50));
    let mut store = Store::new(&engine);
    let module = Module::from_wat(
        &engine,
        r#"(module
            (global $depth (export "depth") (mut i32) (i32.const 0))
            (func $spin (export "spin")
                global.get $depth
                i32.const 1
                i32.add
                global.set $depth
                call $spin))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;

    let err = call1(&mut store, instance, "spin", &[])
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::CallStackOverflow));

    // Exactly `ceiling` frames ran before the trap; the partial side
    // effects are not rolled back.
    let depth = instance.get_global(&store, "depth").expect("global");
    assert_eq!(depth.get(&store), Val::I32(50));
    Ok(())
}

#[test_log::test]
fn deep_but_legal_recursion_completes() -> Result<()> {
    let engine = Engine::new(Config::new().call_stack_ceiling(200));
    let mut store = Store::new(&engine);
    let module = Module::from_wat(
        &engine,
        r#"(module (func $down (export "down") (param i32) (result i32)
            (if (result i32) (local.get 0)
                (then
                    (call $down (i32.sub (local.get 0) (i32.const 1)))
                    (i32.add (i32.const 1)))
                (else (i32.const 0)))))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    assert_eq!(
        call1(&mut store, instance, "down", &[Val::I32(150)])?,
        Val::I32(150)
    );
    Ok(())
}

#[test_log::test]
fn trap_backtrace_names_frames() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module
            (func $inner (export "inner") (param i64) (result i64)
                unreachable)
            (func $outer (export "outer") (result i64)
                i64.const 3
                call $inner))"#,
    )?;
    let err = call1(&mut store, instance, "outer", &[])
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.trap(), Some(Trap::Unreachable));

    let backtrace = err.backtrace().expect("trap carries a backtrace");
    let frames = backtrace.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].func_name(), Some("inner"));
    assert_eq!(frames[1].func_name(), Some("outer"));
    assert_eq!(frames[0].params(), [silt::WasmValType::I64]);
    assert_eq!(frames[0].results(), [silt::WasmValType::I64]);

    let rendered = format!("{err}");
    assert!(rendered.contains("inner"), "{rendered}");
    assert!(rendered.contains("outer"), "{rendered}");
    Ok(())
}

#[test_log::test]
fn arity_mismatch_is_rejected_before_running() -> Result<()> {
    let (mut store, instance) = instantiate(
        r#"(module (func (export "f") (param i32) (result i32) local.get 0))"#,
    )?;
    let func = instance.get_func(&store, "f").expect("export");
    let mut results = [Val::I32(0)];
    let err = func.call(&mut store, &[], &mut results).unwrap_err();
    assert!(matches!(err, silt::Error::TypeMismatch(_)));
    let err = func
        .call(&mut store, &[Val::I64(1)], &mut results)
        .unwrap_err();
    assert!(matches!(err, silt::Error::TypeMismatch(_)));
    Ok(())
}
