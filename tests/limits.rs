use anyhow::Result;
use silt::{CloseHandle, Config, Engine, Error, Linker, Module, Store, Val, WasmFuncType};
use std::sync::{Arc, Mutex};

#[test_log::test]
fn closed_instance_rejects_new_calls() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let module = Module::from_wat(
        &engine,
        r#"(module (func (export "f") (result i32) i32.const 1))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;

    instance.close_with_exit_code(&store, 17);

    let func = instance.get_func(&store, "f").expect("export");
    let mut results = [Val::I32(0)];
    let err = func.call(&mut store, &[], &mut results).unwrap_err();
    assert!(matches!(err, Error::ModuleClosed { exit_code: 17 }));
    Ok(())
}

#[test_log::test]
fn close_handle_works_across_threads() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let module = Module::from_wat(
        &engine,
        r#"(module (func (export "f") (result i32) i32.const 1))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    let handle = instance.close_handle(&store);

    std::thread::spawn(move || handle.close_with_exit_code(3))
        .join()
        .expect("close thread");

    let func = instance.get_func(&store, "f").expect("export");
    let err = func.call(&mut store, &[], &mut [Val::I32(0)]).unwrap_err();
    assert!(matches!(err, Error::ModuleClosed { exit_code: 3 }));
    Ok(())
}

#[test_log::test]
fn first_close_wins() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let module = Module::from_wat(
        &engine,
        r#"(module (func (export "f") (result i32) i32.const 1))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    let handle = instance.close_handle(&store);
    handle.close_with_exit_code(1);
    handle.close_with_exit_code(2);
    assert!(handle.is_closed());

    let func = instance.get_func(&store, "f").expect("export");
    let err = func.call(&mut store, &[], &mut [Val::I32(0)]).unwrap_err();
    assert!(matches!(err, Error::ModuleClosed { exit_code: 1 }));
    Ok(())
}

#[test_log::test]
fn termination_check_interrupts_call_free_loop() -> Result<()> {
    // A host function closes its own instance mid-call; the loop header
    // check planted by `ensure_termination` then unwinds the invocation
    // without any further calls.
    let engine = Engine::new(Config::new().ensure_termination(true));
    let mut store = Store::new(&engine);

    let slot: Arc<Mutex<Option<CloseHandle>>> = Arc::new(Mutex::new(None));
    let closer = slot.clone();
    let mut linker = Linker::new();
    linker.func_new(
        &mut store,
        "env",
        "request_exit",
        WasmFuncType::new([], []),
        move |_caller, _params, _results| {
            closer
                .lock()
                .unwrap()
                .as_ref()
                .expect("handle installed")
                .close_with_exit_code(9);
            Ok(())
        },
    );

    let module = Module::from_wat(
        &engine,
        r#"(module
            (import "env" "request_exit" (func $request_exit))
            (func (export "spin_forever")
                call $request_exit
                (loop br 0)))"#,
    )?;
    let instance = linker.instantiate(&mut store, &module)?;
    *slot.lock().unwrap() = Some(instance.close_handle(&store));

    let func = instance.get_func(&store, "spin_forever").expect("export");
    let err = func.call(&mut store, &[], &mut []).unwrap_err();
    assert!(matches!(err, Error::ModuleClosed { exit_code: 9 }));
    Ok(())
}

#[test_log::test]
fn loops_run_normally_with_termination_checks() -> Result<()> {
    let engine = Engine::new(Config::new().ensure_termination(true));
    let mut store = Store::new(&engine);
    let module = Module::from_wat(
        &engine,
        r#"(module (func (export "sum") (param i32) (result i32)
            (local i32)
            (block
                (loop
                    local.get 0
                    i32.eqz
                    br_if 1
                    local.get 1
                    local.get 0
                    i32.add
                    local.set 1
                    local.get 0
                    i32.const 1
                    i32.sub
                    local.set 0
                    br 0))
            local.get 1))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    let func = instance.get_func(&store, "sum").expect("export");
    let mut results = [Val::I32(0)];
    func.call(&mut store, &[Val::I32(100)], &mut results)?;
    assert_eq!(results[0], Val::I32(5050));
    Ok(())
}

#[test_log::test]
fn value_stack_grows_on_demand() -> Result<()> {
    // A deliberately deep expression: hundreds of live operands at once.
    let mut body = String::new();
    for i in 0..500 {
        body.push_str(&format!("(i64.const {i})"));
    }
    for _ in 0..499 {
        body.push_str("(i64.add)");
    }
    let wat = format!(
        r#"(module (func (export "sum") (result i64) {body}))"#
    );

    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let module = Module::from_wat(&engine, &wat)?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    let func = instance.get_func(&store, "sum").expect("export");
    let mut results = [Val::I32(0)];
    func.call(&mut store, &[], &mut results)?;
    assert_eq!(results[0], Val::I64(499 * 500 / 2));
    Ok(())
}
