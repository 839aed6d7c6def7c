use anyhow::Result;
use silt::{
    Caller, Config, ContextValue, Engine, FuncInfo, FunctionListener, Linker, Module, Store, Trap,
    Val, WasmFuncType, WasmValType,
};
use std::sync::{Arc, Mutex};

#[test_log::test]
fn host_function_roundtrip() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let mut linker = Linker::new();
    linker.func_new(
        &mut store,
        "env",
        "add_ten",
        WasmFuncType::new([WasmValType::I64], [WasmValType::I64]),
        |_caller, params, results| {
            results[0] = params[0].wrapping_add(10);
            Ok(())
        },
    );

    let module = Module::from_wat(
        &engine,
        r#"(module
            (import "env" "add_ten" (func $add_ten (param i64) (result i64)))
            (func (export "f") (param i64) (result i64)
                local.get 0 call $add_ten))"#,
    )?;
    let instance = linker.instantiate(&mut store, &module)?;
    let func = instance.get_func(&store, "f").expect("export");
    let mut results = [Val::I32(0)];
    func.call(&mut store, &[Val::I64(32)], &mut results)?;
    assert_eq!(results[0], Val::I64(42));
    Ok(())
}

#[test_log::test]
fn host_trap_unwinds_with_backtrace() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let mut linker = Linker::new();
    linker.func_new(
        &mut store,
        "env",
        "boom",
        WasmFuncType::new([], []),
        |_caller, _params, _results| Err(Trap::Unreachable),
    );

    let module = Module::from_wat(
        &engine,
        r#"(module
            (import "env" "boom" (func $boom))
            (func (export "outer") call $boom))"#,
    )?;
    let instance = linker.instantiate(&mut store, &module)?;
    let func = instance.get_func(&store, "outer").expect("export");
    let err = func.call(&mut store, &[], &mut []).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::Unreachable));
    let frames = err.backtrace().expect("backtrace").frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].func_name(), Some("outer"));
    Ok(())
}

#[test_log::test]
fn host_observes_callers_memory() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    let mut linker = Linker::new();
    // Reads the first byte of whatever memory the *caller* has.
    linker.func_new(
        &mut store,
        "env",
        "peek",
        WasmFuncType::new([], [WasmValType::I32]),
        |mut caller: Caller<'_>, _params, results| {
            let memory = caller.memory().expect("caller has a memory");
            results[0] = u64::from(memory[0]);
            Ok(())
        },
    );

    // Module B imports the host function and re-exports it untouched.
    let b = Module::from_wat(
        &engine,
        r#"(module
            (import "env" "peek" (func $peek (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "\42")
            (export "peek" (func $peek)))"#,
    )?;
    let b_instance = linker.instantiate(&mut store, &b)?;
    linker.define_instance(&store, "b", b_instance);

    // Module A calls the re-exported host function. The host must observe
    // A's memory (the caller's), not B's.
    let a = Module::from_wat(
        &engine,
        r#"(module
            (import "b" "peek" (func $peek (result i32)))
            (memory 1)
            (data (i32.const 0) "\07")
            (func (export "call_peek") (result i32) call $peek))"#,
    )?;
    let a_instance = linker.instantiate(&mut store, &a)?;
    let func = a_instance.get_func(&store, "call_peek").expect("export");
    let mut results = [Val::I32(0)];
    func.call(&mut store, &[], &mut results)?;
    assert_eq!(results[0], Val::I32(7));

    // Called through B's own wasm wrapper it is B's memory instead.
    let b2 = Module::from_wat(
        &engine,
        r#"(module
            (import "env" "peek" (func $peek (result i32)))
            (memory 1)
            (data (i32.const 0) "\42")
            (func (export "wrapped_peek") (result i32) call $peek))"#,
    )?;
    let b2_instance = linker.instantiate(&mut store, &b2)?;
    let func = b2_instance.get_func(&store, "wrapped_peek").expect("export");
    func.call(&mut store, &[], &mut results)?;
    assert_eq!(results[0], Val::I32(0x42));
    Ok(())
}

#[test_log::test]
fn host_reads_context_value() -> Result<()> {
    let engine = Engine::default();
    let mut store = Store::new(&engine);
    store.set_context(Arc::new(1234u64));

    let mut linker = Linker::new();
    linker.func_new(
        &mut store,
        "env",
        "ctx",
        WasmFuncType::new([], [WasmValType::I64]),
        |caller: Caller<'_>, _params, results| {
            let context = caller.context();
            let value = context.downcast_ref::<u64>().copied().unwrap_or(0);
            results[0] = value;
            Ok(())
        },
    );

    let module = Module::from_wat(
        &engine,
        r#"(module
            (import "env" "ctx" (func $ctx (result i64)))
            (func (export "f") (result i64) call $ctx))"#,
    )?;
    let instance = linker.instantiate(&mut store, &module)?;
    let func = instance.get_func(&store, "f").expect("export");
    let mut results = [Val::I32(0)];
    func.call(&mut store, &[], &mut results)?;
    assert_eq!(results[0], Val::I64(1234));
    Ok(())
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl FunctionListener for RecordingListener {
    fn before(
        &self,
        context: &ContextValue,
        func: &FuncInfo<'_>,
        params: &[u64],
    ) -> Option<ContextValue> {
        let label = func.name.unwrap_or("<anon>");
        self.events
            .lock()
            .unwrap()
            .push(format!("before {label} {params:?}"));
        // Replace the context for the duration of the call.
        let depth = context.downcast_ref::<u64>().copied().unwrap_or(0);
        Some(Arc::new(depth + 1))
    }

    fn after(&self, _context: &ContextValue, func: &FuncInfo<'_>, results: &[u64]) {
        let label = func.name.unwrap_or("<anon>");
        self.events
            .lock()
            .unwrap()
            .push(format!("after {label} {results:?}"));
    }
}

#[test_log::test]
fn listener_sees_calls_in_order() -> Result<()> {
    let listener = Arc::new(RecordingListener::default());
    let engine = Engine::new(Config::new().listener(listener.clone()));
    let mut store = Store::new(&engine);
    store.set_context(Arc::new(0u64));

    let module = Module::from_wat(
        &engine,
        r#"(module
            (func $inner (export "inner") (param i32) (result i32)
                local.get 0 i32.const 1 i32.add)
            (func (export "outer") (param i32) (result i32)
                local.get 0 call $inner))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    let func = instance.get_func(&store, "outer").expect("export");
    let mut results = [Val::I32(0)];
    func.call(&mut store, &[Val::I32(7)], &mut results)?;
    assert_eq!(results[0], Val::I32(8));

    let events = listener.events.lock().unwrap();
    assert_eq!(
        events.as_slice(),
        [
            "before outer [7]",
            "before inner [7]",
            "after inner [8]",
            "after outer [8]",
        ]
    );
    // The replacement context is restored once the call ends.
    assert_eq!(store.context().downcast_ref::<u64>(), Some(&0));
    Ok(())
}

#[test_log::test]
fn listener_after_is_skipped_on_trap() -> Result<()> {
    let listener = Arc::new(RecordingListener::default());
    let engine = Engine::new(Config::new().listener(listener.clone()));
    let mut store = Store::new(&engine);

    let module = Module::from_wat(
        &engine,
        r#"(module (func (export "boom") unreachable))"#,
    )?;
    let instance = Linker::new().instantiate(&mut store, &module)?;
    let func = instance.get_func(&store, "boom").expect("export");
    let err = func.call(&mut store, &[], &mut []).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::Unreachable));

    let events = listener.events.lock().unwrap();
    assert_eq!(events.as_slice(), ["before boom []"]);
    Ok(())
}
