use criterion::{criterion_group, criterion_main, Criterion};
use silt::{Engine, Linker, Module, Store, Val};

const FIB: &str = r#"(module (func $fib (export "fib") (param i32) (result i32)
    (if (result i32) (i32.lt_u (local.get 0) (i32.const 2))
        (then (local.get 0))
        (else
            (i32.add
                (call $fib (i32.sub (local.get 0) (i32.const 1)))
                (call $fib (i32.sub (local.get 0) (i32.const 2))))))))"#;

fn compilation(c: &mut Criterion) {
    let bytes = wat::parse_str(FIB).unwrap();
    c.bench_function("compile_fib", |b| {
        b.iter(|| {
            // A fresh engine per iteration defeats the code cache.
            let engine = Engine::default();
            Module::from_bytes(&engine, &bytes).unwrap()
        });
    });
}

fn execution(c: &mut Criterion) {
    let engine = Engine::default();
    let module = Module::from_wat(&engine, FIB).unwrap();
    let mut store = Store::new(&engine);
    let instance = Linker::new().instantiate(&mut store, &module).unwrap();
    let fib = instance.get_func(&store, "fib").unwrap();

    c.bench_function("fib_20", |b| {
        let mut results = [Val::I32(0)];
        b.iter(|| {
            fib.call(&mut store, &[Val::I32(20)], &mut results).unwrap();
            assert_eq!(results[0], Val::I32(6765));
        });
    });
}

criterion_group!(benches, compilation, execution);
criterion_main!(benches);
