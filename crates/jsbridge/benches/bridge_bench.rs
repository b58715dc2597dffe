//! Benchmarks for bridge round trips
//!
//! Run with: cargo bench -p jsbridge

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use jsbridge::Engine;

fn bridge_benchmarks(c: &mut Criterion) {
    let engine = Engine::builder().console(false).build().unwrap();
    engine
        .register_function("addOne", |engine, args| {
            Ok(engine.number(args[0].to_number()? + 1.0))
        })
        .unwrap();

    c.bench_function("evaluate_arithmetic", |b| {
        b.iter(|| engine.evaluate(black_box("1 + 1")).unwrap())
    });

    let add = engine.evaluate("(a, b) => a + b").unwrap();
    let (x, y) = (engine.int(20), engine.int(22));
    c.bench_function("call_script_function", |b| {
        b.iter(|| engine.call(&add, &[x.clone(), y.clone()]).unwrap())
    });

    let unit = engine
        .compile("for (var i = 0, s = 0; i < 100; i++) s = addOne(s); s", "loop.js", 1)
        .unwrap();
    c.bench_function("host_callback_x100", |b| {
        b.iter(|| engine.execute(&unit).unwrap())
    });

    c.bench_function("value_create_drop", |b| {
        b.iter(|| {
            let value = engine.int(black_box(7));
            drop(value);
        })
    });

    c.bench_function("nested_lock", |b| {
        let _guard = engine.lock();
        b.iter(|| engine.evaluate("0").unwrap())
    });
}

criterion_group!(benches, bridge_benchmarks);
criterion_main!(benches);
