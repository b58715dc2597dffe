//! Root accounting, cross-thread disposal and teardown

use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use jsbridge::{Engine, Value};

fn engine() -> Engine {
    Engine::builder().console(false).build().unwrap()
}

#[test]
fn test_root_count_tracks_live_handles() {
    let engine = engine();
    assert_eq!(engine.root_count(), 0);

    let mut live: Vec<Value> = (0..10).map(|i| engine.int(i)).collect();
    assert_eq!(engine.root_count(), 10);

    live.truncate(4);
    assert_eq!(engine.root_count(), 4);

    let obj = engine.new_object();
    let unit = engine.compile("1", "one.js", 1).unwrap();
    assert_eq!(engine.root_count(), 6);

    drop(obj);
    drop(unit);
    drop(live);
    assert_eq!(engine.root_count(), 0);

    let stats = engine.stats();
    assert_eq!(stats.outstanding_roots(), 0);
}

#[test]
fn test_clone_registers_a_second_root() {
    let engine = engine();
    let first = engine.evaluate("({ tag: 'shared' })").unwrap();
    let second = first.clone();
    assert_ne!(first.root_id(), second.root_id());
    assert_eq!(engine.root_count(), 2);

    drop(first);
    assert_eq!(engine.root_count(), 1);
    assert_eq!(
        second.object().get_property("tag").unwrap().string(),
        "shared"
    );
}

#[test]
fn test_drop_only_enqueues() {
    let engine = engine();
    let values: Vec<Value> = (0..3).map(|i| engine.int(i)).collect();
    drop(values);
    assert_eq!(engine.pending_disposals(), 3);
    assert_eq!(engine.flush(), 3);
    assert_eq!(engine.pending_disposals(), 0);
    assert_eq!(engine.flush(), 0);
}

#[test]
fn test_temporaries_do_not_leak_roots() {
    let engine = engine();
    engine
        .register_function("echo", |_, args| Ok(args[0].clone()))
        .unwrap();
    for i in 0..100 {
        let value = engine.evaluate(&format!("echo({i}) + echo('x')")).unwrap();
        assert!(value.is_string());
    }
    assert_eq!(engine.root_count(), 0);
}

#[test]
fn test_values_survive_collection() {
    let engine = engine();
    let kept = engine.evaluate("({ payload: 'kept' })").unwrap();
    engine
        .evaluate("var junk = []; for (var i = 0; i < 10000; i++) junk.push({ i }); junk = null;")
        .unwrap();
    engine.collect_garbage();
    assert_eq!(
        kept.object().get_property("payload").unwrap().string(),
        "kept"
    );
}

#[test]
fn test_compiled_unit_survives_collection() {
    let engine = engine();
    let unit = engine.compile("'still here'", "unit.js", 1).unwrap();
    engine.collect_garbage();
    assert_eq!(engine.execute(&unit).unwrap().string(), "still here");
}

#[test]
fn test_drop_on_other_thread_during_call() {
    let engine = engine();
    let barrier = Arc::new(Barrier::new(2));

    let in_call = barrier.clone();
    engine
        .register_function("slow", move |engine, _| {
            in_call.wait();
            thread::sleep(Duration::from_millis(20));
            Ok(engine.int(1))
        })
        .unwrap();

    let doomed: Vec<Value> = (0..50).map(|i| engine.int(i)).collect();
    let survivors: Vec<Value> = (0..5).map(|i| engine.int(i)).collect();
    let slow = engine.evaluate("slow").unwrap();

    let caller = {
        let engine = engine.clone();
        thread::spawn(move || engine.call(&slow, &[]).unwrap().int())
    };
    let dropper = {
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            // the call on the other thread holds the lock right now
            drop(doomed);
        })
    };

    dropper.join().unwrap();
    assert_eq!(caller.join().unwrap(), 1);

    assert_eq!(engine.root_count(), survivors.len());
    drop(survivors);
    assert_eq!(engine.root_count(), 0);
}

#[test]
fn test_many_threads_creating_and_dropping() {
    let engine = engine();
    let workers: Vec<_> = (0..4)
        .map(|t| {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..50 {
                    let value = engine.evaluate(&format!("({t} * 1000 + {i})")).unwrap();
                    if i % 10 == 0 {
                        kept.push(value);
                    }
                }
                kept
            })
        })
        .collect();

    let kept: Vec<Value> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    assert_eq!(engine.root_count(), kept.len());
    assert_eq!(kept.len(), 20);
}

#[test]
fn test_dispose_releases_outstanding_roots() {
    let engine = engine();
    let survivor = engine.evaluate("({})").unwrap();
    engine.dispose();
    assert!(engine.is_disposed());
    // dropping after dispose is allowed
    drop(survivor);
}

#[test]
fn test_dispose_drops_captures_of_host_functions() {
    let engine = engine();
    let marker = Arc::new(());
    let captured_marker = marker.clone();
    let captured_engine = engine.clone();
    let captured_value = engine.evaluate("({ kept: true })").unwrap();

    engine
        .register_function("cyclic", move |_, _| {
            let _ = &captured_marker;
            Ok(captured_value.clone())
        })
        .unwrap();
    engine
        .register_function("selfRef", move |_, _| Ok(captured_engine.int(1)))
        .unwrap();
    assert_eq!(Arc::strong_count(&marker), 2);

    engine.dispose();
    assert_eq!(Arc::strong_count(&marker), 1);
}

#[test]
#[should_panic(expected = "engine used after dispose")]
fn test_use_after_dispose_panics() {
    let engine = engine();
    engine.dispose();
    let _ = engine.evaluate("1");
}

#[test]
#[should_panic(expected = "engine used after dispose")]
fn test_double_dispose_panics() {
    let engine = engine();
    engine.dispose();
    engine.dispose();
}

#[test]
fn test_dispose_inside_host_function_is_refused() {
    let engine = engine();
    engine
        .register_function("selfDestruct", |engine, _| {
            engine.dispose();
            Ok(engine.undefined())
        })
        .unwrap();

    assert!(engine.evaluate("selfDestruct()").is_err());
    assert!(!engine.is_disposed());
    assert_eq!(engine.evaluate("1").unwrap().int(), 1);
}
