//! Host functions, same-thread reentry and cross-thread serialization

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use jsbridge::{BridgeError, Engine};
use parking_lot::Mutex;

fn engine() -> Engine {
    Engine::builder().console(false).build().unwrap()
}

fn register_add_one(engine: &Engine) {
    engine
        .register_function("addOne", |engine, args| {
            let n = args
                .first()
                .ok_or_else(|| BridgeError::host("addOne expects one argument"))?
                .to_number()?;
            Ok(engine.number(n + 1.0))
        })
        .unwrap();
}

#[test]
fn test_add_one() {
    let engine = engine();
    register_add_one(&engine);
    let result = engine.evaluate("addOne(41)").unwrap();
    assert_eq!(result.int(), 42);
    assert_eq!(engine.stats().callbacks, 1);
}

#[test]
fn test_nested_evaluate_inside_host_function() {
    let engine = engine();
    let nested = Arc::new(Mutex::new(None));
    let record = nested.clone();

    engine
        .register_function("addOne", move |engine, args| {
            let inner = engine.evaluate("2+2")?;
            *record.lock() = Some(inner.to_number()?);
            assert_eq!(engine.lock_state().depth, 2);
            Ok(engine.number(args[0].to_number()? + 1.0))
        })
        .unwrap();

    assert_eq!(engine.evaluate("addOne(41)").unwrap().int(), 42);
    assert_eq!(*nested.lock(), Some(4.0));
    assert!(!engine.lock_state().is_held());
}

#[test]
fn test_deep_host_script_recursion() {
    let engine = engine();
    engine
        .register_function("down", |engine, args| {
            let n = args[0].int();
            if n == 0 {
                return Ok(engine.int(0));
            }
            let f = engine.global().get_property("down")?;
            let rest = engine.call(&f, &[engine.int(n - 1)])?;
            Ok(engine.int(rest.int() + 1))
        })
        .unwrap();
    assert_eq!(engine.evaluate("down(20)").unwrap().int(), 20);
}

#[test]
fn test_host_failure_throws_string_primitive() {
    let engine = engine();
    engine
        .register_function("fail", |_, _| Err(BridgeError::host("bad input")))
        .unwrap();

    let caught = engine
        .evaluate("try { fail(); 'no' } catch (e) { typeof e + ':' + e }")
        .unwrap();
    assert_eq!(caught.string(), "string:bad input");

    assert!(matches!(engine.evaluate("fail()"), Err(BridgeError::Evaluation)));
}

#[test]
fn test_host_panic_becomes_script_failure() {
    let engine = engine();
    engine
        .register_function("explode", |_, _| panic!("kaboom"))
        .unwrap();

    let caught = engine
        .evaluate("try { explode() } catch (e) { String(e) }")
        .unwrap()
        .string();
    assert!(caught.contains("kaboom"), "{caught}");
    assert!(!engine.lock_state().is_held());
    assert_eq!(engine.evaluate("1").unwrap().int(), 1);
}

#[test]
fn test_reregistration_rebinds_captured_reference() {
    let engine = engine();
    engine.register_function("greet", |e, _| e.string("old")).unwrap();
    engine.evaluate("var saved = greet;").unwrap();
    assert_eq!(engine.evaluate("saved()").unwrap().string(), "old");

    engine.register_function("greet", |e, _| e.string("new")).unwrap();
    assert_eq!(engine.evaluate("saved()").unwrap().string(), "new");
    assert_eq!(engine.evaluate("greet()").unwrap().string(), "new");
    assert_eq!(engine.function_names(), vec!["greet".to_string()]);
}

#[test]
fn test_routing_ignores_script_visible_name() {
    let engine = engine();
    register_add_one(&engine);
    engine.register_function("one", |e, _| Ok(e.int(1))).unwrap();
    engine.register_function("two", |e, _| Ok(e.int(2))).unwrap();

    let deleted = engine.evaluate("delete addOne.name; addOne(1)").unwrap();
    assert_eq!(deleted.int(), 2);

    let redefined = engine
        .evaluate(
            "try { Object.defineProperty(one, 'name', { value: 'two' }) } catch (e) {}\n\
             one()",
        )
        .unwrap();
    assert_eq!(redefined.int(), 1);

    // the routing key itself cannot be rewritten or removed
    let hidden = engine
        .evaluate(
            "one.__jsbridge_name = 'two'; delete one.__jsbridge_name;\n\
             Object.keys(one).length + ':' + one()",
        )
        .unwrap();
    assert_eq!(hidden.string(), "0:1");
}

#[test]
fn test_register_from_inside_host_function() {
    let engine = engine();
    engine
        .register_function("install", |engine, _| {
            engine.register_function("late", |e, _| Ok(e.int(7)))?;
            Ok(engine.undefined())
        })
        .unwrap();

    engine.evaluate("install()").unwrap();
    assert_eq!(engine.evaluate("late()").unwrap().int(), 7);
}

#[test]
fn test_arguments_are_rooted_handles() {
    let engine = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    engine
        .register_function("collect", move |engine, args| {
            record.lock().extend(args.iter().map(|a| a.to_string()));
            Ok(engine.int(args.len() as i32))
        })
        .unwrap();

    let count = engine.evaluate("collect(1, 'two', [3], undefined)").unwrap();
    assert_eq!(count.int(), 4);
    assert_eq!(*seen.lock(), vec!["1", "two", "3", "undefined"]);
}

#[test]
fn test_host_value_from_other_engine_is_rejected() {
    let a = engine();
    let b = engine();
    let b_for_host = b.clone();
    a.register_function("foreign", move |_, _| Ok(b_for_host.int(1)))
        .unwrap();

    let caught = a
        .evaluate("try { foreign() } catch (e) { String(e) }")
        .unwrap()
        .string();
    assert!(caught.contains("another engine"), "{caught}");
}

#[test]
fn test_explicit_lock_batches_operations() {
    let engine = engine();
    let guard = engine.lock();
    assert_eq!(guard.depth(), 1);
    engine.evaluate("var x = 1").unwrap();
    engine.evaluate("x += 1").unwrap();
    assert_eq!(engine.lock_state().depth, 1);
    drop(guard);
    assert!(!engine.lock_state().is_held());
    assert_eq!(engine.evaluate("x").unwrap().int(), 2);
}

#[test]
fn test_threads_are_serialized() {
    let engine = engine();
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let (inside_fn, max_fn) = (inside.clone(), max_inside.clone());
    engine
        .register_function("work", move |engine, _| {
            let now = inside_fn.fetch_add(1, Ordering::SeqCst) + 1;
            max_fn.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            inside_fn.fetch_sub(1, Ordering::SeqCst);
            Ok(engine.undefined())
        })
        .unwrap();
    engine.evaluate("var total = 0").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    engine.evaluate("work(); total += 1").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(engine.evaluate("total").unwrap().int(), 80);
}

#[test]
fn test_other_thread_blocks_while_guard_held() {
    let engine = engine();
    let guard = engine.lock();

    let other = engine.clone();
    let done = Arc::new(AtomicUsize::new(0));
    let done_flag = done.clone();
    let worker = thread::spawn(move || {
        other.evaluate("1").unwrap();
        done_flag.store(1, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(50));
    assert_eq!(done.load(Ordering::SeqCst), 0);
    drop(guard);
    worker.join().unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lock_state_quiescent_after_failures() {
    let engine = engine();
    register_add_one(&engine);
    for source in ["addOne()", "throw 1", "let = ;", "addOne(1)"] {
        let _ = engine.evaluate(source);
        let state = engine.lock_state();
        assert!(!state.is_held());
        assert_eq!(state.owner, None);
    }
}
