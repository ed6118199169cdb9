//! Runtime isolation, cross-runtime transfer and proxy lifetime.

extern crate jsbridge;

mod common;

use std::rc::Rc;

use common::{eval, runtime, Foo};
use jsbridge::bridge::{Error, HostFn, HostRef, HostValue, Runtime};
use jsbridge::config::RuntimeConfig;

// ── Isolation ────────────────────────────────────────────────────────

#[test]
fn test_globals_are_isolated() {
    let first = runtime();
    let second = runtime();
    first.set("x", 1).unwrap();
    assert_eq!(eval(&first, "typeof x"), HostValue::from("number"));
    assert_eq!(eval(&second, "typeof x"), HostValue::from("undefined"));
    assert_ne!(first.id(), second.id());
}

#[test]
fn test_one_host_object_gets_a_proxy_per_runtime() {
    let first = runtime();
    let second = runtime();
    let foo = HostRef::new(Foo::new());
    first.set("foo", foo.clone()).unwrap();
    second.set("foo", foo.clone()).unwrap();

    eval(&first, "foo.note = 'first only';");
    assert_eq!(eval(&second, "foo.note"), HostValue::Undefined);
    for rt in [&first, &second] {
        match rt.get("foo").unwrap() {
            HostValue::Object(found) => assert!(found.ptr_eq(&foo)),
            other => panic!("unexpected value {:?}", other),
        }
    }
}

#[test]
fn test_script_handles_know_their_runtime() {
    let rt = runtime();
    match eval(&rt, "({})") {
        HostValue::Script(s) => assert_eq!(s.runtime_id(), rt.id()),
        other => panic!("unexpected value {:?}", other),
    }
}

// ── Cross-runtime transfer ───────────────────────────────────────────

#[test]
fn test_foreign_function_is_reproxied() {
    let first = runtime();
    let second = runtime();
    let double = eval(&first, "var calls = 0; (function (a) { calls++; return a * 2; })");
    second.set("double", double).unwrap();

    assert_eq!(eval(&second, "typeof double"), HostValue::from("function"));
    assert_eq!(eval(&second, "double(21)"), HostValue::Int(42));
    assert_eq!(eval(&first, "calls"), HostValue::Int(1));
    assert_eq!(eval(&second, "typeof calls"), HostValue::from("undefined"));
}

#[test]
fn test_foreign_array_and_object_are_copied() {
    let first = runtime();
    let second = runtime();
    let list = eval(&first, "var list = [1, 2]; list");
    let record = eval(&first, "var rec = { a: 1 }; rec");
    second.set("list", list).unwrap();
    second.set("rec", record).unwrap();

    eval(&second, "list.push(3); rec.a = 2;");
    assert_eq!(eval(&second, "list.length"), HostValue::Int(3));
    assert_eq!(eval(&first, "list.length"), HostValue::Int(2));
    assert_eq!(eval(&first, "rec.a"), HostValue::Int(1));
}

#[test]
fn test_collected_foreign_function_releases_its_handle() {
    let first = runtime();
    let second = runtime();
    let baseline = first.stats().script_proxies;
    let double = eval(&first, "(function (a) { return a * 2; })");
    second.set("double", double).unwrap();
    assert_eq!(eval(&second, "double(21)"), HostValue::Int(42));

    eval(&second, "double = null;");
    second.collect_garbage().unwrap();
    assert_eq!(first.stats().script_proxies, baseline);
    assert_eq!(eval(&first, "typeof Object"), HostValue::from("function"));
}

#[test]
fn test_sparse_array_copies_holes_as_undefined() {
    let first = runtime();
    let second = runtime();
    let sparse = eval(&first, "var a = [1]; a.length = 3; a[2] = 5; a");
    second.set("copy", sparse).unwrap();
    assert_eq!(eval(&second, "copy.length"), HostValue::Int(3));
    assert_eq!(eval(&second, "copy[1] === undefined && copy[2]"), HostValue::Int(5));
}

#[test]
fn test_huge_array_length_is_a_range_error() {
    let first = runtime();
    let second = runtime();
    let huge = match eval(&first, "var a = []; a.length = 4294967295; a") {
        HostValue::Script(s) => s,
        other => panic!("unexpected value {:?}", other),
    };
    match huge.to_list() {
        Err(Error::Script(e)) => assert_eq!(e.name, "RangeError"),
        other => panic!("expected a range error, got {:?}", other),
    }
    match second.set("a", huge) {
        Err(Error::Script(e)) => assert_eq!(e.name, "RangeError"),
        other => panic!("expected a range error, got {:?}", other),
    }
    assert_eq!(eval(&first, "a.length"), HostValue::Int(4294967295));
}

// ── Re-entrancy ──────────────────────────────────────────────────────

#[test]
fn test_runtime_is_busy_during_evaluation() {
    let rt = Rc::new(runtime());
    let weak = Rc::downgrade(&rt);
    let reenter = HostFn::new(move |_frame, _args| {
        let rt = weak.upgrade().ok_or(Error::RuntimeDropped)?;
        rt.evaluate("1")
    });
    rt.set("reenter", reenter).unwrap();
    match rt.evaluate("reenter()") {
        Err(Error::Script(e)) => {
            assert_eq!(e.name, "HostError");
            assert!(e.message.contains("busy"), "{}", e.message);
        }
        other => panic!("expected a script error, got {:?}", other),
    }
    assert_eq!(rt.evaluate("1 + 1").unwrap(), HostValue::Int(2));
}

// ── Proxy lifetime ───────────────────────────────────────────────────

#[test]
fn test_dropped_script_handles_leave_the_registry() {
    let rt = runtime();
    let baseline = rt.stats().script_proxies;
    let handle = eval(&rt, "({ a: 1 })");
    assert_eq!(rt.stats().script_proxies, baseline + 1);
    drop(handle);
    assert_eq!(rt.stats().script_proxies, baseline);
}

#[test]
fn test_collect_garbage_reclaims_unreachable_proxies() {
    let rt = runtime();
    let baseline = rt.stats().host_proxies;
    let mut last = None;
    for _ in 0..50 {
        let foo = HostRef::new(Foo::new());
        rt.set("tmp", foo.clone()).unwrap();
        last = Some(foo);
    }
    assert!(rt.stats().host_proxies >= baseline + 1);

    rt.collect_garbage().unwrap();
    assert!(rt.stats().host_proxies <= baseline + 1);
    match (rt.get("tmp").unwrap(), last) {
        (HostValue::Object(found), Some(last)) => assert!(found.ptr_eq(&last)),
        other => panic!("unexpected values {:?}", other),
    }
}

#[test]
fn test_repeated_crossings_do_not_pin_the_proxy() {
    let rt = runtime();
    let baseline = rt.stats().host_proxies;
    let child = HostRef::new(Foo::new());
    let handed_out = child.clone();
    rt.set("getChild", HostFn::new(move |_frame, _args| Ok(handed_out.clone().into())))
        .unwrap();
    let code = r#"
        var same = true, first = getChild();
        for (var i = 0; i < 1000; i++) {
            same = same && getChild() === first;
        }
        var watch = new WeakRef(first);
        first = null;
        same
    "#;
    assert_eq!(eval(&rt, code), HostValue::Bool(true));
    assert_eq!(rt.stats().host_proxies, baseline + 2);

    boa_gc::force_collect();
    assert_eq!(eval(&rt, "watch.deref() === undefined"), HostValue::Bool(true));
    assert_eq!(rt.stats().host_proxies, baseline + 1);
}

#[test]
fn test_host_object_crosses_again_after_collection() {
    let rt = runtime();
    let foo = HostRef::new(Foo::new());
    rt.set("foo", foo.clone()).unwrap();
    eval(&rt, "foo.note = 'old proxy'; foo = null;");
    rt.collect_garbage().unwrap();

    rt.set("foo", foo.clone()).unwrap();
    assert_eq!(eval(&rt, "foo.bar"), HostValue::Int(10));
    rt.set("same", foo).unwrap();
    assert_eq!(eval(&rt, "foo === same"), HostValue::Bool(true));
}

// ── Configuration ────────────────────────────────────────────────────

#[test]
fn test_runtime_from_config_file() {
    let path = std::env::temp_dir().join(format!("jsbridge-{}.conf", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        "[runtime]\nnamespace = \"Bridge\"\n\n[modules]\npreload = [\"prelude\"]\n",
    )
    .unwrap();
    let config = RuntimeConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let rt = Runtime::with_config(config).unwrap();
    assert_eq!(rt.config().namespace, "Bridge");
    assert_eq!(eval(&rt, "typeof Bridge.require"), HostValue::from("function"));
    assert_eq!(eval(&rt, "typeof Prelude"), HostValue::from("object"));
    assert!(format!("{:?}", rt).contains("Bridge"));
}

#[test]
fn test_preload_failure_is_reported() {
    let config = RuntimeConfig::new().with_preload("adkfjhasd");
    assert!(matches!(Runtime::with_config(config), Err(Error::FileNotFound(_))));
}
