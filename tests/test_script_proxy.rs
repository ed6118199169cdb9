//! Script objects, arrays and functions observed and invoked from host code.

extern crate jsbridge;

mod common;

use std::collections::BTreeMap;

use common::{eval, runtime, Foo};
use jsbridge::bridge::{Error, HostRef, HostValue, ScriptKind, ScriptRef, MAX_SAFE_INTEGER};

fn script(value: HostValue) -> ScriptRef {
    match value {
        HostValue::Script(s) => s,
        other => panic!("expected a script value, got {:?}", other),
    }
}

// ── Objects ──────────────────────────────────────────────────────────

#[test]
fn test_object_attributes() {
    let rt = runtime();
    let obj = script(eval(&rt, "({ bar: 10, name: 'x' })"));
    assert_eq!(obj.kind(), ScriptKind::Object);
    assert_eq!(obj.get("bar").unwrap(), HostValue::Int(10));
    assert_eq!(obj.get("missing").unwrap(), HostValue::Undefined);

    obj.set("bar", 11).unwrap();
    obj.set("fresh", "new").unwrap();
    assert_eq!(obj.get("bar").unwrap(), HostValue::Int(11));
    assert_eq!(obj.keys().unwrap(), vec!["bar", "name", "fresh"]);
    assert!(obj.contains("toString").unwrap());
    assert!(!obj.contains("nothing").unwrap());
}

#[test]
fn test_host_writes_are_visible_to_script() {
    let rt = runtime();
    eval(&rt, "var foo = { bar: 10 };");
    let foo = script(rt.get("foo").unwrap());
    foo.set("bar", 20).unwrap();
    assert_eq!(eval(&rt, "foo.bar"), HostValue::Int(20));
}

#[test]
fn test_same_script_object_is_same_handle() {
    let rt = runtime();
    eval(&rt, "var foo = { bar: 10 };");
    let first = script(rt.get("foo").unwrap());
    let second = script(rt.get("foo").unwrap());
    assert_eq!(first, second);

    rt.set("copy", first.clone()).unwrap();
    assert_eq!(eval(&rt, "foo === copy"), HostValue::Bool(true));
    assert_eq!(script(rt.get("copy").unwrap()), first);
}

#[test]
fn test_record_conversion() {
    let rt = runtime();
    let obj = script(eval(&rt, "({ a: 1, b: [true, null], c: { d: 'e' } })"));
    let record = obj.to_record().unwrap();
    assert_eq!(record.len(), 3);
    assert_eq!(record["a"], HostValue::Int(1));
    assert_eq!(
        record["b"].to_list().unwrap(),
        vec![HostValue::Bool(true), HostValue::Nil]
    );
    assert_eq!(record["c"].to_record().unwrap()["d"], HostValue::from("e"));
}

// ── Arrays ───────────────────────────────────────────────────────────

#[test]
fn test_array_indexing() {
    let rt = runtime();
    let array = script(eval(&rt, "[1, 'two', 3.5]"));
    assert!(array.is_array());
    assert_eq!(array.len().unwrap(), 3);
    assert_eq!(array.get_index(1).unwrap(), HostValue::from("two"));
    assert_eq!(array.get_index(2).unwrap(), HostValue::Float(3.5));
    assert_eq!(array.get_index(9).unwrap(), HostValue::Undefined);

    array.set_index(3, "four").unwrap();
    assert_eq!(array.len().unwrap(), 4);
    assert_eq!(
        array.to_list().unwrap(),
        vec![HostValue::Int(1), HostValue::from("two"), HostValue::Float(3.5), HostValue::from("four")]
    );
}

#[test]
fn test_empty_array() {
    let rt = runtime();
    let array = script(eval(&rt, "[]"));
    assert!(array.is_empty().unwrap());
}

// ── Functions ────────────────────────────────────────────────────────

#[test]
fn test_call_uses_global_receiver() {
    let rt = runtime();
    eval(&rt, "var marker = 'global'; function whoami() { return this.marker; }");
    let whoami = script(rt.get("whoami").unwrap());
    assert!(whoami.is_callable());
    assert_eq!(whoami.call(vec![]).unwrap(), HostValue::from("global"));
}

#[test]
fn test_call_using_overrides_receiver() {
    let rt = runtime();
    eval(&rt, "function whoami() { return this.marker; }");
    let whoami = script(rt.get("whoami").unwrap());
    let receiver = script(eval(&rt, "({ marker: 'mine' })"));
    assert_eq!(
        whoami.call_using(&HostValue::Script(receiver), vec![]).unwrap(),
        HostValue::from("mine")
    );
}

#[test]
fn test_call_using_host_object_receiver() {
    let rt = runtime();
    eval(&rt, "function readBar(n) { return this.bar + n; }");
    let read_bar = script(rt.get("readBar").unwrap());
    let foo = HostValue::Object(HostRef::new(Foo::new()));
    assert_eq!(read_bar.call_using(&foo, vec![5.into()]).unwrap(), HostValue::Int(15));
}

#[test]
fn test_runtime_call_passes_arguments() {
    let rt = runtime();
    eval(&rt, "function add(a, b) { return a + b; }");
    assert_eq!(rt.call("add", vec![2.into(), 3.into()]).unwrap(), HostValue::Int(5));
    assert!(matches!(rt.call("nothing", vec![]), Err(Error::Type(_))));
}

#[test]
fn test_calling_non_function_is_type_error() {
    let rt = runtime();
    let obj = script(eval(&rt, "({})"));
    assert!(matches!(obj.call(vec![]), Err(Error::Type(_))));
}

#[test]
fn test_script_exception_reaches_host() {
    let rt = runtime();
    let thrower = script(eval(&rt, "(function () { throw new RangeError('too far'); })"));
    match thrower.call(vec![]) {
        Err(Error::Script(e)) => {
            assert_eq!(e.name, "RangeError");
            assert_eq!(e.message, "too far");
            assert_eq!(e.to_string(), "RangeError: too far");
        }
        other => panic!("expected a script error, got {:?}", other),
    }
}

#[test]
fn test_thrown_symbol_keeps_its_description() {
    let rt = runtime();
    match rt.evaluate("throw Symbol('odd')") {
        Err(Error::Script(e)) => {
            assert_eq!(e.message, "Symbol(odd)");
            assert_eq!(e.value, HostValue::from("Symbol(odd)"));
        }
        other => panic!("expected a script error, got {:?}", other),
    }
}

// ── Marshaling ───────────────────────────────────────────────────────

#[test]
fn test_primitives_cross_by_value() {
    let rt = runtime();
    assert_eq!(eval(&rt, "undefined"), HostValue::Undefined);
    assert_eq!(eval(&rt, "null"), HostValue::Nil);
    assert_eq!(eval(&rt, "1 + 1"), HostValue::Int(2));
    assert_eq!(eval(&rt, "1 / 2"), HostValue::Float(0.5));
    assert_eq!(eval(&rt, "'a' + 'b'"), HostValue::from("ab"));
    assert_eq!(eval(&rt, "10n"), HostValue::Int(10));
    assert!(matches!(eval(&rt, "NaN"), HostValue::Float(n) if n.is_nan()));
}

#[test]
fn test_negative_zero_keeps_its_sign() {
    let rt = runtime();
    let zero = eval(&rt, "-0");
    assert!(matches!(zero, HostValue::Float(f) if f == 0.0 && f.is_sign_negative()));
    rt.set("z", zero).unwrap();
    assert_eq!(eval(&rt, "Object.is(z, -0)"), HostValue::Bool(true));
    assert_eq!(eval(&rt, "0"), HostValue::Int(0));
}

#[test]
fn test_large_integers_keep_precision() {
    let rt = runtime();
    rt.set("big", MAX_SAFE_INTEGER).unwrap();
    assert_eq!(eval(&rt, "big"), HostValue::Int(MAX_SAFE_INTEGER));
    assert_eq!(eval(&rt, "big === 9007199254740991"), HostValue::Bool(true));
    assert_eq!(eval(&rt, "2 ** 60"), HostValue::Float(2f64.powi(60)));
}

#[test]
fn test_symbols_do_not_cross() {
    let rt = runtime();
    assert!(matches!(rt.evaluate("Symbol('x')"), Err(Error::Type(_))));
}

#[test]
fn test_lists_and_records_are_copied() {
    let rt = runtime();
    let mut record = BTreeMap::new();
    record.insert("bar".to_string(), HostValue::Int(10));
    record.insert("list".to_string(), vec![1, 2].into());
    rt.set("rec", record.clone()).unwrap();

    assert_eq!(eval(&rt, "rec.bar"), HostValue::Int(10));
    assert_eq!(eval(&rt, "Array.isArray(rec.list)"), HostValue::Bool(true));
    eval(&rt, "rec.bar = 99; rec.list.push(3);");
    assert_eq!(record["bar"], HostValue::Int(10));
    assert_eq!(eval(&rt, "rec.list.length"), HostValue::Int(3));

    let round_trip = rt.get("rec").unwrap().to_record().unwrap();
    assert_eq!(round_trip["bar"], HostValue::Int(99));
}

// ── Lifetime ─────────────────────────────────────────────────────────

#[test]
fn test_handle_outliving_runtime() {
    let obj = {
        let rt = runtime();
        script(eval(&rt, "({ a: 1 })"))
    };
    assert!(matches!(obj.get("a"), Err(Error::RuntimeDropped)));
}
