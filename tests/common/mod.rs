//! Host fixtures shared by the integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use jsbridge::bridge::{
    no_method, Arity, Call, Frame, HostClass, HostObject, HostRef, HostValue, Indexer, MethodSig,
    Result, Runtime,
};

pub fn runtime() -> Runtime {
    Runtime::new().unwrap()
}

/// Evaluates `code` and expects success.
pub fn eval(runtime: &Runtime, code: &str) -> HostValue {
    match runtime.evaluate(code) {
        Ok(value) => value,
        Err(e) => panic!("evaluation of {:?} failed: {}", code, e),
    }
}

// ── Foo: reader/setter pair, methods with arguments and a block ──────

pub struct Foo {
    pub bar: Cell<i64>,
}

impl Foo {
    pub fn new() -> Self {
        Foo { bar: Cell::new(10) }
    }
}

impl HostObject for Foo {
    fn class_name(&self) -> &str {
        "Foo"
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "bar" => Some(MethodSig::exact(0)),
            "bar=" => Some(MethodSig::exact(1)),
            "x2" => Some(MethodSig::exact(1)),
            "add" => Some(MethodSig::variadic(0)),
            "xform" => Some(MethodSig::exact(1).with_block()),
            _ => None,
        }
    }

    fn invoke(&self, frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
        match name {
            "bar" => Ok(self.bar.get().into()),
            "bar=" => {
                self.bar.set(call.int(0)?);
                Ok(HostValue::Nil)
            }
            "x2" => Ok((call.int(0)? * 2).into()),
            "add" => {
                let mut sum = 0;
                for i in 0..call.args.len() {
                    sum += call.int(i)?;
                }
                Ok(sum.into())
            }
            "xform" => {
                let arg = call.arg(0);
                call.block()?.call(frame, vec![arg])
            }
            _ => Err(no_method(self, name)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The `Foo` class: `Foo.bar` is 10, `Foo.Inner` a nested class.
pub fn foo_class() -> HostRef {
    let inner = HostClass::new("Foo::Inner")
        .with_constructor(Arity::Exact(0), |_frame, _args| Ok(HostRef::new(Foo::new()).into()))
        .into_ref();
    HostClass::new("Foo")
        .with_constructor(Arity::Exact(0), |_frame, _args| Ok(HostRef::new(Foo::new()).into()))
        .class_method("bar", MethodSig::exact(0), |_frame, _call| Ok(10.into()))
        .with_constant("Inner", inner)
        .into_ref()
}

// ── AClass: records constructor arguments ────────────────────────────

pub struct AClass {
    pub args: Vec<HostValue>,
}

impl HostObject for AClass {
    fn class_name(&self) -> &str {
        "AClass"
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "args" => Some(MethodSig::exact(0)),
            _ => None,
        }
    }

    fn invoke(&self, _frame: &mut Frame<'_>, name: &str, _call: Call) -> Result<HostValue> {
        match name {
            "args" => Ok(self.args.clone().into()),
            _ => Err(no_method(self, name)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn a_class() -> HostRef {
    HostClass::new("AClass")
        .with_constructor(Arity::AtLeast(0), |_frame, args| Ok(HostRef::new(AClass { args }).into()))
        .class_method("call", MethodSig::variadic(0), |_frame, call| {
            Ok(format!("called with {}", call.args.len()).into())
        })
        .into_ref()
}

/// A module: class methods and constants, no constructor.
pub fn a_module() -> HostRef {
    HostClass::new("AModule")
        .class_method("greet", MethodSig::exact(1), |_frame, call| {
            Ok(format!("hello {}", call.str(0)?).into())
        })
        .with_constant("VERSION", "1.0")
        .into_ref()
}

// ── Indexable: writable indexer, no methods ──────────────────────────

#[derive(Default)]
pub struct Indexable {
    pub store: RefCell<HashMap<String, HostValue>>,
}

impl Indexable {
    pub fn with(entries: &[(&str, HostValue)]) -> Self {
        let store = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Indexable {
            store: RefCell::new(store),
        }
    }

    pub fn value(&self, key: &str) -> Option<HostValue> {
        self.store.borrow().get(key).cloned()
    }
}

impl Indexer for Indexable {
    fn has_key(&self, key: &str) -> bool {
        self.store.borrow().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<HostValue> {
        self.value(key)
    }

    fn set(&self, _frame: &mut Frame<'_>, key: &str, value: HostValue) -> Result<()> {
        self.store.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        true
    }
}

impl HostObject for Indexable {
    fn class_name(&self) -> &str {
        "Indexable"
    }

    fn indexer(&self) -> Option<&dyn Indexer> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Shadowed: a method and an indexer key of the same name ───────────

pub struct Shadowed {
    pub index: Indexable,
}

impl HostObject for Shadowed {
    fn class_name(&self) -> &str {
        "Shadowed"
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "size" => Some(MethodSig::exact(0)),
            _ => None,
        }
    }

    fn invoke(&self, _frame: &mut Frame<'_>, name: &str, _call: Call) -> Result<HostValue> {
        match name {
            "size" => Ok("from method".into()),
            _ => Err(no_method(self, name)),
        }
    }

    fn indexer(&self) -> Option<&dyn Indexer> {
        Some(&self.index)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Numbers: block-taking iteration ──────────────────────────────────

pub struct Numbers {
    pub items: Vec<i64>,
    pub yields: Cell<usize>,
}

impl Numbers {
    pub fn new(items: Vec<i64>) -> Self {
        Numbers {
            items,
            yields: Cell::new(0),
        }
    }
}

impl HostObject for Numbers {
    fn class_name(&self) -> &str {
        "Numbers"
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "collect" => Some(MethodSig::exact(0).with_block()),
            "length" => Some(MethodSig::exact(0)),
            _ => None,
        }
    }

    fn invoke(&self, frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
        match name {
            "collect" => {
                let block = call.block()?;
                let mut out = Vec::with_capacity(self.items.len());
                for item in &self.items {
                    self.yields.set(self.yields.get() + 1);
                    out.push(block.call(frame, vec![(*item).into()])?);
                }
                Ok(HostValue::List(out))
            }
            "length" => Ok(self.items.len().into()),
            _ => Err(no_method(self, name)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── MethodForWith: scope object for `with` evaluation ────────────────

pub struct MethodForWith;

impl HostObject for MethodForWith {
    fn class_name(&self) -> &str {
        "MethodForWith"
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "b" => Some(MethodSig::exact(0)),
            "double" => Some(MethodSig::exact(1)),
            _ => None,
        }
    }

    fn invoke(&self, _frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
        match name {
            "b" => Ok(42.into()),
            "double" => Ok((call.int(0)? * 2).into()),
            _ => Err(no_method(self, name)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Frozen: rejects ad-hoc attributes ────────────────────────────────

pub struct Frozen;

impl HostObject for Frozen {
    fn class_name(&self) -> &str {
        "Frozen"
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "name" => Some(MethodSig::exact(0)),
            _ => None,
        }
    }

    fn invoke(&self, _frame: &mut Frame<'_>, name: &str, _call: Call) -> Result<HostValue> {
        match name {
            "name" => Ok("ice".into()),
            _ => Err(no_method(self, name)),
        }
    }

    fn frozen(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Caller: re-enters the runtime through its frame ──────────────────

pub struct Caller;

impl HostObject for Caller {
    fn class_name(&self) -> &str {
        "Caller"
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "apply" => Some(MethodSig::exact(2)),
            "global" => Some(MethodSig::exact(1)),
            "sum" => Some(MethodSig::exact(1)),
            _ => None,
        }
    }

    fn invoke(&self, frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
        match name {
            "apply" => {
                let function = call.arg(0);
                let args = frame.to_list(&call.arg(1))?;
                frame.call(&function, args)
            }
            "global" => frame.get(call.str(0)?),
            "sum" => {
                let mut total = 0;
                for item in frame.to_list(&call.arg(0))? {
                    total += item.as_i64().unwrap_or(0);
                }
                Ok(total.into())
            }
            _ => Err(no_method(self, name)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
