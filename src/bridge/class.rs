//! Host classes exposed to script code.
//!
//! A [`HostClass`] crosses as one callable, constructible script value `V`:
//!
//! * `new V(...)` and `V.new(...)` run the constructor with marshaled
//!   arguments and return the proxy of the new host instance;
//! * `V(...)` forwards to the class method `call`, if any;
//! * `V.name` resolves class methods, then constants (nested classes
//!   included), lazily and with the usual identity rules.
//!
//! ```ignore
//! let point = HostClass::new("Point")
//!     .with_constructor(Arity::Exact(2), |_frame, args| Ok(Point::new(&args).into()))
//!     .class_method("origin", MethodSig::exact(0), |_frame, _call| Ok(Point::origin().into()))
//!     .with_constant("DIMENSIONS", 2);
//! runtime.set("Point", point.into_value())?;
//! ```

use std::any::Any;
use std::collections::HashMap;

use crate::bridge::call::{Call, Frame};
use crate::bridge::error::Result;
use crate::bridge::host::{no_method, Arity, Constructor, HostObject, MethodSig};
use crate::bridge::value::{HostRef, HostValue};

type ConstructorFn = dyn Fn(&mut Frame<'_>, Vec<HostValue>) -> Result<HostValue>;
type ClassMethodFn = dyn Fn(&mut Frame<'_>, Call) -> Result<HostValue>;

pub struct HostClass {
    name: String,
    constructor: Option<(Arity, Box<ConstructorFn>)>,
    methods: HashMap<String, (MethodSig, Box<ClassMethodFn>)>,
    constants: HashMap<String, HostValue>,
}

impl HostClass {
    pub fn new(name: impl Into<String>) -> Self {
        HostClass {
            name: name.into(),
            constructor: None,
            methods: HashMap::new(),
            constants: HashMap::new(),
        }
    }

    pub fn with_constructor<F>(mut self, arity: Arity, f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, Vec<HostValue>) -> Result<HostValue> + 'static,
    {
        self.constructor = Some((arity, Box::new(f)));
        self
    }

    pub fn class_method<F>(mut self, name: impl Into<String>, sig: MethodSig, f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, Call) -> Result<HostValue> + 'static,
    {
        self.methods.insert(name.into(), (sig, Box::new(f)));
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn into_ref(self) -> HostRef {
        HostRef::new(self)
    }

    pub fn into_value(self) -> HostValue {
        HostValue::Object(self.into_ref())
    }
}

impl HostObject for HostClass {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        self.methods.get(name).map(|(sig, _)| *sig)
    }

    fn invoke(&self, frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
        match self.methods.get(name) {
            Some((_, f)) => f(frame, call),
            None => Err(no_method(self, name)),
        }
    }

    fn constant(&self, name: &str) -> Option<HostValue> {
        self.constants.get(name).cloned()
    }

    fn constructor(&self) -> Option<&dyn Constructor> {
        if self.constructor.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Constructor for HostClass {
    fn arity(&self) -> Arity {
        self.constructor
            .as_ref()
            .map_or(Arity::Exact(0), |(arity, _)| *arity)
    }

    fn construct(&self, frame: &mut Frame<'_>, args: Vec<HostValue>) -> Result<HostValue> {
        match &self.constructor {
            Some((_, f)) => f(frame, args),
            None => Err(no_method(self, "new")),
        }
    }
}
