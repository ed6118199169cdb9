//! Host-side value representation.
//!
//! [`HostValue`] is what host code hands to the runtime and what it receives
//! back. Primitives, lists and records cross the boundary by copy; objects,
//! classes and functions cross by proxy and keep their identity.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::bridge::call::Frame;
use crate::bridge::error::{Error, Result};
use crate::bridge::host::HostObject;
use crate::bridge::script_proxy::{ScriptKind, ScriptRef};

/// Largest integer a script number represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Stable identity of a shared host value, derived from its allocation address.
pub(crate) type HostKey = usize;

#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence, copied element-wise when crossing.
    List(Vec<HostValue>),
    /// Plain key-value record, copied when crossing.
    Record(BTreeMap<String, HostValue>),
    /// Host object with behavior (instance or class), crosses by proxy.
    Object(HostRef),
    /// Host closure, crosses as a callable proxy.
    Function(HostFn),
    /// Handle on a script-side object owned by some runtime.
    Script(ScriptRef),
}

impl HostValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostRef> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptRef> {
        match self {
            HostValue::Script(s) => Some(s),
            _ => None,
        }
    }

    /// Script-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Undefined | HostValue::Nil => false,
            HostValue::Bool(b) => *b,
            HostValue::Int(i) => *i != 0,
            HostValue::Float(f) => *f != 0.0 && !f.is_nan(),
            HostValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Whether the value is callable from host code.
    pub fn is_callable(&self) -> bool {
        match self {
            HostValue::Function(_) => true,
            HostValue::Script(s) => s.kind() == ScriptKind::Function,
            _ => false,
        }
    }

    /// Elements of a host list or a script array, copied into a vector.
    pub fn to_list(&self) -> Result<Vec<HostValue>> {
        match self {
            HostValue::List(items) => Ok(items.clone()),
            HostValue::Script(s) => s.to_list(),
            other => Err(Error::Type(format!("{} is not a list", other.type_name()))),
        }
    }

    /// Entries of a host record or the own enumerable properties of a script object.
    pub fn to_record(&self) -> Result<BTreeMap<String, HostValue>> {
        match self {
            HostValue::Record(map) => Ok(map.clone()),
            HostValue::Script(s) => s.to_record(),
            other => Err(Error::Type(format!("{} is not a record", other.type_name()))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Nil => "nil",
            HostValue::Bool(_) => "boolean",
            HostValue::Int(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "string",
            HostValue::List(_) => "list",
            HostValue::Record(_) => "record",
            HostValue::Object(_) => "object",
            HostValue::Function(_) => "function",
            HostValue::Script(_) => "script value",
        }
    }

    /// Identity key for values that cross by proxy.
    pub(crate) fn identity(&self) -> Option<HostKey> {
        match self {
            HostValue::Object(o) => Some(o.identity()),
            HostValue::Function(f) => Some(f.identity()),
            _ => None,
        }
    }

    /// Converts a script number, keeping integral values as integers.
    /// Negative zero stays a float so its sign survives the round trip.
    pub(crate) fn from_number(n: f64) -> Self {
        let negative_zero = n == 0.0 && n.is_sign_negative();
        if !negative_zero && n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 {
            HostValue::Int(n as i64)
        } else {
            HostValue::Float(n)
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Undefined, Undefined) | (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(a), Str(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            (Object(a), Object(b)) => a.ptr_eq(b),
            (Function(a), Function(b)) => a.ptr_eq(b),
            (Script(a), Script(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "Undefined"),
            HostValue::Nil => write!(f, "Nil"),
            HostValue::Bool(b) => write!(f, "Bool({})", b),
            HostValue::Int(i) => write!(f, "Int({})", i),
            HostValue::Float(n) => write!(f, "Float({})", n),
            HostValue::Str(s) => write!(f, "Str({:?})", s),
            HostValue::List(items) => f.debug_tuple("List").field(items).finish(),
            HostValue::Record(map) => f.debug_tuple("Record").field(map).finish(),
            HostValue::Object(o) => write!(f, "Object({:?})", o),
            HostValue::Function(_) => write!(f, "Function(..)"),
            HostValue::Script(s) => write!(f, "Script({:?})", s),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Nil => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Float(n) => write!(f, "{}", n),
            HostValue::Str(s) => write!(f, "{}", s),
            HostValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            HostValue::Record(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            HostValue::Object(o) => write!(f, "#<{}>", o.class_name()),
            HostValue::Function(_) => write!(f, "#<host function>"),
            HostValue::Script(s) => match s.kind() {
                ScriptKind::Function => write!(f, "[script function]"),
                ScriptKind::Array => write!(f, "[script array]"),
                ScriptKind::Object => write!(f, "[script object]"),
            },
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        HostValue::Int(i64::from(i))
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<usize> for HostValue {
    fn from(i: usize) -> Self {
        HostValue::Int(i as i64)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Float(n)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, HostValue>> for HostValue {
    fn from(map: BTreeMap<String, HostValue>) -> Self {
        HostValue::Record(map)
    }
}

impl From<HostRef> for HostValue {
    fn from(o: HostRef) -> Self {
        HostValue::Object(o)
    }
}

impl From<HostFn> for HostValue {
    fn from(f: HostFn) -> Self {
        HostValue::Function(f)
    }
}

impl From<ScriptRef> for HostValue {
    fn from(s: ScriptRef) -> Self {
        HostValue::Script(s)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(HostValue::Nil)
    }
}

/// Shared handle on a host object.
///
/// Identity is the allocation: clones compare equal, two separately built
/// objects never do, whatever their contents.
#[derive(Clone)]
pub struct HostRef(Rc<dyn HostObject>);

impl HostRef {
    pub fn new<T: HostObject>(object: T) -> Self {
        HostRef(Rc::new(object))
    }

    pub fn from_rc(object: Rc<dyn HostObject>) -> Self {
        HostRef(object)
    }

    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        self.identity() == other.identity()
    }

    pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub(crate) fn identity(&self) -> HostKey {
        Rc::as_ptr(&self.0) as *const () as HostKey
    }
}

impl std::ops::Deref for HostRef {
    type Target = dyn HostObject;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}>", self.0.class_name())
    }
}

type HostFnBody = dyn Fn(&mut Frame<'_>, Vec<HostValue>) -> Result<HostValue>;

/// Host closure callable from script code.
#[derive(Clone)]
pub struct HostFn(Rc<HostFnBody>);

impl HostFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, Vec<HostValue>) -> Result<HostValue> + 'static,
    {
        HostFn(Rc::new(f))
    }

    pub fn call(&self, frame: &mut Frame<'_>, args: Vec<HostValue>) -> Result<HostValue> {
        (self.0)(frame, args)
    }

    pub fn ptr_eq(&self, other: &HostFn) -> bool {
        self.identity() == other.identity()
    }

    pub(crate) fn identity(&self) -> HostKey {
        Rc::as_ptr(&self.0) as *const () as HostKey
    }
}

impl fmt::Debug for HostFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFn")
    }
}
