//! Dynamic object protocol implemented by host values that cross into script code.
//!
//! A host object does not expose a fixed layout. Instead the proxy probes it
//! for capabilities, in a fixed order, whenever script code touches a
//! property:
//!
//! 1. [`HostObject::method`] reports a method signature for a name.
//! 2. [`HostObject::indexer`] exposes keyed storage (`obj[key]`).
//! 3. [`HostObject::constant`] exposes named constants, nested classes included.
//! 4. [`HostObject::constructor`] makes the object constructible (`new V(...)`).
//!
//! Anything the object does not claim falls through to ad-hoc attributes kept
//! on the script side of the proxy.
//!
//! ```ignore
//! struct Counter(Cell<i64>);
//!
//! impl HostObject for Counter {
//!     fn class_name(&self) -> &str { "Counter" }
//!     fn method(&self, name: &str) -> Option<MethodSig> {
//!         match name {
//!             "count" => Some(MethodSig::exact(0)),
//!             "bump" => Some(MethodSig::exact(1)),
//!             _ => None,
//!         }
//!     }
//!     fn invoke(&self, _frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
//!         match name {
//!             "count" => Ok(self.0.get().into()),
//!             "bump" => { self.0.set(self.0.get() + call.int(0)?); Ok(HostValue::Nil) }
//!             _ => Err(no_method(self, name)),
//!         }
//!     }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//! ```

use std::any::Any;
use std::fmt;

use crate::bridge::call::{Call, Frame};
use crate::bridge::error::{Error, Result};
use crate::bridge::value::HostValue;

/// How many positional arguments a method accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, given: usize) -> bool {
        match *self {
            Arity::Exact(n) => given == n,
            Arity::AtLeast(n) => given >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "{}+", n),
        }
    }
}

/// Signature reported by [`HostObject::method`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSig {
    pub arity: Arity,
    /// A trailing script function is passed as the call's block instead of
    /// as a positional argument.
    pub takes_block: bool,
}

impl MethodSig {
    pub fn exact(n: usize) -> Self {
        MethodSig {
            arity: Arity::Exact(n),
            takes_block: false,
        }
    }

    pub fn variadic(min: usize) -> Self {
        MethodSig {
            arity: Arity::AtLeast(min),
            takes_block: false,
        }
    }

    pub fn with_block(mut self) -> Self {
        self.takes_block = true;
        self
    }

    /// A plain reader: property access invokes it instead of returning a callable.
    pub fn is_reader(&self) -> bool {
        self.arity == Arity::Exact(0) && !self.takes_block
    }

    /// A setter (`name=`) must take exactly one argument.
    pub fn is_setter(&self) -> bool {
        self.arity == Arity::Exact(1) && !self.takes_block
    }
}

/// Keyed storage exposed by a host object (`obj[key]`, and `obj.key` when no
/// method of that name exists).
pub trait Indexer {
    fn has_key(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Option<HostValue>;

    /// Write through the indexer. Only consulted when [`Indexer::is_writable`] holds.
    fn set(&self, _frame: &mut Frame<'_>, key: &str, _value: HostValue) -> Result<()> {
        Err(Error::Type(format!("cannot assign to '{}': indexer is read-only", key)))
    }

    fn is_writable(&self) -> bool {
        false
    }
}

/// Construction capability of a host class.
pub trait Constructor {
    fn arity(&self) -> Arity;

    /// Builds a new instance from already-marshaled arguments.
    fn construct(&self, frame: &mut Frame<'_>, args: Vec<HostValue>) -> Result<HostValue>;
}

/// A host value with behavior, reachable from script code through a proxy.
pub trait HostObject: Any {
    /// Name used in error messages and as the script-side function name of classes.
    fn class_name(&self) -> &str;

    /// Signature of the method `name`, if the object responds to it.
    ///
    /// Setters are reported under `name=`.
    fn method(&self, _name: &str) -> Option<MethodSig> {
        None
    }

    /// Invokes a method previously reported by [`HostObject::method`].
    ///
    /// Arity has already been checked and a trailing block split off.
    fn invoke(&self, _frame: &mut Frame<'_>, name: &str, _call: Call) -> Result<HostValue> {
        Err(no_method(self, name))
    }

    fn indexer(&self) -> Option<&dyn Indexer> {
        None
    }

    /// Named constant, including nested classes and modules.
    fn constant(&self, _name: &str) -> Option<HostValue> {
        None
    }

    fn constructor(&self) -> Option<&dyn Constructor> {
        None
    }

    /// A frozen object rejects ad-hoc attributes.
    fn frozen(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// The error raised when `name` is not a method of `object`.
pub fn no_method<T: HostObject + ?Sized>(object: &T, name: &str) -> Error {
    Error::NoMethod {
        class: object.class_name().to_string(),
        method: name.to_string(),
    }
}

/// Name under which the setter for `property` is reported.
pub fn setter_name(property: &str) -> String {
    format!("{}=", property)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert_eq!(Arity::AtLeast(1).to_string(), "1+");
    }

    #[test]
    fn test_reader_and_setter_shapes() {
        assert!(MethodSig::exact(0).is_reader());
        assert!(!MethodSig::exact(0).with_block().is_reader());
        assert!(!MethodSig::variadic(0).is_reader());
        assert!(MethodSig::exact(1).is_setter());
        assert!(!MethodSig::exact(2).is_setter());
        assert_eq!(setter_name("bar"), "bar=");
    }
}
