//! Property resolution policy for host-object proxies.
//!
//! A script property access on a host proxy is answered by the first
//! capability of the host object that claims the name. The planning functions
//! here only decide; the proxy traps carry the decision out.

use crate::bridge::host::{setter_name, HostObject, MethodSig};
use crate::bridge::value::HostValue;

/// How a property read is answered.
#[derive(Debug)]
pub(crate) enum GetPlan {
    /// Zero-argument method without block: invoke and return its result.
    Invoke,
    /// Any other method: return a callable bound to the object.
    Bound(MethodSig),
    /// The indexer holds the key.
    Index(HostValue),
    /// Named constant or nested class.
    Constant(HostValue),
    /// `new` on a constructible object: return a constructing callable.
    New,
    /// Ad-hoc attribute or inherited member of the proxy, else `undefined`.
    Fallback,
}

/// How a property write is answered.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SetPlan {
    /// Invoke the named one-argument setter.
    Setter(String),
    Index,
    /// Frozen object with nowhere to store the value.
    Frozen,
    /// Store on the proxy, visible to this instance only.
    AdHoc,
}

pub(crate) fn plan_get(object: &dyn HostObject, name: &str) -> GetPlan {
    if let Some(sig) = object.method(name) {
        return if sig.is_reader() {
            GetPlan::Invoke
        } else {
            GetPlan::Bound(sig)
        };
    }
    if let Some(indexer) = object.indexer() {
        if indexer.has_key(name) {
            if let Some(value) = indexer.get(name) {
                return GetPlan::Index(value);
            }
        }
    }
    if let Some(value) = object.constant(name) {
        return GetPlan::Constant(value);
    }
    if name == "new" && object.constructor().is_some() {
        return GetPlan::New;
    }
    GetPlan::Fallback
}

pub(crate) fn plan_set(object: &dyn HostObject, name: &str) -> SetPlan {
    let setter = setter_name(name);
    if object.method(&setter).map_or(false, |sig| sig.is_setter()) {
        return SetPlan::Setter(setter);
    }
    if object.indexer().map_or(false, |indexer| indexer.is_writable()) {
        return SetPlan::Index;
    }
    if object.frozen() {
        SetPlan::Frozen
    } else {
        SetPlan::AdHoc
    }
}

/// Whether the host object itself claims `name` (ad-hoc attributes excluded).
pub(crate) fn has_member(object: &dyn HostObject, name: &str) -> bool {
    object.method(name).is_some()
        || object.indexer().map_or(false, |indexer| indexer.has_key(name))
        || object.constant(name).is_some()
        || (name == "new" && object.constructor().is_some())
}
