//! One-shot scope injection (`with`-style evaluation).
//!
//! The scope object is parked under a unique global slot for the duration of
//! the evaluation, the source is wrapped in `with (slot) { ... }`, and the
//! slot is removed again whether or not the evaluation succeeded.
//!
//! `with` is not allowed in strict code, and a `'use strict'` directive would
//! lose its meaning inside the wrapping block, so strict sources are rejected.

use std::collections::BTreeMap;
use std::rc::Rc;

use boa_engine::{Context, JsString, JsValue, Source};
use log::{trace, warn};
use uuid::Uuid;

use crate::bridge::call::Frame;
use crate::bridge::error::{Error, Result};
use crate::bridge::marshal;
use crate::bridge::runtime::Shared;
use crate::bridge::value::{HostFn, HostRef, HostValue};

/// Bindings visible to exactly one evaluation.
#[derive(Debug, Clone)]
pub enum ScopeFrame {
    /// Ordered name/value pairs; later bindings shadow earlier ones.
    Bindings(Vec<(String, HostValue)>),
    /// A host object (its methods and indexer keys become bindings) or a
    /// script object.
    Object(HostValue),
}

impl ScopeFrame {
    pub fn new() -> Self {
        ScopeFrame::Bindings(Vec::new())
    }

    /// Adds a binding. Turns an object scope into its own single binding list.
    pub fn bind(self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        let mut bindings = match self {
            ScopeFrame::Bindings(bindings) => bindings,
            ScopeFrame::Object(_) => Vec::new(),
        };
        bindings.push((name.into(), value.into()));
        ScopeFrame::Bindings(bindings)
    }

    /// Adds a host closure as a binding.
    pub fn bind_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Frame<'_>, Vec<HostValue>) -> Result<HostValue> + 'static,
    {
        self.bind(name, HostFn::new(f))
    }
}

impl Default for ScopeFrame {
    fn default() -> Self {
        ScopeFrame::new()
    }
}

impl From<Vec<(String, HostValue)>> for ScopeFrame {
    fn from(bindings: Vec<(String, HostValue)>) -> Self {
        ScopeFrame::Bindings(bindings)
    }
}

impl From<BTreeMap<String, HostValue>> for ScopeFrame {
    fn from(map: BTreeMap<String, HostValue>) -> Self {
        ScopeFrame::Bindings(map.into_iter().collect())
    }
}

impl From<HostRef> for ScopeFrame {
    fn from(object: HostRef) -> Self {
        ScopeFrame::Object(HostValue::Object(object))
    }
}

impl From<HostValue> for ScopeFrame {
    fn from(value: HostValue) -> Self {
        match value {
            HostValue::Record(map) => map.into(),
            other => ScopeFrame::Object(other),
        }
    }
}

fn scope_object(shared: &Rc<Shared>, frame: &ScopeFrame, ctx: &mut Context) -> Result<JsValue> {
    match frame {
        ScopeFrame::Bindings(bindings) => {
            let mut map = BTreeMap::new();
            for (name, value) in bindings {
                map.insert(name.clone(), value.clone());
            }
            marshal::record_to_js(shared, &map, ctx).map(JsValue::from)
        }
        ScopeFrame::Object(value) => {
            let object = marshal::to_js(shared, value, ctx)?;
            if object.is_object() {
                Ok(object)
            } else {
                Err(Error::Type(format!("{} cannot be used as a scope", value.type_name())))
            }
        }
    }
}

/// Evaluates `source` with the members of `frame` as bindings.
pub(crate) fn evaluate_with(shared: &Rc<Shared>, ctx: &mut Context, source: &str, frame: &ScopeFrame) -> Result<JsValue> {
    if declares_strict(source) {
        return Err(Error::Type(
            "strict mode source cannot be evaluated with a scope".to_string(),
        ));
    }
    let scope = scope_object(shared, frame, ctx)?;
    let slot = format!("__scope_{}", Uuid::new_v4().to_simple());
    let global = ctx.global_object();
    global
        .create_data_property_or_throw(JsString::from(slot.as_str()), scope, ctx)
        .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
    trace!("evaluating with scope slot {}", slot);

    let wrapped = format!("with ({}) {{\n{}\n}}", slot, source);
    let result = ctx.eval(Source::from_bytes(&wrapped));

    if let Err(e) = global.delete_property_or_throw(JsString::from(slot.as_str()), ctx) {
        warn!("could not remove scope slot {}: {}", slot, e);
    }
    result.map_err(|e| marshal::error_from_js(shared, e, ctx))
}

/// Whether the directive prologue of `source` contains `'use strict'`.
fn declares_strict(source: &str) -> bool {
    let mut rest = source;
    loop {
        rest = skip_trivia(rest);
        let quote = match rest.chars().next() {
            Some(quote @ ('\'' | '"')) => quote,
            _ => return false,
        };
        let end = match rest[1..].find(quote) {
            Some(i) => i + 1,
            None => return false,
        };
        if &rest[1..end] == "use strict" {
            return true;
        }
        rest = skip_trivia(&rest[end + 1..]);
        rest = rest.strip_prefix(';').unwrap_or(rest);
    }
}

/// Skips whitespace and comments.
fn skip_trivia(mut source: &str) -> &str {
    loop {
        source = source.trim_start();
        if let Some(after) = source.strip_prefix("//") {
            source = after.find('\n').map_or("", |i| &after[i..]);
        } else if let Some(after) = source.strip_prefix("/*") {
            source = after.find("*/").map_or("", |i| &after[i + 2..]);
        } else {
            return source;
        }
    }
}
