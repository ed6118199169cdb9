//! Host-side handles on script objects, arrays and functions.
//!
//! A [`ScriptRef`] keeps its script object alive and forwards attribute
//! access, indexing and invocation to the engine. Handles are registered in
//! the identity registry, so the same script object always comes back as the
//! same handle while one is alive.
//!
//! `ScriptRef` methods borrow the owning runtime. From inside a host method
//! called by script code the runtime is already borrowed and these methods
//! return [`Error::ContextBusy`]; use the [`Frame`](crate::bridge::call::Frame)
//! passed to the method instead.

use std::collections::BTreeMap;
use std::fmt;
use std::mem::ManuallyDrop;
use std::rc::{Rc, Weak};

use boa_engine::{Context, JsObject, JsString, JsValue};
use log::trace;
use uuid::Uuid;

use crate::bridge::error::{Error, Result};
use crate::bridge::marshal::{self, string_of};
use crate::bridge::registry::{Lookup, Reclaim, ReclaimQueue};
use crate::bridge::runtime::{self, Shared};
use crate::bridge::value::HostValue;

/// Shape of a script object, fixed when the handle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Object,
    Array,
    Function,
}

pub(crate) struct ScriptInner {
    /// Only taken in `drop`.
    object: ManuallyDrop<JsObject>,
    kind: ScriptKind,
    serial: u64,
    runtime: Uuid,
    shared: Weak<Shared>,
    queue: Rc<ReclaimQueue>,
}

// A handle may be dropped while the engine collector sweeps, for instance
// from a host closure owned by a dead proxy. Engine pointers must not be
// touched then, so the object is moved into the death report untouched and
// released when the runtime drains its queue.
impl Drop for ScriptInner {
    fn drop(&mut self) {
        // SAFETY: `object` is never used again after this point.
        let object = unsafe { ManuallyDrop::take(&mut self.object) };
        self.queue.push(Reclaim::Script {
            object,
            serial: self.serial,
        });
    }
}

/// Handle on a script object owned by a runtime.
#[derive(Clone)]
pub struct ScriptRef(Rc<ScriptInner>);

impl ScriptRef {
    pub(crate) fn from_inner(inner: Rc<ScriptInner>) -> Self {
        ScriptRef(inner)
    }

    pub fn kind(&self) -> ScriptKind {
        self.0.kind
    }

    pub fn is_callable(&self) -> bool {
        self.0.kind == ScriptKind::Function
    }

    pub fn is_array(&self) -> bool {
        self.0.kind == ScriptKind::Array
    }

    /// Id of the runtime owning the object.
    pub fn runtime_id(&self) -> Uuid {
        self.0.runtime
    }

    pub(crate) fn object(&self) -> &JsObject {
        &self.0.object
    }

    pub(crate) fn belongs_to(&self, shared: &Rc<Shared>) -> bool {
        self.0.runtime == shared.id
    }

    fn with_context<T>(&self, f: impl FnOnce(&Rc<Shared>, &mut Context) -> Result<T>) -> Result<T> {
        let shared = self.0.shared.upgrade().ok_or(Error::RuntimeDropped)?;
        runtime::enter(&shared, f)
    }

    /// Reads property `name`.
    pub fn get(&self, name: &str) -> Result<HostValue> {
        self.with_context(|shared, ctx| get_in(shared, ctx, &self.0.object, name))
    }

    /// Writes property `name`.
    pub fn set(&self, name: &str, value: impl Into<HostValue>) -> Result<()> {
        let value = value.into();
        self.with_context(|shared, ctx| set_in(shared, ctx, &self.0.object, name, &value))
    }

    /// Whether property `name` exists, own or inherited.
    pub fn contains(&self, name: &str) -> Result<bool> {
        self.with_context(|shared, ctx| {
            self.0
                .object
                .has_property(JsString::from(name), ctx)
                .map_err(|e| marshal::error_from_js(shared, e, ctx))
        })
    }

    pub fn get_index(&self, index: usize) -> Result<HostValue> {
        self.with_context(|shared, ctx| {
            let value = self
                .0
                .object
                .get(index, ctx)
                .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
            marshal::from_js(shared, &value, ctx)
        })
    }

    pub fn set_index(&self, index: usize, value: impl Into<HostValue>) -> Result<()> {
        let value = value.into();
        self.with_context(|shared, ctx| {
            let value = marshal::to_js(shared, &value, ctx)?;
            self.0
                .object
                .set(index, value, true, ctx)
                .map(|_| ())
                .map_err(|e| marshal::error_from_js(shared, e, ctx))
        })
    }

    /// The `length` property.
    pub fn len(&self) -> Result<usize> {
        self.with_context(|shared, ctx| {
            let length = self
                .0
                .object
                .get(JsString::from("length"), ctx)
                .and_then(|v| v.to_length(ctx))
                .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
            Ok(length as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Own enumerable property names.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.with_context(|shared, ctx| keys_in(shared, ctx, &self.0.object))
    }

    /// Invokes the function with the global object as receiver.
    pub fn call(&self, args: Vec<HostValue>) -> Result<HostValue> {
        self.with_context(|shared, ctx| {
            let this = JsValue::from(ctx.global_object());
            call_in(shared, ctx, &self.0.object, &this, &args)
        })
    }

    /// Invokes the function with `this` as receiver for this call only.
    pub fn call_using(&self, this: &HostValue, args: Vec<HostValue>) -> Result<HostValue> {
        self.with_context(|shared, ctx| {
            let this = marshal::to_js(shared, this, ctx)?;
            call_in(shared, ctx, &self.0.object, &this, &args)
        })
    }

    /// Copies the elements of an array-like.
    pub fn to_list(&self) -> Result<Vec<HostValue>> {
        self.with_context(|shared, ctx| list_in(shared, ctx, &self.0.object))
    }

    /// Copies the own enumerable properties.
    pub fn to_record(&self) -> Result<BTreeMap<String, HostValue>> {
        self.with_context(|shared, ctx| record_in(shared, ctx, &self.0.object))
    }
}

impl PartialEq for ScriptRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.runtime == other.0.runtime && self.0.object == other.0.object
    }
}

impl fmt::Debug for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptRef({:?} #{})", self.0.kind, self.0.serial)
    }
}

/// Returns the handle of a script object, creating it on first crossing.
pub(crate) fn wrap(shared: &Rc<Shared>, object: JsObject) -> Result<ScriptRef> {
    shared.drain_reclaims();
    let lookup = shared.registry.borrow().lookup_script(&object);
    if let Lookup::Live(found) = lookup {
        return Ok(found);
    }

    let kind = if object.is_callable() {
        ScriptKind::Function
    } else if object.is_array() {
        ScriptKind::Array
    } else {
        ScriptKind::Object
    };
    let serial = shared.registry.borrow_mut().next_serial();
    let inner = Rc::new(ScriptInner {
        object: ManuallyDrop::new(object.clone()),
        kind,
        serial,
        runtime: shared.id,
        shared: Rc::downgrade(shared),
        queue: shared.reclaims.clone(),
    });
    shared
        .registry
        .borrow_mut()
        .insert_script(object, lookup.observed(), serial, &inner)?;
    trace!("created host proxy #{} for script {:?}", serial, kind);
    Ok(ScriptRef(inner))
}

pub(crate) fn get_in(shared: &Rc<Shared>, ctx: &mut Context, object: &JsObject, name: &str) -> Result<HostValue> {
    let value = object
        .get(JsString::from(name), ctx)
        .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
    marshal::from_js(shared, &value, ctx)
}

pub(crate) fn set_in(shared: &Rc<Shared>, ctx: &mut Context, object: &JsObject, name: &str, value: &HostValue) -> Result<()> {
    let value = marshal::to_js(shared, value, ctx)?;
    object
        .set(JsString::from(name), value, true, ctx)
        .map(|_| ())
        .map_err(|e| marshal::error_from_js(shared, e, ctx))
}

pub(crate) fn call_in(
    shared: &Rc<Shared>,
    ctx: &mut Context,
    function: &JsObject,
    this: &JsValue,
    args: &[HostValue],
) -> Result<HostValue> {
    if !function.is_callable() {
        return Err(Error::Type("script value is not a function".to_string()));
    }
    let args = marshal::to_js_args(shared, args, ctx)?;
    let result = function
        .call(this, &args, ctx)
        .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
    marshal::from_js(shared, &result, ctx)
}

pub(crate) fn list_in(shared: &Rc<Shared>, ctx: &mut Context, object: &JsObject) -> Result<Vec<HostValue>> {
    let values = marshal::array_values(object, ctx).map_err(|e| marshal::error_from_js(shared, e, ctx))?;
    marshal::from_js_args(shared, &values, ctx)
}

pub(crate) fn keys_in(shared: &Rc<Shared>, ctx: &mut Context, object: &JsObject) -> Result<Vec<String>> {
    let keys = shared
        .intrinsics
        .object_keys
        .call(&JsValue::undefined(), &[object.clone().into()], ctx)
        .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
    let keys = match marshal::object_of(&keys) {
        Some(keys) => marshal::array_values(&keys, ctx).map_err(|e| marshal::error_from_js(shared, e, ctx))?,
        None => Vec::new(),
    };
    Ok(keys.iter().filter_map(string_of).collect())
}

pub(crate) fn record_in(shared: &Rc<Shared>, ctx: &mut Context, object: &JsObject) -> Result<BTreeMap<String, HostValue>> {
    let mut record = BTreeMap::new();
    for key in keys_in(shared, ctx, object)? {
        let value = get_in(shared, ctx, object, &key)?;
        record.insert(key, value);
    }
    Ok(record)
}
