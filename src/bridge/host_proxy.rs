//! Script-side proxies for host objects, classes and functions.
//!
//! Each host value that crosses into a runtime is represented by one engine
//! `Proxy`. Its target is a plain object (instances) or a native function
//! (classes and host functions, so that `typeof`, calls and `new` behave),
//! and also stores ad-hoc attributes assigned from script code. Its handler
//! is a native object carrying a [`HostCell`]; the trap functions live on a
//! handler prototype shared by every proxy of the runtime.
//!
//! The handler is collected together with the proxy. Its finalizer queues
//! the registry entry for removal. It also caches the functions handed out
//! for bound methods and `Class.new`, so that `obj.m === obj.m` holds.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use boa_engine::object::{FunctionObjectBuilder, ObjectInitializer};
use boa_engine::{
    js_string, Context, JsArgs, JsData, JsNativeError, JsObject, JsResult, JsString, JsValue,
    NativeFunction,
};
use boa_gc::{custom_trace, empty_trace, Finalize, Gc, GcRefCell, Trace};
use log::debug;

use crate::bridge::call::{self, Frame};
use crate::bridge::error::{Error, Result};
use crate::bridge::host::{Arity, MethodSig};
use crate::bridge::marshal::{self, object_of};
use crate::bridge::registry::{Lookup, ProxySlot, Reclaim, ReclaimQueue};
use crate::bridge::resolve::{self, GetPlan, SetPlan};
use crate::bridge::runtime::Shared;
use crate::bridge::value::{HostKey, HostRef, HostValue};

/// Handler data of a host proxy.
#[derive(JsData)]
pub(crate) struct HostCell {
    value: HostValue,
    key: HostKey,
    serial: u64,
    queue: Rc<ReclaimQueue>,
    shared: Weak<Shared>,
    members: GcRefCell<HashMap<String, JsObject>>,
    /// Lets the registry find the proxy without keeping it alive.
    slot: Gc<ProxySlot>,
}

impl Finalize for HostCell {
    fn finalize(&self) {
        self.queue.push(Reclaim::Host {
            key: self.key,
            serial: self.serial,
        });
    }
}

// SAFETY: `members` and `slot` are the only engine data owned by the cell.
// Script handles reachable through `value` are shared with host code, count
// as roots and are released through the reclamation queue, never traced.
unsafe impl Trace for HostCell {
    custom_trace!(this, mark, {
        mark(&this.members);
        mark(&this.slot);
    });
}

/// Builds the handler prototype holding the trap functions.
pub(crate) fn handler_prototype(ctx: &mut Context) -> JsObject {
    ObjectInitializer::new(ctx)
        .function(NativeFunction::from_fn_ptr(trap_get), js_string!("get"), 3)
        .function(NativeFunction::from_fn_ptr(trap_set), js_string!("set"), 4)
        .function(NativeFunction::from_fn_ptr(trap_has), js_string!("has"), 2)
        .function(NativeFunction::from_fn_ptr(trap_apply), js_string!("apply"), 3)
        .function(NativeFunction::from_fn_ptr(trap_construct), js_string!("construct"), 3)
        .build()
}

/// Returns the proxy of a host object or function, creating it on first crossing.
pub(crate) fn proxy_for(shared: &Rc<Shared>, value: &HostValue, ctx: &mut Context) -> Result<JsObject> {
    let key = value
        .identity()
        .ok_or_else(|| Error::Type(format!("{} does not cross by proxy", value.type_name())))?;
    shared.drain_reclaims();

    let lookup = shared.registry.borrow().lookup_host(key);
    if let Lookup::Live(proxy) = lookup {
        return Ok(proxy);
    }

    let serial = shared.registry.borrow_mut().next_serial();
    let slot = ProxySlot::new();
    let target = proxy_target(value, ctx);
    let handler = JsObject::from_proto_and_data(
        shared.intrinsics.handler_proto.clone(),
        HostCell {
            value: value.clone(),
            key,
            serial,
            queue: shared.reclaims.clone(),
            shared: Rc::downgrade(shared),
            members: GcRefCell::new(HashMap::new()),
            slot: slot.clone(),
        },
    );
    let proxy = shared
        .intrinsics
        .proxy
        .construct(&[target.into(), handler.into()], None, ctx)
        .map_err(|e| Error::Engine(e.to_string()))?;
    slot.fill(&proxy);
    shared
        .registry
        .borrow_mut()
        .insert_host(key, lookup.observed(), serial, &slot)?;
    debug!("created script proxy #{} for {}", serial, value);
    Ok(proxy)
}

/// The host value behind a proxy of this runtime, if `object` is one.
pub(crate) fn unwrap(shared: &Rc<Shared>, object: &JsObject, ctx: &mut Context) -> Result<Option<HostValue>> {
    let handler = object
        .get(shared.intrinsics.unwrap_key.clone(), ctx)
        .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
    let handler = match object_of(&handler) {
        Some(handler) => handler,
        None => return Ok(None),
    };
    let value = handler.downcast_ref::<HostCell>().map(|cell| cell.value.clone());
    Ok(value)
}

/// The script-side target: a function for constructible and callable values.
fn proxy_target(value: &HostValue, ctx: &mut Context) -> JsObject {
    match value {
        HostValue::Object(object) => match object.constructor() {
            Some(ctor) => {
                let length = match ctor.arity() {
                    Arity::Exact(n) | Arity::AtLeast(n) => n,
                };
                FunctionObjectBuilder::new(ctx.realm(), NativeFunction::from_fn_ptr(inert))
                    .name(JsString::from(object.class_name()))
                    .length(length)
                    .constructor(true)
                    .build()
                    .into()
            }
            None => JsObject::with_object_proto(ctx.intrinsics()),
        },
        HostValue::Function(_) => {
            FunctionObjectBuilder::new(ctx.realm(), NativeFunction::from_fn_ptr(inert))
                .name(js_string!(""))
                .length(0)
                .constructor(false)
                .build()
                .into()
        }
        _ => JsObject::with_object_proto(ctx.intrinsics()),
    }
}

/// Body of proxy targets; never reached because the traps intercept calls.
fn inert(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    Ok(JsValue::undefined())
}

fn cell(this: &JsValue) -> JsResult<(HostValue, Rc<Shared>)> {
    let handler = object_of(this)
        .ok_or_else(|| JsNativeError::typ().with_message("host proxy trap called without handler"))?;
    let cell = handler
        .downcast_ref::<HostCell>()
        .ok_or_else(|| JsNativeError::typ().with_message("host proxy trap called on foreign handler"))?;
    let shared = cell
        .shared
        .upgrade()
        .ok_or_else(|| JsNativeError::error().with_message("runtime has been dropped"))?;
    Ok((cell.value.clone(), shared))
}

fn target_of(args: &[JsValue]) -> JsResult<JsObject> {
    object_of(args.get_or_undefined(0))
        .ok_or_else(|| JsNativeError::typ().with_message("host proxy target is not an object").into())
}

fn trap_get(this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let target = target_of(args)?;
    let key = args.get_or_undefined(1).clone();
    let (value, shared) = cell(this)?;
    if let Some(symbol) = key.as_symbol() {
        if symbol == shared.intrinsics.unwrap_key {
            return Ok(this.clone());
        }
        return target.get(symbol, ctx);
    }
    let name = key.to_string(ctx)?.to_std_string_escaped();
    let handler = object_of(this)
        .ok_or_else(|| JsNativeError::typ().with_message("host proxy trap called without handler"))?;
    get_member(&shared, &handler, &value, &target, &name, ctx).map_err(|e| marshal::throw(&shared, e, ctx))
}

fn get_member(
    shared: &Rc<Shared>,
    handler: &JsObject,
    value: &HostValue,
    target: &JsObject,
    name: &str,
    ctx: &mut Context,
) -> Result<JsValue> {
    let object = match value {
        HostValue::Object(object) => object,
        _ => return target_get(shared, target, name, ctx),
    };
    match resolve::plan_get(&**object, name) {
        GetPlan::Invoke => invoke_method(shared, object, name, &[], ctx),
        GetPlan::Bound(sig) => {
            let function = member_function(handler, name, || bound_method(shared, object, name, sig, ctx));
            Ok(function.into())
        }
        GetPlan::Index(found) | GetPlan::Constant(found) => marshal::to_js(shared, &found, ctx),
        GetPlan::New => {
            let function = member_function(handler, "new", || constructing_function(shared, object, ctx));
            Ok(function.into())
        }
        GetPlan::Fallback => target_get(shared, target, name, ctx),
    }
}

/// The function cached under `name` on the handler, built on first read.
fn member_function(handler: &JsObject, name: &str, build: impl FnOnce() -> JsObject) -> JsObject {
    if let Some(found) = cached_member(handler, name) {
        return found;
    }
    let function = build();
    if let Some(cell) = handler.downcast_ref::<HostCell>() {
        cell.members.borrow_mut().insert(name.to_string(), function.clone());
    }
    function
}

fn cached_member(handler: &JsObject, name: &str) -> Option<JsObject> {
    let cell = handler.downcast_ref::<HostCell>()?;
    let members = cell.members.borrow();
    members.get(name).cloned()
}

fn target_get(shared: &Rc<Shared>, target: &JsObject, name: &str, ctx: &mut Context) -> Result<JsValue> {
    target
        .get(JsString::from(name), ctx)
        .map_err(|e| marshal::error_from_js(shared, e, ctx))
}

fn trap_set(this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let target = target_of(args)?;
    let key = args.get_or_undefined(1).clone();
    let assigned = args.get_or_undefined(2).clone();
    let (value, shared) = cell(this)?;
    if let Some(symbol) = key.as_symbol() {
        return target.set(symbol, assigned, false, ctx).map(JsValue::from);
    }
    let name = key.to_string(ctx)?.to_std_string_escaped();
    set_member(&shared, &value, &target, &name, assigned, ctx)
        .map(|_| JsValue::from(true))
        .map_err(|e| marshal::throw(&shared, e, ctx))
}

fn set_member(
    shared: &Rc<Shared>,
    value: &HostValue,
    target: &JsObject,
    name: &str,
    assigned: JsValue,
    ctx: &mut Context,
) -> Result<()> {
    let object = match value {
        HostValue::Object(object) => object,
        _ => return set_ad_hoc(shared, target, name, assigned, ctx),
    };
    match resolve::plan_set(&**object, name) {
        SetPlan::Setter(setter) => {
            let arg = marshal::from_js(shared, &assigned, ctx)?;
            let mut frame = Frame::new(shared.clone(), ctx);
            call::dispatch(&mut frame, object, &setter, vec![arg]).map(|_| ())
        }
        SetPlan::Index => {
            let arg = marshal::from_js(shared, &assigned, ctx)?;
            let mut frame = Frame::new(shared.clone(), ctx);
            match object.indexer() {
                Some(indexer) => indexer.set(&mut frame, name, arg),
                None => Ok(()),
            }
        }
        SetPlan::Frozen => Err(Error::Type(format!(
            "cannot add attribute '{}' to frozen {}",
            name,
            object.class_name()
        ))),
        SetPlan::AdHoc => set_ad_hoc(shared, target, name, assigned, ctx),
    }
}

fn set_ad_hoc(shared: &Rc<Shared>, target: &JsObject, name: &str, assigned: JsValue, ctx: &mut Context) -> Result<()> {
    target
        .set(JsString::from(name), assigned, true, ctx)
        .map(|_| ())
        .map_err(|e| marshal::error_from_js(shared, e, ctx))
}

fn trap_has(this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let target = target_of(args)?;
    let key = args.get_or_undefined(1).clone();
    let (value, _shared) = cell(this)?;
    if let Some(symbol) = key.as_symbol() {
        return target.has_property(symbol, ctx).map(JsValue::from);
    }
    let name = key.to_string(ctx)?.to_std_string_escaped();
    let claimed = match &value {
        HostValue::Object(object) => resolve::has_member(&**object, &name),
        _ => false,
    };
    if claimed {
        return Ok(JsValue::from(true));
    }
    target.has_property(JsString::from(name.as_str()), ctx).map(JsValue::from)
}

fn trap_apply(this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let (value, shared) = cell(this)?;
    let arguments = match object_of(args.get_or_undefined(2)) {
        Some(list) => marshal::array_values(&list, ctx)?,
        None => Vec::new(),
    };
    apply(&shared, &value, &arguments, ctx).map_err(|e| marshal::throw(&shared, e, ctx))
}

fn apply(shared: &Rc<Shared>, value: &HostValue, arguments: &[JsValue], ctx: &mut Context) -> Result<JsValue> {
    match value {
        HostValue::Function(function) => {
            let args = marshal::from_js_args(shared, arguments, ctx)?;
            let result = {
                let mut frame = Frame::new(shared.clone(), ctx);
                function.call(&mut frame, args)?
            };
            marshal::to_js(shared, &result, ctx)
        }
        HostValue::Object(object) if object.method("call").is_some() => {
            invoke_method(shared, object, "call", arguments, ctx)
        }
        HostValue::Object(object) => Err(Error::Type(format!(
            "{} is not a function; use new {}(...)",
            object.class_name(),
            object.class_name()
        ))),
        other => Err(Error::Type(format!("{} is not a function", other.type_name()))),
    }
}

fn trap_construct(this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let (value, shared) = cell(this)?;
    let arguments = match object_of(args.get_or_undefined(1)) {
        Some(list) => marshal::array_values(&list, ctx)?,
        None => Vec::new(),
    };
    let class = match value {
        HostValue::Object(object) => object,
        other => {
            return Err(JsNativeError::typ()
                .with_message(format!("{} is not a constructor", other.type_name()))
                .into())
        }
    };
    construct(&shared, &class, &arguments, ctx).map_err(|e| marshal::throw(&shared, e, ctx))
}

/// Builds an instance of a host class; the result always crosses as an object.
fn construct(shared: &Rc<Shared>, class: &HostRef, arguments: &[JsValue], ctx: &mut Context) -> Result<JsValue> {
    let ctor = class
        .constructor()
        .ok_or_else(|| Error::Type(format!("{} is not a constructor", class.class_name())))?;
    let args = marshal::from_js_args(shared, arguments, ctx)?;
    let sig = MethodSig {
        arity: ctor.arity(),
        takes_block: false,
    };
    call::check_arity("new", sig, args.len())?;
    let instance = {
        let mut frame = Frame::new(shared.clone(), ctx);
        ctor.construct(&mut frame, args)?
    };
    let result = marshal::to_js(shared, &instance, ctx)?;
    if result.is_object() {
        Ok(result)
    } else {
        Err(Error::Type(format!(
            "{} constructor returned {}",
            class.class_name(),
            instance.type_name()
        )))
    }
}

fn invoke_method(shared: &Rc<Shared>, object: &HostRef, name: &str, arguments: &[JsValue], ctx: &mut Context) -> Result<JsValue> {
    let args = marshal::from_js_args(shared, arguments, ctx)?;
    let result = {
        let mut frame = Frame::new(shared.clone(), ctx);
        call::dispatch(&mut frame, object, name, args)?
    };
    marshal::to_js(shared, &result, ctx)
}

#[derive(Finalize)]
struct MethodCapture {
    object: HostRef,
    name: String,
    shared: Weak<Shared>,
}

// SAFETY: only host data is captured. Script handles owned by `object`
// are released through the reclamation queue, never traced.
unsafe impl Trace for MethodCapture {
    empty_trace!();
}

fn upgrade(shared: &Weak<Shared>) -> JsResult<Rc<Shared>> {
    shared
        .upgrade()
        .ok_or_else(|| JsNativeError::error().with_message("runtime has been dropped").into())
}

/// A script function invoking `name` on `object`, whatever its receiver.
fn bound_method(shared: &Rc<Shared>, object: &HostRef, name: &str, sig: MethodSig, ctx: &mut Context) -> JsObject {
    let length = match sig.arity {
        Arity::Exact(n) | Arity::AtLeast(n) => n,
    };
    let function = NativeFunction::from_copy_closure_with_captures(
        |_this, args, capture: &MethodCapture, ctx| {
            let shared = upgrade(&capture.shared)?;
            invoke_method(&shared, &capture.object, &capture.name, args, ctx)
                .map_err(|e| marshal::throw(&shared, e, ctx))
        },
        MethodCapture {
            object: object.clone(),
            name: name.to_string(),
            shared: Rc::downgrade(shared),
        },
    );
    FunctionObjectBuilder::new(ctx.realm(), function)
        .name(JsString::from(name))
        .length(length)
        .constructor(false)
        .build()
        .into()
}

/// `Class.new`: a script function constructing instances of `class`.
fn constructing_function(shared: &Rc<Shared>, class: &HostRef, ctx: &mut Context) -> JsObject {
    let length = match class.constructor().map(|c| c.arity()) {
        Some(Arity::Exact(n)) | Some(Arity::AtLeast(n)) => n,
        None => 0,
    };
    let function = NativeFunction::from_copy_closure_with_captures(
        |_this, args, capture: &MethodCapture, ctx| {
            let shared = upgrade(&capture.shared)?;
            construct(&shared, &capture.object, args, ctx).map_err(|e| marshal::throw(&shared, e, ctx))
        },
        MethodCapture {
            object: class.clone(),
            name: "new".to_string(),
            shared: Rc::downgrade(shared),
        },
    );
    FunctionObjectBuilder::new(ctx.realm(), function)
        .name(js_string!("new"))
        .length(length)
        .constructor(false)
        .build()
        .into()
}
