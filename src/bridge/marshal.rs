//! Value marshaling between host and script representations.
//!
//! Primitives cross by value, lists and records by recursive copy. Host
//! objects, classes and functions cross as script proxies, and script objects
//! reaching host code become [`ScriptRef`](crate::bridge::script_proxy::ScriptRef)
//! handles, both resolved through the identity registry.

use std::collections::BTreeMap;
use std::rc::Rc;

use boa_engine::object::builtins::JsArray;
use boa_engine::{js_string, Context, JsError, JsNativeError, JsObject, JsString, JsValue};
use log::warn;

use crate::bridge::error::{Error, Result, ScriptError, FILE_NOT_FOUND_ERROR};
use crate::bridge::host_proxy;
use crate::bridge::runtime::Shared;
use crate::bridge::script_proxy::{self, ScriptKind, ScriptRef};
use crate::bridge::value::{HostFn, HostValue};

pub(crate) fn object_of(value: &JsValue) -> Option<JsObject> {
    value.as_object().map(|o| o.clone())
}

pub(crate) fn string_of(value: &JsValue) -> Option<String> {
    value.as_string().map(|s| s.to_std_string_escaped())
}

/// Converts a host value for use inside `shared`'s engine.
pub(crate) fn to_js(shared: &Rc<Shared>, value: &HostValue, ctx: &mut Context) -> Result<JsValue> {
    Ok(match value {
        HostValue::Undefined => JsValue::undefined(),
        HostValue::Nil => JsValue::null(),
        HostValue::Bool(b) => JsValue::from(*b),
        HostValue::Int(i) => match i32::try_from(*i) {
            Ok(small) => JsValue::from(small),
            Err(_) => JsValue::from(*i as f64),
        },
        HostValue::Float(f) => JsValue::from(*f),
        HostValue::Str(s) => JsValue::from(JsString::from(s.as_str())),
        HostValue::List(items) => {
            let values = to_js_args(shared, items, ctx)?;
            JsValue::from(JsArray::from_iter(values, ctx))
        }
        HostValue::Record(map) => JsValue::from(record_to_js(shared, map, ctx)?),
        HostValue::Object(_) | HostValue::Function(_) => {
            JsValue::from(host_proxy::proxy_for(shared, value, ctx)?)
        }
        HostValue::Script(s) if s.belongs_to(shared) => JsValue::from(s.object().clone()),
        HostValue::Script(s) => adopt(shared, s, ctx)?,
    })
}

pub(crate) fn to_js_args(shared: &Rc<Shared>, values: &[HostValue], ctx: &mut Context) -> Result<Vec<JsValue>> {
    values.iter().map(|v| to_js(shared, v, ctx)).collect()
}

pub(crate) fn record_to_js(shared: &Rc<Shared>, map: &BTreeMap<String, HostValue>, ctx: &mut Context) -> Result<JsObject> {
    let object = JsObject::with_object_proto(ctx.intrinsics());
    for (key, value) in map {
        let value = to_js(shared, value, ctx)?;
        object
            .create_data_property_or_throw(JsString::from(key.as_str()), value, ctx)
            .map_err(|e| error_from_js(shared, e, ctx))?;
    }
    Ok(object)
}

/// Brings a value owned by another runtime into this one: functions are
/// reproxied, arrays and objects copied.
fn adopt(shared: &Rc<Shared>, foreign: &ScriptRef, ctx: &mut Context) -> Result<JsValue> {
    let local = match foreign.kind() {
        ScriptKind::Function => {
            let function = foreign.clone();
            HostValue::Function(HostFn::new(move |_frame, args| function.call(args)))
        }
        ScriptKind::Array => HostValue::List(foreign.to_list()?),
        ScriptKind::Object => HostValue::Record(foreign.to_record()?),
    };
    to_js(shared, &local, ctx)
}

/// Converts an engine value for host code.
pub(crate) fn from_js(shared: &Rc<Shared>, value: &JsValue, ctx: &mut Context) -> Result<HostValue> {
    if value.is_undefined() {
        return Ok(HostValue::Undefined);
    }
    if value.is_null() {
        return Ok(HostValue::Nil);
    }
    if let Some(b) = value.as_boolean() {
        return Ok(HostValue::Bool(b));
    }
    if let Some(n) = value.as_number() {
        return Ok(HostValue::from_number(n));
    }
    if let Some(s) = string_of(value) {
        return Ok(HostValue::Str(s));
    }
    if value.is_symbol() {
        return Err(Error::Type("symbols cannot be passed to host code".to_string()));
    }
    if value.is_bigint() {
        let digits = value
            .to_string(ctx)
            .map_err(|e| error_from_js(shared, e, ctx))?
            .to_std_string_escaped();
        return Ok(match digits.parse::<i64>() {
            Ok(i) => HostValue::Int(i),
            Err(_) => HostValue::Float(digits.parse::<f64>().unwrap_or(f64::NAN)),
        });
    }
    match object_of(value) {
        Some(object) => {
            if let Some(host) = host_proxy::unwrap(shared, &object, ctx)? {
                return Ok(host);
            }
            script_proxy::wrap(shared, object).map(HostValue::Script)
        }
        None => Err(Error::Type("unsupported script value".to_string())),
    }
}

pub(crate) fn from_js_args(shared: &Rc<Shared>, values: &[JsValue], ctx: &mut Context) -> Result<Vec<HostValue>> {
    values.iter().map(|v| from_js(shared, v, ctx)).collect()
}

/// Converts a host error into the exception script code observes.
///
/// Script exceptions are rethrown unchanged, type errors become native
/// `TypeError`s, missing modules become `FileNotFoundError`s and every other
/// host error becomes a `HostError` carrying the host class as its `name`.
pub(crate) fn throw(shared: &Rc<Shared>, err: Error, ctx: &mut Context) -> JsError {
    match err {
        Error::Script(e) => match to_js(shared, &e.value, ctx) {
            Ok(value) => JsError::from_opaque(value),
            Err(_) => JsNativeError::error().with_message(e.to_string()).into(),
        },
        Error::Type(message) => JsNativeError::typ().with_message(message).into(),
        Error::FileNotFound(module) => {
            let args = [JsValue::from(JsString::from(module.as_str()))];
            match shared.intrinsics.file_not_found.construct(&args, None, ctx) {
                Ok(error) => JsError::from_opaque(error.into()),
                Err(e) => e,
            }
        }
        other => {
            let args = [
                JsValue::from(JsString::from(other.script_message().as_str())),
                JsValue::from(JsString::from(other.script_name())),
            ];
            match shared.intrinsics.host_error.construct(&args, None, ctx) {
                Ok(error) => JsError::from_opaque(error.into()),
                Err(e) => {
                    warn!("could not build script error for {}: {}", other, e);
                    JsNativeError::error().with_message(other.to_string()).into()
                }
            }
        }
    }
}

/// Converts an engine exception into a host error.
pub(crate) fn error_from_js(shared: &Rc<Shared>, err: JsError, ctx: &mut Context) -> Error {
    let thrown = err.to_opaque(ctx);
    let object = object_of(&thrown);
    let (name, message) = match &object {
        Some(object) => (
            property_string(object, "name", ctx).unwrap_or_else(|| "Error".to_string()),
            property_string(object, "message", ctx).unwrap_or_default(),
        ),
        None => ("Error".to_string(), render(&thrown, ctx)),
    };
    if name == FILE_NOT_FOUND_ERROR {
        if let Some(module) = object.as_ref().and_then(|o| property_string(o, "module", ctx)) {
            return Error::FileNotFound(module);
        }
    }
    match from_js(shared, &thrown, ctx) {
        Ok(value) => Error::Script(ScriptError::new(name, message, value)),
        // Symbols and other values host code cannot hold travel as their text.
        Err(Error::Type(_)) => {
            let rendered = render(&thrown, ctx);
            Error::Script(ScriptError::new(name, message, HostValue::Str(rendered)))
        }
        Err(e) => e,
    }
}

/// Text of a thrown value; symbols by their description.
fn render(value: &JsValue, ctx: &mut Context) -> String {
    if let Some(symbol) = value.as_symbol() {
        return symbol.descriptive_string().to_std_string_escaped();
    }
    value
        .to_string(ctx)
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default()
}

/// Reads a property as a string; `None` when absent or unreadable.
pub(crate) fn property_string(object: &JsObject, name: &str, ctx: &mut Context) -> Option<String> {
    let value = object.get(JsString::from(name), ctx).ok()?;
    if value.is_undefined() {
        return None;
    }
    value.to_string(ctx).ok().map(|s| s.to_std_string_escaped())
}

/// Longest array-like copied into a host list.
pub(crate) const MAX_COPIED_LENGTH: u64 = 1 << 24;

/// Elements of an engine array-like, read through `length`.
///
/// `length` is script-controlled and may describe a mostly empty array, so
/// it only bounds the copy; longer array-likes raise a `RangeError`.
pub(crate) fn array_values(object: &JsObject, ctx: &mut Context) -> std::result::Result<Vec<JsValue>, JsError> {
    let length = object.get(js_string!("length"), ctx)?.to_length(ctx)?;
    if length > MAX_COPIED_LENGTH {
        return Err(JsNativeError::range()
            .with_message(format!(
                "array of length {} is too long to copy (limit {})",
                length, MAX_COPIED_LENGTH
            ))
            .into());
    }
    let mut values = Vec::new();
    for i in 0..length {
        values.push(object.get(i as usize, ctx)?);
    }
    Ok(values)
}
