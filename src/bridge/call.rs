//! Call marshaling: arity checks, trailing-block conversion and the
//! re-entrant [`Frame`] handed to host code while a script is running.

use std::rc::Rc;

use boa_engine::{Context, JsValue, Source};
use log::trace;
use uuid::Uuid;

use crate::bridge::error::{Error, Result};
use crate::bridge::host::MethodSig;
use crate::bridge::marshal;
use crate::bridge::runtime::Shared;
use crate::bridge::script_proxy::{self, ScriptRef};
use crate::bridge::value::{HostRef, HostValue};

/// A callable passed to a block-taking host method in trailing position.
#[derive(Debug, Clone)]
pub struct Block(HostValue);

impl Block {
    pub(crate) fn new(callable: HostValue) -> Self {
        Block(callable)
    }

    /// Invokes the block once.
    pub fn call(&self, frame: &mut Frame<'_>, args: Vec<HostValue>) -> Result<HostValue> {
        frame.call(&self.0, args)
    }

    pub fn value(&self) -> &HostValue {
        &self.0
    }
}

/// Arguments of one host method invocation.
#[derive(Debug, Clone, Default)]
pub struct Call {
    pub args: Vec<HostValue>,
    pub block: Option<Block>,
}

impl Call {
    pub fn new(args: Vec<HostValue>) -> Self {
        Call { args, block: None }
    }

    /// Positional argument `i`, `Undefined` when absent.
    pub fn arg(&self, i: usize) -> HostValue {
        self.args.get(i).cloned().unwrap_or(HostValue::Undefined)
    }

    pub fn int(&self, i: usize) -> Result<i64> {
        self.args
            .get(i)
            .and_then(HostValue::as_i64)
            .ok_or_else(|| Error::Type(format!("argument {} must be an integer", i)))
    }

    pub fn float(&self, i: usize) -> Result<f64> {
        self.args
            .get(i)
            .and_then(HostValue::as_f64)
            .ok_or_else(|| Error::Type(format!("argument {} must be a number", i)))
    }

    pub fn str(&self, i: usize) -> Result<&str> {
        self.args
            .get(i)
            .and_then(HostValue::as_str)
            .ok_or_else(|| Error::Type(format!("argument {} must be a string", i)))
    }

    pub fn block(&self) -> Result<&Block> {
        self.block
            .as_ref()
            .ok_or_else(|| Error::host("LocalJumpError", "no block given"))
    }
}

/// Splits a trailing callable off `args` when the method takes a block.
pub(crate) fn split_block(sig: MethodSig, mut args: Vec<HostValue>) -> (Vec<HostValue>, Option<Block>) {
    if sig.takes_block && args.last().map_or(false, HostValue::is_callable) {
        let block = args.pop().map(Block::new);
        (args, block)
    } else {
        (args, None)
    }
}

pub(crate) fn check_arity(method: &str, sig: MethodSig, given: usize) -> Result<()> {
    if sig.arity.accepts(given) {
        Ok(())
    } else {
        Err(Error::Arity {
            method: method.to_string(),
            given,
            expected: sig.arity.to_string(),
        })
    }
}

/// Builds the [`Call`] for `method`, after block conversion and arity check.
pub(crate) fn prepare(method: &str, sig: MethodSig, args: Vec<HostValue>) -> Result<Call> {
    let (args, block) = split_block(sig, args);
    check_arity(method, sig, args.len())?;
    Ok(Call { args, block })
}

/// Invokes `name` on a host object with marshaled arguments.
pub(crate) fn dispatch(frame: &mut Frame<'_>, object: &HostRef, name: &str, args: Vec<HostValue>) -> Result<HostValue> {
    let sig = object.method(name).ok_or_else(|| Error::NoMethod {
        class: object.class_name().to_string(),
        method: name.to_string(),
    })?;
    let call = prepare(name, sig, args)?;
    trace!("dispatching {}#{} with {} argument(s)", object.class_name(), name, call.args.len());
    object.invoke(frame, name, call)
}

/// Access to the running runtime from inside a host method.
///
/// While script code is executing, the runtime itself is borrowed; host code
/// called back from the script must go through the frame to call script
/// functions, read globals or inspect script values.
pub struct Frame<'a> {
    pub(crate) shared: Rc<Shared>,
    pub(crate) context: &'a mut Context,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(shared: Rc<Shared>, context: &'a mut Context) -> Self {
        Frame { shared, context }
    }

    pub fn runtime_id(&self) -> Uuid {
        self.shared.id
    }

    /// Calls a script or host function with the global object as receiver.
    pub fn call(&mut self, function: &HostValue, args: Vec<HostValue>) -> Result<HostValue> {
        match function {
            HostValue::Script(s) if s.belongs_to(&self.shared) => {
                let this = JsValue::from(self.context.global_object());
                self.call_script(s, this, args)
            }
            HostValue::Script(s) => s.call(args),
            _ => self.call_using(function, &HostValue::Undefined, args),
        }
    }

    /// Calls a script or host function with `this` as receiver.
    pub fn call_using(&mut self, function: &HostValue, this: &HostValue, args: Vec<HostValue>) -> Result<HostValue> {
        match function {
            HostValue::Function(f) => f.call(self, args),
            HostValue::Script(s) if !s.belongs_to(&self.shared) => s.call_using(this, args),
            HostValue::Script(s) if s.is_callable() => {
                let this = marshal::to_js(&self.shared, this, self.context)?;
                self.call_script(s, this, args)
            }
            other => Err(Error::Type(format!("{} is not a function", other.type_name()))),
        }
    }

    fn call_script(&mut self, function: &ScriptRef, this: JsValue, args: Vec<HostValue>) -> Result<HostValue> {
        script_proxy::call_in(&self.shared, self.context, function.object(), &this, &args)
    }

    /// Reads a global variable.
    pub fn get(&mut self, name: &str) -> Result<HostValue> {
        let global = self.context.global_object();
        script_proxy::get_in(&self.shared, self.context, &global, name)
    }

    /// Assigns a global variable.
    pub fn set(&mut self, name: &str, value: HostValue) -> Result<()> {
        let global = self.context.global_object();
        script_proxy::set_in(&self.shared, self.context, &global, name, &value)
    }

    /// Evaluates nested source in the running context.
    pub fn evaluate(&mut self, source: &str) -> Result<HostValue> {
        let result = self
            .context
            .eval(Source::from_bytes(source))
            .map_err(|e| marshal::error_from_js(&self.shared, e, self.context))?;
        marshal::from_js(&self.shared, &result, self.context)
    }

    /// The script global object.
    pub fn global(&mut self) -> Result<HostValue> {
        let global = JsValue::from(self.context.global_object());
        marshal::from_js(&self.shared, &global, self.context)
    }

    /// Reads property `name` of a script value.
    pub fn attribute(&mut self, value: &HostValue, name: &str) -> Result<HostValue> {
        match value {
            HostValue::Script(s) if s.belongs_to(&self.shared) => {
                script_proxy::get_in(&self.shared, self.context, s.object(), name)
            }
            HostValue::Script(s) => s.get(name),
            HostValue::Record(map) => Ok(map.get(name).cloned().unwrap_or(HostValue::Undefined)),
            other => Err(Error::Type(format!("cannot read '{}' of {}", name, other.type_name()))),
        }
    }

    /// Elements of a host list or script array.
    pub fn to_list(&mut self, value: &HostValue) -> Result<Vec<HostValue>> {
        match value {
            HostValue::Script(s) if s.belongs_to(&self.shared) => {
                script_proxy::list_in(&self.shared, self.context, s.object())
            }
            other => other.to_list(),
        }
    }

    /// Own enumerable properties of a host record or script object.
    pub fn to_record(&mut self, value: &HostValue) -> Result<std::collections::BTreeMap<String, HostValue>> {
        match value {
            HostValue::Script(s) if s.belongs_to(&self.shared) => {
                script_proxy::record_in(&self.shared, self.context, s.object())
            }
            other => other.to_record(),
        }
    }

    /// Invokes a host method by name, as script code would.
    pub fn send(&mut self, object: &HostRef, name: &str, args: Vec<HostValue>) -> Result<HostValue> {
        dispatch(self, object, name, args)
    }
}
