//! Error taxonomy for the bridge.
//!
//! Errors travel in both directions across the language boundary. A script
//! exception that escapes to host code becomes [`Error::Script`] carrying the
//! thrown value; a host error raised while script code is calling into a
//! host object is rethrown inside the engine with the host error class as the
//! script error's `name` (see `marshal::throw`).

use std::fmt;

use thiserror::Error;

use crate::bridge::value::HostValue;
use crate::config::ConfigError;

/// Name carried by the script-side error raised for a missing module.
pub const FILE_NOT_FOUND_ERROR: &str = "FileNotFoundError";

/// Name carried by host errors surfaced to script code without a class of their own.
pub const HOST_ERROR: &str = "HostError";

/// An uncaught exception raised while evaluating script code.
#[derive(Debug, Clone)]
pub struct ScriptError {
    /// The script-side error name (`TypeError`, `SyntaxError`, a custom class name...).
    pub name: String,
    /// The script-side error message. Empty when the thrown value had none.
    pub message: String,
    /// The thrown value, marshaled to host form.
    pub value: HostValue,
}

impl ScriptError {
    pub fn new(name: impl Into<String>, message: impl Into<String>, value: HostValue) -> Self {
        ScriptError {
            name: name.into(),
            message: message.into(),
            value,
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Uncaught script exception.
    #[error("{0}")]
    Script(ScriptError),

    /// A module could not be located on the search path.
    #[error("cannot load module '{0}'")]
    FileNotFound(String),

    /// The identity registry detected a duplicate proxy. This is a programming
    /// error inside the bridge, never a recoverable condition.
    #[error("proxy resolution invariant violated: {0}")]
    ProxyResolution(String),

    /// A value had the wrong type for the requested operation.
    #[error("type error: {0}")]
    Type(String),

    /// The host object does not respond to the requested method.
    #[error("undefined method '{method}' for {class}")]
    NoMethod { class: String, method: String },

    /// A host method was called with the wrong number of arguments.
    #[error("wrong number of arguments for '{method}' (given {given}, expected {expected})")]
    Arity {
        method: String,
        given: usize,
        expected: String,
    },

    /// An error raised by host code; `class` becomes the script error name.
    #[error("{class}: {message}")]
    Host { class: String, message: String },

    /// The runtime is already evaluating; re-entrant host code must go through its `Frame`.
    #[error("runtime is busy evaluating; use the call frame for re-entrant access")]
    ContextBusy,

    /// The runtime owning a proxy has been dropped.
    #[error("runtime has been dropped")]
    RuntimeDropped,

    /// The embedded engine failed outside of script evaluation (bootstrap, intrinsics).
    #[error("engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for host-side failures.
    pub fn host(class: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Host {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Name under which this error is visible to script code.
    pub fn script_name(&self) -> &str {
        match self {
            Error::Script(e) => &e.name,
            Error::FileNotFound(_) => FILE_NOT_FOUND_ERROR,
            Error::Type(_) => "TypeError",
            Error::NoMethod { .. } => "NoMethodError",
            Error::Arity { .. } => "ArgumentError",
            Error::Host { class, .. } => class,
            _ => HOST_ERROR,
        }
    }

    /// Message as seen by script code (without the name prefix).
    pub fn script_message(&self) -> String {
        match self {
            Error::Script(e) => e.message.clone(),
            Error::Type(m) => m.clone(),
            Error::Host { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_names() {
        assert_eq!(Error::FileNotFound("x".into()).script_name(), "FileNotFoundError");
        assert_eq!(Error::host("KeyError", "missing").script_name(), "KeyError");
        assert_eq!(
            Error::Arity {
                method: "x2".into(),
                given: 0,
                expected: "1".into()
            }
            .script_name(),
            "ArgumentError"
        );
        assert_eq!(Error::ContextBusy.script_name(), HOST_ERROR);
    }

    #[test]
    fn test_script_error_display() {
        let e = ScriptError::new("TypeError", "boom", HostValue::Undefined);
        assert_eq!(e.to_string(), "TypeError: boom");
        let e = ScriptError::new("Error", "", HostValue::Undefined);
        assert_eq!(e.to_string(), "Error");
    }

    #[test]
    fn test_host_error_message() {
        let e = Error::host("KeyError", "missing key");
        assert_eq!(e.script_message(), "missing key");
        assert_eq!(e.to_string(), "KeyError: missing key");
    }
}
