//! The bidirectional proxy layer between host values and the script engine.
//!
//! ## Crossing the Boundary
//!
//! ```text
//!   host                         | engine
//!   -----------------------------+------------------------------------
//!   HostValue::Int / Str / ...   | number / string / ...   (copied)
//!   HostValue::List / Record     | Array / Object          (copied)
//!   HostValue::Object (HostRef)  | Proxy -> HostCell       (proxied)
//!   HostValue::Function (HostFn) | callable Proxy          (proxied)
//!   HostValue::Script (ScriptRef)| the script object itself
//! ```
//!
//! Proxied values keep their identity in both directions: every runtime keeps
//! an identity registry so the same host object always crosses as the same
//! script proxy, and the same script object always comes back as the same
//! [`ScriptRef`].
//!
//! ### Key Components
//!
//! - **[`HostObject`]**: the capability protocol host values implement
//!   (methods, indexer, constants, constructor)
//! - **[`Runtime`]**: one engine context with its registry, module loader and
//!   namespace object
//! - **[`ScriptRef`]**: host-side handle on a script object, array or function
//! - **[`HostClass`]**: builder for constructible host classes
//! - **[`ScopeFrame`]**: bindings injected for a single evaluation
//! - **[`Frame`]**: re-entrant access to the runtime from inside host methods
//!
//! ## Example
//!
//! ```
//! use jsbridge::bridge::{HostClass, HostValue, MethodSig, Runtime};
//!
//! let runtime = Runtime::new().unwrap();
//! let greeter = HostClass::new("Greeter")
//!     .class_method("greet", MethodSig::exact(1), |_frame, call| {
//!         Ok(format!("hello {}", call.str(0)?).into())
//!     });
//! runtime.set("Greeter", greeter.into_value()).unwrap();
//!
//! let greeting = runtime.evaluate("Greeter.greet('world')").unwrap();
//! assert_eq!(greeting, HostValue::from("hello world"));
//! ```

pub mod error;
pub mod value;
pub mod host;
pub mod call;
mod registry;
mod marshal;
mod resolve;
mod host_proxy;
pub mod script_proxy;
pub mod class;
pub mod scope;
mod loader;
pub mod runtime;

pub use error::{Error, Result, ScriptError, FILE_NOT_FOUND_ERROR, HOST_ERROR};
pub use value::{HostFn, HostRef, HostValue, MAX_SAFE_INTEGER};
pub use host::{no_method, setter_name, Arity, Constructor, HostObject, Indexer, MethodSig};
pub use call::{Block, Call, Frame};
pub use registry::RegistryStats;
pub use script_proxy::{ScriptKind, ScriptRef};
pub use class::HostClass;
pub use scope::ScopeFrame;
pub use runtime::Runtime;
