//! # jsbridge - Two-way proxy bridge between Rust and JavaScript
//!
//! Host values implementing a small dynamic object protocol are observed and
//! mutated from JavaScript, and JavaScript objects, arrays and functions are
//! observed and invoked from Rust. Evaluation itself is delegated to the
//! embedded `boa_engine`.
//!
//! - Identity-preserving proxies in both directions
//! - Property/method resolution over host capabilities (methods, indexer,
//!   constants, constructor) with ad-hoc attributes as fallback
//! - Host classes that are callable and constructible from script code
//! - `with`-style scope injection for a single evaluation
//! - Module loading from a search path through a namespace object (`Host`)
//!
//! ## Quick Start
//!
//! ### Exposing a host object
//!
//! ```
//! use std::any::Any;
//! use std::cell::Cell;
//! use jsbridge::bridge::{no_method, Call, Frame, HostObject, HostRef, HostValue, MethodSig, Result, Runtime};
//!
//! struct Counter(Cell<i64>);
//!
//! impl HostObject for Counter {
//!     fn class_name(&self) -> &str { "Counter" }
//!
//!     fn method(&self, name: &str) -> Option<MethodSig> {
//!         match name {
//!             "count" => Some(MethodSig::exact(0)),
//!             "bump" => Some(MethodSig::exact(1)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn invoke(&self, _frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
//!         match name {
//!             "count" => Ok(self.0.get().into()),
//!             "bump" => {
//!                 self.0.set(self.0.get() + call.int(0)?);
//!                 Ok(HostValue::Nil)
//!             }
//!             _ => Err(no_method(self, name)),
//!         }
//!     }
//!
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! let runtime = Runtime::new().unwrap();
//! runtime.set("counter", HostRef::new(Counter(Cell::new(1)))).unwrap();
//! runtime.evaluate("counter.bump(41)").unwrap();
//! assert_eq!(runtime.evaluate("counter.count").unwrap(), HostValue::Int(42));
//! ```
//!
//! ### Calling script functions from Rust
//!
//! ```
//! use jsbridge::bridge::{HostValue, Runtime};
//!
//! let runtime = Runtime::new().unwrap();
//! let add = runtime.evaluate("(function (a, b) { return a + b; })").unwrap();
//! let add = add.as_script().unwrap();
//! assert_eq!(add.call(vec![1.into(), 2.into()]).unwrap(), HostValue::Int(3));
//! ```
//!
//! ## Architecture
//!
//! - **[`bridge`]** - The proxy layer, marshaling, identity registry and runtime
//! - **[`config`]** - Runtime configuration (builder, file, environment)

pub mod bridge;
pub mod config;

pub use bridge::{Error, HostValue, Result, Runtime};
pub use config::RuntimeConfig;
