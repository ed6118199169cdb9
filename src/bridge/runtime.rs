//! Runtimes: isolated evaluation contexts with their own identity registry.
//!
//! A [`Runtime`] owns one engine context, one proxy table, one module loader
//! and the namespace object. Nothing is shared between runtimes; a value
//! passed to two runtimes gets two distinct proxies, and a script value handed
//! from one runtime to another is copied or reproxied on entry.
//!
//! Runtimes are single-threaded (`!Send`). Callers needing access from
//! several threads must serialize around the whole runtime.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsObject, JsString, JsSymbol, JsValue, Source};
use log::debug;
use uuid::Uuid;

use crate::bridge::call::{self, Frame};
use crate::bridge::error::{Error, Result};
use crate::bridge::host_proxy;
use crate::bridge::loader::{self, HostNamespace, ModuleLoader};
use crate::bridge::marshal::{self, object_of};
use crate::bridge::registry::{IdentityRegistry, ReclaimQueue, RegistryStats};
use crate::bridge::resolve;
use crate::bridge::scope::{self, ScopeFrame};
use crate::bridge::script_proxy;
use crate::bridge::value::{HostRef, HostValue};
use crate::config::RuntimeConfig;

const BOOTSTRAP: &str = include_str!("../../js/bootstrap.js");

/// Engine objects the bridge relies on, captured before any user code runs.
pub(crate) struct Intrinsics {
    pub(crate) proxy: JsObject,
    pub(crate) object_keys: JsObject,
    pub(crate) handler_proto: JsObject,
    pub(crate) host_error: JsObject,
    pub(crate) file_not_found: JsObject,
    /// Private key under which a host proxy reveals its handler.
    pub(crate) unwrap_key: JsSymbol,
}

impl Intrinsics {
    fn load(ctx: &mut Context) -> Result<Self> {
        let proxy = engine_object(ctx, "Proxy")?;
        let object_keys = engine_object(ctx, "Object.keys")?;
        let errors = engine_object(ctx, BOOTSTRAP)?;
        let host_error = element(&errors, 0, ctx)?;
        let file_not_found = element(&errors, 1, ctx)?;
        let unwrap_key = JsSymbol::new(Some(js_string!("jsbridge.host")))
            .ok_or_else(|| Error::Engine("cannot allocate symbol".to_string()))?;
        Ok(Intrinsics {
            proxy,
            object_keys,
            handler_proto: host_proxy::handler_prototype(ctx),
            host_error,
            file_not_found,
            unwrap_key,
        })
    }
}

fn engine_object(ctx: &mut Context, source: &str) -> Result<JsObject> {
    let value = ctx
        .eval(Source::from_bytes(source))
        .map_err(|e| Error::Engine(e.to_string()))?;
    object_of(&value).ok_or_else(|| Error::Engine(format!("'{}' is not an object", source)))
}

fn element(array: &JsObject, index: usize, ctx: &mut Context) -> Result<JsObject> {
    let value = array.get(index, ctx).map_err(|e| Error::Engine(e.to_string()))?;
    object_of(&value).ok_or_else(|| Error::Engine(format!("bootstrap element {} is not an object", index)))
}

/// State shared by a runtime and every proxy rooted in it.
pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) context: RefCell<Context>,
    pub(crate) registry: RefCell<IdentityRegistry>,
    pub(crate) reclaims: Rc<ReclaimQueue>,
    pub(crate) loader: RefCell<ModuleLoader>,
    pub(crate) host_globals: RefCell<BTreeMap<String, HostValue>>,
    pub(crate) intrinsics: Intrinsics,
}

impl Shared {
    /// Applies queued death reports to the registry.
    pub(crate) fn drain_reclaims(&self) {
        let records = self.reclaims.take();
        if records.is_empty() {
            return;
        }
        match self.registry.try_borrow_mut() {
            Ok(mut registry) => registry.reclaim(records),
            Err(_) => records.into_iter().for_each(|r| self.reclaims.push(r)),
        }
    }
}

/// Runs `f` as one top-level turn with the engine context, failing if it is
/// already in use.
///
/// Every `WeakRef` dereference pins its target until the end of the turn,
/// and registry lookups dereference one per crossing, so the pins are
/// released here rather than left for the next collection.
pub(crate) fn enter<T>(shared: &Rc<Shared>, f: impl FnOnce(&Rc<Shared>, &mut Context) -> Result<T>) -> Result<T> {
    let result = match shared.context.try_borrow_mut() {
        Ok(mut ctx) => {
            let result = f(shared, &mut ctx);
            ctx.clear_kept_objects();
            result
        }
        Err(_) => Err(Error::ContextBusy),
    };
    result
}

pub struct Runtime {
    shared: Rc<Shared>,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new() -> Result<Self> {
        Runtime::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        let mut ctx = Context::default();
        let intrinsics = Intrinsics::load(&mut ctx)?;
        let shared = Rc::new(Shared {
            id: Uuid::new_v4(),
            context: RefCell::new(ctx),
            registry: RefCell::new(IdentityRegistry::new()),
            reclaims: Rc::new(ReclaimQueue::default()),
            loader: RefCell::new(ModuleLoader::new(config.search_path.clone())),
            host_globals: RefCell::new(BTreeMap::new()),
            intrinsics,
        });
        let runtime = Runtime { shared, config };
        if runtime.config.expose_namespace {
            runtime.install_namespace()?;
        }
        debug!(
            "created runtime {} (namespace '{}', {} search path entries)",
            runtime.id(),
            runtime.config.namespace,
            runtime.config.search_path.len()
        );
        for module in &runtime.config.preload {
            runtime.require(module)?;
        }
        Ok(runtime)
    }

    fn install_namespace(&self) -> Result<()> {
        let namespace = HostNamespace::new(
            &self.config.namespace,
            &self.config.load_path_global,
            Rc::downgrade(&self.shared),
        );
        let namespace = HostValue::Object(HostRef::new(namespace));
        self.enter(|shared, ctx| {
            let proxy = marshal::to_js(shared, &namespace, ctx)?;
            ctx.register_global_property(
                JsString::from(self.config.namespace.as_str()),
                proxy,
                Attribute::WRITABLE | Attribute::CONFIGURABLE,
            )
            .map_err(|e| Error::Engine(e.to_string()))
        })
    }

    /// Runs `f` with the engine context, failing if it is already in use.
    fn enter<T>(&self, f: impl FnOnce(&Rc<Shared>, &mut Context) -> Result<T>) -> Result<T> {
        enter(&self.shared, f)
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Evaluates script source in the global scope.
    pub fn evaluate(&self, source: &str) -> Result<HostValue> {
        self.enter(|shared, ctx| {
            let value = ctx
                .eval(Source::from_bytes(source))
                .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
            marshal::from_js(shared, &value, ctx)
        })
    }

    /// Evaluates `source` with the bindings of `scope` visible for this evaluation only.
    pub fn evaluate_with(&self, source: &str, scope: impl Into<ScopeFrame>) -> Result<HostValue> {
        let frame = scope.into();
        self.enter(|shared, ctx| {
            let value = scope::evaluate_with(shared, ctx, source, &frame)?;
            marshal::from_js(shared, &value, ctx)
        })
    }

    /// Reads a global variable.
    pub fn get(&self, name: &str) -> Result<HostValue> {
        self.enter(|shared, ctx| {
            let global = ctx.global_object();
            script_proxy::get_in(shared, ctx, &global, name)
        })
    }

    /// Assigns a global variable.
    pub fn set(&self, name: &str, value: impl Into<HostValue>) -> Result<()> {
        let value = value.into();
        self.enter(|shared, ctx| {
            let global = ctx.global_object();
            script_proxy::set_in(shared, ctx, &global, name, &value)
        })
    }

    /// Calls the global function `name`.
    pub fn call(&self, name: &str, args: Vec<HostValue>) -> Result<HostValue> {
        self.enter(|shared, ctx| {
            let global = ctx.global_object();
            let function = global
                .get(JsString::from(name), ctx)
                .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
            match object_of(&function) {
                Some(function) if function.is_callable() => {
                    script_proxy::call_in(shared, ctx, &function, &JsValue::from(global), &args)
                }
                _ => Err(Error::Type(format!("{} is not a function", name))),
            }
        })
    }

    /// Loads a module unless already loaded; `true` when it was loaded by this call.
    pub fn require(&self, name: &str) -> Result<bool> {
        self.enter(|shared, ctx| loader::require(shared, ctx, name))
    }

    pub fn loaded_modules(&self) -> Vec<String> {
        self.shared.loader.borrow().loaded().to_vec()
    }

    pub fn search_path(&self) -> Vec<PathBuf> {
        self.shared.loader.borrow().search_path().to_vec()
    }

    pub fn add_search_path(&self, dir: impl Into<PathBuf>) {
        self.shared.loader.borrow_mut().add_search_path(dir.into());
    }

    /// Publishes a host value as `Host[name]`.
    pub fn define_host_global(&self, name: &str, value: impl Into<HostValue>) {
        self.shared
            .host_globals
            .borrow_mut()
            .insert(name.to_string(), value.into());
    }

    pub fn host_global(&self, name: &str) -> Option<HostValue> {
        self.shared.host_globals.borrow().get(name).cloned()
    }

    /// Reads `name` of a value the way script code would see it, ad-hoc
    /// attributes assigned from script code included.
    pub fn attribute(&self, value: &HostValue, name: &str) -> Result<HostValue> {
        match value {
            HostValue::Object(_) | HostValue::Function(_) => self.enter(|shared, ctx| {
                let proxy = host_proxy::proxy_for(shared, value, ctx)?;
                script_proxy::get_in(shared, ctx, &proxy, name)
            }),
            HostValue::Script(s) => s.get(name),
            HostValue::Record(map) => Ok(map.get(name).cloned().unwrap_or(HostValue::Undefined)),
            other => Err(Error::Type(format!("cannot read '{}' of {}", name, other.type_name()))),
        }
    }

    /// Invokes `name` on a value: a host method, else a function-valued
    /// attribute called with the value as `this`. A non-callable attribute is
    /// returned as is when no arguments are given.
    pub fn send(&self, value: &HostValue, name: &str, args: Vec<HostValue>) -> Result<HostValue> {
        if let HostValue::Object(object) = value {
            if object.method(name).is_some() {
                return self.enter(|shared, ctx| {
                    let mut frame = Frame::new(shared.clone(), ctx);
                    call::dispatch(&mut frame, object, name, args)
                });
            }
        }
        let target = match value {
            HostValue::Object(_) | HostValue::Function(_) => {
                self.enter(|shared, ctx| host_proxy::proxy_for(shared, value, ctx))?
            }
            HostValue::Script(s) if s.runtime_id() == self.id() => s.object().clone(),
            HostValue::Script(s) => {
                let function = s.get(name)?;
                return match function {
                    HostValue::Script(f) if f.is_callable() => f.call_using(value, args),
                    other if args.is_empty() => Ok(other),
                    _ => Err(Error::Type(format!("{} is not a function", name))),
                };
            }
            other => {
                return Err(Error::NoMethod {
                    class: other.type_name().to_string(),
                    method: name.to_string(),
                })
            }
        };
        self.enter(|shared, ctx| {
            let member = target
                .get(JsString::from(name), ctx)
                .map_err(|e| marshal::error_from_js(shared, e, ctx))?;
            match object_of(&member) {
                Some(function) if function.is_callable() => {
                    script_proxy::call_in(shared, ctx, &function, &JsValue::from(target.clone()), &args)
                }
                _ if args.is_empty() => marshal::from_js(shared, &member, ctx),
                _ => Err(Error::Type(format!("{} is not a function", name))),
            }
        })
    }

    /// Whether `name` resolves on the value: host members, then ad-hoc attributes.
    pub fn responds_to(&self, value: &HostValue, name: &str) -> Result<bool> {
        if let HostValue::Object(object) = value {
            if resolve::has_member(&**object, name) {
                return Ok(true);
            }
        }
        match value {
            HostValue::Object(_) | HostValue::Function(_) => self.enter(|shared, ctx| {
                let proxy = host_proxy::proxy_for(shared, value, ctx)?;
                proxy
                    .has_own_property(JsString::from(name), ctx)
                    .map_err(|e| marshal::error_from_js(shared, e, ctx))
            }),
            HostValue::Script(s) => s.contains(name),
            HostValue::Record(map) => Ok(map.contains_key(name)),
            _ => Ok(false),
        }
    }

    /// Runs the engine collector and drops registry entries of dead proxies.
    /// Returns the number of entries removed.
    pub fn collect_garbage(&self) -> Result<usize> {
        self.enter(|shared, ctx| {
            ctx.clear_kept_objects();
            boa_gc::force_collect();
            shared.drain_reclaims();
            let removed = shared.registry.borrow_mut().purge();
            debug!("runtime {}: garbage collection removed {} proxy entries", shared.id, removed);
            Ok(removed)
        })
    }

    /// Current registry entry counts.
    pub fn stats(&self) -> RegistryStats {
        self.shared.drain_reclaims();
        self.shared.registry.borrow().stats()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.shared.id)
            .field("namespace", &self.config.namespace)
            .finish()
    }
}
