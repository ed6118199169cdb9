//! Module loading and the host namespace object.
//!
//! Modules are plain scripts evaluated in the global scope of the runtime
//! that requires them. A module name is looked up on the search path as
//! `<dir>/<name>.js`, then `<dir>/<name>`, and finally among the modules
//! built into the crate. Each runtime loads a module at most once.
//!
//! The namespace object (global `Host` by default) exposes:
//!
//! * `Host.require(name)`: `true` on first load, `false` afterwards; a missing
//!   module throws a `FileNotFoundError`.
//! * `Host.loaded`: names of the modules loaded so far, in load order.
//! * `Host[name]`: host globals registered with `Runtime::define_host_global`,
//!   plus the search path under `Host['$LOAD_PATH']`. Assigning a list of
//!   directories to `Host['$LOAD_PATH']` replaces the search path.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use boa_engine::{Context, Source};
use lazy_static::lazy_static;
use log::debug;

use crate::bridge::call::{Call, Frame};
use crate::bridge::error::{Error, Result};
use crate::bridge::host::{no_method, HostObject, Indexer, MethodSig};
use crate::bridge::marshal;
use crate::bridge::runtime::Shared;
use crate::bridge::value::HostValue;

lazy_static! {
    static ref BUILTIN_MODULES: HashMap<&'static str, &'static str> = {
        let mut modules = HashMap::new();
        modules.insert("prelude", include_str!("../../js/prelude.js"));
        modules
    };
}

/// Source of a located module.
pub(crate) struct Module {
    pub(crate) origin: Option<PathBuf>,
    pub(crate) source: Cow<'static, str>,
}

pub(crate) struct ModuleLoader {
    search_path: Vec<PathBuf>,
    loaded: Vec<String>,
}

impl ModuleLoader {
    pub(crate) fn new(search_path: Vec<PathBuf>) -> Self {
        ModuleLoader {
            search_path,
            loaded: Vec::new(),
        }
    }

    pub(crate) fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub(crate) fn set_search_path(&mut self, search_path: Vec<PathBuf>) {
        self.search_path = search_path;
    }

    pub(crate) fn add_search_path(&mut self, dir: PathBuf) {
        if !self.search_path.contains(&dir) {
            self.search_path.push(dir);
        }
    }

    pub(crate) fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|m| m == name)
    }

    pub(crate) fn loaded(&self) -> &[String] {
        &self.loaded
    }

    fn mark_loaded(&mut self, name: &str) {
        self.loaded.push(name.to_string());
    }

    fn unmark(&mut self, name: &str) {
        self.loaded.retain(|m| m != name);
    }

    /// Finds a module on the search path, then among the built-in modules.
    pub(crate) fn locate(&self, name: &str) -> Result<Module> {
        for dir in &self.search_path {
            if let Some(path) = module_file(dir, name) {
                let source = std::fs::read_to_string(&path)?;
                return Ok(Module {
                    origin: Some(path),
                    source: Cow::Owned(source),
                });
            }
        }
        match BUILTIN_MODULES.get(name) {
            Some(source) => Ok(Module {
                origin: None,
                source: Cow::Borrowed(source),
            }),
            None => Err(Error::FileNotFound(name.to_string())),
        }
    }
}

fn module_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let with_extension = dir.join(format!("{}.js", name));
    if with_extension.is_file() {
        return Some(with_extension);
    }
    let bare = dir.join(name);
    if bare.is_file() {
        Some(bare)
    } else {
        None
    }
}

/// Loads `name` into the runtime unless it is already loaded.
pub(crate) fn require(shared: &Rc<Shared>, ctx: &mut Context, name: &str) -> Result<bool> {
    let module = {
        let mut loader = shared.loader.borrow_mut();
        if loader.is_loaded(name) {
            debug!("module '{}' already loaded", name);
            return Ok(false);
        }
        let module = loader.locate(name)?;
        // Marked before evaluation so that a module requiring itself terminates.
        loader.mark_loaded(name);
        module
    };
    match &module.origin {
        Some(path) => debug!("loading module '{}' from {}", name, path.display()),
        None => debug!("loading built-in module '{}'", name),
    }
    match ctx.eval(Source::from_bytes(module.source.as_bytes())) {
        Ok(_) => Ok(true),
        Err(e) => {
            shared.loader.borrow_mut().unmark(name);
            Err(marshal::error_from_js(shared, e, ctx))
        }
    }
}

/// The script-visible namespace object.
pub(crate) struct HostNamespace {
    name: String,
    load_path_global: String,
    shared: Weak<Shared>,
}

impl HostNamespace {
    pub(crate) fn new(name: &str, load_path_global: &str, shared: Weak<Shared>) -> Self {
        HostNamespace {
            name: name.to_string(),
            load_path_global: load_path_global.to_string(),
            shared,
        }
    }

    fn shared(&self) -> Result<Rc<Shared>> {
        self.shared.upgrade().ok_or(Error::RuntimeDropped)
    }

    fn load_path(&self, shared: &Shared) -> HostValue {
        let loader = shared.loader.borrow();
        HostValue::List(
            loader
                .search_path()
                .iter()
                .map(|dir| HostValue::Str(dir.to_string_lossy().into_owned()))
                .collect(),
        )
    }
}

impl HostObject for HostNamespace {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn method(&self, name: &str) -> Option<MethodSig> {
        match name {
            "require" => Some(MethodSig::exact(1)),
            "loaded" => Some(MethodSig::exact(0)),
            _ => None,
        }
    }

    fn invoke(&self, frame: &mut Frame<'_>, name: &str, call: Call) -> Result<HostValue> {
        match name {
            "require" => {
                let module = call.str(0)?.to_string();
                let shared = frame.shared.clone();
                require(&shared, frame.context, &module).map(HostValue::Bool)
            }
            "loaded" => {
                let loader = frame.shared.loader.borrow();
                Ok(loader.loaded().to_vec().into())
            }
            _ => Err(no_method(self, name)),
        }
    }

    fn indexer(&self) -> Option<&dyn Indexer> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Indexer for HostNamespace {
    fn has_key(&self, key: &str) -> bool {
        if key == self.load_path_global {
            return true;
        }
        match self.shared() {
            Ok(shared) => shared.host_globals.borrow().contains_key(key),
            Err(_) => false,
        }
    }

    fn get(&self, key: &str) -> Option<HostValue> {
        let shared = self.shared().ok()?;
        if key == self.load_path_global {
            return Some(self.load_path(&shared));
        }
        let value = shared.host_globals.borrow().get(key).cloned();
        value
    }

    fn set(&self, frame: &mut Frame<'_>, key: &str, value: HostValue) -> Result<()> {
        let shared = self.shared()?;
        if key == self.load_path_global {
            let dirs = frame
                .to_list(&value)?
                .into_iter()
                .map(|dir| match dir {
                    HostValue::Str(s) => Ok(PathBuf::from(s)),
                    other => Err(Error::Type(format!(
                        "search path entries must be strings, got {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            debug!("search path replaced with {} entries", dirs.len());
            shared.loader.borrow_mut().set_search_path(dirs);
        } else {
            shared.host_globals.borrow_mut().insert(key.to_string(), value);
        }
        Ok(())
    }

    fn is_writable(&self) -> bool {
        true
    }
}
