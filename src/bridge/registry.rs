//! Identity registry (the proxy table).
//!
//! One registry per runtime keeps both directions of the bridge
//! identity-stable:
//!
//! * host object → script proxy, keyed by the allocation address of the host
//!   handle. The proxy's handler owns a [`ProxySlot`] pointing back at the
//!   proxy; the table only holds a `WeakGc` to the slot, so it never keeps
//!   the proxy alive and looking it up pins nothing.
//! * script object → host proxy ([`ScriptRef`]), keyed by the engine object
//!   and held through a `std::rc::Weak`.
//!
//! Every entry carries a serial. Proxies report their own serial when they
//! die (engine finalization for script-side proxies, `Drop` for host-side
//! ones); the report only evicts an entry whose serial still matches, so a
//! late report never removes a newer proxy for the same object.
//!
//! Death reports may arrive in the middle of an engine allocation, so they
//! are only queued in a [`ReclaimQueue`]; the runtime drains the queue into
//! the registry before each mutation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use boa_engine::JsObject;
use boa_gc::{Finalize, Gc, GcRefCell, Trace, WeakGc};
use log::{error, trace, warn};

use crate::bridge::error::{Error, Result};
use crate::bridge::script_proxy::{ScriptInner, ScriptRef};
use crate::bridge::value::HostKey;

/// A death report for a proxy.
pub(crate) enum Reclaim {
    Host { key: HostKey, serial: u64 },
    Script { object: JsObject, serial: u64 },
}

impl Reclaim {
    fn serial(&self) -> u64 {
        match self {
            Reclaim::Host { serial, .. } | Reclaim::Script { serial, .. } => *serial,
        }
    }
}

/// Reentrancy-guarded queue of death reports.
///
/// Reports are pushed from finalizers and destructors that may run during a
/// collector sweep, so `push` must not inspect engine objects.
#[derive(Default)]
pub(crate) struct ReclaimQueue(RefCell<Vec<Reclaim>>);

impl ReclaimQueue {
    pub(crate) fn push(&self, record: Reclaim) {
        match self.0.try_borrow_mut() {
            Ok(mut queue) => queue.push(record),
            // The entry is left for `purge`, which recognises dead proxies on its own.
            Err(_) => warn!("reclamation queue busy, dropping report #{}", record.serial()),
        }
    }

    pub(crate) fn take(&self) -> Vec<Reclaim> {
        match self.0.try_borrow_mut() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }
}

/// Collector-managed back reference from a proxy's handler to the proxy.
#[derive(Trace, Finalize)]
pub(crate) struct ProxySlot {
    proxy: GcRefCell<Option<JsObject>>,
}

impl ProxySlot {
    pub(crate) fn new() -> Gc<Self> {
        Gc::new(ProxySlot {
            proxy: GcRefCell::new(None),
        })
    }

    pub(crate) fn fill(&self, proxy: &JsObject) {
        *self.proxy.borrow_mut() = Some(proxy.clone());
    }

    fn proxy(&self) -> Option<JsObject> {
        self.proxy.borrow().clone()
    }
}

/// Result of a registry probe.
pub(crate) enum Lookup<T> {
    Live(T),
    /// An entry exists but its proxy is gone; holds the entry's serial.
    Stale(u64),
    Vacant,
}

impl<T> Lookup<T> {
    /// The state an insert must still observe to be accepted.
    pub(crate) fn observed(&self) -> Option<u64> {
        match self {
            Lookup::Stale(serial) => Some(*serial),
            _ => None,
        }
    }
}

/// Number of entries per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub host_proxies: usize,
    pub script_proxies: usize,
}

struct HostEntry {
    serial: u64,
    slot: WeakGc<ProxySlot>,
}

struct ScriptEntry {
    serial: u64,
    handle: Weak<ScriptInner>,
}

#[derive(Default)]
pub(crate) struct IdentityRegistry {
    host: HashMap<HostKey, HostEntry>,
    script: HashMap<JsObject, ScriptEntry>,
    next_serial: u64,
}

impl IdentityRegistry {
    pub(crate) fn new() -> Self {
        IdentityRegistry::default()
    }

    pub(crate) fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Finds the live script proxy of a host object.
    pub(crate) fn lookup_host(&self, key: HostKey) -> Lookup<JsObject> {
        let entry = match self.host.get(&key) {
            Some(entry) => entry,
            None => return Lookup::Vacant,
        };
        match entry.slot.upgrade().and_then(|slot| slot.proxy()) {
            Some(proxy) => Lookup::Live(proxy),
            None => Lookup::Stale(entry.serial),
        }
    }

    pub(crate) fn insert_host(&mut self, key: HostKey, observed: Option<u64>, serial: u64, slot: &Gc<ProxySlot>) -> Result<()> {
        let current = self.host.get(&key).map(|e| e.serial);
        if current != observed {
            error!(
                "duplicate script proxy for host object {:#x} (expected {:?}, found {:?})",
                key, observed, current
            );
            return Err(Error::ProxyResolution(format!(
                "host object {:#x} already has a script proxy",
                key
            )));
        }
        self.host.insert(
            key,
            HostEntry {
                serial,
                slot: WeakGc::new(slot),
            },
        );
        Ok(())
    }

    /// Finds the live host proxy of a script object.
    pub(crate) fn lookup_script(&self, object: &JsObject) -> Lookup<ScriptRef> {
        match self.script.get(object) {
            None => Lookup::Vacant,
            Some(entry) => match entry.handle.upgrade() {
                Some(inner) => Lookup::Live(ScriptRef::from_inner(inner)),
                None => Lookup::Stale(entry.serial),
            },
        }
    }

    pub(crate) fn insert_script(&mut self, object: JsObject, observed: Option<u64>, serial: u64, handle: &Rc<ScriptInner>) -> Result<()> {
        let current = self.script.get(&object).map(|e| e.serial);
        if current != observed {
            error!(
                "duplicate host proxy for script object (expected {:?}, found {:?})",
                observed, current
            );
            return Err(Error::ProxyResolution(
                "script object already has a host proxy".to_string(),
            ));
        }
        self.script.insert(
            object,
            ScriptEntry {
                serial,
                handle: Rc::downgrade(handle),
            },
        );
        Ok(())
    }

    /// Applies queued death reports, ignoring those whose serial is outdated.
    pub(crate) fn reclaim(&mut self, records: Vec<Reclaim>) {
        for record in records {
            match record {
                Reclaim::Host { key, serial } => {
                    if self.host.get(&key).map_or(false, |e| e.serial == serial) {
                        self.host.remove(&key);
                        trace!("reclaimed script proxy #{} of host object {:#x}", serial, key);
                    } else {
                        trace!("ignoring outdated reclamation #{} of host object {:#x}", serial, key);
                    }
                }
                Reclaim::Script { object, serial } => {
                    if self.script.get(&object).map_or(false, |e| e.serial == serial) {
                        self.script.remove(&object);
                        trace!("reclaimed host proxy #{} of script object", serial);
                    } else {
                        trace!("ignoring outdated reclamation #{} of script object", serial);
                    }
                }
            }
        }
    }

    /// Drops every entry whose proxy is gone. Returns the number removed.
    pub(crate) fn purge(&mut self) -> usize {
        let before = self.host.len() + self.script.len();
        self.host.retain(|_, entry| entry.slot.is_upgradable());
        self.script.retain(|_, entry| entry.handle.strong_count() > 0);
        before - self.host.len() - self.script.len()
    }

    pub(crate) fn stats(&self) -> RegistryStats {
        RegistryStats {
            host_proxies: self.host.len(),
            script_proxies: self.script.len(),
        }
    }
}
