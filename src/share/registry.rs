// src/share/registry.rs

//! In-memory registry of shared processes, keyed by logical name.
//!
//! Each name is in one of two states:
//!
//! - **reserved**: a start is in flight. The name is taken (a second start
//!   is rejected) but it is not yet visible to `get` / `list` / `remove`.
//! - **active**: the process came up and is being shared.
//!
//! A single `RwLock` guards the map. `get` and `list` share the read lock;
//! every mutation takes the write lock. The lock is never held across an
//! `.await`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::exec::ProcessHandle;

enum Slot {
    Reserved,
    Active(Arc<dyn ProcessHandle>),
}

#[derive(Default)]
pub struct ProcessRegistry {
    slots: RwLock<HashMap<String, Slot>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` for a start in progress.
    ///
    /// Returns `false` if the name is already reserved or active.
    pub fn reserve(&self, name: &str) -> bool {
        let mut slots = self.write();
        if slots.contains_key(name) {
            return false;
        }
        slots.insert(name.to_string(), Slot::Reserved);
        debug!(name = %name, "name reserved");
        true
    }

    /// Drop a reservation made by [`reserve`](Self::reserve). Active entries
    /// are left alone.
    pub fn release(&self, name: &str) {
        let mut slots = self.write();
        if matches!(slots.get(name), Some(Slot::Reserved)) {
            slots.remove(name);
            debug!(name = %name, "reservation released");
        }
    }

    /// Insert `handle` under `name`, replacing any reservation or entry.
    pub fn register(&self, name: &str, handle: Arc<dyn ProcessHandle>) {
        self.write().insert(name.to_string(), Slot::Active(handle));
        debug!(name = %name, "process registered");
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProcessHandle>> {
        match self.read().get(name) {
            Some(Slot::Active(handle)) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove an active entry, returning its handle.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn ProcessHandle>> {
        let mut slots = self.write();
        if !matches!(slots.get(name), Some(Slot::Active(_))) {
            return None;
        }
        match slots.remove(name) {
            Some(Slot::Active(handle)) => {
                debug!(name = %name, "process removed");
                Some(handle)
            }
            _ => None,
        }
    }

    /// Snapshot of active names.
    pub fn list(&self) -> BTreeSet<String> {
        self.read()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Remove every active entry. Reservations stay with their in-flight
    /// starts.
    pub fn drain(&self) -> Vec<(String, Arc<dyn ProcessHandle>)> {
        let mut slots = self.write();
        let names: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
            .map(|(name, _)| name.clone())
            .collect();

        names
            .into_iter()
            .filter_map(|name| match slots.remove(&name) {
                Some(Slot::Active(handle)) => Some((name, handle)),
                _ => None,
            })
            .collect()
    }

    // The map is only mutated by single insert/remove calls, so a poisoned
    // lock still guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Slot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.read();
        let reserved = slots
            .values()
            .filter(|slot| matches!(slot, Slot::Reserved))
            .count();
        f.debug_struct("ProcessRegistry")
            .field("active", &(slots.len() - reserved))
            .field("reserved", &reserved)
            .finish()
    }
}
