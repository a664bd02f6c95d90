//! # Keyed subscriber store.
//!
//! A key → group map behind the per-broker gate. Groups are created lazily on
//! first subscribe for a key and removed — under the same gate — the moment
//! their last entry is removed, so the map never holds an orphan empty group
//! and a concurrent subscribe for that key either joins a surviving group or
//! creates a fresh one, never one being deleted underneath it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Key-addressed groups of entries behind one gate.
pub(crate) struct KeyedRegistry<K, H: ?Sized> {
    state: Mutex<KeyedState<K, H>>,
}

struct KeyedState<K, H: ?Sized> {
    disposed: bool,
    groups: HashMap<K, Vec<Arc<H>>>,
}

impl<K: Eq + Hash, H: ?Sized> KeyedRegistry<K, H> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(KeyedState {
                disposed: false,
                groups: HashMap::new(),
            }),
        }
    }

    /// Appends an entry to the key's group, creating the group on first use.
    /// Returns `false` when the registry was disposed.
    pub(crate) fn add(&self, key: K, entry: Arc<H>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return false;
        }
        state.groups.entry(key).or_default().push(entry);
        true
    }

    /// Removes the entry by pointer identity; a group emptied by the removal
    /// is dropped from the map before the gate is released.
    pub(crate) fn remove(&self, key: &K, entry: &Arc<H>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return false;
        }
        let Some(group) = state.groups.get_mut(key) else {
            return false;
        };
        let before = group.len();
        group.retain(|existing| !Arc::ptr_eq(existing, entry));
        let removed = group.len() != before;
        if group.is_empty() {
            state.groups.remove(key);
        }
        removed
    }

    /// Point-in-time view of the key's group, or `None` when the key has no
    /// live subscribers.
    pub(crate) fn snapshot(&self, key: &K) -> Option<Vec<Arc<H>>> {
        self.state.lock().unwrap().groups.get(key).cloned()
    }

    pub(crate) fn subscriber_count(&self, key: &K) -> usize {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(key)
            .map_or(0, Vec::len)
    }

    pub(crate) fn group_count(&self) -> usize {
        self.state.lock().unwrap().groups.len()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    /// Atomically drops every group and marks the registry disposed.
    ///
    /// Returns the total removed entry count on the first call, `None`
    /// afterwards.
    pub(crate) fn clear(&self) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return None;
        }
        state.disposed = true;
        let removed = state.groups.values().map(Vec::len).sum();
        state.groups.clear();
        Some(removed)
    }
}
