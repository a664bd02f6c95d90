//! # Keyless subscriber store.
//!
//! One mutex guards the entry list, the lazily-created replay buffer, and the
//! disposed flag — the single per-broker gate of the concurrency model. An
//! entry is visible to publishers from the moment `add` returns until the
//! moment `remove` returns; readers observe either the pre- or post-mutation
//! state, never a partially-built one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Entry list + replay buffer + disposed flag behind one gate.
///
/// `H` is the stored entry type (kept behind `Arc`); `M` is the buffered
/// message type, `()` for registries without a replay buffer.
pub(crate) struct ListRegistry<H: ?Sized, M = ()> {
    state: Mutex<ListState<H, M>>,
}

struct ListState<H: ?Sized, M> {
    disposed: bool,
    buffer: Option<VecDeque<M>>,
    entries: Vec<Arc<H>>,
}

impl<H: ?Sized, M> ListRegistry<H, M> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ListState {
                disposed: false,
                buffer: None,
                entries: Vec::new(),
            }),
        }
    }

    /// Appends an entry. Returns `false` when the registry was disposed and
    /// nothing was registered.
    pub(crate) fn add(&self, entry: Arc<H>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return false;
        }
        state.entries.push(entry);
        true
    }

    /// Removes the entry by pointer identity. Returns whether an entry was
    /// actually removed (false after teardown or a prior removal).
    pub(crate) fn remove(&self, entry: &Arc<H>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return false;
        }
        let before = state.entries.len();
        state.entries.retain(|existing| !Arc::ptr_eq(existing, entry));
        state.entries.len() != before
    }

    /// Point-in-time view of the current entries, in insertion order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<H>> {
        self.state.lock().unwrap().entries.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    /// Atomically removes every entry and marks the registry disposed.
    ///
    /// Returns the removed count on the first call, `None` afterwards.
    pub(crate) fn clear(&self) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return None;
        }
        state.disposed = true;
        let removed = state.entries.len();
        state.entries.clear();
        state.buffer = None;
        Some(removed)
    }

    /// Enqueues a message for the next buffered subscriber, creating the
    /// buffer lazily. Messages published before teardown but never drained
    /// are dropped with the registry.
    pub(crate) fn push_buffer(&self, message: M) {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return;
        }
        state
            .buffer
            .get_or_insert_with(VecDeque::new)
            .push_back(message);
    }

    /// Takes the entire buffer contents, in enqueue order.
    pub(crate) fn drain_buffer(&self) -> VecDeque<M> {
        let mut state = self.state.lock().unwrap();
        state.buffer.take().unwrap_or_default()
    }

    /// Puts undelivered drained messages back at the front of the buffer,
    /// ahead of anything enqueued while the drain was in flight.
    pub(crate) fn restore_buffer(&self, mut messages: VecDeque<M>) {
        if messages.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return;
        }
        if let Some(existing) = state.buffer.take() {
            messages.extend(existing);
        }
        state.buffer = Some(messages);
    }
}
