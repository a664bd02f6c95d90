//! # Subscription handle.
//!
//! Returned by every `subscribe` call; owns exactly one registry entry.
//! Disposing removes the entry; dropping the handle disposes it too, so a
//! subscription kept for the life of the program should be [`detach`]ed.
//!
//! [`detach`]: Subscription::detach

use crate::diagnostics::SubscriptionId;

/// Disposable handle for one registered subscriber.
///
/// Dispose is idempotent by construction: it consumes the handle, and a
/// handle that was already released (or that was inert to begin with) does
/// nothing. Disposing after the owning broker was torn down is a no-op.
pub struct Subscription {
    id: SubscriptionId,
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn active(id: SubscriptionId, remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            remove: Some(Box::new(remove)),
        }
    }

    /// Handle that was never registered; returned under
    /// [`DisposedPolicy::Ignore`](crate::DisposedPolicy::Ignore).
    pub(crate) fn inert(id: SubscriptionId) -> Self {
        Self { id, remove: None }
    }

    /// The process-unique id reported to the diagnostics sink.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether this handle still owns a registry entry.
    pub fn is_active(&self) -> bool {
        self.remove.is_some()
    }

    /// Removes the owned entry; subsequent publishes will not see it.
    pub fn dispose(mut self) {
        self.release();
    }

    /// Keeps the entry registered for the broker's lifetime and discards the
    /// handle without removing anything.
    pub fn detach(mut self) {
        self.remove = None;
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_dispose_runs_removal_once() {
        let removed = Arc::new(AtomicUsize::new(0));
        let seen = removed.clone();
        let sub = Subscription::active(1, move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.dispose();
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_disposes() {
        let removed = Arc::new(AtomicUsize::new(0));
        let seen = removed.clone();
        {
            let _sub = Subscription::active(2, move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach_skips_removal() {
        let removed = Arc::new(AtomicUsize::new(0));
        let seen = removed.clone();
        let sub = Subscription::active(3, move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        sub.detach();
        assert_eq!(removed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inert_handle_is_inactive() {
        let sub = Subscription::inert(4);
        assert!(!sub.is_active());
        sub.dispose();
    }
}
