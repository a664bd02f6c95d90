//! Diagnostics sink notified about subscription lifecycle.
//!
//! The brokers report every successful subscribe (with the new subscription's
//! id) and every unsubscribe or teardown (with the number of removed entries)
//! to a [`Diagnostics`] implementation supplied at factory construction.
//!
//! The sink is purely observational: it can never affect dispatch outcomes,
//! and it is invoked synchronously outside any await point, so implementations
//! must return quickly.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Process-unique, monotonically increasing subscription identifier.
pub type SubscriptionId = u64;

/// Global sequence counter for subscription ids.
static SUBSCRIPTION_SEQ: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_subscription_id() -> SubscriptionId {
    SUBSCRIPTION_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Observational sink for subscription lifecycle notifications.
///
/// Both methods default to no-ops so implementations override only what they
/// track. Implementations must not block: they run on the subscriber's call
/// path.
pub trait Diagnostics: Send + Sync + 'static {
    /// Called after a subscription was registered.
    fn on_subscribe(&self, _id: SubscriptionId) {}

    /// Called after entries were removed — `1` for a disposed subscription,
    /// the full entry count for a broker teardown.
    fn on_unsubscribe(&self, _removed: usize) {}
}

/// Sink that ignores every notification. The factory default.
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {}

/// Sink that emits `tracing` debug events for every notification.
///
/// Useful during development; prefer a custom [`Diagnostics`] implementation
/// for metrics collection.
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn on_subscribe(&self, id: SubscriptionId) {
        debug!(subscription = id, "subscribed");
    }

    fn on_unsubscribe(&self, removed: usize) {
        debug!(removed, "unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_ids_are_unique_and_increasing() {
        let a = next_subscription_id();
        let b = next_subscription_id();
        assert!(b > a);
    }
}
