//! # Keyless request broker.
//!
//! Fan-out with answers: responders registered here may produce a value for a
//! message, and the broker offers two shapes over the same snapshot —
//! first-responder-wins ([`EventRequester::request_async`]) and collect-all
//! ([`EventRequester::request_all_async`]). Responders reporting "not
//! applicable" are skipped, never errors; in parallel mode results keep
//! snapshot order regardless of completion order.

use std::sync::Arc;

use tracing::debug;

use crate::brokers::DispatchOpts;
use crate::config::{DisposedPolicy, Options};
use crate::diagnostics::{next_subscription_id, Diagnostics};
use crate::dispatch::{request_all, request_first};
use crate::error::{BusError, HandleError};
use crate::handlers::{Message, Respond};
use crate::registry::{ListRegistry, Subscription};

/// Request/response broker for one message and one response type.
pub struct EventRequester<T: Message, R: Send + 'static> {
    registry: Arc<ListRegistry<dyn Respond<T, R>>>,
    options: Arc<Options>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<T: Message, R: Send + 'static> Clone for EventRequester<T, R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            options: self.options.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl<T: Message, R: Send + 'static> EventRequester<T, R> {
    pub(crate) fn new(options: Arc<Options>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            registry: Arc::new(ListRegistry::new()),
            options,
            diagnostics,
        }
    }

    /// Registers a responder.
    pub fn subscribe<P: Respond<T, R>>(&self, responder: P) -> Result<Subscription, BusError> {
        let entry: Arc<dyn Respond<T, R>> = Arc::new(responder);
        if !self.registry.add(entry.clone()) {
            return match self.options.disposed_policy {
                DisposedPolicy::Ignore => Ok(Subscription::inert(next_subscription_id())),
                DisposedPolicy::Fail => Err(BusError::Disposed),
            };
        }

        let id = next_subscription_id();
        self.diagnostics.on_subscribe(id);
        debug!(subscription = id, "responder subscribed");

        let registry = self.registry.clone();
        let diagnostics = self.diagnostics.clone();
        Ok(Subscription::active(id, move || {
            if registry.remove(&entry) {
                diagnostics.on_unsubscribe(1);
            }
        }))
    }

    /// Synchronous first-success: walks the snapshot in order and returns
    /// the first responder's value, or `None` when nobody applies.
    pub fn request(&self, message: &T) -> Option<R> {
        for responder in self.registry.snapshot() {
            if let Some(value) = responder.try_handle(message) {
                return Some(value);
            }
        }
        None
    }

    /// Synchronous collect-all: every applicable responder's value, in
    /// snapshot order. Empty when nobody applies.
    pub fn request_all(&self, message: &T) -> Vec<R> {
        self.registry
            .snapshot()
            .iter()
            .filter_map(|responder| responder.try_handle(message))
            .collect()
    }

    /// First-success under the factory's default strategy.
    pub async fn request_async(&self, message: &T) -> Result<Option<R>, HandleError> {
        self.request_async_opts(message, DispatchOpts::default())
            .await
    }

    /// First-success with per-call strategy and token. Parallel mode awaits
    /// every responder and picks the first success in snapshot order.
    pub async fn request_async_opts(
        &self,
        message: &T,
        opts: DispatchOpts,
    ) -> Result<Option<R>, HandleError> {
        let snapshot = self.registry.snapshot();
        let strategy = opts.strategy.unwrap_or(self.options.default_strategy);
        request_first(&snapshot, message, strategy, opts.token.as_ref()).await
    }

    /// Collect-all under the factory's default strategy.
    pub async fn request_all_async(&self, message: &T) -> Result<Vec<R>, HandleError> {
        self.request_all_async_opts(message, DispatchOpts::default())
            .await
    }

    /// Collect-all with per-call strategy and token.
    pub async fn request_all_async_opts(
        &self,
        message: &T,
        opts: DispatchOpts,
    ) -> Result<Vec<R>, HandleError> {
        let snapshot = self.registry.snapshot();
        let strategy = opts.strategy.unwrap_or(self.options.default_strategy);
        request_all(&snapshot, message, strategy, opts.token.as_ref()).await
    }

    /// Atomically removes every responder. Idempotent.
    pub fn dispose(&self) {
        if let Some(removed) = self.registry.clear() {
            debug!(removed, "requester disposed");
            self.diagnostics.on_unsubscribe(removed);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::brokers::BrokerFactory;
    use crate::dispatch::DispatchStrategy;
    use crate::handlers::{AsyncResponderFn, ResponderFn};

    fn requester() -> EventRequester<u32, u32> {
        BrokerFactory::default().requester::<u32, u32>()
    }

    #[tokio::test]
    async fn test_no_responders_reports_no_result() {
        let requester = requester();
        assert_eq!(requester.request(&1), None);
        assert_eq!(requester.request_async(&1).await, Ok(None));
        assert_eq!(requester.request_all_async(&1).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_sync_first_success_walks_in_order() {
        let requester = requester();
        requester
            .subscribe(ResponderFn::new(|_m: &u32| None))
            .unwrap()
            .detach();
        requester
            .subscribe(ResponderFn::new(|m: &u32| Some(m + 10)))
            .unwrap()
            .detach();
        requester
            .subscribe(ResponderFn::new(|m: &u32| Some(m + 100)))
            .unwrap()
            .detach();

        assert_eq!(requester.request(&1), Some(11));
        assert_eq!(requester.request_all(&1), vec![11, 101]);
    }

    #[tokio::test]
    async fn test_collect_all_gathers_successes_and_skips_failures() {
        let requester = requester();
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async { Ok(Some(1)) }))
            .unwrap()
            .detach();
        // Reports "not applicable": skipped, not an error.
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async { Ok(None) }))
            .unwrap()
            .detach();

        let out = requester
            .request_all_async_opts(
                &7,
                DispatchOpts {
                    strategy: Some(DispatchStrategy::Parallel),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(out, vec![1]);
    }

    #[tokio::test]
    async fn test_responder_error_propagates_as_aggregation_failure() {
        let requester = requester();
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async { Ok(Some(1)) }))
            .unwrap()
            .detach();
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async {
                Err(HandleError::fail("h2 blew up"))
            }))
            .unwrap()
            .detach();

        let out = requester
            .request_all_async_opts(
                &7,
                DispatchOpts {
                    strategy: Some(DispatchStrategy::Parallel),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(out, Err(HandleError::fail("h2 blew up")));
    }

    #[tokio::test]
    async fn test_parallel_first_success_is_snapshot_order_not_completion_order() {
        let requester = requester();
        // Slowest responder is first in the snapshot: it must still win.
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async {
                sleep(Duration::from_millis(30)).await;
                Ok(Some(1))
            }))
            .unwrap()
            .detach();
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async { Ok(Some(2)) }))
            .unwrap()
            .detach();

        let out = requester
            .request_async_opts(
                &0,
                DispatchOpts {
                    strategy: Some(DispatchStrategy::Parallel),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(out, Some(1));
    }

    #[tokio::test]
    async fn test_sequential_first_success_stops_at_first_applicable() {
        let requester = requester();
        let invoked = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async { Ok(Some(1)) }))
            .unwrap()
            .detach();
        {
            let invoked = invoked.clone();
            requester
                .subscribe(AsyncResponderFn::new(move |_m: u32| {
                    let invoked = invoked.clone();
                    async move {
                        invoked.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        Ok(Some(2))
                    }
                }))
                .unwrap()
                .detach();
        }

        let out = requester
            .request_async_opts(
                &0,
                DispatchOpts {
                    strategy: Some(DispatchStrategy::Sequential),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(out, Some(1));
        assert_eq!(invoked.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parallel_collect_preserves_snapshot_order() {
        let requester = requester();
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async {
                sleep(Duration::from_millis(25)).await;
                Ok(Some(1))
            }))
            .unwrap()
            .detach();
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async { Ok(Some(2)) }))
            .unwrap()
            .detach();
        requester
            .subscribe(AsyncResponderFn::new(|_m: u32| async {
                sleep(Duration::from_millis(5)).await;
                Ok(Some(3))
            }))
            .unwrap()
            .detach();

        let out = requester
            .request_all_async_opts(
                &0,
                DispatchOpts {
                    strategy: Some(DispatchStrategy::Parallel),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }
}
