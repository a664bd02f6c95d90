//! # Keyed request broker.
//!
//! The request/response counterpart of [`TopicBroker`](crate::TopicBroker):
//! responder groups addressed by key, with first-success and collect-all
//! shapes over the addressed group only. A key with no responders reports
//! "no result" on every shape.

use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use crate::brokers::DispatchOpts;
use crate::config::{DisposedPolicy, Options};
use crate::diagnostics::{next_subscription_id, Diagnostics};
use crate::dispatch::{request_all, request_first};
use crate::error::{BusError, HandleError};
use crate::handlers::{Message, Respond};
use crate::registry::{KeyedRegistry, Subscription};

/// Request/response broker addressing responder groups by key.
pub struct TopicRequester<K, T: Message, R: Send + 'static> {
    registry: Arc<KeyedRegistry<K, dyn Respond<T, R>>>,
    options: Arc<Options>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<K, T: Message, R: Send + 'static> Clone for TopicRequester<K, T, R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            options: self.options.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl<K, T, R> TopicRequester<K, T, R>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Message,
    R: Send + 'static,
{
    pub(crate) fn new(options: Arc<Options>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            registry: Arc::new(KeyedRegistry::new()),
            options,
            diagnostics,
        }
    }

    /// Registers a responder under the key, creating the group on first use.
    pub fn subscribe<P: Respond<T, R>>(
        &self,
        key: K,
        responder: P,
    ) -> Result<Subscription, BusError> {
        let entry: Arc<dyn Respond<T, R>> = Arc::new(responder);
        if !self.registry.add(key.clone(), entry.clone()) {
            return match self.options.disposed_policy {
                DisposedPolicy::Ignore => Ok(Subscription::inert(next_subscription_id())),
                DisposedPolicy::Fail => Err(BusError::Disposed),
            };
        }

        let id = next_subscription_id();
        self.diagnostics.on_subscribe(id);
        debug!(subscription = id, "topic responder subscribed");

        let registry = self.registry.clone();
        let diagnostics = self.diagnostics.clone();
        Ok(Subscription::active(id, move || {
            if registry.remove(&key, &entry) {
                diagnostics.on_unsubscribe(1);
            }
        }))
    }

    /// Synchronous first-success over the key's group.
    pub fn request(&self, key: &K, message: &T) -> Option<R> {
        let snapshot = self.registry.snapshot(key)?;
        for responder in snapshot {
            if let Some(value) = responder.try_handle(message) {
                return Some(value);
            }
        }
        None
    }

    /// Synchronous collect-all over the key's group.
    pub fn request_all(&self, key: &K, message: &T) -> Vec<R> {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Vec::new();
        };
        snapshot
            .iter()
            .filter_map(|responder| responder.try_handle(message))
            .collect()
    }

    /// First-success under the factory's default strategy.
    pub async fn request_async(&self, key: &K, message: &T) -> Result<Option<R>, HandleError> {
        self.request_async_opts(key, message, DispatchOpts::default())
            .await
    }

    /// First-success with per-call strategy and token.
    pub async fn request_async_opts(
        &self,
        key: &K,
        message: &T,
        opts: DispatchOpts,
    ) -> Result<Option<R>, HandleError> {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Ok(None);
        };
        let strategy = opts.strategy.unwrap_or(self.options.default_strategy);
        request_first(&snapshot, message, strategy, opts.token.as_ref()).await
    }

    /// Collect-all under the factory's default strategy.
    pub async fn request_all_async(&self, key: &K, message: &T) -> Result<Vec<R>, HandleError> {
        self.request_all_async_opts(key, message, DispatchOpts::default())
            .await
    }

    /// Collect-all with per-call strategy and token.
    pub async fn request_all_async_opts(
        &self,
        key: &K,
        message: &T,
        opts: DispatchOpts,
    ) -> Result<Vec<R>, HandleError> {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Ok(Vec::new());
        };
        let strategy = opts.strategy.unwrap_or(self.options.default_strategy);
        request_all(&snapshot, message, strategy, opts.token.as_ref()).await
    }

    /// Atomically removes every group. Idempotent.
    pub fn dispose(&self) {
        if let Some(removed) = self.registry.clear() {
            debug!(removed, "topic requester disposed");
            self.diagnostics.on_unsubscribe(removed);
        }
    }

    /// Live responders under the key (0 when the group does not exist).
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.registry.subscriber_count(key)
    }

    /// Number of keys with at least one live responder.
    pub fn group_count(&self) -> usize {
        self.registry.group_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brokers::BrokerFactory;
    use crate::handlers::{AsyncResponderFn, ResponderFn};

    fn requester() -> TopicRequester<&'static str, u32, u32> {
        BrokerFactory::default().topic_requester::<&'static str, u32, u32>()
    }

    #[tokio::test]
    async fn test_unknown_key_reports_no_result() {
        let requester = requester();
        assert_eq!(requester.request(&"ghost", &1), None);
        assert_eq!(requester.request_async(&"ghost", &1).await, Ok(None));
        assert_eq!(
            requester.request_all_async(&"ghost", &1).await,
            Ok(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_requests_only_reach_the_addressed_group() {
        let requester = requester();
        requester
            .subscribe("double", ResponderFn::new(|m: &u32| Some(m * 2)))
            .unwrap()
            .detach();
        requester
            .subscribe("triple", ResponderFn::new(|m: &u32| Some(m * 3)))
            .unwrap()
            .detach();

        assert_eq!(requester.request(&"double", &4), Some(8));
        assert_eq!(requester.request(&"triple", &4), Some(12));
        assert_eq!(requester.request_all(&"double", &4), vec![8]);
    }

    #[tokio::test]
    async fn test_group_is_removed_with_its_last_responder() {
        let requester = requester();
        let sub = requester
            .subscribe("k", AsyncResponderFn::new(|m: u32| async move { Ok(Some(m)) }))
            .unwrap();
        assert_eq!(requester.group_count(), 1);

        assert_eq!(requester.request_async(&"k", &5).await, Ok(Some(5)));
        sub.dispose();
        assert_eq!(requester.group_count(), 0);
        assert_eq!(requester.request_async(&"k", &5).await, Ok(None));
    }

    #[tokio::test]
    async fn test_async_first_success_skips_not_applicable() {
        let requester = requester();
        requester
            .subscribe("k", AsyncResponderFn::new(|_m: u32| async { Ok(None) }))
            .unwrap()
            .detach();
        requester
            .subscribe(
                "k",
                AsyncResponderFn::new(|m: u32| async move { Ok(Some(m + 1)) }),
            )
            .unwrap()
            .detach();

        assert_eq!(requester.request_async(&"k", &10).await, Ok(Some(11)));
    }
}
