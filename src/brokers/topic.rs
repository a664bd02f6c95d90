//! # Keyed publish broker.
//!
//! Many independent channels for one message type, addressed by key. Each
//! key's subscriber group is created lazily on first subscribe and removed
//! the moment its last subscriber disposes; publishing to a key nobody
//! subscribed to is a no-op. There is no replay buffer on keyed topics.

use std::any::TypeId;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::brokers::DispatchOpts;
use crate::config::{DisposedPolicy, Options};
use crate::diagnostics::{next_subscription_id, Diagnostics};
use crate::dispatch::{forget_all, publish_all};
use crate::error::{BusError, HandleError};
use crate::filters::{BoundHandler, Filter, Pipeline, PredicateFilter};
use crate::handlers::{Handle, Message};
use crate::registry::{KeyedRegistry, Subscription};

/// Publish/subscribe broker addressing subscriber groups by key.
pub struct TopicBroker<K, T: Message> {
    registry: Arc<KeyedRegistry<K, BoundHandler<T>>>,
    pipeline: Arc<Pipeline>,
    options: Arc<Options>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<K, T: Message> Clone for TopicBroker<K, T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            pipeline: self.pipeline.clone(),
            options: self.options.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl<K, T> TopicBroker<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Message,
{
    pub(crate) fn new(
        pipeline: Arc<Pipeline>,
        options: Arc<Options>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            registry: Arc::new(KeyedRegistry::new()),
            pipeline,
            options,
            diagnostics,
        }
    }

    /// Registers a handler under the key, creating the group on first use.
    pub fn subscribe<H: Handle<T>>(&self, key: K, handler: H) -> Result<Subscription, BusError> {
        self.subscribe_with(key, handler, Vec::new())
    }

    /// Registers a handler under the key, wrapped in the given filters.
    pub fn subscribe_with<H: Handle<T>>(
        &self,
        key: K,
        handler: H,
        filters: Vec<Arc<dyn Filter<T>>>,
    ) -> Result<Subscription, BusError> {
        let handler_type = TypeId::of::<H>();
        let bound = self.pipeline.bind(Arc::new(handler), handler_type, filters);
        self.register(key, Arc::new(bound))
    }

    /// Registers a predicate-gated handler under the key.
    pub fn subscribe_when<H: Handle<T>>(
        &self,
        key: K,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        handler: H,
    ) -> Result<Subscription, BusError> {
        self.subscribe_with(key, handler, vec![Arc::new(PredicateFilter::new(predicate))])
    }

    /// Fire-and-forget delivery to the key's current group.
    pub fn publish(&self, key: &K, message: T) {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return;
        };
        trace!(subscribers = snapshot.len(), "topic publish");
        forget_all(&snapshot, &message);
    }

    /// Awaited delivery under the factory's default strategy.
    pub async fn publish_async(&self, key: &K, message: T) -> Result<(), HandleError> {
        self.publish_async_opts(key, message, DispatchOpts::default())
            .await
    }

    /// Awaited delivery with per-call strategy and token.
    pub async fn publish_async_opts(
        &self,
        key: &K,
        message: T,
        opts: DispatchOpts,
    ) -> Result<(), HandleError> {
        let Some(snapshot) = self.registry.snapshot(key) else {
            return Ok(());
        };
        let strategy = opts.strategy.unwrap_or(self.options.default_strategy);
        publish_all(&snapshot, &message, strategy, opts.token.as_ref()).await
    }

    /// Atomically removes every group. Idempotent.
    pub fn dispose(&self) {
        if let Some(removed) = self.registry.clear() {
            debug!(removed, "topic broker disposed");
            self.diagnostics.on_unsubscribe(removed);
        }
    }

    /// Live subscribers under the key (0 when the group does not exist).
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.registry.subscriber_count(key)
    }

    /// Number of keys with at least one live subscriber.
    pub fn group_count(&self) -> usize {
        self.registry.group_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }

    fn register(&self, key: K, bound: Arc<BoundHandler<T>>) -> Result<Subscription, BusError> {
        if !self.registry.add(key.clone(), bound.clone()) {
            return match self.options.disposed_policy {
                DisposedPolicy::Ignore => Ok(Subscription::inert(next_subscription_id())),
                DisposedPolicy::Fail => Err(BusError::Disposed),
            };
        }

        let id = next_subscription_id();
        self.diagnostics.on_subscribe(id);
        debug!(subscription = id, "topic subscribed");

        let registry = self.registry.clone();
        let diagnostics = self.diagnostics.clone();
        Ok(Subscription::active(id, move || {
            if registry.remove(&key, &bound) {
                diagnostics.on_unsubscribe(1);
            }
        }))
    }
}
