//! # Keyless publish broker.
//!
//! One channel per message type. Subscribers register a [`Handle`] (optionally
//! wrapped in filters); producers pick one of three delivery shapes:
//!
//! - [`EventBroker::publish`] — fire-and-forget: the synchronous surface runs
//!   inline, both async surfaces are spawned unawaited, and nothing a handler
//!   does can fail the producer;
//! - [`EventBroker::publish_async`] — awaited delivery under the factory's
//!   default strategy;
//! - [`EventBroker::publish_async_opts`] — awaited delivery with per-call
//!   strategy, cancellation token, and buffering.
//!
//! ## Replay buffer
//! Buffered publishes enqueue the message (even with zero subscribers); the
//! next *buffered* subscribe drains the whole queue to the new subscriber, in
//! enqueue order, before it goes live. The buffer is delivered once — this is
//! "replay until caught up", not an event log.
//!
//! ## Example
//! ```
//! use evbus::{BrokerFactory, HandlerFn};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let factory = BrokerFactory::default();
//! let broker = factory.event_broker::<String>();
//!
//! let sub = broker
//!     .subscribe(HandlerFn::new(|m: &String| println!("got {m}")))
//!     .unwrap();
//!
//! broker.publish("hello".to_string());
//! sub.dispose();
//! # }
//! ```

use std::any::TypeId;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::brokers::PublishOpts;
use crate::config::{DisposedPolicy, Options};
use crate::diagnostics::{next_subscription_id, Diagnostics};
use crate::dispatch::{forget_all, publish_all};
use crate::error::{BusError, HandleError};
use crate::filters::{BoundHandler, Filter, Pipeline, PredicateFilter};
use crate::handlers::{Handle, Message};
use crate::registry::{ListRegistry, Subscription};

/// Publish/subscribe broker for one message type.
///
/// Cheap to clone; all clones share the same subscriber registry and replay
/// buffer.
pub struct EventBroker<T: Message> {
    registry: Arc<ListRegistry<BoundHandler<T>, T>>,
    pipeline: Arc<Pipeline>,
    options: Arc<Options>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl<T: Message> Clone for EventBroker<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            pipeline: self.pipeline.clone(),
            options: self.options.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl<T: Message> EventBroker<T> {
    pub(crate) fn new(
        pipeline: Arc<Pipeline>,
        options: Arc<Options>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            registry: Arc::new(ListRegistry::new()),
            pipeline,
            options,
            diagnostics,
        }
    }

    /// Registers a handler.
    pub fn subscribe<H: Handle<T>>(&self, handler: H) -> Result<Subscription, BusError> {
        self.subscribe_with(handler, Vec::new())
    }

    /// Registers a handler wrapped in the given subscribe-time filters (on
    /// top of any global and declarative filters).
    pub fn subscribe_with<H: Handle<T>>(
        &self,
        handler: H,
        filters: Vec<Arc<dyn Filter<T>>>,
    ) -> Result<Subscription, BusError> {
        let handler_type = TypeId::of::<H>();
        let bound = self.pipeline.bind(Arc::new(handler), handler_type, filters);
        self.register(Arc::new(bound))
    }

    /// Registers a handler gated by a predicate: messages failing the
    /// predicate skip the terminal handler (other filters still see them).
    pub fn subscribe_when<H: Handle<T>>(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        handler: H,
    ) -> Result<Subscription, BusError> {
        self.subscribe_with(handler, vec![Arc::new(PredicateFilter::new(predicate))])
    }

    /// Drains the replay buffer to the handler's synchronous surface, then
    /// registers it.
    pub fn subscribe_buffered<H: Handle<T>>(&self, handler: H) -> Result<Subscription, BusError> {
        let handler_type = TypeId::of::<H>();
        let handler: Arc<dyn Handle<T>> = Arc::new(handler);
        for message in self.registry.drain_buffer() {
            handler.handle(&message);
        }
        let bound = self.pipeline.bind(handler, handler_type, Vec::new());
        self.register(Arc::new(bound))
    }

    /// Drains the replay buffer through the handler's async surface, then
    /// registers it. A failing replay keeps the undelivered remainder
    /// buffered and registers nothing.
    pub async fn subscribe_buffered_async<H: Handle<T>>(
        &self,
        handler: H,
    ) -> Result<Subscription, BusError> {
        let handler_type = TypeId::of::<H>();
        let handler: Arc<dyn Handle<T>> = Arc::new(handler);
        let mut pending = self.registry.drain_buffer();
        while let Some(message) = pending.pop_front() {
            if let Err(error) = handler.handle_async(message).await {
                self.registry.restore_buffer(pending);
                return Err(BusError::Replay(error));
            }
        }
        let bound = self.pipeline.bind(handler, handler_type, Vec::new());
        self.register(Arc::new(bound))
    }

    /// Fire-and-forget delivery to the current snapshot. Never blocks on and
    /// never surfaces handler outcomes; requires a tokio runtime for the
    /// spawned async surfaces.
    pub fn publish(&self, message: T) {
        let snapshot = self.registry.snapshot();
        trace!(subscribers = snapshot.len(), "publish");
        forget_all(&snapshot, &message);
    }

    /// Fire-and-forget delivery that also enqueues the message for the next
    /// buffered subscriber.
    pub fn publish_buffered(&self, message: T) {
        self.registry.push_buffer(message.clone());
        let snapshot = self.registry.snapshot();
        forget_all(&snapshot, &message);
    }

    /// Awaited delivery under the factory's default strategy.
    pub async fn publish_async(&self, message: T) -> Result<(), HandleError> {
        self.publish_async_opts(message, PublishOpts::default())
            .await
    }

    /// Awaited delivery with per-call strategy, token and buffering.
    pub async fn publish_async_opts(
        &self,
        message: T,
        opts: PublishOpts,
    ) -> Result<(), HandleError> {
        if opts.buffered {
            self.registry.push_buffer(message.clone());
        }
        let snapshot = self.registry.snapshot();
        trace!(subscribers = snapshot.len(), "publish_async");
        let strategy = opts.strategy.unwrap_or(self.options.default_strategy);
        publish_all(&snapshot, &message, strategy, opts.token.as_ref()).await
    }

    /// Atomically removes every subscriber and rejects future registrations
    /// per the configured [`DisposedPolicy`]. Idempotent.
    pub fn dispose(&self) {
        if let Some(removed) = self.registry.clear() {
            debug!(removed, "event broker disposed");
            self.diagnostics.on_unsubscribe(removed);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.is_disposed()
    }

    fn register(&self, bound: Arc<BoundHandler<T>>) -> Result<Subscription, BusError> {
        if !self.registry.add(bound.clone()) {
            return match self.options.disposed_policy {
                DisposedPolicy::Ignore => Ok(Subscription::inert(next_subscription_id())),
                DisposedPolicy::Fail => Err(BusError::Disposed),
            };
        }

        let id = next_subscription_id();
        self.diagnostics.on_subscribe(id);
        debug!(subscription = id, "subscribed");

        let registry = self.registry.clone();
        let diagnostics = self.diagnostics.clone();
        Ok(Subscription::active(id, move || {
            if registry.remove(&bound) {
                diagnostics.on_unsubscribe(1);
            }
        }))
    }
}
