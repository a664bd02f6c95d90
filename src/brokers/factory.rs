//! # Broker factory.
//!
//! Constructs brokers of all four kinds over one shared configuration: the
//! [`Options`], the [`Diagnostics`] sink, and the filter pipeline with its
//! declarative-filter source and per-handler-type definition cache. Brokers
//! from the same factory therefore agree on the default strategy, the
//! disposed policy, and the global filter set.
//!
//! ## Example
//! ```
//! use evbus::{BrokerFactory, DispatchStrategy, Options};
//!
//! let mut options = Options::default();
//! options.default_strategy = DispatchStrategy::Sequential;
//!
//! let factory = BrokerFactory::new(options);
//! let events = factory.event_broker::<String>();
//! let lookups = factory.requester::<String, u64>();
//! # let _ = (events, lookups);
//! ```

use std::hash::Hash;
use std::sync::Arc;

use crate::config::Options;
use crate::diagnostics::{Diagnostics, NullDiagnostics};
use crate::filters::{DeclarativeFilters, NoDeclarativeFilters, Pipeline};
use crate::handlers::Message;

use super::{EventBroker, EventRequester, TopicBroker, TopicRequester};

/// Creates brokers wired to shared configuration and diagnostics.
#[derive(Clone)]
pub struct BrokerFactory {
    options: Arc<Options>,
    pipeline: Arc<Pipeline>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl BrokerFactory {
    /// Factory with the given options, a no-op diagnostics sink, and no
    /// declarative filter source. Use [`BrokerFactory::builder`] to supply
    /// collaborators.
    pub fn new(options: Options) -> Self {
        Self::builder(options).build()
    }

    pub fn builder(options: Options) -> BrokerFactoryBuilder {
        BrokerFactoryBuilder {
            options,
            diagnostics: None,
            declarative: None,
        }
    }

    /// Keyless publish broker for message type `T`.
    pub fn event_broker<T: Message>(&self) -> EventBroker<T> {
        EventBroker::new(
            self.pipeline.clone(),
            self.options.clone(),
            self.diagnostics.clone(),
        )
    }

    /// Keyed publish broker for key type `K` and message type `T`.
    pub fn topic_broker<K, T>(&self) -> TopicBroker<K, T>
    where
        K: Eq + Hash + Clone + Send + 'static,
        T: Message,
    {
        TopicBroker::new(
            self.pipeline.clone(),
            self.options.clone(),
            self.diagnostics.clone(),
        )
    }

    /// Keyless request broker for message type `T` and response type `R`.
    pub fn requester<T, R>(&self) -> EventRequester<T, R>
    where
        T: Message,
        R: Send + 'static,
    {
        EventRequester::new(self.options.clone(), self.diagnostics.clone())
    }

    /// Keyed request broker.
    pub fn topic_requester<K, T, R>(&self) -> TopicRequester<K, T, R>
    where
        K: Eq + Hash + Clone + Send + 'static,
        T: Message,
        R: Send + 'static,
    {
        TopicRequester::new(self.options.clone(), self.diagnostics.clone())
    }
}

impl Default for BrokerFactory {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

/// Builder wiring the factory's collaborators.
pub struct BrokerFactoryBuilder {
    options: Options,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    declarative: Option<Arc<dyn DeclarativeFilters>>,
}

impl BrokerFactoryBuilder {
    /// Sink notified on subscribe/unsubscribe. Defaults to a no-op.
    pub fn with_diagnostics(mut self, sink: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Source of handler-declared filters. Defaults to "none declared".
    pub fn with_declarative(mut self, source: Arc<dyn DeclarativeFilters>) -> Self {
        self.declarative = Some(source);
        self
    }

    pub fn build(self) -> BrokerFactory {
        let options = Arc::new(self.options);
        let declarative = self
            .declarative
            .unwrap_or_else(|| Arc::new(NoDeclarativeFilters));
        BrokerFactory {
            pipeline: Arc::new(Pipeline::new(options.clone(), declarative)),
            options,
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Arc::new(NullDiagnostics)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::filters::{Filter, FilterOrder, Next};
    use crate::handlers::{AsyncHandlerFn, HandlerFn};
    use crate::error::HandleError;

    struct CountingSink {
        subscribed: AtomicUsize,
        unsubscribed: AtomicUsize,
    }

    impl Diagnostics for CountingSink {
        fn on_subscribe(&self, _id: u64) {
            self.subscribed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unsubscribe(&self, removed: usize) {
            self.unsubscribed.fetch_add(removed, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_diagnostics_sees_subscribe_and_teardown_counts() {
        let sink = Arc::new(CountingSink {
            subscribed: AtomicUsize::new(0),
            unsubscribed: AtomicUsize::new(0),
        });
        let factory = BrokerFactory::builder(Options::default())
            .with_diagnostics(sink.clone())
            .build();
        let broker = factory.event_broker::<u32>();

        let sub = broker.subscribe(HandlerFn::new(|_m: &u32| {})).unwrap();
        broker
            .subscribe(HandlerFn::new(|_m: &u32| {}))
            .unwrap()
            .detach();
        assert_eq!(sink.subscribed.load(Ordering::SeqCst), 2);

        sub.dispose();
        assert_eq!(sink.unsubscribed.load(Ordering::SeqCst), 1);

        // Teardown reports the remaining entry; a second dispose reports
        // nothing.
        broker.dispose();
        broker.dispose();
        assert_eq!(sink.unsubscribed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_global_filters_reach_every_broker_of_the_message_type() {
        struct Stamp {
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        #[async_trait::async_trait]
        impl Filter<u32> for Stamp {
            fn order(&self) -> FilterOrder {
                FilterOrder::At(10)
            }

            async fn handle_async(
                &self,
                message: u32,
                next: Next<u32>,
            ) -> Result<(), HandleError> {
                self.log.lock().unwrap().push("global");
                next.run(message).await
            }
        }

        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut options = Options::default();
        {
            let log = log.clone();
            options.add_global_filter::<u32, _>(FilterOrder::At(10), move || {
                Arc::new(Stamp { log: log.clone() })
            });
        }
        let factory = BrokerFactory::new(options);
        let broker = factory.event_broker::<u32>();

        {
            let log = log.clone();
            broker
                .subscribe(AsyncHandlerFn::new(move |_m: u32| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push("handler");
                        Ok(())
                    }
                }))
                .unwrap()
                .detach();
        }

        broker.publish_async(1).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["global", "handler"]);

        // A broker of a different message type is unaffected.
        let other = factory.event_broker::<String>();
        other
            .subscribe(HandlerFn::new(|_m: &String| {}))
            .unwrap()
            .detach();
        other.publish_async("x".to_string()).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
    }
}
