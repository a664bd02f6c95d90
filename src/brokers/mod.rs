//! The broker surface: publish/subscribe and request/response.
//!
//! ## Contents
//! - [`EventBroker`] keyless publish broker with the replay buffer
//! - [`TopicBroker`] keyed publish broker (one subscriber group per key)
//! - [`EventRequester`] keyless request broker (first-success / collect-all)
//! - [`TopicRequester`] keyed request broker
//! - [`BrokerFactory`] constructs all four kinds over shared configuration,
//!   a diagnostics sink and the filter pipeline
//!
//! ## Quick reference
//! - Brokers are cheap clones over shared state: clone freely, dispose once.
//! - Publishing to zero subscribers succeeds trivially; requesting with zero
//!   successes reports "no result", never an error.
//! - `dispose()` clears all subscribers atomically; in-flight dispatches
//!   past their snapshot still complete.

mod event;
mod factory;
mod requester;
mod topic;
mod topic_requester;

pub use event::EventBroker;
pub use factory::{BrokerFactory, BrokerFactoryBuilder};
pub use requester::EventRequester;
pub use topic::TopicBroker;
pub use topic_requester::TopicRequester;

use tokio_util::sync::CancellationToken;

use crate::dispatch::DispatchStrategy;

/// Per-call options for awaited publishing on an [`EventBroker`].
#[derive(Clone, Default)]
pub struct PublishOpts {
    /// Strategy override; the factory default applies when `None`.
    pub strategy: Option<DispatchStrategy>,
    /// Advisory cancellation token passed through to handlers.
    pub token: Option<CancellationToken>,
    /// Also enqueue the message for the next buffered subscriber.
    pub buffered: bool,
}

/// Per-call options for keyed publishing and for requests.
#[derive(Clone, Default)]
pub struct DispatchOpts {
    /// Strategy override; the factory default applies when `None`.
    pub strategy: Option<DispatchStrategy>,
    /// Advisory cancellation token passed through to handlers.
    pub token: Option<CancellationToken>,
}
