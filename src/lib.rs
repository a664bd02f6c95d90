//! # evbus
//!
//! **evbus** is a typed in-process event bus for Rust.
//!
//! It provides publish/subscribe and request/response brokers — keyless (one
//! channel per message type) and keyed (independent channels addressed by a
//! key) — with three delivery shapes, middleware-style filters, and a safe
//! concurrent subscription lifecycle. The crate is designed as a building
//! block for decoupling components inside one process; there is no network
//! transport and no persistence.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!       producer                               consumer(s)
//!          │                                       ▲
//!          ▼                                       │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Broker (one of four kinds, created by BrokerFactory)             │
//! │  - EventBroker<T>        keyless publish (+ replay buffer)        │
//! │  - TopicBroker<K, T>     keyed publish                            │
//! │  - EventRequester<T, R>  keyless request/response                 │
//! │  - TopicRequester<K,T,R> keyed request/response                   │
//! └──────┬──────────────────────────┬─────────────────────────┬───────┘
//!        ▼                          ▼                         ▼
//! ┌──────────────┐        ┌──────────────────┐      ┌──────────────────┐
//! │   Registry   │        │  Filter pipeline │      │  Dispatch engine │
//! │ list / keyed │        │ global+declared+ │      │ fire-and-forget  │
//! │ one gate per │        │ explicit, sorted │      │ sequential await │
//! │    broker    │        │ once, bound once │      │ parallel WhenAll │
//! └──────────────┘        └──────────────────┘      └──────────────────┘
//! ```
//!
//! ### Delivery shapes
//! ```text
//! publish(msg)              fire-and-forget: sync surface inline,
//!                           async surfaces spawned, nothing surfaces
//!
//! publish_async(msg)        Sequential: h1 → h2 → h3 (fail-fast)
//!                           Parallel:   h1 ∥ h2 ∥ h3 → one completion,
//!                                       first failure wins
//!
//! request_async(msg)        first responder (snapshot order) with Some(..)
//! request_all_async(msg)    every Some(..), snapshot order kept even in
//!                           parallel mode
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                        |
//! |-------------------|-----------------------------------------------------------------|-------------------------------------------|
//! | **Handlers**      | Capability traits with sync / async / cancellable surfaces.     | [`Handle`], [`Respond`]                   |
//! | **Filters**       | Ordered middleware around handler calls, built once.            | [`Filter`], [`FilterOrder`], [`Next`]     |
//! | **Brokers**       | Publish and request brokers, keyless and keyed.                 | [`EventBroker`], [`TopicBroker`], …       |
//! | **Lifecycle**     | Disposable subscriptions, atomic broker teardown.               | [`Subscription`], [`DisposedPolicy`]      |
//! | **Configuration** | Factory-scoped strategy, policies, global filters.              | [`Options`], [`BrokerFactory`]            |
//! | **Diagnostics**   | Observational subscribe/unsubscribe sink.                       | [`Diagnostics`]                           |
//! | **Errors**        | Typed broker and handler errors.                                | [`BusError`], [`HandleError`]             |
//!
//! ## Example
//! ```
//! use evbus::{AsyncHandlerFn, BrokerFactory, ResponderFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = BrokerFactory::default();
//!
//!     // Publish/subscribe.
//!     let events = factory.event_broker::<String>();
//!     let sub = events.subscribe(AsyncHandlerFn::new(|m: String| async move {
//!         println!("event: {m}");
//!         Ok(())
//!     }))?;
//!     events.publish_async("deploy finished".to_string()).await?;
//!     sub.dispose();
//!
//!     // Request/response: first responder with an answer wins.
//!     let lookups = factory.requester::<String, usize>();
//!     lookups
//!         .subscribe(ResponderFn::new(|m: &String| Some(m.len())))?
//!         .detach();
//!     assert_eq!(lookups.request(&"four".to_string()), Some(4));
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency model
//! - Handlers run on the host tokio runtime; the engine owns no threads and
//!   only coordinates completion.
//! - Registry mutation is serialized by one gate per broker; dispatch runs
//!   over point-in-time snapshots, so disposing a subscription racing an
//!   in-flight dispatch may still see one last delivery.
//! - Parallel aggregation abandons — never cancels — outstanding handlers
//!   after the first failure; they run to completion and their outcomes are
//!   discarded.

mod brokers;
mod config;
mod diagnostics;
mod dispatch;
mod error;
mod filters;
mod handlers;
mod registry;

// ---- Public re-exports ----

pub use brokers::{
    BrokerFactory, BrokerFactoryBuilder, DispatchOpts, EventBroker, EventRequester, PublishOpts,
    TopicBroker, TopicRequester,
};
pub use config::{DisposedPolicy, Options};
pub use diagnostics::{Diagnostics, LogDiagnostics, NullDiagnostics, SubscriptionId};
pub use dispatch::DispatchStrategy;
pub use error::{BusError, HandleError};
pub use filters::{
    DeclarativeFilters, Filter, FilterDef, FilterOrder, Next, NextWithToken, NoDeclarativeFilters,
    PredicateFilter,
};
pub use handlers::{
    AsyncHandlerFn, AsyncResponderFn, Handle, HandlerFn, Message, Respond, ResponderFn,
    TokenHandlerFn,
};
pub use registry::Subscription;
