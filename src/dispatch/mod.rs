//! Dispatch strategies and execution drivers.
//!
//! ## Contents
//! - [`DispatchStrategy`] parallel vs sequential delivery
//! - `engine` (crate-internal) the drivers running a registry snapshot under
//!   a strategy: fire-and-forget fan-out, fail-fast sequential await,
//!   parallel fan-out through the aggregation combinator
//! - `when_all` (crate-internal) the hand-rolled combinator collecting N
//!   concurrent handler outcomes into one completion
//!
//! ## Quick reference
//! - One or zero snapshot entries always dispatch sequentially — the
//!   parallel machinery buys nothing there.
//! - A cancellation token already triggered before dispatch begins fails the
//!   dispatch with `Canceled` before any handler runs.

mod engine;
mod strategy;
mod when_all;

pub use strategy::DispatchStrategy;

pub(crate) use engine::{forget_all, publish_all, request_all, request_first};
