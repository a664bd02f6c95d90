//! Handler and responder capability traits.
//!
//! This module groups the two subscriber-side contracts of the bus:
//! - [`Handle`] — publish-side handler with three independent call surfaces
//!   (sync, async, cancellable-async);
//! - [`Respond`] — request-side responder reporting applicability through
//!   `Option`.
//!
//! Function-backed adapters ([`HandlerFn`], [`AsyncHandlerFn`],
//! [`TokenHandlerFn`], [`ResponderFn`], [`AsyncResponderFn`]) build
//! single-surface implementations from closures.

mod handler;
mod responder;

pub use handler::{AsyncHandlerFn, Handle, HandlerFn, TokenHandlerFn};
pub use responder::{AsyncResponderFn, Respond, ResponderFn};

/// Marker for types that can travel through the bus.
///
/// Blanket-implemented for every `Clone + Send + Sync + 'static` type; never
/// implement it manually.
pub trait Message: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Message for T {}
