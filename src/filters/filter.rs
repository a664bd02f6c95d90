//! # Filter trait and ordering.
//!
//! A [`Filter`] wraps a handler invocation with before/after logic and decides
//! whether to call through to the rest of the chain. Filters mirror the three
//! handler surfaces; each surface defaults to a transparent pass-through, so a
//! filter overrides only the surfaces it cares about.
//!
//! Filters must be stateless with respect to subscription identity: the same
//! filter instance may wrap many handlers only if it holds no per-call
//! mutable state.
//!
//! ## Example
//! ```
//! use async_trait::async_trait;
//! use evbus::{Filter, FilterOrder, HandleError, Next};
//!
//! struct RetryOnce;
//!
//! #[async_trait]
//! impl Filter<String> for RetryOnce {
//!     fn order(&self) -> FilterOrder {
//!         FilterOrder::At(100)
//!     }
//!
//!     async fn handle_async(&self, message: String, next: Next<String>) -> Result<(), HandleError> {
//!         if next.run(message.clone()).await.is_err() {
//!             return next.run(message).await;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::HandleError;
use crate::handlers::Message;

/// Position of a filter in the wrap order.
///
/// Higher values wrap further out and therefore run earlier; the lowest
/// value ends up directly before the base handler. [`FilterOrder::Gate`]
/// sorts below every [`FilterOrder::At`] value and is reserved for
/// predicate-based gating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterOrder {
    /// Always innermost, directly before the handler. Reserved for
    /// [`PredicateFilter`](crate::PredicateFilter); user filters should use
    /// [`FilterOrder::At`].
    Gate,
    /// Numeric position; higher runs earlier.
    At(i32),
}

impl Default for FilterOrder {
    fn default() -> Self {
        FilterOrder::At(0)
    }
}

pub(crate) type AsyncCall<T> =
    dyn Fn(T) -> BoxFuture<'static, Result<(), HandleError>> + Send + Sync;

pub(crate) type TokenCall<T> =
    dyn Fn(T, CancellationToken) -> BoxFuture<'static, Result<(), HandleError>> + Send + Sync;

/// Continuation handed to [`Filter::handle_async`]: the rest of the chain.
pub struct Next<T> {
    inner: Arc<AsyncCall<T>>,
}

impl<T> Clone for Next<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Message> Next<T> {
    pub(crate) fn new(inner: Arc<AsyncCall<T>>) -> Self {
        Self { inner }
    }

    /// Invokes the rest of the chain.
    pub async fn run(&self, message: T) -> Result<(), HandleError> {
        (self.inner.as_ref())(message).await
    }
}

/// Continuation handed to [`Filter::handle_with_token`].
pub struct NextWithToken<T> {
    inner: Arc<TokenCall<T>>,
}

impl<T> Clone for NextWithToken<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Message> NextWithToken<T> {
    pub(crate) fn new(inner: Arc<TokenCall<T>>) -> Self {
        Self { inner }
    }

    /// Invokes the rest of the chain, passing the token through.
    pub async fn run(&self, message: T, token: CancellationToken) -> Result<(), HandleError> {
        (self.inner.as_ref())(message, token).await
    }
}

/// # Middleware unit wrapping a handler call.
///
/// Every surface defaults to calling straight through, so implementations
/// override only what they need. Dropping the `next` call short-circuits
/// delivery for this subscriber.
#[async_trait]
pub trait Filter<T: Message>: Send + Sync + 'static {
    /// Position in the wrap order. Defaults to [`FilterOrder::At`]`(0)`.
    fn order(&self) -> FilterOrder {
        FilterOrder::default()
    }

    /// Wraps the synchronous surface.
    fn handle(&self, message: &T, next: &dyn Fn(&T)) {
        next(message)
    }

    /// Wraps the asynchronous surface.
    async fn handle_async(&self, message: T, next: Next<T>) -> Result<(), HandleError> {
        next.run(message).await
    }

    /// Wraps the cancellation-aware surface.
    async fn handle_with_token(
        &self,
        message: T,
        token: CancellationToken,
        next: NextWithToken<T>,
    ) -> Result<(), HandleError> {
        next.run(message, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_sorts_below_every_numeric_order() {
        assert!(FilterOrder::Gate < FilterOrder::At(i32::MIN));
        assert!(FilterOrder::Gate < FilterOrder::At(0));
        assert!(FilterOrder::At(-1) < FilterOrder::At(1));
    }

    #[test]
    fn test_default_order_is_zero() {
        assert_eq!(FilterOrder::default(), FilterOrder::At(0));
    }
}
