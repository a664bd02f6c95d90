//! # Publish-side handler trait and function-backed adapters.
//!
//! A [`Handle`] exposes three *independent* call surfaces. Each surface
//! defaults to a no-op, and a handler is invoked only on the surfaces it
//! actually implements:
//!
//! - [`Handle::handle`] — synchronous; invoked by fire-and-forget publishing.
//! - [`Handle::handle_async`] — awaited by async publishing when the caller
//!   supplied no cancellation token (and spawned, unawaited, by
//!   fire-and-forget publishing).
//! - [`Handle::handle_with_token`] — awaited by async publishing when the
//!   caller supplied a token.
//!
//! ## Rules
//! - The surfaces do **not** delegate to each other. A handler that only
//!   implements [`Handle::handle_async`] is skipped by a publish that carries
//!   a token; implement the token surface too if publishers pass tokens.
//! - Fire-and-forget publishing invokes all three surfaces; a handler
//!   implementing several of them with real work is delivered once per
//!   implemented surface.
//!
//! ## Example
//! ```
//! use async_trait::async_trait;
//! use evbus::{Handle, HandleError};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Handle<String> for Audit {
//!     async fn handle_async(&self, message: String) -> Result<(), HandleError> {
//!         // write audit record...
//!         let _ = message;
//!         Ok(())
//!     }
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandleError;
use crate::handlers::Message;

/// # Publish-side handler.
///
/// Implement the surfaces you want invoked; every surface defaults to a
/// no-op. Handlers are caller-owned: the broker only holds a registration
/// for the duration of the subscription and never mutates the handler.
#[async_trait]
pub trait Handle<T: Message>: Send + Sync + 'static {
    /// Synchronous surface, invoked inline by fire-and-forget publishing.
    fn handle(&self, _message: &T) {}

    /// Asynchronous surface, awaited by token-less async publishing.
    async fn handle_async(&self, _message: T) -> Result<(), HandleError> {
        Ok(())
    }

    /// Cancellation-aware surface, awaited by async publishing when the
    /// caller supplied a token. The token is advisory: check it at natural
    /// suspension points and return [`HandleError::Canceled`] to stop early.
    async fn handle_with_token(
        &self,
        _message: T,
        _token: CancellationToken,
    ) -> Result<(), HandleError> {
        Ok(())
    }
}

/// Synchronous handler built from a closure.
///
/// Implements only [`Handle::handle`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F> Handle<T> for HandlerFn<F>
where
    T: Message,
    F: Fn(&T) + Send + Sync + 'static,
{
    fn handle(&self, message: &T) {
        (self.f)(message)
    }
}

/// Asynchronous handler built from a closure returning a future.
///
/// Implements only [`Handle::handle_async`].
pub struct AsyncHandlerFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncHandlerFn<F, Fut> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> Handle<T> for AsyncHandlerFn<F, Fut>
where
    T: Message,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandleError>> + Send + 'static,
{
    async fn handle_async(&self, message: T) -> Result<(), HandleError> {
        (self.f)(message).await
    }
}

/// Cancellation-aware handler built from a closure receiving the token.
///
/// Implements only [`Handle::handle_with_token`].
pub struct TokenHandlerFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> TokenHandlerFn<F, Fut> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> Handle<T> for TokenHandlerFn<F, Fut>
where
    T: Message,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandleError>> + Send + 'static,
{
    async fn handle_with_token(
        &self,
        message: T,
        token: CancellationToken,
    ) -> Result<(), HandleError> {
        (self.f)(message, token).await
    }
}
