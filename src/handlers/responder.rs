//! # Request-side responder trait and function-backed adapters.
//!
//! A [`Respond`] is the request/response counterpart of
//! [`Handle`](crate::Handle): instead of consuming a message it may produce a
//! value for it. Applicability is reported through `Option` — `None` means
//! "this responder does not apply to that message" and is skipped by the
//! dispatcher, never treated as an error. An `Err` return is a real failure
//! and propagates per the dispatch error rules.
//!
//! Like handlers, the three surfaces are independent and default to
//! "not applicable": a responder that only implements
//! [`Respond::try_handle_async`] is skipped by a request that carries a
//! cancellation token.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandleError;
use crate::handlers::Message;

/// # Request-side responder.
///
/// Implement the surfaces you want invoked; every surface defaults to
/// "not applicable".
#[async_trait]
pub trait Respond<T: Message, R: Send + 'static>: Send + Sync + 'static {
    /// Synchronous surface, used by the synchronous request shapes.
    fn try_handle(&self, _message: &T) -> Option<R> {
        None
    }

    /// Asynchronous surface, awaited by token-less async requests.
    async fn try_handle_async(&self, _message: T) -> Result<Option<R>, HandleError> {
        Ok(None)
    }

    /// Cancellation-aware surface, awaited by async requests when the caller
    /// supplied a token.
    async fn try_handle_with_token(
        &self,
        _message: T,
        _token: CancellationToken,
    ) -> Result<Option<R>, HandleError> {
        Ok(None)
    }
}

/// Synchronous responder built from a closure.
pub struct ResponderFn<F> {
    f: F,
}

impl<F> ResponderFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, R, F> Respond<T, R> for ResponderFn<F>
where
    T: Message,
    R: Send + 'static,
    F: Fn(&T) -> Option<R> + Send + Sync + 'static,
{
    fn try_handle(&self, message: &T) -> Option<R> {
        (self.f)(message)
    }
}

/// Asynchronous responder built from a closure returning a future.
pub struct AsyncResponderFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncResponderFn<F, Fut> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, R, F, Fut> Respond<T, R> for AsyncResponderFn<F, Fut>
where
    T: Message,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<R>, HandleError>> + Send + 'static,
{
    async fn try_handle_async(&self, message: T) -> Result<Option<R>, HandleError> {
        (self.f)(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_surfaces_report_not_applicable() {
        let responder = ResponderFn::new(|m: &u32| if *m > 10 { Some(*m * 2) } else { None });

        assert_eq!(Respond::<u32, u32>::try_handle(&responder, &20), Some(40));
        assert_eq!(Respond::<u32, u32>::try_handle(&responder, &3), None);
        // The async surfaces were not provided.
        assert_eq!(responder.try_handle_async(20).await, Ok(None));
    }

    #[tokio::test]
    async fn test_async_responder_propagates_failure() {
        let responder = AsyncResponderFn::new(|m: u32| async move {
            if m == 0 {
                return Err(HandleError::fail("zero"));
            }
            Ok(Some(m + 1))
        });

        assert_eq!(responder.try_handle_async(1).await, Ok(Some(2)));
        assert_eq!(
            responder.try_handle_async(0).await,
            Err(HandleError::fail("zero"))
        );
    }
}
