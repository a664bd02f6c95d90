//! Error types used by the evbus brokers and handlers.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`] — errors raised by the broker lifecycle itself (subscribing
//!   to a disposed broker, a failed replay drain).
//! - [`HandleError`] — errors raised by individual handler or responder
//!   invocations during dispatch.
//!
//! Both types provide an `as_label` helper for logging/metrics and
//! [`HandleError`] additionally distinguishes cancellation from failure via
//! [`HandleError::is_canceled`].

use thiserror::Error;

/// # Errors produced by the broker lifecycle.
///
/// These represent failures of the subscription surface itself, not of any
/// individual handler.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The broker was already disposed and [`DisposedPolicy::Fail`] is in
    /// effect.
    ///
    /// [`DisposedPolicy::Fail`]: crate::DisposedPolicy::Fail
    #[error("broker already disposed; subscribe rejected")]
    Disposed,

    /// A buffered subscribe failed while replaying the buffer to the new
    /// subscriber. The subscription was not registered.
    #[error("replay delivery failed: {0}")]
    Replay(#[from] HandleError),
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evbus::BusError;
    ///
    /// assert_eq!(BusError::Disposed.as_label(), "bus_disposed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Disposed => "bus_disposed",
            BusError::Replay(_) => "bus_replay_failed",
        }
    }
}

/// # Errors produced by handler invocations.
///
/// Sequential dispatch propagates the first `Fail` immediately and aborts the
/// remaining handlers; parallel dispatch surfaces the first failure captured
/// by completion order. Fire-and-forget publishing never surfaces these.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// Handler or responder execution failed.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The caller-supplied cancellation token was triggered before or at a
    /// sequential await point.
    #[error("dispatch cancelled")]
    Canceled,
}

impl HandleError {
    /// Builds a [`HandleError::Fail`] from any displayable error.
    pub fn fail(error: impl Into<String>) -> Self {
        HandleError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evbus::HandleError;
    ///
    /// assert_eq!(HandleError::fail("boom").as_label(), "handler_failed");
    /// assert_eq!(HandleError::Canceled.as_label(), "handler_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandleError::Fail { .. } => "handler_failed",
            HandleError::Canceled => "handler_canceled",
        }
    }

    /// Indicates whether this outcome is a cancellation rather than a
    /// handler failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, HandleError::Canceled)
    }
}
