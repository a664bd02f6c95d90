//! # Predicate gate: the innermost delivery veto.
//!
//! [`PredicateFilter`] short-circuits delivery to a single subscriber when a
//! boolean predicate over the message evaluates false. It is pinned to
//! [`FilterOrder::Gate`], which sorts below every numeric order, so every
//! other filter on the subscription still observes the message — gating
//! happens last, directly before the terminal handler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandleError;
use crate::filters::{Filter, FilterOrder, Next, NextWithToken};
use crate::handlers::Message;

/// Boolean gate over the message, applied on all three surfaces.
pub struct PredicateFilter<T> {
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> PredicateFilter<T> {
    pub fn new(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

#[async_trait]
impl<T: Message> Filter<T> for PredicateFilter<T> {
    fn order(&self) -> FilterOrder {
        FilterOrder::Gate
    }

    fn handle(&self, message: &T, next: &dyn Fn(&T)) {
        if (self.predicate)(message) {
            next(message)
        }
    }

    async fn handle_async(&self, message: T, next: Next<T>) -> Result<(), HandleError> {
        if (self.predicate)(&message) {
            next.run(message).await
        } else {
            Ok(())
        }
    }

    async fn handle_with_token(
        &self,
        message: T,
        token: CancellationToken,
        next: NextWithToken<T>,
    ) -> Result<(), HandleError> {
        if (self.predicate)(&message) {
            next.run(message, token).await
        } else {
            Ok(())
        }
    }
}
