//! # Dispatch drivers over a registry snapshot.
//!
//! Free functions shared by the publish and request brokers. Every driver
//! operates on a point-in-time snapshot taken by the caller; concurrent
//! registry mutation affects later dispatches only.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::dispatch::when_all::{Job, WhenAll};
use crate::dispatch::DispatchStrategy;
use crate::error::HandleError;
use crate::filters::BoundHandler;
use crate::handlers::{Message, Respond};

/// Fire-and-forget fan-out: invokes the synchronous surface inline and
/// spawns both async surfaces, never awaiting them. Failures of the spawned
/// surfaces are the handler's own concern and are dropped here.
pub(crate) fn forget_all<T: Message>(entries: &[Arc<BoundHandler<T>>], message: &T) {
    for entry in entries {
        entry.handle(message);

        let spawned = entry.clone();
        let m = message.clone();
        tokio::spawn(async move {
            let _ = spawned.handle_async(m).await;
        });

        let spawned = entry.clone();
        let m = message.clone();
        tokio::spawn(async move {
            let _ = spawned
                .handle_with_token(m, CancellationToken::new())
                .await;
        });
    }
}

/// Awaited publish under the given strategy.
///
/// A token already cancelled fails the dispatch before any handler runs; a
/// snapshot of zero or one entries always takes the sequential path.
pub(crate) async fn publish_all<T: Message>(
    entries: &[Arc<BoundHandler<T>>],
    message: &T,
    strategy: DispatchStrategy,
    token: Option<&CancellationToken>,
) -> Result<(), HandleError> {
    if token.is_some_and(|t| t.is_cancelled()) {
        return Err(HandleError::Canceled);
    }
    if entries.len() <= 1 || strategy == DispatchStrategy::Sequential {
        publish_sequential(entries, message, token).await
    } else {
        publish_parallel(entries, message, token).await
    }
}

async fn publish_sequential<T: Message>(
    entries: &[Arc<BoundHandler<T>>],
    message: &T,
    token: Option<&CancellationToken>,
) -> Result<(), HandleError> {
    for entry in entries {
        match token {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(HandleError::Canceled);
                }
                entry
                    .handle_with_token(message.clone(), token.clone())
                    .await?;
            }
            None => entry.handle_async(message.clone()).await?,
        }
    }
    Ok(())
}

async fn publish_parallel<T: Message>(
    entries: &[Arc<BoundHandler<T>>],
    message: &T,
    token: Option<&CancellationToken>,
) -> Result<(), HandleError> {
    let jobs: Vec<Job<()>> = entries
        .iter()
        .map(|entry| {
            let entry = entry.clone();
            let message = message.clone();
            let token = token.cloned();
            let job: Job<()> = Box::pin(async move {
                match token {
                    Some(token) => entry.handle_with_token(message, token).await?,
                    None => entry.handle_async(message).await?,
                }
                Ok(Some(()))
            });
            job
        })
        .collect();

    WhenAll::start(jobs).await.map(|_| ())
}

/// First-responder-wins request. Sequential mode stops at the first
/// applicable responder; parallel mode awaits all of them and picks the
/// first success in snapshot order, deterministically.
pub(crate) async fn request_first<T, R>(
    entries: &[Arc<dyn Respond<T, R>>],
    message: &T,
    strategy: DispatchStrategy,
    token: Option<&CancellationToken>,
) -> Result<Option<R>, HandleError>
where
    T: Message,
    R: Send + 'static,
{
    if token.is_some_and(|t| t.is_cancelled()) {
        return Err(HandleError::Canceled);
    }
    if entries.len() <= 1 || strategy == DispatchStrategy::Sequential {
        for entry in entries {
            let outcome = invoke_responder(entry, message, token).await?;
            if outcome.is_some() {
                return Ok(outcome);
            }
        }
        Ok(None)
    } else {
        let results = WhenAll::start(responder_jobs(entries, message, token)).await?;
        Ok(results.into_iter().flatten().next())
    }
}

/// Collect-all request: every success, in snapshot order in both modes.
pub(crate) async fn request_all<T, R>(
    entries: &[Arc<dyn Respond<T, R>>],
    message: &T,
    strategy: DispatchStrategy,
    token: Option<&CancellationToken>,
) -> Result<Vec<R>, HandleError>
where
    T: Message,
    R: Send + 'static,
{
    if token.is_some_and(|t| t.is_cancelled()) {
        return Err(HandleError::Canceled);
    }
    if entries.len() <= 1 || strategy == DispatchStrategy::Sequential {
        let mut collected = Vec::new();
        for entry in entries {
            if let Some(value) = invoke_responder(entry, message, token).await? {
                collected.push(value);
            }
        }
        Ok(collected)
    } else {
        let results = WhenAll::start(responder_jobs(entries, message, token)).await?;
        Ok(results.into_iter().flatten().collect())
    }
}

async fn invoke_responder<T, R>(
    entry: &Arc<dyn Respond<T, R>>,
    message: &T,
    token: Option<&CancellationToken>,
) -> Result<Option<R>, HandleError>
where
    T: Message,
    R: Send + 'static,
{
    match token {
        Some(token) => {
            entry
                .try_handle_with_token(message.clone(), token.clone())
                .await
        }
        None => entry.try_handle_async(message.clone()).await,
    }
}

fn responder_jobs<T, R>(
    entries: &[Arc<dyn Respond<T, R>>],
    message: &T,
    token: Option<&CancellationToken>,
) -> Vec<Job<R>>
where
    T: Message,
    R: Send + 'static,
{
    entries
        .iter()
        .map(|entry| {
            let entry = entry.clone();
            let message = message.clone();
            let token = token.cloned();
            let job: Job<R> = Box::pin(async move {
                match token {
                    Some(token) => entry.try_handle_with_token(message, token).await,
                    None => entry.try_handle_async(message).await,
                }
            });
            job
        })
        .collect()
}
