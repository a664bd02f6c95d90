//! # Aggregation combinator: one completion for N concurrent handler calls.
//!
//! [`WhenAll`] is a manually driven future, not a composition of combinator
//! library primitives. Each job is polled once inline at start — a job that
//! finishes immediately records its outcome with no task spawn and no waker
//! round-trip — and only still-pending jobs are handed to the runtime, whose
//! task is the single registered continuation for that job.
//!
//! Completion protocol:
//! - an atomic completed-count; overall success is signalled when it reaches
//!   the job total;
//! - a set-once failure slot (`OnceLock`): the first failure *by completion
//!   order* wins, is signalled immediately, and abandons the remaining jobs —
//!   they are not cancelled, they keep running and their outcomes are
//!   discarded;
//! - a three-state waiter slot (empty / registered / done): signalling swaps
//!   in `done` and wakes a registered waiter; a waiter registering after
//!   completion observes `done` and resumes immediately; the race between
//!   registration and completion is closed by re-checking completion after
//!   registering.
//!
//! Job outcomes are `Result<Option<R>, HandleError>`: `Ok(None)` marks a
//! responder that reported "not applicable" and leaves a hole in the output,
//! which stays in input order regardless of completion order. Publish
//! dispatch uses `R = ()`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll, Waker};

use futures::future::BoxFuture;
use futures::task::noop_waker;

use crate::error::HandleError;

const WAITER_EMPTY: u8 = 0;
const WAITER_REGISTERED: u8 = 1;
const WAITER_DONE: u8 = 2;

/// One concurrent handler invocation.
pub(crate) type Job<R> = BoxFuture<'static, Result<Option<R>, HandleError>>;

/// Joins N concurrent jobs into one completion.
///
/// Resolves to the per-job outcomes in input order, or to the first captured
/// failure.
pub(crate) struct WhenAll<R> {
    inner: Arc<Inner<R>>,
}

struct Inner<R> {
    total: usize,
    completed: AtomicUsize,
    failure: OnceLock<HandleError>,
    results: Mutex<Vec<Option<R>>>,
    waiter: AtomicU8,
    waker: Mutex<Option<Waker>>,
}

impl<R> Inner<R> {
    fn is_complete(&self) -> bool {
        self.failure.get().is_some() || self.completed.load(Ordering::Acquire) == self.total
    }

    fn complete_value(&self, index: usize, value: R) {
        {
            let mut slots = self.results.lock().unwrap();
            // A shrunk vector means the outcome was already taken after a
            // failure: this job was abandoned and its result is discarded.
            if slots.len() == self.total {
                slots[index] = Some(value);
            }
        }
        self.advance();
    }

    fn complete_skip(&self) {
        self.advance();
    }

    fn complete_failure(&self, error: HandleError) {
        let _ = self.failure.set(error);
        self.finish();
    }

    fn advance(&self) {
        if self.completed.fetch_add(1, Ordering::AcqRel) + 1 == self.total {
            self.finish();
        }
    }

    /// Signals overall completion. Idempotent: only the exchange that first
    /// installs `done` may wake a waiter.
    fn finish(&self) {
        if self.waiter.swap(WAITER_DONE, Ordering::AcqRel) == WAITER_REGISTERED {
            if let Some(waker) = self.waker.lock().unwrap().take() {
                waker.wake();
            }
        }
    }

    fn take_outcome(&self) -> Result<Vec<Option<R>>, HandleError> {
        if let Some(error) = self.failure.get() {
            return Err(error.clone());
        }
        let mut slots = self.results.lock().unwrap();
        Ok(std::mem::take(&mut *slots))
    }
}

impl<R: Send + 'static> WhenAll<R> {
    /// Starts every job immediately.
    ///
    /// Jobs completing during this call take the inline fast path; the rest
    /// are driven by the runtime. A job failing inline abandons the jobs
    /// after it — they are never started, matching the all-or-first-failure
    /// contract.
    pub(crate) fn start(jobs: Vec<Job<R>>) -> Self {
        let total = jobs.len();
        let inner = Arc::new(Inner {
            total,
            completed: AtomicUsize::new(0),
            failure: OnceLock::new(),
            results: Mutex::new((0..total).map(|_| None).collect()),
            waiter: AtomicU8::new(WAITER_EMPTY),
            waker: Mutex::new(None),
        });

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        for (index, mut job) in jobs.into_iter().enumerate() {
            match job.as_mut().poll(&mut cx) {
                Poll::Ready(Ok(Some(value))) => inner.complete_value(index, value),
                Poll::Ready(Ok(None)) => inner.complete_skip(),
                Poll::Ready(Err(error)) => {
                    inner.complete_failure(error);
                    break;
                }
                Poll::Pending => {
                    let state = Arc::clone(&inner);
                    tokio::spawn(async move {
                        match job.await {
                            Ok(Some(value)) => state.complete_value(index, value),
                            Ok(None) => state.complete_skip(),
                            Err(error) => state.complete_failure(error),
                        }
                    });
                }
            }
        }

        Self { inner }
    }
}

impl<R> Future for WhenAll<R> {
    type Output = Result<Vec<Option<R>>, HandleError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &self.inner;
        if inner.is_complete() {
            return Poll::Ready(inner.take_outcome());
        }

        *inner.waker.lock().unwrap() = Some(cx.waker().clone());
        match inner.waiter.compare_exchange(
            WAITER_EMPTY,
            WAITER_REGISTERED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            // Re-poll with the waker refreshed above.
            Err(WAITER_REGISTERED) => {}
            // Completion won the race while we were registering.
            Err(_) => return Poll::Ready(inner.take_outcome()),
        }

        // A completion that landed between the first check and the exchange
        // saw `registered` and woke the stored waker; one that landed before
        // the exchange is caught here.
        if inner.is_complete() {
            return Poll::Ready(inner.take_outcome());
        }
        Poll::Pending
    }
}
