//! Ordered concurrent fan-out of oracle tasks.
//!
//! A bounded worker pool submits up to `max_workers` tasks at a time and
//! always returns results in submission order, independent of completion
//! order - sibling order encodes document order and downstream consumers
//! assume order = reading order. A single task failure never cancels its
//! siblings; each outcome is independently a success or a typed failure.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::warn;

use legis_oracle::OracleError;

/// A re-invocable oracle task; each invocation produces a fresh attempt.
pub type OracleTask<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, OracleError>> + Send + Sync>;

/// Failure of a dispatched task after retry handling.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The whole operation was cancelled before or during this task.
    #[error("task cancelled")]
    Cancelled,

    /// The oracle failed; retryable failures have exhausted their attempts.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// The worker task panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Exponential backoff policy for retryable oracle failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per task, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each retry (10s, 20s, 40s).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Cancellation signal shared between the caller and in-flight tasks.
///
/// Cancelling abandons in-flight oracle calls (their futures are dropped)
/// and reports unstarted tasks as [`DispatchError::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once cancellation has been signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

/// Bounded worker pool with ordered results.
#[derive(Debug, Clone)]
pub struct ParallelDispatcher {
    max_workers: usize,
    retry: RetryPolicy,
    cancel: CancelFlag,
}

impl ParallelDispatcher {
    /// Create a dispatcher with the given worker cap and default retry
    /// policy.
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            retry: RetryPolicy::default(),
            cancel: CancelFlag::new(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The cancellation flag honored by this dispatcher.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run all tasks concurrently, bounded by `max_workers`, and return
    /// their outcomes in submission order.
    pub async fn run_all<T>(&self, tasks: Vec<OracleTask<T>>) -> Vec<Result<T, DispatchError>>
    where
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut handles = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let retry = self.retry.clone();
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| DispatchError::Cancelled)?;
                run_with_retry(task, &retry, &cancel, index).await
            }));
        }

        // Each task owns exactly one result slot; awaiting the handles in
        // submission order restores document order no matter which task
        // completed first.
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Err(DispatchError::Panicked(e.to_string()))),
            }
        }
        results
    }
}

async fn run_with_retry<T>(
    task: OracleTask<T>,
    retry: &RetryPolicy,
    cancel: &CancelFlag,
    index: usize,
) -> Result<T, DispatchError> {
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DispatchError::Cancelled),
            outcome = task() => outcome,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                let delay = retry.delay_for(attempt);
                warn!(
                    "task {index} attempt {} failed ({e}), retrying in {:.0?}",
                    attempt + 1,
                    delay
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(DispatchError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(DispatchError::Oracle(e)),
        }
    }
}
