use crate::backoff::IntervalFunction;
use std::sync::Arc;
use std::time::Duration;

/// A predicate deciding whether a given error is eligible for retry.
///
/// Returns `true` if the operation should be retried, `false` if the error
/// should propagate immediately.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// The retry decision logic: how many attempts, which errors qualify, and how
/// long to wait between attempts.
///
/// This is independent of any particular Tower [`Service`](tower::Service) —
/// it only knows about attempt counters, errors, and durations, so the same
/// policy can back both the [`Retry`](crate::Retry) middleware and a
/// transport-agnostic `execute` call.
pub struct RetryPolicy<E> {
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    /// Creates a new policy with the given backoff strategy and no predicate
    /// (every error is retried).
    pub fn new(interval_fn: Arc<dyn IntervalFunction>) -> Self {
        Self {
            interval_fn,
            retry_predicate: None,
        }
    }

    /// Attaches a predicate restricting which errors are retried.
    pub fn with_retry_predicate(mut self, predicate: RetryPredicate<E>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Returns whether the given error should be retried.
    pub fn should_retry(&self, error: &E) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    /// Computes the delay before the next attempt, given the zero-based
    /// attempt number that just failed.
    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.interval(attempt)
    }
}
