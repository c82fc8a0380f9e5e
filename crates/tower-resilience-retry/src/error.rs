//! Error types for the retry middleware.

use thiserror::Error;

/// Errors returned by the `Retry` service.
#[derive(Debug, Clone, Error)]
pub enum RetryError<E> {
    /// The inner service failed with an error the retry predicate rejected,
    /// so it was returned without consuming an attempt.
    #[error("inner service error: {0}")]
    Inner(E),

    /// All attempts were consumed without a non-retryable outcome.
    #[error("retry exhausted after {attempts_made} attempts")]
    Exhausted {
        /// Total attempts made, including the initial one.
        attempts_made: usize,
        /// The error from the final attempt.
        cause: E,
    },

    /// A shared retry budget had no tokens left, so the next retry was
    /// skipped and the current error returned immediately. Distinct from
    /// ordinary exhaustion: `attempts_made` may be well under `max_attempts`.
    #[error("retry budget exhausted")]
    BudgetExhausted(E),
}

impl<E> RetryError<E> {
    /// Returns `true` if every configured attempt was used without success.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Returns `true` if a shared retry budget, not the attempt count, ended the retry loop.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, RetryError::BudgetExhausted(_))
    }

    /// Returns the underlying service error, regardless of which variant raised it.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Inner(e) => e,
            RetryError::Exhausted { cause, .. } => cause,
            RetryError::BudgetExhausted(e) => e,
        }
    }
}

impl<E> From<RetryError<E>> for tower_resilience_core::ResilienceError<E> {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::Exhausted { attempts_made, .. } => {
                tower_resilience_core::ResilienceError::RetryExhausted { attempts_made }
            }
            RetryError::Inner(e) | RetryError::BudgetExhausted(e) => {
                tower_resilience_core::ResilienceError::Application(e)
            }
        }
    }
}
