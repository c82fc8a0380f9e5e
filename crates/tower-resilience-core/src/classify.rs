//! Outcome classification: turning a `(response, error)` pair into a
//! success / transient-failure / permanent-failure label, shared by retry,
//! circuit-breaker, and fallback.

use crate::model::Response;

/// The label an [`OutcomeClassifier`] assigns to a completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    TransientFailure,
    PermanentFailure,
}

impl Outcome {
    pub fn is_retryable(self) -> bool {
        matches!(self, Outcome::TransientFailure)
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, Outcome::Success)
    }
}

/// Classifies the outcome of an attempt. `E` is the error type raised by the
/// terminal handler or an inner layer (e.g. a transport error).
pub trait OutcomeClassifier<E>: Send + Sync {
    fn classify(&self, response: Option<&Response>, error: Option<&E>) -> Outcome;
}

/// A classifier backed by a plain closure over the error type, used when the
/// transport error has no further structure to inspect.
pub trait TransientError {
    /// Whether this error represents a transient condition (network reset,
    /// DNS failure, TLS handshake failure) as opposed to a permanent one.
    fn is_transient(&self) -> bool;
}

/// The default classifier for HTTP-shaped outcomes, matching the status-code
/// table in the outcome-classification design: 2xx is success; 408, 429,
/// and 5xx are transient; other 4xx are permanent.
pub struct DefaultHttpClassifier;

impl<E: TransientError> OutcomeClassifier<E> for DefaultHttpClassifier {
    fn classify(&self, response: Option<&Response>, error: Option<&E>) -> Outcome {
        if let Some(err) = error {
            return if err.is_transient() {
                Outcome::TransientFailure
            } else {
                Outcome::PermanentFailure
            };
        }

        match response {
            Some(res) if res.is_success() => Outcome::Success,
            Some(res) => match res.status {
                408 | 429 | 500 | 502 | 503 | 504 => Outcome::TransientFailure,
                _ => Outcome::PermanentFailure,
            },
            None => Outcome::PermanentFailure,
        }
    }
}

/// A classifier built from a closure, for callers who want to override the
/// default table wholesale without implementing the trait.
pub struct FnClassifier<F> {
    f: F,
}

impl<F> FnClassifier<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<E, F> OutcomeClassifier<E> for FnClassifier<F>
where
    F: Fn(Option<&Response>, Option<&E>) -> Outcome + Send + Sync,
{
    fn classify(&self, response: Option<&Response>, error: Option<&E>) -> Outcome {
        (self.f)(response, error)
    }
}
