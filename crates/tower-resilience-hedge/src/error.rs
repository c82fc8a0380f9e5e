//! Error types for the hedging middleware.

use std::fmt;

/// Error type for the hedging service.
#[derive(Debug, Clone)]
pub enum HedgeError<E> {
    /// All hedged attempts failed.
    ///
    /// Contains the error from the primary request and the total number
    /// of attempts raced (primary plus hedges).
    AllAttemptsFailed {
        /// The error from the primary request, preferred over hedge errors.
        cause: E,
        /// Total attempts raced, including the primary.
        attempts_made: usize,
    },

    /// Error from the inner service.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for HedgeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeError::AllAttemptsFailed { cause, attempts_made } => {
                write!(f, "all {} hedged attempts failed: {}", attempts_made, cause)
            }
            HedgeError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for HedgeError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HedgeError::AllAttemptsFailed { cause, .. } => Some(cause),
            HedgeError::Inner(e) => Some(e),
        }
    }
}

impl<E> HedgeError<E> {
    /// Returns `true` if all hedged attempts failed.
    pub fn is_all_attempts_failed(&self) -> bool {
        matches!(self, HedgeError::AllAttemptsFailed { .. })
    }

    /// Returns `true` if this is an inner service error.
    pub fn is_inner(&self) -> bool {
        matches!(self, HedgeError::Inner(_))
    }

    /// Get a reference to the inner error.
    pub fn inner(&self) -> &E {
        match self {
            HedgeError::AllAttemptsFailed { cause, .. } => cause,
            HedgeError::Inner(e) => e,
        }
    }

    /// Convert into the inner error.
    pub fn into_inner(self) -> E {
        match self {
            HedgeError::AllAttemptsFailed { cause, .. } => cause,
            HedgeError::Inner(e) => e,
        }
    }
}

impl<E> From<HedgeError<E>> for tower_resilience_core::ResilienceError<E> {
    fn from(err: HedgeError<E>) -> Self {
        match err {
            HedgeError::AllAttemptsFailed { attempts_made, .. } => {
                tower_resilience_core::ResilienceError::HedgingFailed { attempts_made }
            }
            HedgeError::Inner(e) => tower_resilience_core::ResilienceError::Application(e),
        }
    }
}
