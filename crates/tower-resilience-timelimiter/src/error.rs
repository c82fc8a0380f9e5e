//! Error types for the time limiter.

use std::fmt;
use std::time::Duration;

/// Error type for the time limiter service.
#[derive(Debug, Clone)]
pub enum TimeLimiterError<E> {
    /// The inner service failed before the timeout elapsed.
    Inner(E),

    /// The call did not complete within the configured timeout. The
    /// abandoned call may keep running in the background; it is the
    /// caller's responsibility to not treat this as a cancellation.
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },
}

impl<E> TimeLimiterError<E> {
    /// Returns `true` if this error represents a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the inner service error, if this wasn't a timeout.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for TimeLimiterError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner(e) => write!(f, "inner service error: {}", e),
            Self::Timeout { timeout } => write!(f, "call timed out after {:?}", timeout),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeLimiterError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }
}

impl<E> From<TimeLimiterError<E>> for tower_resilience_core::ResilienceError<E> {
    fn from(err: TimeLimiterError<E>) -> Self {
        match err {
            TimeLimiterError::Inner(e) => tower_resilience_core::ResilienceError::Application(e),
            TimeLimiterError::Timeout { .. } => {
                tower_resilience_core::ResilienceError::Timeout { layer: "time_limiter" }
            }
        }
    }
}
