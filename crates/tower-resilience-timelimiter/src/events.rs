//! Events emitted by the time limiter.

use std::time::{Duration, Instant};
use tower_resilience_core::ResilienceEvent;

/// Events emitted by the time limiter.
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The inner service completed before the timeout elapsed.
    Success {
        /// Name of the time limiter instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the call took to complete.
        duration: Duration,
    },

    /// The inner service failed before the timeout elapsed.
    Error {
        /// Name of the time limiter instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the call took before failing.
        duration: Duration,
    },

    /// The inner service did not complete within the timeout.
    Timeout {
        /// Name of the time limiter instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The timeout duration that was exceeded.
        timeout_duration: Duration,
    },
}

impl ResilienceEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
            Self::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Success { timestamp, .. }
            | Self::Error { timestamp, .. }
            | Self::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Success { pattern_name, .. }
            | Self::Error { pattern_name, .. }
            | Self::Timeout { pattern_name, .. } => pattern_name,
        }
    }
}
