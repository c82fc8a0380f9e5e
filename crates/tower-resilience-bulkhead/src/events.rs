//! Events emitted by the bulkhead.

use std::time::{Duration, Instant};
use tower_resilience_core::events::ResilienceEvent;

/// Events emitted by the bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call acquired a permit and was allowed to proceed.
    CallPermitted {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Number of concurrent calls in flight after this call was permitted.
        concurrent_calls: usize,
    },

    /// A call was rejected because the bulkhead was at capacity.
    CallRejected {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The configured maximum number of concurrent calls.
        max_concurrent_calls: usize,
    },

    /// A permitted call finished successfully and released its permit.
    CallFinished {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the call held its permit.
        duration: Duration,
    },

    /// A permitted call failed and released its permit.
    CallFailed {
        /// Name of the bulkhead instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the call held its permit before failing.
        duration: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
            Self::CallFinished { .. } => "call_finished",
            Self::CallFailed { .. } => "call_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::CallPermitted { timestamp, .. }
            | Self::CallRejected { timestamp, .. }
            | Self::CallFinished { timestamp, .. }
            | Self::CallFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::CallPermitted { pattern_name, .. }
            | Self::CallRejected { pattern_name, .. }
            | Self::CallFinished { pattern_name, .. }
            | Self::CallFailed { pattern_name, .. } => pattern_name,
        }
    }
}
