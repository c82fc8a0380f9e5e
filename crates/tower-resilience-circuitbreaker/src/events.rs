//! Events emitted by the circuit breaker.

use crate::circuit::CircuitState;
use std::time::{Duration, Instant};
use tower_resilience_core::ResilienceEvent;

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit transitioned from one state to another.
    StateTransition {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The state the circuit left.
        from_state: CircuitState,
        /// The state the circuit entered.
        to_state: CircuitState,
    },

    /// A call was permitted through the circuit.
    CallPermitted {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The circuit's state at the time the call was permitted.
        state: CircuitState,
    },

    /// A call was rejected because the circuit is open.
    CallRejected {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// A permitted call succeeded.
    SuccessRecorded {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The circuit's state at the time the success was recorded.
        state: CircuitState,
    },

    /// A permitted call failed.
    FailureRecorded {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The circuit's state at the time the failure was recorded.
        state: CircuitState,
    },

    /// A permitted call completed slower than the configured threshold.
    SlowCallDetected {
        /// Name of the circuit breaker instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the call took.
        duration: Duration,
        /// The circuit's state at the time the slow call was detected.
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state_transition",
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
            Self::SuccessRecorded { .. } => "success_recorded",
            Self::FailureRecorded { .. } => "failure_recorded",
            Self::SlowCallDetected { .. } => "slow_call_detected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::StateTransition { timestamp, .. }
            | Self::CallPermitted { timestamp, .. }
            | Self::CallRejected { timestamp, .. }
            | Self::SuccessRecorded { timestamp, .. }
            | Self::FailureRecorded { timestamp, .. }
            | Self::SlowCallDetected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::StateTransition { pattern_name, .. }
            | Self::CallPermitted { pattern_name, .. }
            | Self::CallRejected { pattern_name, .. }
            | Self::SuccessRecorded { pattern_name, .. }
            | Self::FailureRecorded { pattern_name, .. }
            | Self::SlowCallDetected { pattern_name, .. } => pattern_name,
        }
    }
}
