//! Error types for bulkhead pattern.

/// Errors that can occur when using a bulkhead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BulkheadError {
    /// The bulkhead rejected the call immediately because both its
    /// concurrent-call slots and its wait queue were full.
    #[error("bulkhead is full: max concurrent calls ({max_concurrent_calls}) reached, {queue_depth} already queued")]
    BulkheadFull {
        /// Maximum concurrent calls allowed.
        max_concurrent_calls: usize,
        /// Number of callers already queued waiting for a permit at the time of rejection.
        queue_depth: usize,
    },
    /// The call queued for a permit but `max_wait_duration` elapsed first.
    #[error("timeout waiting for bulkhead permit")]
    Timeout,
}

/// Result type for bulkhead operations.
pub type Result<T> = std::result::Result<T, BulkheadError>;

impl<E> From<BulkheadError> for tower_resilience_core::ResilienceError<E> {
    fn from(err: BulkheadError) -> Self {
        match err {
            BulkheadError::BulkheadFull {
                max_concurrent_calls,
                ..
            } => tower_resilience_core::ResilienceError::BulkheadFull {
                concurrent_calls: max_concurrent_calls,
                max_concurrent: max_concurrent_calls,
                reason: tower_resilience_core::BulkheadRejectReason::QueueFull,
            },
            BulkheadError::Timeout => tower_resilience_core::ResilienceError::BulkheadFull {
                concurrent_calls: 0,
                max_concurrent: 0,
                reason: tower_resilience_core::BulkheadRejectReason::QueueTimeout,
            },
        }
    }
}
