//! Bulkhead service implementation.

use crate::config::BulkheadConfig;
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::Semaphore;
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Bulkhead service that limits concurrent calls.
#[derive(Clone)]
pub struct Bulkhead<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
    queue_depth: Arc<AtomicUsize>,
    config: Arc<BulkheadConfig>,
}

impl<S> Bulkhead<S> {
    /// Creates a new bulkhead service.
    pub(crate) fn new(inner: S, config: BulkheadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_calls));
        Self {
            inner,
            semaphore,
            queue_depth: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        }
    }
}

impl<S, Request> Service<Request> for Bulkhead<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: From<BulkheadError> + Send + 'static,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let semaphore = Arc::clone(&self.semaphore);
        let semaphore_for_check = Arc::clone(&self.semaphore);
        let queue_depth = Arc::clone(&self.queue_depth);
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();
        let start_time = Instant::now();

        Box::pin(async move {
            let reject = |error: BulkheadError| {
                let event = BulkheadEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    max_concurrent_calls: config.max_concurrent_calls,
                };
                config.event_listeners.emit(&event);

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_rejected_total", "bulkhead" => config.name.clone())
                    .increment(1);

                error
            };

            // Fast path: a permit is immediately available, no queueing needed.
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    let depth = queue_depth.fetch_add(1, Ordering::AcqRel) + 1;
                    if let Some(max_depth) = config.max_queue_depth {
                        if depth > max_depth {
                            queue_depth.fetch_sub(1, Ordering::AcqRel);
                            return Err(reject(BulkheadError::BulkheadFull {
                                max_concurrent_calls: config.max_concurrent_calls,
                                queue_depth: depth - 1,
                            })
                            .into());
                        }
                    }

                    let acquired = match config.max_wait_duration {
                        Some(duration) => {
                            tokio::time::timeout(duration, semaphore.acquire_owned()).await
                        }
                        None => Ok(semaphore.acquire_owned().await),
                    };
                    queue_depth.fetch_sub(1, Ordering::AcqRel);

                    match acquired {
                        Ok(Ok(permit)) => permit,
                        Ok(Err(_)) => {
                            // Semaphore was closed, shouldn't happen in normal operation.
                            return Err(reject(BulkheadError::BulkheadFull {
                                max_concurrent_calls: config.max_concurrent_calls,
                                queue_depth: depth,
                            })
                            .into());
                        }
                        Err(_) => {
                            return Err(reject(BulkheadError::Timeout).into());
                        }
                    }
                }
            };

            // Emit call permitted event
            let concurrent_calls =
                config.max_concurrent_calls - semaphore_for_check.available_permits();
            let event = BulkheadEvent::CallPermitted {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                concurrent_calls,
            };
            config.event_listeners.emit(&event);

            #[cfg(feature = "metrics")]
            {
                counter!("bulkhead_calls_permitted_total", "bulkhead" => config.name.clone())
                    .increment(1);
                gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                    .set(concurrent_calls as f64);
            }

            // Call the inner service
            let result = inner.call(request).await;

            // Drop the permit to release the slot
            drop(permit);

            let duration = start_time.elapsed();

            // Emit completion event
            match &result {
                Ok(_) => {
                    let event = BulkheadEvent::CallFinished {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    };
                    config.event_listeners.emit(&event);

                    #[cfg(feature = "metrics")]
                    counter!("bulkhead_calls_finished_total", "bulkhead" => config.name.clone())
                        .increment(1);
                }
                Err(_) => {
                    let event = BulkheadEvent::CallFailed {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    };
                    config.event_listeners.emit(&event);

                    #[cfg(feature = "metrics")]
                    counter!("bulkhead_calls_failed_total", "bulkhead" => config.name.clone())
                        .increment(1);
                }
            }

            #[cfg(feature = "metrics")]
            {
                let new_concurrent =
                    config.max_concurrent_calls - semaphore_for_check.available_permits();
                gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                    .set(new_concurrent as f64);
            }

            result
        })
    }
}
