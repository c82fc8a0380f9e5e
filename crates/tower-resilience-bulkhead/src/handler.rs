//! Context-aware form of the bulkhead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tower_resilience_core::{Context, Handler, ResilienceError, Response};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

use crate::config::BulkheadConfig;
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;

/// The `Handler` form of the bulkhead pattern.
pub struct BulkheadHandler<E> {
    inner: Arc<dyn Handler<E>>,
    semaphore: Arc<Semaphore>,
    queue_depth: Arc<AtomicUsize>,
    config: Arc<BulkheadConfig>,
}

impl<E> BulkheadHandler<E> {
    pub fn new(config: Arc<BulkheadConfig>, inner: Arc<dyn Handler<E>>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_calls));
        Self {
            inner,
            semaphore,
            queue_depth: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }
}

impl<E> Handler<E> for BulkheadHandler<E>
where
    E: Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move {
            let config = &self.config;
            let start_time = Instant::now();

            let reject = |error: BulkheadError| {
                config.event_listeners.emit(&BulkheadEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    max_concurrent_calls: config.max_concurrent_calls,
                });

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_rejected_total", "bulkhead" => config.name.clone())
                    .increment(1);

                ResilienceError::from(error)
            };

            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    let depth = self.queue_depth.fetch_add(1, Ordering::AcqRel) + 1;
                    if let Some(max_depth) = config.max_queue_depth {
                        if depth > max_depth {
                            self.queue_depth.fetch_sub(1, Ordering::AcqRel);
                            return Err(reject(BulkheadError::BulkheadFull {
                                max_concurrent_calls: config.max_concurrent_calls,
                                queue_depth: depth - 1,
                            }));
                        }
                    }

                    let acquired = match config.max_wait_duration {
                        Some(duration) => {
                            tokio::time::timeout(duration, self.semaphore.acquire_owned()).await
                        }
                        None => Ok(self.semaphore.acquire_owned().await),
                    };
                    self.queue_depth.fetch_sub(1, Ordering::AcqRel);

                    match acquired {
                        Ok(Ok(permit)) => permit,
                        Ok(Err(_)) => {
                            return Err(reject(BulkheadError::BulkheadFull {
                                max_concurrent_calls: config.max_concurrent_calls,
                                queue_depth: depth,
                            }));
                        }
                        Err(_) => {
                            return Err(reject(BulkheadError::Timeout));
                        }
                    }
                }
            };

            let concurrent_calls =
                config.max_concurrent_calls - self.semaphore.available_permits();
            config.event_listeners.emit(&BulkheadEvent::CallPermitted {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                concurrent_calls,
            });

            #[cfg(feature = "metrics")]
            {
                counter!("bulkhead_calls_permitted_total", "bulkhead" => config.name.clone())
                    .increment(1);
                gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                    .set(concurrent_calls as f64);
            }

            let result = self.inner.send(ctx).await;
            drop(permit);

            let duration = start_time.elapsed();

            match &result {
                Ok(_) => {
                    config.event_listeners.emit(&BulkheadEvent::CallFinished {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("bulkhead_calls_finished_total", "bulkhead" => config.name.clone())
                        .increment(1);
                }
                Err(_) => {
                    config.event_listeners.emit(&BulkheadEvent::CallFailed {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("bulkhead_calls_failed_total", "bulkhead" => config.name.clone())
                        .increment(1);
                }
            }

            #[cfg(feature = "metrics")]
            {
                let new_concurrent =
                    config.max_concurrent_calls - self.semaphore.available_permits();
                gauge!("bulkhead_concurrent_calls", "bulkhead" => config.name.clone())
                    .set(new_concurrent as f64);
            }

            result
        })
    }
}
