//! Enhanced retry middleware for Tower services.
//!
//! This crate provides advanced retry functionality beyond Tower's built-in retry,
//! with flexible backoff strategies, retry predicates, and comprehensive event system.
//!
//! # Features
//!
//! - **IntervalFunction abstraction**: Pluggable backoff strategies
//!   - Fixed interval
//!   - Exponential backoff with configurable multiplier
//!   - Exponential random backoff with randomization factor
//!   - Custom function-based backoff
//! - **Per-request configuration**: Extract max attempts from the request
//! - **Retry predicates**: Control which errors should be retried
//! - **Event system**: Observability through retry events
//! - **Flexible configuration**: Builder API with sensible defaults
//!
//! # Examples
//!
//! ## Basic Retry with Exponential Backoff
//!
//! ```
//! use tower_resilience_retry::RetryLayer;
//! use tower::ServiceBuilder;
//! use std::time::Duration;
//!
//! # #[derive(Debug, Clone)]
//! # struct MyError;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create retry layer with exponential backoff
//! let retry_layer = RetryLayer::<String, MyError>::builder()
//!     .max_attempts(5)
//!     .exponential_backoff(Duration::from_millis(100))
//!     .on_retry(|attempt, delay| {
//!         println!("Retry attempt {} after {:?}", attempt, delay);
//!     })
//!     .build();
//!
//! // Apply to a service
//! let service = ServiceBuilder::new()
//!     .layer(retry_layer)
//!     .service(tower::service_fn(|req: String| async move {
//!         Ok::<_, MyError>(format!("Response: {}", req))
//!     }));
//! # Ok(())
//! # }
//! ```
//!
//! ## Per-Request Max Attempts
//!
//! Extract retry configuration from the request itself:
//!
//! ```
//! use tower_resilience_retry::RetryLayer;
//! use tower::ServiceBuilder;
//! use std::time::Duration;
//!
//! #[derive(Clone)]
//! struct MyRequest {
//!     is_idempotent: bool,
//!     data: String,
//! }
//!
//! # #[derive(Debug, Clone)]
//! # struct MyError;
//! # async fn example() {
//! // Idempotent requests can retry more aggressively
//! let retry_layer = RetryLayer::<MyRequest, MyError>::builder()
//!     .max_attempts_fn(|req: &MyRequest| {
//!         if req.is_idempotent { 5 } else { 1 }
//!     })
//!     .exponential_backoff(Duration::from_millis(100))
//!     .build();
//! # }
//! ```
//!
//! ## Fallback After Retry Exhaustion
//!
//! When retries are exhausted, you can provide a fallback response using standard error handling:
//!
//! ```
//! use tower_resilience_retry::RetryLayer;
//! use tower::{Service, ServiceBuilder, ServiceExt};
//! use std::time::Duration;
//!
//! # #[derive(Debug, Clone)]
//! # struct MyError;
//! # impl std::fmt::Display for MyError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//! #         write!(f, "MyError")
//! #     }
//! # }
//! # impl std::error::Error for MyError {}
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let retry_layer = RetryLayer::<String, MyError>::builder()
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(100))
//!     .build();
//!
//! let mut service = ServiceBuilder::new()
//!     .layer(retry_layer)
//!     .service(tower::service_fn(|req: String| async move {
//!         Err::<String, MyError>(MyError) // Always fails
//!     }));
//!
//! // Handle retry exhaustion with fallback
//! let result = service.ready().await?.call("request".to_string()).await
//!     .unwrap_or_else(|_| "Fallback: Service unavailable".to_string());
//! # Ok(())
//! # }
//! ```
//!
//! ### Fallback with Cached Data
//!
//! ```
//! use tower_resilience_retry::RetryLayer;
//! use tower::{Service, ServiceBuilder, ServiceExt};
//! use std::time::Duration;
//! use std::sync::Arc;
//! use std::collections::HashMap;
//!
//! # #[derive(Debug, Clone)]
//! # struct MyError;
//! # impl std::fmt::Display for MyError {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//! #         write!(f, "MyError")
//! #     }
//! # }
//! # impl std::error::Error for MyError {}
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(std::sync::RwLock::new(HashMap::new()));
//! cache.write().unwrap().insert("key", "cached value");
//!
//! let retry_layer = RetryLayer::<String, MyError>::builder()
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(50))
//!     .build();
//!
//! let mut service = ServiceBuilder::new()
//!     .layer(retry_layer)
//!     .service(tower::service_fn(|req: String| async move {
//!         Err::<String, MyError>(MyError)
//!     }));
//!
//! let cache_clone = Arc::clone(&cache);
//! let result = service.ready().await?.call("key".to_string()).await
//!     .unwrap_or_else(|_| {
//!         cache_clone.read().unwrap()
//!             .get("key")
//!             .map(|s| s.to_string())
//!             .unwrap_or_else(|| "Default value".to_string())
//!     });
//! # Ok(())
//! # }
//! ```

mod backoff;
mod budget;
mod config;
mod error;
mod events;
mod handler;
mod layer;
mod policy;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use budget::{AimdBudget, RetryBudget, RetryBudgetBuilder, TokenBucketBudget};
pub use config::{MaxAttemptsSource, RetryConfig, RetryConfigBuilder};
pub use error::RetryError;
pub use events::RetryEvent;
pub use handler::RetryHandler;
pub use layer::RetryLayer;
pub use policy::{RetryPolicy, RetryPredicate};

use futures::future::BoxFuture;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

/// A Tower [`Service`] that retries failed requests.
///
/// This service wraps an inner service and automatically retries requests
/// that fail, according to the configured retry policy and backoff strategy.
pub struct Retry<S, Req, E> {
    inner: S,
    config: Arc<RetryConfig<Req, E>>,
    _phantom: PhantomData<Req>,
}

impl<S, Req, E> Retry<S, Req, E> {
    /// Creates a new `Retry` service wrapping the given service.
    pub fn new(inner: S, config: Arc<RetryConfig<Req, E>>, _phantom: PhantomData<Req>) -> Self {
        #[cfg(feature = "metrics")]
        {
            describe_counter!(
                "retry_calls_total",
                "Total number of retry operations (success or exhausted)"
            );
            describe_counter!(
                "retry_attempts_total",
                "Total number of retry attempts across all calls"
            );
            describe_histogram!("retry_attempts", "Number of attempts per successful call");
        }

        Self {
            inner,
            config,
            _phantom,
        }
    }
}

impl<S, Req, E> Clone for Retry<S, Req, E>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            _phantom: PhantomData,
        }
    }
}

impl<S, Req, E> Service<Req> for Retry<S, Req, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    E: Clone + Send + 'static,
    S::Response: Send + 'static,
{
    type Response = S::Response;
    type Error = RetryError<E>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RetryError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut service = self.inner.clone();
        let config = Arc::clone(&self.config);

        // Extract max_attempts from request before moving it
        let max_attempts = config.max_attempts_source.get_max_attempts(&req);

        Box::pin(async move {
            let mut attempt = 0;

            loop {
                let result = service.call(req.clone()).await;

                match result {
                    Ok(response) => {
                        // Success - deposit to budget if configured
                        if let Some(ref budget) = config.budget {
                            budget.deposit();
                        }

                        #[cfg(feature = "metrics")]
                        {
                            counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "success").increment(1);
                            histogram!("retry_attempts", "retry" => config.name.clone())
                                .record((attempt + 1) as f64);
                        }

                        #[cfg(feature = "tracing")]
                        {
                            if attempt > 0 {
                                info!(retry = %config.name, attempts = attempt + 1, "Request succeeded after retries");
                            } else {
                                debug!(retry = %config.name, "Request succeeded on first attempt");
                            }
                        }

                        let event = RetryEvent::Success {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        };
                        config.event_listeners.emit(&event);
                        return Ok(response);
                    }
                    Err(error) => {
                        // Check if we should retry this error
                        if !config.policy.should_retry(&error) {
                            #[cfg(feature = "tracing")]
                            debug!(retry = %config.name, "Error not retryable, failing immediately");

                            let event = RetryEvent::IgnoredError {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                            };
                            config.event_listeners.emit(&event);
                            return Err(RetryError::Inner(error));
                        }

                        // Check if we've exhausted retries (use per-request max_attempts)
                        if attempt + 1 >= max_attempts {
                            #[cfg(feature = "metrics")]
                            {
                                counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "exhausted").increment(1);
                            }

                            #[cfg(feature = "tracing")]
                            warn!(retry = %config.name, attempts = attempt + 1, max_attempts = max_attempts, "Retry attempts exhausted");

                            let event = RetryEvent::Error {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                                attempts: attempt + 1,
                            };
                            config.event_listeners.emit(&event);
                            return Err(RetryError::Exhausted {
                                attempts_made: attempt + 1,
                                cause: error,
                            });
                        }

                        // Check retry budget if configured
                        if let Some(ref budget) = config.budget {
                            if !budget.try_withdraw() {
                                #[cfg(feature = "metrics")]
                                {
                                    counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "budget_exhausted").increment(1);
                                }

                                #[cfg(feature = "tracing")]
                                warn!(retry = %config.name, attempt = attempt + 1, "Retry budget exhausted, failing immediately");

                                let event = RetryEvent::BudgetExhausted {
                                    pattern_name: config.name.clone(),
                                    timestamp: Instant::now(),
                                    attempt: attempt + 1,
                                };
                                config.event_listeners.emit(&event);
                                return Err(RetryError::BudgetExhausted(error));
                            }
                        }

                        // Calculate backoff and retry
                        let delay = config.policy.next_backoff(attempt);

                        #[cfg(feature = "metrics")]
                        {
                            counter!("retry_attempts_total", "retry" => config.name.clone())
                                .increment(1);
                        }

                        #[cfg(feature = "tracing")]
                        debug!(retry = %config.name, attempt = attempt + 1, delay_ms = delay.as_millis(), "Retrying after delay");

                        let event = RetryEvent::Retry {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                            delay,
                        };
                        config.event_listeners.emit(&event);

                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}
