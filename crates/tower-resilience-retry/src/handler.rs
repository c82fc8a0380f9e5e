//! Context-aware form of the retry policy.
//!
//! [`Retry`](crate::Retry) is the generic Tower [`Service`](tower::Service)
//! form, oblivious to `Context`. [`RetryHandler`] is the counterpart that
//! plugs into a [`Handler`] pipeline: it mutates `Context::retry_count` and
//! `Context::total_retry_delay` directly, can honor a `Retry-After` response
//! header, and races its backoff sleep against `Context::cancellation`
//! instead of sleeping unconditionally.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tower_resilience_core::{Context, Handler, Request, ResilienceError, Response};

use crate::config::RetryConfig;
use crate::events::RetryEvent;

fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// The `Handler` form of the retry policy.
pub struct RetryHandler<E> {
    inner: Arc<dyn Handler<E>>,
    config: Arc<RetryConfig<Request, E>>,
}

impl<E> RetryHandler<E> {
    pub fn new(config: Arc<RetryConfig<Request, E>>, inner: Arc<dyn Handler<E>>) -> Self {
        Self { inner, config }
    }

    fn emit(&self, event: RetryEvent) {
        self.config.event_listeners.emit(&event);
    }

    fn err_is_retryable(&self, err: &ResilienceError<E>) -> bool {
        match err {
            ResilienceError::Cancelled { .. } => false,
            ResilienceError::HttpStatus { status, .. } => is_transient_status(*status),
            ResilienceError::Application(e) => self.config.policy.should_retry(e),
            _ => true,
        }
    }

    /// Computes the backoff delay for the attempt that just failed, honoring
    /// a `Retry-After` response header when configured, accumulates it into
    /// `ctx.total_retry_delay`, and sleeps for it, racing the sleep against
    /// cancellation.
    async fn back_off(
        &self,
        ctx: &mut Context,
        attempt: usize,
        retry_after: Option<Duration>,
    ) -> Result<(), ResilienceError<E>> {
        let mut delay = self.config.policy.next_backoff(attempt);
        if self.config.respect_retry_after {
            if let Some(mut honored) = retry_after {
                if let Some(max) = self.config.max_retry_after_delay {
                    honored = honored.min(max);
                }
                delay = honored;
            }
        }

        ctx.total_retry_delay += delay;

        self.emit(RetryEvent::Retry {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            attempt: attempt + 1,
            delay,
        });

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = ctx.cancellation.cancelled() => Err(ResilienceError::Cancelled {
                reason: Some("retry backoff interrupted by cancellation".into()),
            }),
        }
    }
}

impl<E> Handler<E> for RetryHandler<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move {
            let max_attempts = self
                .config
                .max_attempts_source
                .get_max_attempts(ctx.request());
            let mut attempt = 0usize;

            loop {
                ctx.retry_count = attempt;
                ctx.cancellation.throw_if_cancelled()?;

                match self.inner.send(ctx).await {
                    Ok(response) => {
                        let transient = !response.is_success() && is_transient_status(response.status);
                        if !transient || attempt + 1 >= max_attempts {
                            if let Some(budget) = &self.config.budget {
                                budget.deposit();
                            }
                            self.emit(RetryEvent::Success {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                                attempts: attempt + 1,
                            });
                            ctx.response = Some(response.clone());
                            return Ok(response);
                        }

                        let retry_after = response.retry_after();
                        ctx.response = Some(response);
                        self.back_off(ctx, attempt, retry_after).await?;
                        attempt += 1;
                    }
                    Err(err) => {
                        if matches!(err, ResilienceError::Cancelled { .. }) {
                            return Err(err);
                        }

                        if !self.err_is_retryable(&err) {
                            self.emit(RetryEvent::IgnoredError {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                            });
                            return Err(err);
                        }

                        if attempt + 1 >= max_attempts {
                            self.emit(RetryEvent::Error {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                                attempts: attempt + 1,
                            });
                            return Err(ResilienceError::RetryExhausted {
                                attempts_made: attempt + 1,
                            });
                        }

                        if let Some(budget) = &self.config.budget {
                            if !budget.try_withdraw() {
                                self.emit(RetryEvent::BudgetExhausted {
                                    pattern_name: self.config.name.clone(),
                                    timestamp: Instant::now(),
                                    attempt: attempt + 1,
                                });
                                return Err(err);
                            }
                        }

                        let retry_after = ctx.response.as_ref().and_then(|r| r.retry_after());
                        self.back_off(ctx, attempt, retry_after).await?;
                        attempt += 1;
                    }
                }
            }
        })
    }
}
