//! Context-aware form of the hedging policy.
//!
//! [`Hedge`](crate::Hedge) is the generic Tower [`Service`](tower::Service)
//! form. [`HedgeHandler`] is the `Handler`-pipeline counterpart: each hedged
//! attempt gets its own `Context`, forked from the caller's via
//! [`Context::fork_for_hedge`](tower_resilience_core::Context::fork_for_hedge)
//! so siblings share the parent's cancellation signal but never share
//! `retry_count`/`total_retry_delay` bookkeeping with each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tower_resilience_core::{Context, Handler, Request, ResilienceError, Response};

use crate::config::HedgeConfig;
use crate::events::HedgeEvent;

type AttemptResult<E> = (usize, Result<Response, ResilienceError<E>>);

fn spawn_attempt<E>(
    inner: Arc<dyn Handler<E>>,
    mut forked: Context,
    attempt: usize,
    tx: mpsc::Sender<AttemptResult<E>>,
) where
    E: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let result = inner.send(&mut forked).await;
        let _ = tx.send((attempt, result)).await;
    });
}

/// The `Handler` form of the hedging policy.
pub struct HedgeHandler<E> {
    inner: Arc<dyn Handler<E>>,
    config: Arc<HedgeConfig<Request, Response, E>>,
}

impl<E> HedgeHandler<E> {
    pub fn new(config: Arc<HedgeConfig<Request, Response, E>>, inner: Arc<dyn Handler<E>>) -> Self {
        Self { inner, config }
    }

    fn accept(&self, response: &Response) -> bool {
        self.config
            .should_hedge
            .as_ref()
            .map_or(true, |predicate| !predicate(response))
    }
}

impl<E> Handler<E> for HedgeHandler<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move {
            let max_attempts = self.config.max_hedged_attempts.max(1);
            let start = Instant::now();

            self.config.listeners.emit(&HedgeEvent::PrimaryStarted {
                name: self.config.name.clone(),
                timestamp: Instant::now(),
            });

            let (tx, mut rx) = mpsc::channel::<AttemptResult<E>>(max_attempts);

            spawn_attempt(Arc::clone(&self.inner), ctx.fork_for_hedge(), 0, tx.clone());

            let mut hedges_spawned: usize = 0;
            let mut primary_error: Option<ResilienceError<E>> = None;
            let mut fallback: Option<(usize, Response)> = None;

            if max_attempts > 1 {
                let first_delay = self.config.delay.get_delay(1).unwrap_or(Duration::ZERO);
                let mut delay_fut = std::pin::pin!(tokio::time::sleep(first_delay));

                'hedging: loop {
                    tokio::select! {
                        biased;

                        Some((attempt, result)) = rx.recv() => {
                            match result {
                                Ok(response) if self.accept(&response) => {
                                    let duration = start.elapsed();
                                    if attempt == 0 {
                                        self.config.listeners.emit(&HedgeEvent::PrimarySucceeded {
                                            name: self.config.name.clone(),
                                            duration,
                                            hedges_cancelled: hedges_spawned,
                                            timestamp: Instant::now(),
                                        });
                                    } else {
                                        self.config.listeners.emit(&HedgeEvent::HedgeSucceeded {
                                            name: self.config.name.clone(),
                                            attempt,
                                            duration,
                                            primary_cancelled: true,
                                            timestamp: Instant::now(),
                                        });
                                    }
                                    ctx.response = Some(response.clone());
                                    return Ok(response);
                                }
                                Ok(response) => {
                                    if fallback.is_none() {
                                        fallback = Some((attempt, response));
                                    }
                                    if hedges_spawned + 1 >= max_attempts {
                                        break 'hedging;
                                    }
                                }
                                Err(e) => {
                                    if attempt == 0 {
                                        primary_error = Some(e);
                                    }
                                    if hedges_spawned + 1 >= max_attempts {
                                        break 'hedging;
                                    }
                                }
                            }
                        }

                        _ = &mut delay_fut, if hedges_spawned + 1 < max_attempts => {
                            hedges_spawned += 1;
                            let attempt_num = hedges_spawned;

                            self.config.listeners.emit(&HedgeEvent::HedgeStarted {
                                name: self.config.name.clone(),
                                attempt: attempt_num,
                                delay: first_delay,
                                timestamp: Instant::now(),
                            });

                            spawn_attempt(
                                Arc::clone(&self.inner),
                                ctx.fork_for_hedge(),
                                attempt_num,
                                tx.clone(),
                            );

                            if hedges_spawned + 1 < max_attempts {
                                if let Some(next_delay) = self.config.delay.get_delay(hedges_spawned + 1) {
                                    delay_fut.set(tokio::time::sleep(next_delay));
                                }
                            }
                        }
                    }
                }
            }

            drop(tx);
            let total_attempts = hedges_spawned + 1;

            while let Some((attempt, result)) = rx.recv().await {
                match result {
                    Ok(response) if self.accept(&response) => {
                        let duration = start.elapsed();
                        self.config.listeners.emit(&HedgeEvent::HedgeSucceeded {
                            name: self.config.name.clone(),
                            attempt,
                            duration,
                            primary_cancelled: attempt != 0,
                            timestamp: Instant::now(),
                        });
                        ctx.response = Some(response.clone());
                        return Ok(response);
                    }
                    Ok(response) => {
                        if fallback.is_none() {
                            fallback = Some((attempt, response));
                        }
                    }
                    Err(e) => {
                        if primary_error.is_none() {
                            primary_error = Some(e);
                        }
                    }
                }
            }

            if let Some((attempt, response)) = fallback {
                let duration = start.elapsed();
                self.config.listeners.emit(&HedgeEvent::HedgeSucceeded {
                    name: self.config.name.clone(),
                    attempt,
                    duration,
                    primary_cancelled: attempt != 0,
                    timestamp: Instant::now(),
                });
                ctx.response = Some(response.clone());
                return Ok(response);
            }

            self.config.listeners.emit(&HedgeEvent::AllFailed {
                name: self.config.name.clone(),
                attempts: total_attempts,
                timestamp: Instant::now(),
            });

            let _ = primary_error;
            Err(ResilienceError::HedgingFailed {
                attempts_made: total_attempts,
            })
        })
    }
}
