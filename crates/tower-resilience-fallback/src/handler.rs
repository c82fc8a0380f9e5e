//! Context-aware form of the fallback policy.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tower_resilience_core::{Context, Handler, Request, ResilienceError, Response};

use crate::config::FallbackConfig;
use crate::events::FallbackEvent;
use crate::FallbackStrategy;

/// The `Handler` form of the fallback policy.
pub struct FallbackHandler<E> {
    inner: Arc<dyn Handler<E>>,
    config: Arc<FallbackConfig<Request, Response, E>>,
}

impl<E> FallbackHandler<E> {
    pub fn new(config: Arc<FallbackConfig<Request, Response, E>>, inner: Arc<dyn Handler<E>>) -> Self {
        Self { inner, config }
    }
}

impl<E> Handler<E> for FallbackHandler<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move {
            let result = self.inner.send(ctx).await;

            let error = match result {
                Ok(response) => {
                    self.config.event_listeners.emit(&FallbackEvent::Success {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    return Ok(response);
                }
                Err(err) => err,
            };

            // Only the `Application` variant carries the raw error the
            // configured predicate/classifier/strategy closures expect.
            // Every other variant (timeout, circuit open, ...) is treated as
            // an unconditional failure worth falling back for.
            let app_error = match &error {
                ResilienceError::Application(e) => Some(e.clone()),
                _ => None,
            };

            let should_handle = match &app_error {
                Some(e) => {
                    if let Some(p) = self.config.handle_predicate.as_ref() {
                        p(e)
                    } else if let Some(classifier) = self.config.classifier.as_ref() {
                        classifier.classify(None, Some(e)).is_failure()
                    } else {
                        true
                    }
                }
                None => true,
            };

            if !should_handle {
                self.config.event_listeners.emit(&FallbackEvent::Skipped {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });
                return Err(error);
            }

            self.config
                .event_listeners
                .emit(&FallbackEvent::FailedAttempt {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });

            match &self.config.strategy {
                FallbackStrategy::Value(v) => {
                    self.config.event_listeners.emit(&FallbackEvent::Applied {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        strategy: "value",
                    });
                    ctx.response = Some(v.clone());
                    Ok(v.clone())
                }

                FallbackStrategy::ValueFn(f) => {
                    let response = f();
                    self.config.event_listeners.emit(&FallbackEvent::Applied {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        strategy: "value_fn",
                    });
                    ctx.response = Some(response.clone());
                    Ok(response)
                }

                FallbackStrategy::FromError(f) => match &app_error {
                    Some(e) => {
                        let response = f(e);
                        self.config.event_listeners.emit(&FallbackEvent::Applied {
                            pattern_name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            strategy: "from_error",
                        });
                        ctx.response = Some(response.clone());
                        Ok(response)
                    }
                    None => Err(error),
                },

                FallbackStrategy::FromRequestError(f) => match &app_error {
                    Some(e) => {
                        let response = f(ctx.request(), e);
                        self.config.event_listeners.emit(&FallbackEvent::Applied {
                            pattern_name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            strategy: "from_request_error",
                        });
                        ctx.response = Some(response.clone());
                        Ok(response)
                    }
                    None => Err(error),
                },

                FallbackStrategy::Service(backup) => {
                    match backup(ctx.request().clone()).await {
                        Ok(response) => {
                            self.config.event_listeners.emit(&FallbackEvent::Applied {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                                strategy: "service",
                            });
                            ctx.response = Some(response.clone());
                            Ok(response)
                        }
                        Err(_backup_error) => {
                            self.config.event_listeners.emit(&FallbackEvent::Failed {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                            });
                            Err(error)
                        }
                    }
                }

                FallbackStrategy::Exception(transform) => match app_error {
                    Some(e) => {
                        let transformed = transform(e);
                        self.config.event_listeners.emit(&FallbackEvent::Applied {
                            pattern_name: self.config.name.clone(),
                            timestamp: Instant::now(),
                            strategy: "exception",
                        });
                        Err(ResilienceError::Application(transformed))
                    }
                    None => Err(error),
                },
            }
        })
    }
}
