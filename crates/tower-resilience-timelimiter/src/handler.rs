//! Context-aware form of the time limiter.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tower_resilience_core::{Context, Handler, Request, ResilienceError, Response};

use crate::config::TimeLimiterConfig;
use crate::events::TimeLimiterEvent;

/// The `Handler` form of the time limiter.
pub struct TimeLimiterHandler<E> {
    inner: Arc<dyn Handler<E>>,
    config: Arc<TimeLimiterConfig<Request>>,
}

impl<E> TimeLimiterHandler<E> {
    pub fn new(config: Arc<TimeLimiterConfig<Request>>, inner: Arc<dyn Handler<E>>) -> Self {
        Self { inner, config }
    }
}

impl<E> Handler<E> for TimeLimiterHandler<E>
where
    E: Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move {
            let timeout_duration = self.config.timeout_source.get_timeout(ctx.request());
            let start = Instant::now();

            match tokio::time::timeout(timeout_duration, self.inner.send(ctx)).await {
                Ok(Ok(response)) => {
                    self.config.event_listeners.emit(&TimeLimiterEvent::Success {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        duration: start.elapsed(),
                    });
                    Ok(response)
                }
                Ok(Err(err)) => {
                    self.config.event_listeners.emit(&TimeLimiterEvent::Error {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        duration: start.elapsed(),
                    });
                    Err(err)
                }
                Err(_elapsed) => {
                    self.config.event_listeners.emit(&TimeLimiterEvent::Timeout {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        timeout_duration,
                    });
                    Err(ResilienceError::Timeout {
                        layer: "time_limiter",
                    })
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimeLimiterLayer;
    use std::time::Duration;

    struct Slow;
    impl Handler<&'static str> for Slow {
        fn send<'a>(
            &'a self,
            _ctx: &'a mut Context,
        ) -> BoxFuture<'a, Result<Response, ResilienceError<&'static str>>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Response::empty(200))
            })
        }
    }

    #[tokio::test]
    async fn times_out_slow_inner_handler() {
        let config = TimeLimiterLayer::<Request>::builder()
            .timeout_duration(Duration::from_millis(5))
            .build_config_arc();
        let inner: Arc<dyn Handler<&'static str>> = Arc::new(Slow);
        let handler = TimeLimiterHandler::new(config, inner);

        let mut ctx = Context::new(Request::get("/"));
        let err = handler.send(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ResilienceError::Timeout { layer: "time_limiter" }));
    }
}
