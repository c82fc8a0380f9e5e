//! Context-aware form of the circuit breaker.
//!
//! Unlike [`CircuitBreaker`](crate::CircuitBreaker), the Tower [`Service`](tower::Service)
//! form, [`CircuitBreakerHandler`] plugs directly into a [`Handler`] pipeline and
//! classifies outcomes from the unified [`ResilienceError`].

use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tower_resilience_core::{Context, Handler, ResilienceError, Response};

use crate::circuit::{Circuit, CircuitState};
use crate::config::CircuitBreakerConfig;

/// The `Handler` form of the circuit breaker.
pub struct CircuitBreakerHandler<E> {
    inner: Arc<dyn Handler<E>>,
    circuit: Mutex<Circuit>,
    config: Arc<CircuitBreakerConfig<Response, E>>,
}

impl<E> CircuitBreakerHandler<E> {
    pub fn new(config: Arc<CircuitBreakerConfig<Response, E>>, inner: Arc<dyn Handler<E>>) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            inner,
            circuit: Mutex::new(Circuit::new_with_atomic(state_atomic)),
            config,
        }
    }

    /// Returns the current state of the circuit.
    pub async fn state(&self) -> CircuitState {
        self.circuit.lock().await.state()
    }
}

impl<E> Handler<E> for CircuitBreakerHandler<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move {
            let permitted = {
                let mut circuit = self.circuit.lock().await;
                circuit.try_acquire(&self.config)
            };

            if !permitted {
                return Err(ResilienceError::CircuitOpen {
                    name: Some(self.config.name.clone()),
                    retry_after: Some(self.config.wait_duration_in_open),
                });
            }

            let start = Instant::now();
            let result = self.inner.send(ctx).await;
            let duration = start.elapsed();

            let is_failure = match &result {
                Ok(response) => (self.config.failure_classifier)(&Ok(response.clone())),
                Err(ResilienceError::Application(e)) => {
                    (self.config.failure_classifier)(&Err(e.clone()))
                }
                Err(_) => true,
            };

            let mut circuit = self.circuit.lock().await;
            if is_failure {
                circuit.record_failure(&self.config, duration);
            } else {
                circuit.record_success(&self.config, duration);
            }
            drop(circuit);

            if let Ok(response) = &result {
                ctx.response = Some(response.clone());
            }

            result
        })
    }
}
