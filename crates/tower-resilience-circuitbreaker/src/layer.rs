use crate::config::CircuitBreakerConfig;
use crate::CircuitBreaker;
use std::marker::PhantomData;
use std::sync::Arc;
use tower::Layer;

/// A Tower [`Layer`] that applies circuit breaker behavior to an inner service.
///
/// # Examples
///
/// ```rust
/// use tower::{ServiceBuilder, service_fn};
/// use tower_resilience_circuitbreaker::CircuitBreakerLayer;
///
/// let layer = CircuitBreakerLayer::<String, String, std::io::Error>::builder()
///     .failure_rate_threshold(0.5)
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
pub struct CircuitBreakerLayer<Req, Res, Err> {
    config: Arc<CircuitBreakerConfig<Res, Err>>,
    _phantom: PhantomData<fn() -> Req>,
}

impl<Req, Res, Err> Clone for CircuitBreakerLayer<Req, Res, Err> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            _phantom: PhantomData,
        }
    }
}

impl<Req, Res, Err> CircuitBreakerLayer<Req, Res, Err> {
    /// Creates a new `CircuitBreakerLayer` from the given configuration.
    pub(crate) fn new(config: CircuitBreakerConfig<Res, Err>) -> Self {
        Self {
            config: Arc::new(config),
            _phantom: PhantomData,
        }
    }

    /// Creates a new builder for configuring a circuit breaker layer.
    pub fn builder() -> crate::CircuitBreakerConfigBuilder<Res, Err> {
        crate::CircuitBreakerConfigBuilder::new()
    }

    /// Returns the shared configuration backing this layer, for building a
    /// [`CircuitBreakerHandler`](crate::CircuitBreakerHandler) instead of a
    /// Tower [`Layer`].
    pub fn config_arc(&self) -> Arc<CircuitBreakerConfig<Res, Err>> {
        Arc::clone(&self.config)
    }

    // =========================================================================
    // Presets
    // =========================================================================

    /// Preset: Standard balanced circuit breaker configuration.
    ///
    /// - 50% failure rate threshold
    /// - 100 call sliding window
    /// - 30 second wait duration in open state
    /// - 3 permitted calls in half-open state
    pub fn standard() -> crate::CircuitBreakerConfigBuilder<Res, Err> {
        use std::time::Duration;
        Self::builder()
            .failure_rate_threshold(0.5)
            .sliding_window_size(100)
            .wait_duration_in_open(Duration::from_secs(30))
            .permitted_calls_in_half_open(3)
    }

    /// Preset: Fast-fail circuit breaker for latency-sensitive scenarios.
    ///
    /// - 25% failure rate threshold
    /// - 20 call sliding window
    /// - 10 second wait duration in open state
    /// - 1 permitted call in half-open state
    pub fn fast_fail() -> crate::CircuitBreakerConfigBuilder<Res, Err> {
        use std::time::Duration;
        Self::builder()
            .failure_rate_threshold(0.25)
            .sliding_window_size(20)
            .wait_duration_in_open(Duration::from_secs(10))
            .permitted_calls_in_half_open(1)
    }

    /// Preset: Tolerant circuit breaker for resilient scenarios.
    ///
    /// - 75% failure rate threshold
    /// - 200 call sliding window
    /// - 60 second wait duration in open state
    /// - 5 permitted calls in half-open state
    pub fn tolerant() -> crate::CircuitBreakerConfigBuilder<Res, Err> {
        use std::time::Duration;
        Self::builder()
            .failure_rate_threshold(0.75)
            .sliding_window_size(200)
            .wait_duration_in_open(Duration::from_secs(60))
            .permitted_calls_in_half_open(5)
    }
}

impl<E> CircuitBreakerLayer<tower_resilience_core::Request, tower_resilience_core::Response, E> {
    /// Converts this layer into the `Handler` form of the circuit breaker,
    /// wrapping `inner` as the next pipeline stage. Only available when the
    /// layer is built over the core `Request`/`Response` types, since a
    /// `Handler` always operates on `Context`.
    pub fn into_handler(
        self,
        inner: Arc<dyn tower_resilience_core::Handler<E>>,
    ) -> crate::CircuitBreakerHandler<E> {
        crate::CircuitBreakerHandler::new(self.config, inner)
    }
}

impl<S, Req, Res, Err> Layer<S> for CircuitBreakerLayer<Req, Res, Err>
where
    S: tower::Service<Req, Response = Res, Error = Err> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
{
    type Service = CircuitBreaker<S, Req, Res, Err>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, Arc::clone(&self.config))
    }
}
