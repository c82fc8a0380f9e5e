//! Timeout enforcement for Tower services.
//!
//! Wraps a service with a hard deadline: if the inner call hasn't completed
//! when the deadline passes, the awaited future is abandoned and a
//! [`TimeLimiterError::Timeout`] is returned. The abandoned call is not
//! cancelled at the transport level — it may keep running in the
//! background until its own I/O times out — so outer policies (retry,
//! hedging) remain free to issue a fresh attempt without racing a
//! half-cancelled one.
//!
//! ## Basic Example
//!
//! ```rust
//! use tower_resilience_timelimiter::TimeLimiterLayer;
//! use tower::{Layer, service_fn};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let layer = TimeLimiterLayer::<String>::builder()
//!     .timeout_duration(Duration::from_secs(5))
//!     .on_timeout(|| {
//!         eprintln!("Request timed out!");
//!     })
//!     .build();
//!
//! let svc = service_fn(|req: String| async move {
//!     Ok::<String, ()>(req)
//! });
//!
//! let mut service = layer.layer(svc);
//! # }
//! ```
//!
//! ## Per-request timeout
//!
//! A timeout can also be derived from the request itself, e.g. a
//! caller-supplied deadline header:
//!
//! ```rust
//! use tower_resilience_timelimiter::TimeLimiterLayer;
//! use std::time::Duration;
//!
//! #[derive(Clone)]
//! struct Req {
//!     timeout_ms: Option<u64>,
//! }
//!
//! let layer = TimeLimiterLayer::<Req>::builder()
//!     .timeout_fn(|req: &Req| {
//!         req.timeout_ms
//!             .map(Duration::from_millis)
//!             .unwrap_or(Duration::from_secs(5))
//!     })
//!     .build();
//! ```
//!
//! ## Event Listeners
//!
//! ```rust
//! use tower_resilience_timelimiter::TimeLimiterLayer;
//! use std::time::Duration;
//!
//! let layer = TimeLimiterLayer::<()>::builder()
//!     .timeout_duration(Duration::from_secs(5))
//!     .on_success(|duration| {
//!         println!("Call succeeded in {:?}", duration);
//!     })
//!     .on_error(|duration| {
//!         println!("Call failed after {:?}", duration);
//!     })
//!     .on_timeout(|| {
//!         println!("Call timed out");
//!     })
//!     .build();
//! ```

use futures::future::BoxFuture;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::time::timeout;
use tower::Service;

pub use config::{TimeLimiterConfig, TimeLimiterConfigBuilder, TimeoutSource};
pub use error::TimeLimiterError;
pub use events::TimeLimiterEvent;
pub use handler::TimeLimiterHandler;
pub use layer::TimeLimiterLayer;

mod config;
mod error;
mod events;
mod handler;
mod layer;

/// A Tower service that enforces a deadline on calls to an inner service.
pub struct TimeLimiter<S, Req> {
    inner: S,
    config: Arc<TimeLimiterConfig<Req>>,
    _phantom: PhantomData<Req>,
}

impl<S, Req> TimeLimiter<S, Req> {
    /// Creates a new time limiter wrapping the given service.
    pub(crate) fn new(
        inner: S,
        config: Arc<TimeLimiterConfig<Req>>,
        _phantom: PhantomData<Req>,
    ) -> Self {
        Self {
            inner,
            config,
            _phantom,
        }
    }
}

impl<S: Clone, Req> Clone for TimeLimiter<S, Req> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            _phantom: PhantomData,
        }
    }
}

impl<S, Req> Service<Req> for TimeLimiter<S, Req>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = TimeLimiterError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(TimeLimiterError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut inner = self.inner.clone();
        let config = Arc::clone(&self.config);
        let timeout_duration = config.timeout_source.get_timeout(&req);

        Box::pin(async move {
            let start = Instant::now();

            match timeout(timeout_duration, inner.call(req)).await {
                Ok(Ok(response)) => {
                    let duration = start.elapsed();
                    config.event_listeners.emit(&TimeLimiterEvent::Success {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });
                    Ok(response)
                }
                Ok(Err(err)) => {
                    let duration = start.elapsed();
                    config.event_listeners.emit(&TimeLimiterEvent::Error {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        duration,
                    });
                    Err(TimeLimiterError::Inner(err))
                }
                Err(_elapsed) => {
                    config.event_listeners.emit(&TimeLimiterEvent::Timeout {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        timeout_duration,
                    });
                    Err(TimeLimiterError::Timeout {
                        timeout: timeout_duration,
                    })
                }
            }
        })
    }
}
