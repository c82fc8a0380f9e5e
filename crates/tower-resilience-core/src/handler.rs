//! The `Handler` pipeline abstraction: the `Context`-aware counterpart to a
//! Tower [`Service`](tower::Service). Every non-terminal pipeline stage is a
//! [`DelegatingHandler`] wrapping an inner [`Handler`]; the terminal performs
//! the actual I/O.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};

use crate::context::Context;
use crate::error::ResilienceError;
use crate::model::Response;

#[cfg(feature = "layer")]
use crate::model::Request;

/// A single stage in the request pipeline. Handlers are re-entrant: they may
/// hold per-instance state (a semaphore, a circuit), but never per-request
/// state outside the `Context` passed to `send`.
pub trait Handler<E>: Send + Sync {
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>>;
}

/// Raised when a [`DelegatingHandler`]'s inner handler is read before it has
/// been bound via [`DelegatingHandler::bind`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("DelegatingHandler used before its inner handler was bound")]
pub struct UnboundInnerError;

/// A handler that wraps an inner handler, bound exactly once after
/// construction. Pipelines are assembled outer-to-inner once at startup and
/// never rebound while serving requests.
pub struct DelegatingHandler<E> {
    inner: Mutex<Option<Arc<dyn Handler<E>>>>,
}

impl<E> Default for DelegatingHandler<E> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl<E> DelegatingHandler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the inner handler.
    pub fn bind(&self, inner: Arc<dyn Handler<E>>) {
        *self.inner.lock().unwrap() = Some(inner);
    }

    fn inner(&self) -> Result<Arc<dyn Handler<E>>, UnboundInnerError> {
        self.inner.lock().unwrap().clone().ok_or(UnboundInnerError)
    }
}

/// A terminal handler that always returns a fixed status with an empty body.
/// Appended implicitly when a pipeline's last `DelegatingHandler` has no
/// bound inner.
pub struct NoopTerminalHandler {
    pub status: u16,
}

impl<E: Send + Sync> Handler<E> for NoopTerminalHandler {
    fn send<'a>(
        &'a self,
        _ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move { Ok(Response::empty(self.status)) })
    }
}

impl<E> Handler<E> for DelegatingHandler<E>
where
    E: Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        Box::pin(async move {
            let inner = self.inner().map_err(|_| ResilienceError::Cancelled {
                reason: Some("handler pipeline stage not bound".into()),
            })?;
            inner.send(ctx).await
        })
    }
}

/// Adapts any Tower [`tower::Service`] built from the policy layers (retry,
/// circuit breaker, bulkhead, ...) into a [`Handler`], so it can terminate a
/// `Handler`-based pipeline or sit inside a [`DelegatingHandler`] chain.
///
/// The service is cloned once per call: `Handler::send` takes `&self` so it
/// can be shared behind an `Arc` across concurrent requests, while
/// `Service::call` requires exclusive access. This mirrors how each policy
/// layer already clones its own inner service per call internally.
#[cfg(feature = "layer")]
impl<E, S> Handler<E> for S
where
    S: tower::Service<Request, Response = Response, Error = ResilienceError<E>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response, ResilienceError<E>>> {
        let mut svc = self.clone();
        let request = ctx.request().clone();
        Box::pin(async move {
            std::future::poll_fn(|cx| svc.poll_ready(cx)).await?;
            svc.call(request).await
        })
    }
}
