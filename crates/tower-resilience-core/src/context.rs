//! Per-request mutable context threaded through every handler, and the
//! cooperative cancellation signal it carries.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::ResilienceError;
use crate::model::{Request, Response};

/// A listener invoked when a [`CancellationToken`] transitions to cancelled.
type CancelListener = Box<dyn FnOnce(Option<&str>) + Send>;

struct CancellationState {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    listeners: Mutex<Vec<CancelListener>>,
    notify: tokio::sync::Notify,
}

/// A cooperative, one-shot cancellation signal shared by every handler and
/// policy processing one logical request, and by every hedged sibling
/// attempt spawned from it.
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<CancellationState>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                notify: tokio::sync::Notify::new(),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Raises [`ResilienceError::Cancelled`] if the token has already fired.
    pub fn throw_if_cancelled<E>(&self) -> Result<(), ResilienceError<E>> {
        if self.is_cancelled() {
            let reason = self.state.reason.lock().unwrap().clone();
            Err(ResilienceError::Cancelled { reason })
        } else {
            Ok(())
        }
    }

    /// Cancels the token. Idempotent: only the first call's reason sticks,
    /// and listeners are invoked exactly once.
    pub fn cancel(&self, reason: Option<String>) {
        if self
            .state
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.state.reason.lock().unwrap() = reason.clone();
            self.state.notify.notify_waiters();
            let listeners = std::mem::take(&mut *self.state.listeners.lock().unwrap());
            for listener in listeners {
                listener(reason.as_deref());
            }
        }
    }

    /// Registers a listener, invoked immediately (inline) if already
    /// cancelled, or later exactly once when cancellation happens.
    pub fn on_cancelled<F>(&self, listener: F)
    where
        F: FnOnce(Option<&str>) + Send + 'static,
    {
        if self.is_cancelled() {
            let reason = self.state.reason.lock().unwrap().clone();
            listener(reason.as_deref());
            return;
        }
        self.state.listeners.lock().unwrap().push(Box::new(listener));
    }

    /// Resolves once the token is cancelled. Used to race a sleep against
    /// cancellation (`tokio::select!`).
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.state.notify.notified().await;
    }
}

/// A typed, heterogeneous property bag used for inter-handler
/// communication, keyed by string.
#[derive(Default)]
pub struct PropertyBag {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// The mutable per-request context passed by reference through the pipeline.
///
/// Handlers may freely mutate its fields but must never replace the
/// `Context` itself — the same instance flows from the outermost handler to
/// the terminal and back.
pub struct Context {
    request: Request,
    pub response: Option<Response>,
    pub retry_count: usize,
    pub total_retry_delay: Duration,
    pub started_at: Instant,
    pub cancellation: CancellationToken,
    pub properties: PropertyBag,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
            retry_count: 0,
            total_retry_delay: Duration::ZERO,
            started_at: Instant::now(),
            cancellation: CancellationToken::new(),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn update_request(&mut self, request: Request) {
        self.request = request;
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Builds an independent context for a hedged sibling attempt: shares
    /// the cancellation token (so a parent cancel aborts every sibling) but
    /// owns its own `retry_count`/`total_retry_delay` so bookkeeping never
    /// bleeds across concurrently racing attempts.
    pub fn fork_for_hedge(&self) -> Self {
        Self {
            request: self.request.clone(),
            response: None,
            retry_count: 0,
            total_retry_delay: Duration::ZERO,
            started_at: self.started_at,
            cancellation: self.cancellation.clone(),
            properties: PropertyBag::new(),
        }
    }
}
