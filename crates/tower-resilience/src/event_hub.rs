//! Process-local event bus aggregating lifecycle events across policies.
//!
//! Each policy crate already has its own synchronous, per-instance
//! [`EventListeners`](tower_resilience_core::EventListeners) for direct
//! observability. The hub is different: a single process-wide dispatch point
//! that callers subscribe to once, independent of which policy instance
//! raised the event, with dispatch happening off the emitting call's stack so
//! a slow or panicking listener can never hold up a request.
//!
//! The event set is closed: [`HubEvent`] is a tagged enum over every
//! policy's event type, gated by the same features that gate the policy
//! crates themselves.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The closed set of events that can flow through the hub.
#[derive(Debug, Clone)]
pub enum HubEvent {
    #[cfg(feature = "retry")]
    Retry(tower_resilience_retry::RetryEvent),
    #[cfg(feature = "circuitbreaker")]
    CircuitBreaker(tower_resilience_circuitbreaker::CircuitBreakerEvent),
    #[cfg(feature = "timelimiter")]
    Timeout(tower_resilience_timelimiter::TimeLimiterEvent),
    #[cfg(feature = "fallback")]
    Fallback(tower_resilience_fallback::FallbackEvent),
    #[cfg(feature = "bulkhead")]
    Bulkhead(tower_resilience_bulkhead::BulkheadEvent),
    #[cfg(feature = "hedge")]
    Hedge(tower_resilience_hedge::HedgeEvent),
}

/// Maps a concrete policy event type to its [`HubEvent`] variant, so
/// [`EventHub::on`] can be generic over the concrete type while the hub
/// itself only ever stores and dispatches the closed `HubEvent` enum.
pub trait HubEventKind: Send + Sync + Sized + 'static {
    fn wrap(self) -> HubEvent;
    fn extract(event: &HubEvent) -> Option<&Self>;
}

#[cfg(feature = "retry")]
impl HubEventKind for tower_resilience_retry::RetryEvent {
    fn wrap(self) -> HubEvent {
        HubEvent::Retry(self)
    }

    fn extract(event: &HubEvent) -> Option<&Self> {
        match event {
            HubEvent::Retry(e) => Some(e),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

#[cfg(feature = "circuitbreaker")]
impl HubEventKind for tower_resilience_circuitbreaker::CircuitBreakerEvent {
    fn wrap(self) -> HubEvent {
        HubEvent::CircuitBreaker(self)
    }

    fn extract(event: &HubEvent) -> Option<&Self> {
        match event {
            HubEvent::CircuitBreaker(e) => Some(e),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

#[cfg(feature = "timelimiter")]
impl HubEventKind for tower_resilience_timelimiter::TimeLimiterEvent {
    fn wrap(self) -> HubEvent {
        HubEvent::Timeout(self)
    }

    fn extract(event: &HubEvent) -> Option<&Self> {
        match event {
            HubEvent::Timeout(e) => Some(e),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

#[cfg(feature = "fallback")]
impl HubEventKind for tower_resilience_fallback::FallbackEvent {
    fn wrap(self) -> HubEvent {
        HubEvent::Fallback(self)
    }

    fn extract(event: &HubEvent) -> Option<&Self> {
        match event {
            HubEvent::Fallback(e) => Some(e),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

#[cfg(feature = "bulkhead")]
impl HubEventKind for tower_resilience_bulkhead::BulkheadEvent {
    fn wrap(self) -> HubEvent {
        HubEvent::Bulkhead(self)
    }

    fn extract(event: &HubEvent) -> Option<&Self> {
        match event {
            HubEvent::Bulkhead(e) => Some(e),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

#[cfg(feature = "hedge")]
impl HubEventKind for tower_resilience_hedge::HedgeEvent {
    fn wrap(self) -> HubEvent {
        HubEvent::Hedge(self)
    }

    fn extract(event: &HubEvent) -> Option<&Self> {
        match event {
            HubEvent::Hedge(e) => Some(e),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Default soft cap on listeners per event type, before a diagnostic fires
/// via [`EventHub::on_listener_error`].
pub const DEFAULT_MAX_LISTENERS: usize = 100;

type Dispatch = Arc<dyn Fn(&HubEvent) + Send + Sync>;

/// A listener registered with [`EventHub::on`], kept alongside its dispatch
/// closure purely so a later `on`/`off` call can recognize it by identity.
struct Registration {
    identity: Arc<dyn Any + Send + Sync>,
    dispatch: Dispatch,
}

/// Process-local publish/subscribe bus for resilience events.
///
/// `emit` is fire-and-forget: the listener lists for the event's type are
/// snapshotted synchronously, then invoked on a spawned task, so the emitting
/// policy never blocks on a listener.
pub struct EventHub {
    typed: Mutex<HashMap<TypeId, Vec<Registration>>>,
    any: Mutex<Vec<Dispatch>>,
    max_listeners: usize,
    on_listener_error: Mutex<Option<Arc<dyn Fn(&str) + Send + Sync>>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    /// `0` disables the soft listener cap entirely.
    pub fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            typed: Mutex::new(HashMap::new()),
            any: Mutex::new(Vec::new()),
            max_listeners,
            on_listener_error: Mutex::new(None),
        }
    }

    /// Sets the callback invoked when a listener panics or the soft listener
    /// cap is exceeded. Replaces any previously set handler.
    pub fn on_listener_error<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_listener_error.lock().unwrap() = Some(Arc::new(handler));
    }

    fn report(&self, message: String) {
        if let Some(handler) = self.on_listener_error.lock().unwrap().as_ref() {
            handler(&message);
        }
    }

    /// Registers a listener for one concrete event type. Registering the
    /// same `Arc` twice is a no-op.
    pub fn on<E>(&self, listener: Arc<dyn Fn(&E) + Send + Sync>)
    where
        E: HubEventKind,
    {
        let type_id = TypeId::of::<E>();
        let identity: Arc<dyn Any + Send + Sync> = Arc::new(Arc::clone(&listener));

        let mut typed = self.typed.lock().unwrap();
        let bucket = typed.entry(type_id).or_default();

        let already_registered = bucket.iter().any(|reg| {
            reg.identity
                .downcast_ref::<Arc<dyn Fn(&E) + Send + Sync>>()
                .is_some_and(|existing| Arc::ptr_eq(existing, &listener))
        });
        if already_registered {
            return;
        }

        if self.max_listeners != 0 && bucket.len() >= self.max_listeners {
            let count = bucket.len();
            drop(typed);
            self.report(format!(
                "event hub exceeded max_listeners ({count} >= {}) for {}",
                self.max_listeners,
                std::any::type_name::<E>()
            ));
            return;
        }

        let dispatch: Dispatch = Arc::new(move |event: &HubEvent| {
            if let Some(e) = E::extract(event) {
                listener(e);
            }
        });
        bucket.push(Registration { identity, dispatch });
    }

    /// Removes a previously registered listener. No-op if not registered.
    pub fn off<E>(&self, listener: &Arc<dyn Fn(&E) + Send + Sync>)
    where
        E: HubEventKind,
    {
        let mut typed = self.typed.lock().unwrap();
        if let Some(bucket) = typed.get_mut(&TypeId::of::<E>()) {
            bucket.retain(|reg| {
                !reg.identity
                    .downcast_ref::<Arc<dyn Fn(&E) + Send + Sync>>()
                    .is_some_and(|existing| Arc::ptr_eq(existing, listener))
            });
        }
    }

    /// Registers a listener invoked for every event flowing through the hub.
    /// Registering the same `Arc` twice is a no-op.
    pub fn on_any(&self, listener: Dispatch) {
        let mut any = self.any.lock().unwrap();
        if any.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            return;
        }
        if self.max_listeners != 0 && any.len() >= self.max_listeners {
            let count = any.len();
            drop(any);
            self.report(format!(
                "event hub exceeded max_listeners ({count} >= {}) for onAny",
                self.max_listeners
            ));
            return;
        }
        any.push(listener);
    }

    /// Removes a previously registered `onAny` listener.
    pub fn off_any(&self, listener: &Dispatch) {
        self.any
            .lock()
            .unwrap()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Removes every registered listener, typed and `onAny` alike.
    pub fn clear(&self) {
        self.typed.lock().unwrap().clear();
        self.any.lock().unwrap().clear();
    }

    /// Dispatches `event` to every matching listener. Returns immediately;
    /// listener invocation happens on a spawned task.
    pub fn emit<E>(&self, event: E)
    where
        E: HubEventKind,
    {
        let typed: Vec<Dispatch> = self
            .typed
            .lock()
            .unwrap()
            .get(&TypeId::of::<E>())
            .map(|bucket| bucket.iter().map(|reg| Arc::clone(&reg.dispatch)).collect())
            .unwrap_or_default();
        let any_listeners: Vec<Dispatch> = self.any.lock().unwrap().clone();

        if typed.is_empty() && any_listeners.is_empty() {
            return;
        }

        let error_handler = self.on_listener_error.lock().unwrap().clone();
        let hub_event = event.wrap();

        tokio::spawn(async move {
            for listener in typed.iter().chain(any_listeners.iter()) {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    listener(&hub_event);
                }));
                if let Err(payload) = outcome {
                    report_panic(&error_handler, payload.as_ref());
                }
            }
        });
    }
}

fn report_panic(handler: &Option<Arc<dyn Fn(&str) + Send + Sync>>, payload: &(dyn Any + Send)) {
    let Some(handler) = handler else { return };

    let message = payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    handler(&format!("event hub listener panicked: {message}"));
}

/// A process-wide default hub, for callers who don't want to thread an
/// explicit instance through their application. Tests should construct a
/// fresh [`EventHub::new()`] instead, to avoid cross-test pollution.
pub fn default_hub() -> &'static EventHub {
    static DEFAULT: std::sync::OnceLock<EventHub> = std::sync::OnceLock::new();
    DEFAULT.get_or_init(EventHub::new)
}

#[cfg(all(test, feature = "retry"))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tower_resilience_retry::RetryEvent;

    fn sample_event() -> RetryEvent {
        RetryEvent::RetryScheduled {
            pattern_name: "test".to_string(),
            timestamp: Instant::now(),
            attempt: 1,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn typed_listener_receives_matching_event() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let listener: Arc<dyn Fn(&RetryEvent) + Send + Sync> = Arc::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        hub.on(Arc::clone(&listener));

        hub.emit(sample_event());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registering_same_listener_twice_is_idempotent() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let listener: Arc<dyn Fn(&RetryEvent) + Send + Sync> = Arc::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        hub.on(Arc::clone(&listener));
        hub.on(Arc::clone(&listener));

        hub.emit(sample_event());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn off_removes_listener() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let listener: Arc<dyn Fn(&RetryEvent) + Send + Sync> = Arc::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        hub.on(Arc::clone(&listener));
        hub.off(&listener);

        hub.emit(sample_event());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn on_any_receives_every_event_type() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        hub.on_any(Arc::new(move |_event: &HubEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        hub.emit(sample_event());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_removes_all_listeners() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        hub.on(Arc::new(move |_event: &RetryEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }) as Arc<dyn Fn(&RetryEvent) + Send + Sync>);
        hub.clear();

        hub.emit(sample_event());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exceeding_max_listeners_reports_diagnostic() {
        let hub = EventHub::with_max_listeners(1);
        let reports = Arc::new(AtomicUsize::new(0));
        let reports_clone = Arc::clone(&reports);
        hub.on_listener_error(move |_msg| {
            reports_clone.fetch_add(1, Ordering::SeqCst);
        });

        hub.on(Arc::new(|_: &RetryEvent| {}) as Arc<dyn Fn(&RetryEvent) + Send + Sync>);
        hub.on(Arc::new(|_: &RetryEvent| {}) as Arc<dyn Fn(&RetryEvent) + Send + Sync>);

        assert_eq!(reports.load(Ordering::SeqCst), 1);
    }
}
