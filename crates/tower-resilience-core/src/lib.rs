//! Core infrastructure shared by every resilience policy crate.
//!
//! This crate provides the value model (`Request`/`Response`/`Context`), the
//! `Handler` pipeline abstraction, outcome classification, a unified error
//! type, an async event bus, and a name-keyed policy registry.

pub mod classify;
pub mod context;
pub mod error;
pub mod events;
pub mod handler;
pub mod model;
pub mod registry;

pub use classify::{DefaultHttpClassifier, FnClassifier, Outcome, OutcomeClassifier, TransientError};
pub use context::{CancellationToken, Context, PropertyBag};
pub use error::{BulkheadRejectReason, ResilienceError};
pub use events::{EventListener, ResilienceEvent};
pub use handler::{DelegatingHandler, Handler, NoopTerminalHandler, UnboundInnerError};
pub use model::{Body, BodyChunk, BodyStream, Headers, Method, Request, Response, StreamConsumedError};
pub use registry::{default_registry, Registry, RegistryError};
