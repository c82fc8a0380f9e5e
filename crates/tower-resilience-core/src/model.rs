//! The immutable request/response value model shared by every policy and handler.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{Stream, StreamExt};

/// An HTTP method. Known verbs are represented as variants; anything else is
/// carried verbatim (upper-cased) in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Custom(String),
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
            Method::Head => write!(f, "HEAD"),
            Method::Options => write!(f, "OPTIONS"),
            Method::Custom(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            other => Method::Custom(other.to_string()),
        }
    }
}

/// A case-insensitive header map, preserving the lowercased key as the
/// canonical lookup key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into().to_ascii_lowercase(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Immutable outbound request. Every mutator returns a new value rather than
/// modifying in place (`updateRequest` in the pipeline replaces the whole
/// value, it never mutates through a reference).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub metadata: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: None,
            metadata: HashMap::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    /// Returns a copy with the given header set, leaving `self` untouched.
    pub fn with_header(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.headers.insert(key, value);
        copy
    }

    pub fn with_body(&self, body: Vec<u8>) -> Self {
        let mut copy = self.clone();
        copy.body = Some(body);
        copy
    }

    /// Whether this request asked (via the `stream` metadata flag) for a
    /// streaming response body.
    pub fn wants_streaming_response(&self) -> bool {
        self.metadata.get("stream").map(String::as_str) == Some("true")
    }
}

/// A chunk of a streaming response body.
pub type BodyChunk = Vec<u8>;

/// A single-consumer stream of body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<BodyChunk>> + Send>>;

/// A response body: either fully buffered, streamed, or absent.
pub enum Body {
    Buffered(Option<Vec<u8>>),
    Streaming(Mutex<Option<BodyStream>>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Buffered(b) => f.debug_tuple("Buffered").field(&b.as_ref().map(|b| b.len())).finish(),
            Body::Streaming(_) => write!(f, "Streaming(..)"),
        }
    }
}

/// Raised when a streaming body is consumed a second time.
#[derive(Debug, Clone, thiserror::Error)]
#[error("response body stream already consumed")]
pub struct StreamConsumedError;

/// Effectively-immutable HTTP response. `body` is interior-mutable only to
/// support the single-consumption rule of a streaming body; everything else
/// is a plain value.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
    pub duration: Duration,
}

impl Response {
    pub fn buffered(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Buffered(Some(body.into())),
            duration: Duration::ZERO,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Buffered(None),
            duration: Duration::ZERO,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Takes ownership of the buffered body, if this response is buffered.
    pub fn take_buffered_body(&mut self) -> Option<Vec<u8>> {
        match &mut self.body {
            Body::Buffered(b) => b.take(),
            Body::Streaming(_) => None,
        }
    }

    /// Takes the streaming body, failing if it was already consumed or the
    /// response isn't streaming.
    pub fn take_stream(&self) -> Result<BodyStream, StreamConsumedError> {
        match &self.body {
            Body::Streaming(slot) => slot.lock().unwrap().take().ok_or(StreamConsumedError),
            Body::Buffered(_) => Err(StreamConsumedError),
        }
    }

    /// Parses a `Retry-After` header as a plain integer number of seconds.
    /// HTTP-date values are not supported and yield `None`.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Drains a streaming body and returns an equivalent buffered response
    /// with identical status, headers and duration. A response that is
    /// already buffered is returned unchanged.
    pub async fn to_buffered(mut self) -> Result<Self, std::io::Error> {
        let stream = match &self.body {
            Body::Buffered(_) => return Ok(self),
            Body::Streaming(_) => self
                .take_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?,
        };
        let chunks: Vec<std::io::Result<BodyChunk>> = stream.collect().await;
        let mut buf = Vec::new();
        for chunk in chunks {
            buf.extend_from_slice(&chunk?);
        }
        self.body = Body::Buffered(Some(buf));
        Ok(self)
    }
}

impl Clone for Response {
    fn clone(&self) -> Self {
        let body = match &self.body {
            Body::Buffered(b) => Body::Buffered(b.clone()),
            Body::Streaming(_) => Body::Buffered(None),
        };
        Self {
            status: self.status,
            headers: self.headers.clone(),
            body,
            duration: self.duration,
        }
    }
}
