//! Transport gateway abstraction.
//!
//! The core never performs I/O. A `TransportGateway` receives a finished
//! `HttpRequest` and settles with the response, whatever its status, or with
//! a `TransportError` when no response was obtained. Timeouts belong to the
//! gateway.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::http::{HttpRequest, HttpResponse};

/// Network-level failure: no HTTP response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Other(String),
}

/// Executes requests built by the core.
#[async_trait]
pub trait TransportGateway: Send + Sync {
    /// Perform the exchange. Non-2xx statuses are returned as `Ok`; the
    /// adapter decides what counts as failure.
    async fn submit(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: TransportGateway + ?Sized> TransportGateway for Arc<T> {
    async fn submit(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).submit(request).await
    }
}

/// A scripted transport for testing.
///
/// Responses are handed out in the order they were queued; every submitted
/// request is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body.
    pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queue a transport-level failure.
    pub fn fail(&self, error: TransportError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Requests submitted so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl TransportGateway for MockTransport {
    async fn submit(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted response".into())))
    }
}
