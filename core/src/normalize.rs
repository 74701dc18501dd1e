//! Failure body normalization.
//!
//! # Design
//! A failure body is whatever the server or transport produced. Parsing is
//! best effort: a structured body is kept as-is, anything else degrades to
//! "errored, cause unknown" and is only logged. Normalization never fails.

use serde_json::Value;

use crate::serializer::Serializer;

/// Structured representation of a failed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedError {
    /// HTTP status, or `None` when the transport never got a response.
    pub status: Option<u16>,
    /// Parsed failure body, `None` if it was empty or unparsable.
    pub body: Option<Value>,
    /// Raw failure text as received.
    pub raw: String,
}

impl NormalizedError {
    pub fn is_parsed(&self) -> bool {
        self.body.is_some()
    }
}

/// Best-effort parse of a failure body.
pub fn normalize(serializer: &dyn Serializer, status: Option<u16>, raw: &str) -> NormalizedError {
    let body = match serializer.parse(raw) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(?status, error = %e, "failure body is not structured");
            None
        }
    };
    NormalizedError {
        status,
        body,
        raw: raw.to_string(),
    }
}
