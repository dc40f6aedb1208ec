//! Transport error type shared by the API client and the query cache.
//!
//! Every failure between the dashboard and the backend (connection refused,
//! timeout, non-2xx status, undecodable body) collapses into a single
//! [`RequestFailed`]. There is no retry at any layer; the error surfaces as
//! the cache's `Error` state for reads, or as a returned `Err` for writes.

use thiserror::Error;

/// A failed request against the ingestion backend.
///
/// `status` is present when the server answered, `body` when it answered
/// with a readable payload. The type is `Clone` so that one in-flight
/// result can be handed to every deduplicated waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("request failed: {message}")]
pub struct RequestFailed {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub message: String,
}

impl RequestFailed {
    /// The server answered with a non-2xx status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        Self {
            status: Some(status),
            body: (!body.is_empty()).then_some(body),
            message,
        }
    }

    /// The request never produced a response (DNS, refused, timeout).
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        Self {
            status: err.status().map(|s| s.as_u16()),
            body: None,
            message,
        }
    }

    /// A 2xx response whose body did not match the expected shape.
    pub fn decode(status: u16, err: impl std::fmt::Display) -> Self {
        Self {
            status: Some(status),
            body: None,
            message: format!("invalid response body: {}", err),
        }
    }

    /// The fetch task was cancelled before it settled (cache shutdown).
    pub fn cancelled() -> Self {
        Self {
            status: None,
            body: None,
            message: "request cancelled".to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}
