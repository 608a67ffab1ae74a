//! Error types for the YooKassa client.
//!
//! # Design
//! Two kinds of failure reach the caller. `Error::Api` means the server
//! answered with a non-2xx status; it carries the status, the raw body and,
//! when the body is a YooKassa error object, its parsed fields. Everything
//! else (network failure, timeout, a body that is not the expected JSON)
//! lands in `Error::Transport` with the underlying cause attached.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used by every fallible client operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by `YooKassa` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server returned a non-2xx status.
    #[error("API error (HTTP {status}): {}", describe(.details, .body))]
    Api {
        status: u16,
        body: String,
        details: Option<ApiErrorBody>,
    },
}

/// Underlying causes of a transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid resource id {0:?}")]
    InvalidResourceId(String),

    #[error("invalid value for header {0}")]
    InvalidHeader(String),

    #[error("request body serialization failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("response body deserialization failed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Error object returned by the API in non-2xx response bodies.
///
/// ```json
/// {"type":"error","id":"...","code":"invalid_request",
///  "description":"...","parameter":"amount.value"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl Error {
    /// HTTP status of an API error, `None` for transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Transport(_) => None,
        }
    }

    /// Parsed error payload, when the server sent one.
    pub fn details(&self) -> Option<&ApiErrorBody> {
        match self {
            Error::Api { details, .. } => details.as_ref(),
            Error::Transport(_) => None,
        }
    }

    /// True when the configured timeout aborted the request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Http(e)) if e.is_timeout())
    }

    pub fn is_api(&self) -> bool {
        matches!(self, Error::Api { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(TransportError::Http(e))
    }
}

fn describe(details: &Option<ApiErrorBody>, body: &str) -> String {
    let Some(details) = details else {
        return if body.is_empty() {
            "<empty body>".to_string()
        } else {
            body.to_string()
        };
    };
    let mut out = details.code.clone().unwrap_or_else(|| details.error_type.clone());
    if let Some(description) = &details.description {
        out.push_str(": ");
        out.push_str(description);
    }
    if let Some(parameter) = &details.parameter {
        out.push_str(&format!(" (parameter: {parameter})"));
    }
    out
}
