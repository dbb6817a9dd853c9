//! Typed failures for the request layer.
//!
//! Four classes, matching how the client degrades: requests rejected
//! before the network, 401s (which the interceptor may resolve), other
//! backend statuses, and transport failures. None of these are fatal to
//! the process; the command layer prints them and exits nonzero.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected client-side before any network call was made.
    #[error("invalid request: {0}")]
    Validation(String),

    /// HTTP 401 from the backend. `body` is kept verbatim so the
    /// interceptor can surface the original failure unchanged when a
    /// refresh is not possible.
    #[error("unauthorized (HTTP 401): {message}")]
    Unauthorized { message: String, body: String },

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: StatusCode, message: String },

    /// A success status whose body did not parse as expected.
    #[error("invalid backend response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Connection-level failure before any status was received.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Human-readable message out of an error body. The backend reports
/// `{"message": "..."}`; anything else falls back to the raw body, and an
/// empty body to the status text.
pub(crate) fn backend_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
