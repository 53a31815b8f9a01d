//! Typed API errors, normalized once at the transport edge.
//!
//! DESIGN
//! ======
//! Every non-2xx response becomes `ApiError::Status` carrying the numeric
//! status and the payload's `message` (when the server sent one). Stores and
//! the interceptor match on this single shape instead of probing nested
//! fields of whatever the HTTP library raised.

use serde_json::Value;

/// Errors produced while talking to the gallery REST API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("API response error: status {status}")]
    Status { status: u16, message: Option<String>, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("response parse failed: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, unserializable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build a status error from a raw response body, extracting `message`.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        let message = extract_message(&body);
        Self::Status { status, message, body }
    }

    /// HTTP status, when the server responded at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Server-provided message, if the payload carried one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Server-provided message, or the caller's action-specific fallback.
    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_owned()
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidRequest(_) => "E_INVALID_REQUEST",
        }
    }
}

/// Pull a human-readable `message` out of an error payload.
///
/// Validation failures from the API send `message` as an array of strings;
/// those are joined.
pub(crate) fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() { None } else { Some(parts.join(", ")) }
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
