//! Store-action error boundary.
//!
//! Store actions never hand raw transport errors to the UI. They normalize
//! failures into an `ActionError` carrying the message to show: the server's
//! payload message when present, otherwise an action-specific fallback.

use crate::http::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
    /// HTTP status of the underlying failure, when there was a response.
    pub status: Option<u16>,
}

impl ActionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), status: None }
    }

    #[must_use]
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        Self { message: err.message_or(fallback), status: err.status() }
    }

    #[must_use]
    pub fn not_authenticated() -> Self {
        Self::new("Not authenticated")
    }
}

pub type ActionResult<T = ()> = Result<T, ActionError>;
