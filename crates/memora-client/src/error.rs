//! Error types for memora-client

use thiserror::Error;

/// Result type alias using memora-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before a response arrived, or the body broke off
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend answered a request with a non-success status
    #[error("Backend rejected request: {message} (status {status})")]
    Rejected { status: u16, message: String },

    /// The response stream could not be opened or ended abnormally
    #[error("Stream error: {0}")]
    Stream(String),

    /// No signed-in session
    #[error("Not authenticated")]
    Unauthenticated,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a rejection from a status code and message
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Connection-level failure: refused, dropped mid-stream, or a failed stream request
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Stream(_))
    }

    /// The backend received the request and refused it
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejected { .. } | Error::Unauthenticated)
    }
}

/// A single frame that could not be turned into an event.
///
/// Never escalated: the stream logs and skips the frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload is not valid JSON or misses required fields
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload carries a discriminant we do not know
    #[error("unknown event type: {0}")]
    UnknownType(String),
}
