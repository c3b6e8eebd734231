//! Error types for memora-engine

use thiserror::Error;

/// Result type alias using memora-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend client layer
    #[error(transparent)]
    Client(#[from] memora_client::Error),

    /// A send is already waiting for its echo or streaming its reply
    #[error("A message is already being sent")]
    SendInProgress,

    /// Nothing to send
    #[error("Message is empty")]
    EmptyMessage,

    /// No user is signed in
    #[error("Not signed in")]
    NotAuthenticated,

    /// The reply stream ended before the assistant message was finalized
    #[error("Stream ended before the reply completed")]
    StreamIncomplete,

    /// The send was aborted through the session handle
    #[error("Cancelled")]
    Cancelled,

    /// The conversation only exists locally so far
    #[error("Conversation {0} is not confirmed by the backend yet")]
    Unconfirmed(memora_client::ConversationId),
}

impl Error {
    /// Whether sending again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Client(e) => e.is_transport(),
            Error::StreamIncomplete | Error::Cancelled => true,
            _ => false,
        }
    }

    /// The backend refused a create, delete or fetch
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Client(e) if e.is_rejection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(Error::StreamIncomplete.is_retryable());
        assert!(Error::Client(memora_client::Error::Stream("reset".into())).is_retryable());
        assert!(!Error::EmptyMessage.is_retryable());
        assert!(!Error::Client(memora_client::Error::rejected(404, "gone")).is_retryable());
    }

    #[test]
    fn test_rejection() {
        assert!(Error::Client(memora_client::Error::rejected(500, "boom")).is_rejection());
        assert!(!Error::SendInProgress.is_rejection());
    }
}
