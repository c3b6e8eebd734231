//! Backend collaborators

pub mod http;

use crate::{
    Conversation, ConversationDetail, Credentials, Exchange, Result, User,
    stream::StreamEventStream,
};
use async_trait::async_trait;

/// Conversation CRUD
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// All conversations of the signed-in user, most recently updated first
    async fn list(&self) -> Result<Vec<Conversation>>;

    /// Create a conversation with the given title
    async fn create(&self, title: &str) -> Result<Conversation>;

    /// Delete a conversation
    async fn delete(&self, id: i64) -> Result<()>;

    /// Fetch a conversation with its full message history
    async fn get_with_messages(&self, id: i64) -> Result<ConversationDetail>;
}

/// Sending user messages
#[async_trait]
pub trait MessageStreamer: Send + Sync {
    /// Send `content` and stream back the echo, the reply chunks and the final identity
    async fn stream_message(&self, conversation_id: i64, content: &str)
    -> Result<StreamEventStream>;

    /// Send `content` and wait for the complete exchange
    async fn send_message(&self, conversation_id: i64, content: &str) -> Result<Exchange>;
}

/// Account session
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<User>;

    async fn register(&self, credentials: &Credentials) -> Result<User>;

    async fn logout(&self) -> Result<()>;

    /// The user owning the current session, `None` if signed out
    async fn current_user(&self) -> Result<Option<User>>;
}
