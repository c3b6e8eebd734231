//! Engine event types

use memora_client::{Conversation, ConversationId, Message};
use serde::Serialize;

/// Events emitted to observers (the rendering layer) as engine state changes
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The conversation list or its order changed
    ConversationsChanged { conversations: Vec<Conversation> },

    /// The selected conversation changed
    SelectionChanged { id: Option<ConversationId> },

    /// The open conversation's message list was replaced wholesale
    MessagesLoaded { messages: Vec<Message> },

    /// A send started; waiting for the backend echo
    SendStarted { conversation_id: i64 },

    /// A message was appended to the open conversation
    MessageAppended { message: Message },

    /// The pending assistant message grew
    PendingUpdated { delta: String, content: String },

    /// The pending assistant message received its final identity
    MessageFinalized { message: Message },

    /// The send stopped before completion; partial content is kept
    SendFailed { message: String },
}

impl EngineEvent {
    /// Check if this event ends a send
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineEvent::MessageFinalized { .. } | EngineEvent::SendFailed { .. }
        )
    }
}
