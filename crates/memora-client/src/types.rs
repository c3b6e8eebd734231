//! Core types shared between the backend wire format and the engine

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Identity of a message in the open conversation.
///
/// Exactly one message may be `Pending` while an assistant reply streams in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageId {
    /// Server-assigned identifier
    Confirmed(i64),
    /// Assistant reply still being streamed
    Pending,
    /// Assistant reply whose stream broke off; kept for display, never confirmed
    Interrupted,
}

impl MessageId {
    pub fn is_pending(&self) -> bool {
        matches!(self, MessageId::Pending)
    }

    /// The server identifier, if confirmed
    pub fn confirmed(&self) -> Option<i64> {
        match self {
            MessageId::Confirmed(id) => Some(*id),
            MessageId::Pending | MessageId::Interrupted => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Confirmed(id) => write!(f, "{}", id),
            MessageId::Pending => f.write_str("pending"),
            MessageId::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// An empty assistant message awaiting streamed content
    pub fn pending_assistant(created_at: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::Pending,
            role: Role::Assistant,
            content: String::new(),
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }
}

/// Identity of a conversation in the registry.
///
/// `Local` ids are reserved client-side for optimistic entries that the
/// backend has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationId {
    Confirmed(i64),
    Local(Uuid),
}

impl ConversationId {
    /// Reserve a fresh local id
    pub fn local() -> Self {
        ConversationId::Local(Uuid::new_v4())
    }

    pub fn confirmed(&self) -> Option<i64> {
        match self {
            ConversationId::Confirmed(id) => Some(*id),
            ConversationId::Local(_) => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ConversationId::Local(_))
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        ConversationId::Confirmed(id)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationId::Confirmed(id) => write!(f, "{}", id),
            ConversationId::Local(uuid) => write!(f, "local-{}", uuid),
        }
    }
}

/// Conversation summary as shown in navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// A conversation together with its full message history
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDetail {
    pub id: i64,
    pub title: String,
    pub messages: Vec<Message>,
}

/// The pair of messages persisted by a non-streaming send
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user_message: Message,
    pub assistant_message: Message,
}

/// A signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
}

/// Credentials for login and registration
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

// ============================================================================
// Wire records
// ============================================================================

/// Message as persisted by the backend
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessageRecord {
    pub id: i64,
    pub role: Role,
    pub content: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: MessageId::Confirmed(record.id),
            role: record.role,
            content: record.content,
            created_at: record.created_at,
        }
    }
}

/// Conversation summary as returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConversationRecord {
    pub id: i64,
    pub title: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: ConversationId::Confirmed(record.id),
            title: record.title,
            updated_at: record.updated_at,
        }
    }
}

/// Lenient ISO-8601 timestamps.
///
/// The backend emits naive datetimes (no offset) for some records; those are
/// read as UTC.
pub(crate) mod timestamp {
    use super::*;

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
