//! Streaming event types and frame parsing

use crate::{
    error::{DecodeError, Result},
    sse::FrameDecoder,
    types::{Message, MessageRecord, timestamp},
};
use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted by the backend while answering a message
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The backend's persisted copy of the message just sent
    UserMessageCreated { message: Message },
    /// A slice of assistant output, appended to what came before
    Chunk { text: String },
    /// The assistant message is complete and has its final identity
    Done { id: i64, created_at: DateTime<Utc> },
}

impl StreamEvent {
    /// Check if this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. })
    }
}

/// A stream of decoded events; `Err` items are transport failures and end the stream
pub type StreamEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Payload {
    UserMessage {
        message: MessageRecord,
    },
    Chunk {
        #[serde(alias = "text")]
        content: String,
    },
    Done {
        id: i64,
        #[serde(deserialize_with = "timestamp::deserialize")]
        created_at: DateTime<Utc>,
    },
}

const KNOWN_TYPES: &[&str] = &["user_message", "chunk", "done"];

impl From<Payload> for StreamEvent {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::UserMessage { message } => StreamEvent::UserMessageCreated {
                message: message.into(),
            },
            Payload::Chunk { content } => StreamEvent::Chunk { text: content },
            Payload::Done { id, created_at } => StreamEvent::Done { id, created_at },
        }
    }
}

/// Parse one frame.
///
/// Returns `Ok(None)` for frames without a `data:` field (keep-alives,
/// comments, bare `event:` lines).
pub fn parse_frame(frame: &str) -> std::result::Result<Option<StreamEvent>, DecodeError> {
    let mut data: Option<String> = None;
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match data.as_mut() {
                Some(buf) => {
                    buf.push('\n');
                    buf.push_str(rest);
                }
                None => data = Some(rest.to_string()),
            }
        }
    }

    let Some(payload) = data else {
        return Ok(None);
    };
    if payload.trim().is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(&payload)?;
    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or_default();
    if !KNOWN_TYPES.contains(&kind) {
        return Err(DecodeError::UnknownType(kind.to_string()));
    }

    let payload: Payload = serde_json::from_value(value)?;
    Ok(Some(payload.into()))
}

/// Parse a frame, logging and dropping anything malformed
fn parse_lenient(frame: &str) -> Option<StreamEvent> {
    match parse_frame(frame) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("Dropping frame ({}): {:?}", e, frame);
            None
        }
    }
}

/// Turn a chunked response body into a stream of events.
///
/// A fresh [`FrameDecoder`] is created for every body. Body errors are
/// forwarded once and end the stream; the stream also ends after `Done`.
pub fn decode_events<S, B>(body: S) -> StreamEventStream
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(stream! {
        let mut decoder = FrameDecoder::new();
        let mut body = Box::pin(body);

        while let Some(fragment) = body.next().await {
            match fragment {
                Ok(bytes) => {
                    for frame in decoder.push_bytes(bytes.as_ref()) {
                        if let Some(event) = parse_lenient(&frame) {
                            let terminal = event.is_terminal();
                            yield Ok(event);
                            if terminal {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(rest) = decoder.finish() {
            if let Some(event) = parse_lenient(&rest) {
                yield Ok(event);
            }
        }
    })
}
