//! Message reconciliation: folds stream events into the open conversation

use chrono::Utc;
use memora_client::{Exchange, Message, MessageId, StreamEvent};

use crate::{
    error::{Error, Result},
    events::EngineEvent,
};

/// Where the reconciler is in the lifecycle of a send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilerState {
    /// No send has happened since the list was loaded
    #[default]
    Idle,
    /// Send issued; waiting for the backend to echo the user message
    AwaitingUserEcho,
    /// Reply chunks are being appended to the pending message
    Streaming,
    /// The last send completed
    Finalized,
    /// The last send broke off; partial content is kept
    Failed,
}

impl ReconcilerState {
    /// A send is underway and a new one must wait
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ReconcilerState::AwaitingUserEcho | ReconcilerState::Streaming
        )
    }
}

/// The one active send
#[derive(Debug)]
struct StreamSession {
    conversation_id: i64,
    /// Index of the pending assistant message, once created
    pending: Option<usize>,
}

/// Owns the message list of the open conversation.
///
/// Events are applied strictly in the order they are handed in.
#[derive(Debug, Default)]
pub struct MessageReconciler {
    messages: Vec<Message>,
    state: ReconcilerState,
    session: Option<StreamSession>,
    last_error: Option<String>,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The assistant message currently being filled, if any
    pub fn pending(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_pending())
    }

    /// Conversation targeted by the active send
    pub fn active_conversation(&self) -> Option<i64> {
        self.session.as_ref().map(|s| s.conversation_id)
    }

    /// Why the last send failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Replace the list with a freshly loaded history.
    ///
    /// Any active send is abandoned.
    pub fn load(&mut self, messages: Vec<Message>) {
        if self.state.is_in_flight() {
            tracing::warn!("Replacing message list while a send is in flight; abandoning it");
        }
        self.messages = messages;
        self.session = None;
        self.state = ReconcilerState::Idle;
        self.last_error = None;
    }

    /// Empty list, as for a new chat
    pub fn clear(&mut self) {
        self.load(Vec::new());
    }

    /// Start a send to `conversation_id`.
    ///
    /// The user text is not appended here; the backend echo is the single
    /// source of truth for its id and timestamp.
    pub fn begin_send(&mut self, conversation_id: i64) -> Result<()> {
        if self.state.is_in_flight() {
            return Err(Error::SendInProgress);
        }

        // A reply left over from a broken stream stops counting as pending
        for message in self.messages.iter_mut().filter(|m| m.is_pending()) {
            message.id = MessageId::Interrupted;
        }

        self.session = Some(StreamSession {
            conversation_id,
            pending: None,
        });
        self.state = ReconcilerState::AwaitingUserEcho;
        self.last_error = None;
        Ok(())
    }

    /// Apply one stream event, returning what changed.
    ///
    /// Events that do not fit the current state are logged and ignored.
    pub fn apply(&mut self, event: StreamEvent) -> Vec<EngineEvent> {
        match (self.state, event) {
            (ReconcilerState::AwaitingUserEcho, StreamEvent::UserMessageCreated { message }) => {
                self.messages.push(message.clone());
                let pending = Message::pending_assistant(Utc::now());
                self.messages.push(pending.clone());
                if let Some(session) = self.session.as_mut() {
                    session.pending = Some(self.messages.len() - 1);
                }
                self.state = ReconcilerState::Streaming;
                vec![
                    EngineEvent::MessageAppended { message },
                    EngineEvent::MessageAppended { message: pending },
                ]
            }
            (ReconcilerState::Streaming, StreamEvent::Chunk { text }) => {
                let Some(pending) = self.pending_mut() else {
                    return vec![];
                };
                pending.content.push_str(&text);
                vec![EngineEvent::PendingUpdated {
                    delta: text,
                    content: pending.content.clone(),
                }]
            }
            (ReconcilerState::Streaming, StreamEvent::Done { id, created_at }) => {
                let Some(pending) = self.pending_mut() else {
                    return vec![];
                };
                pending.id = MessageId::Confirmed(id);
                pending.created_at = created_at;
                let message = pending.clone();
                self.session = None;
                self.state = ReconcilerState::Finalized;
                vec![EngineEvent::MessageFinalized { message }]
            }
            (state, event) => {
                tracing::warn!("Ignoring {:?} in state {:?}", event, state);
                vec![]
            }
        }
    }

    /// Apply the result of a non-streaming send in one step
    pub fn apply_exchange(&mut self, exchange: Exchange) -> Vec<EngineEvent> {
        if self.state != ReconcilerState::AwaitingUserEcho {
            tracing::warn!("Ignoring exchange in state {:?}", self.state);
            return vec![];
        }
        self.messages.push(exchange.user_message.clone());
        self.messages.push(exchange.assistant_message.clone());
        self.session = None;
        self.state = ReconcilerState::Finalized;
        vec![
            EngineEvent::MessageAppended {
                message: exchange.user_message,
            },
            EngineEvent::MessageFinalized {
                message: exchange.assistant_message,
            },
        ]
    }

    /// Stop the active send. The pending message stays as it is.
    pub fn fail(&mut self, reason: impl Into<String>) -> Option<EngineEvent> {
        if !self.state.is_in_flight() {
            return None;
        }
        let reason = reason.into();
        tracing::warn!("Send failed: {}", reason);
        self.session = None;
        self.state = ReconcilerState::Failed;
        self.last_error = Some(reason.clone());
        Some(EngineEvent::SendFailed { message: reason })
    }

    fn pending_mut(&mut self) -> Option<&mut Message> {
        let index = self.session.as_ref()?.pending?;
        self.messages.get_mut(index).filter(|m| m.is_pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use memora_client::Role;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn user_echo(id: i64, content: &str) -> StreamEvent {
        StreamEvent::UserMessageCreated {
            message: Message {
                id: MessageId::Confirmed(id),
                role: Role::User,
                content: content.into(),
                created_at: ts(0),
            },
        }
    }

    fn chunk(text: &str) -> StreamEvent {
        StreamEvent::Chunk { text: text.into() }
    }

    fn pending_count(r: &MessageReconciler) -> usize {
        r.messages().iter().filter(|m| m.is_pending()).count()
    }

    #[test]
    fn test_full_send_lifecycle() {
        let mut r = MessageReconciler::new();
        r.begin_send(1).unwrap();
        assert_eq!(r.state(), ReconcilerState::AwaitingUserEcho);
        assert!(r.messages().is_empty());
        assert_eq!(pending_count(&r), 0);

        let events = r.apply(user_echo(101, "Hi"));
        assert_eq!(events.len(), 2);
        assert_eq!(r.state(), ReconcilerState::Streaming);
        assert_eq!(pending_count(&r), 1);

        r.apply(chunk("Hello"));
        assert_eq!(pending_count(&r), 1);
        r.apply(chunk(" there"));

        let events = r.apply(StreamEvent::Done {
            id: 202,
            created_at: ts(5),
        });
        assert!(events[0].is_terminal());
        assert_eq!(r.state(), ReconcilerState::Finalized);
        assert_eq!(pending_count(&r), 0);
        assert_eq!(r.active_conversation(), None);

        let msgs = r.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].id, MessageId::Confirmed(101));
        assert_eq!(msgs[0].content, "Hi");
        assert_eq!(msgs[1].id, MessageId::Confirmed(202));
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[1].content, "Hello there");
        assert_eq!(msgs[1].created_at, ts(5));
    }

    #[test]
    fn test_chunks_concatenate_in_order() {
        let mut r = MessageReconciler::new();
        r.begin_send(1).unwrap();
        r.apply(user_echo(1, "q"));

        r.apply(chunk("Hel"));
        assert_eq!(r.pending().unwrap().content, "Hel");
        r.apply(chunk(""));
        r.apply(chunk("lo, "));
        let events = r.apply(chunk("world"));
        assert_eq!(r.pending().unwrap().content, "Hello, world");
        match &events[0] {
            EngineEvent::PendingUpdated { delta, content } => {
                assert_eq!(delta, "world");
                assert_eq!(content, "Hello, world");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_send_refused_while_in_flight() {
        let mut r = MessageReconciler::new();
        r.begin_send(1).unwrap();
        assert!(matches!(r.begin_send(1), Err(Error::SendInProgress)));
        r.apply(user_echo(1, "q"));
        assert!(matches!(r.begin_send(2), Err(Error::SendInProgress)));
        assert_eq!(r.active_conversation(), Some(1));
    }

    #[test]
    fn test_failure_keeps_partial_content() {
        let mut r = MessageReconciler::new();
        r.begin_send(1).unwrap();
        r.apply(user_echo(101, "Hi"));
        r.apply(chunk("Hello"));

        let event = r.fail("connection reset").unwrap();
        assert!(event.is_terminal());
        assert_eq!(r.state(), ReconcilerState::Failed);
        assert_eq!(r.last_error(), Some("connection reset"));

        let pending = r.pending().unwrap();
        assert_eq!(pending.content, "Hello");
        assert_eq!(pending.id, MessageId::Pending);

        // Late chunks are not applied
        r.apply(chunk(" there"));
        assert_eq!(r.pending().unwrap().content, "Hello");
    }

    #[test]
    fn test_fail_when_idle_is_noop() {
        let mut r = MessageReconciler::new();
        assert!(r.fail("nothing to fail").is_none());
        assert_eq!(r.state(), ReconcilerState::Idle);
    }

    #[test]
    fn test_next_send_retires_stale_pending() {
        let mut r = MessageReconciler::new();
        r.begin_send(1).unwrap();
        r.apply(user_echo(101, "Hi"));
        r.apply(chunk("Hel"));
        r.fail("dropped");

        r.begin_send(1).unwrap();
        assert_eq!(pending_count(&r), 0);
        assert_eq!(r.messages()[1].id, MessageId::Interrupted);
        assert_eq!(r.messages()[1].content, "Hel");

        r.apply(user_echo(103, "again"));
        assert_eq!(pending_count(&r), 1);
    }

    #[test]
    fn test_out_of_state_events_ignored() {
        let mut r = MessageReconciler::new();
        assert!(r.apply(chunk("early")).is_empty());
        r.begin_send(1).unwrap();
        assert!(r.apply(chunk("before echo")).is_empty());
        assert!(r.apply(StreamEvent::Done { id: 9, created_at: ts(1) }).is_empty());
        r.apply(user_echo(1, "q"));
        assert!(r.apply(user_echo(2, "dup")).is_empty());
        assert_eq!(r.messages().len(), 2);
    }

    #[test]
    fn test_load_replaces_and_resets() {
        let mut r = MessageReconciler::new();
        r.begin_send(1).unwrap();
        r.load(vec![Message {
            id: MessageId::Confirmed(5),
            role: Role::User,
            content: "old".into(),
            created_at: ts(0),
        }]);
        assert_eq!(r.state(), ReconcilerState::Idle);
        assert_eq!(r.messages().len(), 1);
        r.clear();
        assert!(r.messages().is_empty());
    }

    #[test]
    fn test_apply_exchange() {
        let mut r = MessageReconciler::new();
        r.begin_send(1).unwrap();
        let exchange = Exchange {
            user_message: Message {
                id: MessageId::Confirmed(1),
                role: Role::User,
                content: "Hi".into(),
                created_at: ts(0),
            },
            assistant_message: Message {
                id: MessageId::Confirmed(2),
                role: Role::Assistant,
                content: "Hello".into(),
                created_at: ts(1),
            },
        };
        let events = r.apply_exchange(exchange.clone());
        assert_eq!(events.len(), 2);
        assert_eq!(r.state(), ReconcilerState::Finalized);
        assert_eq!(r.messages().len(), 2);

        // Not accepted outside a send
        assert!(r.apply_exchange(exchange).is_empty());
    }
}
