//! The chat session: wires the auth gate, registry and reconciler to the backend

use chrono::{DateTime, TimeZone};
use futures::StreamExt;
use memora_client::{
    AuthBackend, Conversation, ConversationBackend, ConversationId, Credentials, Message,
    MessageStreamer, User,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::AuthGate,
    bucket::{RecencyBucket, bucket},
    error::{Error, Result},
    events::EngineEvent,
    handle::SessionHandle,
    reconciler::{MessageReconciler, ReconcilerState},
    registry::{ConversationRegistry, derive_title},
};

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 256;

/// One signed-in user's view of their conversations.
///
/// All mutation goes through `&mut self`, so events from a send are applied
/// in arrival order and two sends can never interleave.
pub struct ChatSession {
    auth: AuthGate,
    registry: ConversationRegistry,
    reconciler: MessageReconciler,
    conversations: Arc<dyn ConversationBackend>,
    streamer: Arc<dyn MessageStreamer>,
    event_tx: broadcast::Sender<EngineEvent>,
    handle: SessionHandle,
    streaming: bool,
}

impl ChatSession {
    pub fn new(
        conversations: Arc<dyn ConversationBackend>,
        streamer: Arc<dyn MessageStreamer>,
        auth: Arc<dyn AuthBackend>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            auth: AuthGate::new(auth),
            registry: ConversationRegistry::new(Arc::clone(&conversations), event_tx.clone()),
            reconciler: MessageReconciler::new(),
            conversations,
            streamer,
            event_tx,
            handle: SessionHandle::new(),
            streaming: true,
        }
    }

    /// Build a session around a single backend implementing every collaborator
    pub fn with_backend<B>(backend: Arc<B>) -> Self
    where
        B: ConversationBackend + MessageStreamer + AuthBackend + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend)
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Get a handle to abort a send from outside
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Choose between streamed and whole replies
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn user(&self) -> Option<&User> {
        self.auth.current_user()
    }

    pub fn is_loading(&self) -> bool {
        self.auth.is_loading()
    }

    pub fn messages(&self) -> &[Message] {
        self.reconciler.messages()
    }

    pub fn state(&self) -> ReconcilerState {
        self.reconciler.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.reconciler.last_error()
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.registry.conversations()
    }

    pub fn selected(&self) -> Option<ConversationId> {
        self.registry.selected()
    }

    /// Navigation view of the conversation list
    pub fn buckets<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<RecencyBucket> {
        bucket(self.registry.conversations(), now)
    }

    // ------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------

    /// Resume an existing backend session and load its conversations
    pub async fn restore(&mut self) -> Result<Option<User>> {
        let user = self.auth.restore().await.cloned();
        if user.is_some() {
            self.registry.list().await?;
        }
        Ok(user)
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<User> {
        let user = self.auth.login(credentials).await?.clone();
        self.registry.list().await?;
        Ok(user)
    }

    pub async fn register(&mut self, credentials: &Credentials) -> Result<User> {
        let user = self.auth.register(credentials).await?.clone();
        self.registry.list().await?;
        Ok(user)
    }

    /// Sign out and forget every conversation and message
    pub async fn logout(&mut self) -> Result<()> {
        let result = self.auth.logout().await;
        self.registry.clear();
        self.reset_messages(Vec::new());
        result
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub async fn refresh_conversations(&mut self) -> Result<()> {
        self.require_auth()?;
        self.registry.refresh().await
    }

    /// Select a conversation and load its history
    pub async fn open(&mut self, id: ConversationId) -> Result<()> {
        self.require_auth()?;
        let remote_id = id.confirmed().ok_or(Error::Unconfirmed(id))?;
        let detail = self.conversations.get_with_messages(remote_id).await?;
        tracing::debug!(
            "Opened conversation {} with {} messages",
            remote_id,
            detail.messages.len()
        );
        self.registry.select(id);
        self.reset_messages(detail.messages);
        Ok(())
    }

    /// Start over with no conversation selected
    pub fn new_chat(&mut self) {
        self.registry.clear_selection();
        self.reset_messages(Vec::new());
    }

    /// Delete a conversation; the open message list is dropped if it belonged to it
    pub async fn delete_conversation(&mut self, id: ConversationId) -> Result<()> {
        self.require_auth()?;
        let was_selected = self.registry.selected() == Some(id);
        self.registry.delete(id).await?;
        if was_selected {
            self.reset_messages(Vec::new());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send a user message and fold the reply into the open conversation.
    ///
    /// Creates a conversation titled after `text` when none is selected. On
    /// any failure the partial reply stays in the list and the reconciler
    /// ends up `Failed`.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyMessage);
        }
        self.require_auth()?;
        if self.reconciler.state().is_in_flight() {
            return Err(Error::SendInProgress);
        }

        // Installed before any backend call so an abort during create counts
        let cancel = self.handle.reset();
        self.handle.set_sending(true);
        let result = self.send_with(text, &cancel).await;
        self.handle.set_sending(false);
        result
    }

    async fn send_with(&mut self, text: &str, cancel: &CancellationToken) -> Result<()> {
        let conversation_id = match self.registry.selected() {
            Some(ConversationId::Confirmed(id)) => id,
            Some(local) => return Err(Error::Unconfirmed(local)),
            None => self.start_conversation(text).await?,
        };
        // The created conversation stays; only the reply is skipped
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.reconciler.begin_send(conversation_id)?;
        self.emit(EngineEvent::SendStarted { conversation_id });

        let result = if self.streaming {
            self.stream_reply(conversation_id, text, cancel).await
        } else {
            self.whole_reply(conversation_id, text, cancel).await
        };

        if let Err(e) = &result {
            if let Some(event) = self.reconciler.fail(e.to_string()) {
                self.emit(event);
            }
        }
        result
    }

    async fn start_conversation(&mut self, text: &str) -> Result<i64> {
        let created = self.registry.create(&derive_title(text)).await?;
        self.registry.select(created.id);
        created.id.confirmed().ok_or(Error::Unconfirmed(created.id))
    }

    async fn stream_reply(
        &mut self,
        conversation_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut stream = tokio::select! {
            opened = self.streamer.stream_message(conversation_id, text) => opened?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            };
            match next {
                Some(Ok(event)) => {
                    let events = self.reconciler.apply(event);
                    self.publish(conversation_id, events);
                    if self.reconciler.state() == ReconcilerState::Finalized {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::StreamIncomplete),
            }
        }
    }

    async fn whole_reply(
        &mut self,
        conversation_id: i64,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let exchange = tokio::select! {
            sent = self.streamer.send_message(conversation_id, text) => sent?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };
        let events = self.reconciler.apply_exchange(exchange);
        self.publish(conversation_id, events);
        Ok(())
    }

    /// Forward reconciler output, bumping the conversation when a reply lands
    fn publish(&mut self, conversation_id: i64, events: Vec<EngineEvent>) {
        for event in events {
            if let EngineEvent::MessageFinalized { message } = &event {
                self.registry
                    .touch(ConversationId::Confirmed(conversation_id), message.created_at);
            }
            self.emit(event);
        }
    }

    fn reset_messages(&mut self, messages: Vec<Message>) {
        self.reconciler.load(messages.clone());
        self.emit(EngineEvent::MessagesLoaded { messages });
    }

    fn require_auth(&self) -> Result<()> {
        if self.auth.is_signed_in() {
            Ok(())
        } else {
            Err(Error::NotAuthenticated)
        }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}
