//! Conversation registry: the ordered conversation list and the selection

use chrono::{DateTime, Utc};
use memora_client::{Conversation, ConversationBackend, ConversationId};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::{error::Result, events::EngineEvent};

/// Maximum title length, in characters, derived from a first message
pub const TITLE_MAX_CHARS: usize = 50;

/// Title for a conversation started by `text`
pub fn derive_title(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Ordered conversation summaries, most recently updated first.
///
/// Create and delete are optimistic: observers see the change before the
/// backend answers, and the change is undone if the backend refuses it.
pub struct ConversationRegistry {
    backend: Arc<dyn ConversationBackend>,
    event_tx: broadcast::Sender<EngineEvent>,
    conversations: Vec<Conversation>,
    selected: Option<ConversationId>,
}

impl ConversationRegistry {
    pub fn new(
        backend: Arc<dyn ConversationBackend>,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            backend,
            event_tx,
            conversations: Vec::new(),
            selected: None,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn selected(&self) -> Option<ConversationId> {
        self.selected
    }

    /// Reload from the backend
    pub async fn list(&mut self) -> Result<&[Conversation]> {
        let mut conversations = self.backend.list().await?;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        tracing::debug!("Loaded {} conversations", conversations.len());
        self.conversations = conversations;
        self.notify();
        Ok(&self.conversations)
    }

    /// Reload, discarding the listing
    pub async fn refresh(&mut self) -> Result<()> {
        self.list().await.map(|_| ())
    }

    /// Create a conversation.
    ///
    /// A local placeholder goes to the front at once and is swapped in place
    /// for the confirmed record, or removed if the backend fails.
    pub async fn create(&mut self, title: &str) -> Result<Conversation> {
        let local_id = ConversationId::local();
        self.conversations.insert(
            0,
            Conversation {
                id: local_id,
                title: title.to_string(),
                updated_at: Utc::now(),
            },
        );
        self.notify();

        match self.backend.create(title).await {
            Ok(confirmed) => {
                if let Some(slot) = self.conversations.iter_mut().find(|c| c.id == local_id) {
                    *slot = confirmed.clone();
                }
                if self.selected == Some(local_id) {
                    self.set_selected(Some(confirmed.id));
                }
                self.notify();
                Ok(confirmed)
            }
            Err(e) => {
                tracing::warn!("Create failed, removing placeholder: {}", e);
                self.conversations.retain(|c| c.id != local_id);
                if self.selected == Some(local_id) {
                    self.set_selected(None);
                }
                self.notify();
                Err(e.into())
            }
        }
    }

    /// Point the selection at `id`; the id does not have to be listed yet
    pub fn select(&mut self, id: ConversationId) {
        self.set_selected(Some(id));
    }

    /// Select nothing, as for a new chat
    pub fn clear_selection(&mut self) {
        self.set_selected(None);
    }

    /// Delete a conversation.
    ///
    /// Removed locally first; restored at its old position (with its
    /// selection) if the backend refuses.
    pub async fn delete(&mut self, id: ConversationId) -> Result<()> {
        let removed = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .map(|index| (index, self.conversations.remove(index)));
        let was_selected = self.selected == Some(id);
        if was_selected {
            self.set_selected(None);
        }
        self.notify();

        let Some(remote_id) = id.confirmed() else {
            return Ok(());
        };

        if let Err(e) = self.backend.delete(remote_id).await {
            tracing::warn!("Delete of {} failed, restoring it: {}", id, e);
            if let Some((index, conversation)) = removed {
                let index = index.min(self.conversations.len());
                self.conversations.insert(index, conversation);
            }
            if was_selected {
                self.set_selected(Some(id));
            }
            self.notify();
            return Err(e.into());
        }
        Ok(())
    }

    /// Record activity on a conversation, moving it to the front
    pub fn touch(&mut self, id: ConversationId, at: DateTime<Utc>) {
        let Some(index) = self.conversations.iter().position(|c| c.id == id) else {
            return;
        };
        let mut conversation = self.conversations.remove(index);
        conversation.updated_at = at;
        self.conversations.insert(0, conversation);
        self.notify();
    }

    /// Forget everything, as on sign-out
    pub fn clear(&mut self) {
        self.conversations.clear();
        self.set_selected(None);
        self.notify();
    }

    fn set_selected(&mut self, id: Option<ConversationId>) {
        if self.selected != id {
            self.selected = id;
            let _ = self.event_tx.send(EngineEvent::SelectionChanged { id });
        }
    }

    fn notify(&self) {
        let _ = self.event_tx.send(EngineEvent::ConversationsChanged {
            conversations: self.conversations.clone(),
        });
    }
}
