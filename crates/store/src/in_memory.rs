//! In-memory backend: useful for testing and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use toolchat_core::error::StoreError;
use toolchat_core::message::{Conversation, ConversationId, Message};
use toolchat_core::store::ConversationStore;

/// Keeps every conversation in a map guarded by one async lock.
/// Histories are lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<ConversationId, Vec<Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .entry(id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn append_all(
        &self,
        id: &ConversationId,
        messages: &[Message],
    ) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .entry(id.clone())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> Result<Conversation, StoreError> {
        let messages = self
            .conversations
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default();
        Ok(Conversation {
            id: id.clone(),
            messages,
        })
    }

    async fn count(&self, id: &ConversationId) -> Result<usize, StoreError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(id)
            .map_or(0, Vec::len))
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, StoreError> {
        let mut ids: Vec<ConversationId> = self.conversations.read().await.keys().cloned().collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }
}
