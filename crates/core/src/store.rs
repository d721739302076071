//! Conversation store trait: durable per-session message history.
//!
//! Histories are keyed by an opaque [`ConversationId`] and only ever grow:
//! the core appends messages and reads whole histories back. Retention and
//! deletion belong to whoever operates the storage.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Conversation, ConversationId, Message};

/// The core conversation store trait.
///
/// Each append must be atomic: a concurrent reader of the same session sees
/// either the whole message or none of it. Serializing writers of one
/// session is the caller's job (see the agent's session locks).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append one message to the end of a conversation, creating it on first use.
    async fn append(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError>;

    /// Append several messages in order, all or nothing.
    async fn append_all(
        &self,
        id: &ConversationId,
        messages: &[Message],
    ) -> Result<(), StoreError> {
        for message in messages {
            self.append(id, message).await?;
        }
        Ok(())
    }

    /// Load the full ordered history. Unknown ids yield an empty conversation.
    async fn load(&self, id: &ConversationId) -> Result<Conversation, StoreError>;

    /// Number of messages stored for a conversation.
    async fn count(&self, id: &ConversationId) -> Result<usize, StoreError>;

    /// All conversation ids with at least one message.
    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, StoreError>;
}
