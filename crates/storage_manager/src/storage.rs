//! Conversation storage trait

use async_trait::async_trait;
use conversation_tree::Conversation;
use uuid::Uuid;

use crate::error::Result;

/// Persistence collaborator for conversation snapshots.
#[async_trait]
pub trait ConversationStorage: Send + Sync {
    /// Load a conversation, `None` if it was never saved.
    async fn load(&self, conversation_id: Uuid) -> Result<Option<Conversation>>;

    /// Save the whole conversation, replacing any previous snapshot.
    async fn save(&self, conversation_id: Uuid, conversation: &Conversation) -> Result<()>;

    /// Delete a conversation. Returns whether anything was removed.
    async fn delete(&self, conversation_id: Uuid) -> Result<bool>;

    /// Ids of all stored conversations.
    async fn list(&self) -> Result<Vec<Uuid>>;
}
