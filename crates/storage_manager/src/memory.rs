//! In-memory conversation storage.
//!
//! Snapshots are kept serialized so loads go through the same validation as
//! file storage and never alias the caller's conversation.

use std::collections::HashMap;

use async_trait::async_trait;
use conversation_tree::Conversation;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::ConversationStorage;

#[derive(Debug, Default)]
pub struct MemoryConversationStorage {
    snapshots: RwLock<HashMap<Uuid, String>>,
}

impl MemoryConversationStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStorage for MemoryConversationStorage {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let snapshots = self.snapshots.read().await;
        match snapshots.get(&conversation_id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation_id: Uuid, conversation: &Conversation) -> Result<()> {
        let json = serde_json::to_string(conversation)?;
        self.snapshots.write().await.insert(conversation_id, json);
        Ok(())
    }

    async fn delete(&self, conversation_id: Uuid) -> Result<bool> {
        Ok(self
            .snapshots
            .write()
            .await
            .remove(&conversation_id)
            .is_some())
    }

    async fn list(&self) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self.snapshots.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
