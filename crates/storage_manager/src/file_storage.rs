//! File-based conversation storage: one pretty JSON file per conversation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use conversation_tree::Conversation;
use tokio::fs;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::storage::ConversationStorage;

#[derive(Debug, Clone)]
pub struct FileConversationStorage {
    base_path: PathBuf,
}

impl FileConversationStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn conversation_path(&self, conversation_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json", conversation_id))
    }

    fn temp_path(&self, conversation_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json.tmp", conversation_id))
    }
}

#[async_trait]
impl ConversationStorage for FileConversationStorage {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let path = self.conversation_path(conversation_id);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let conversation: Conversation = serde_json::from_str(&contents)?;
        if conversation.id != conversation_id {
            return Err(StorageError::IdMismatch {
                requested: conversation_id,
                found: conversation.id,
            });
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            message_count = conversation.len(),
            "FileConversationStorage: loaded"
        );
        Ok(Some(conversation))
    }

    async fn save(&self, conversation_id: Uuid, conversation: &Conversation) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;

        let contents = serde_json::to_string_pretty(conversation)?;
        let temp_path = self.temp_path(conversation_id);
        fs::write(&temp_path, contents).await?;
        fs::rename(&temp_path, self.conversation_path(conversation_id)).await?;

        tracing::debug!(
            conversation_id = %conversation_id,
            message_count = conversation.len(),
            "FileConversationStorage: saved"
        );
        Ok(())
    }

    async fn delete(&self, conversation_id: Uuid) -> Result<bool> {
        match fs::remove_file(self.conversation_path(conversation_id)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Uuid>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let storage = FileConversationStorage::new(dir.path());

        let loaded = storage.load(Uuid::new_v4()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let storage = FileConversationStorage::new(dir.path().join("not-created"));

        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_id_mismatch_is_reported() {
        let dir = tempdir().unwrap();
        let storage = FileConversationStorage::new(dir.path());
        let conversation = Conversation::default();
        let other_id = Uuid::new_v4();

        storage.save(other_id, &conversation).await.unwrap();
        let result = storage.load(other_id).await;
        assert!(matches!(result, Err(StorageError::IdMismatch { .. })));
    }
}
