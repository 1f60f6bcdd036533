use chat_core::{HistoryMessage, Message, MessageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TreeError};
use crate::structs::active_path::{
    deepest_latest_extension, resolve_active_path, truncate_to_valid_prefix,
};
use crate::structs::navigation::{self, BranchNavigation, Direction};
use crate::structs::store::MessageStore;
use crate::structs::tree::MessageTree;

/// A complete branching conversation: the flat store plus the path currently shown.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(from = "ConversationRecord")]
pub struct Conversation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// The single source of truth for all message data in this conversation.
    store: MessageStore,

    /// Root → leaf ids currently displayed.
    active_path: Vec<Uuid>,

    /// Runtime flag to track if the conversation needs persistence (not serialized).
    #[serde(skip)]
    dirty: bool,
}

/// On-disk shape; loading repairs the active path against the store.
#[derive(Deserialize)]
struct ConversationRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    store: MessageStore,
    #[serde(default)]
    active_path: Vec<Uuid>,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        let active_path = truncate_to_valid_prefix(&record.store, &record.active_path);
        if active_path.len() != record.active_path.len() {
            tracing::warn!(
                conversation_id = %record.id,
                dropped = record.active_path.len() - active_path.len(),
                "Conversation: loaded active path did not match store, truncated"
            );
        }
        Self {
            id: record.id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            store: record.store,
            active_path,
            dirty: false,
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

impl Conversation {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            store: MessageStore::new(),
            active_path: Vec::new(),
            dirty: false,
        }
    }

    /// Assemble a conversation from an existing store and path. The path is
    /// truncated to its longest valid prefix.
    pub fn from_parts(id: Uuid, store: MessageStore, active_path: Vec<Uuid>) -> Self {
        let mut conversation = Self::new(id);
        conversation.active_path = truncate_to_valid_prefix(&store, &active_path);
        conversation.store = store;
        conversation
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn get(&self, id: &Uuid) -> Option<&Message> {
        self.store.get(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn active_path(&self) -> &[Uuid] {
        &self.active_path
    }

    /// The last id of the active path.
    pub fn leaf_id(&self) -> Option<Uuid> {
        self.active_path.last().copied()
    }

    pub fn tree(&self) -> MessageTree<'_> {
        MessageTree::build(&self.store)
    }

    /// Root ids, oldest first.
    pub fn roots(&self) -> Vec<Uuid> {
        self.tree().roots().to_vec()
    }

    /// Messages on the active path, skipping entries that no longer resolve.
    pub fn active_messages(&self) -> Vec<&Message> {
        let tree = self.tree();
        resolve_active_path(&tree, &self.active_path)
            .into_iter()
            .map(|node| node.message)
            .collect()
    }

    pub fn branch_navigation(&self, id: &Uuid) -> BranchNavigation {
        navigation::branch_navigation(&self.tree(), id)
    }

    /// Switch `id` to its neighbouring sibling. Returns `false` (no-op) when the
    /// move is not possible.
    pub fn navigate_branch(&mut self, id: &Uuid, direction: Direction) -> bool {
        let next = navigation::navigate_branch(&self.tree(), &self.active_path, id, direction);
        match next {
            Some(path) => {
                tracing::info!(
                    conversation_id = %self.id,
                    message_id = %id,
                    direction = ?direction,
                    path_len = path.len(),
                    "Conversation: navigated branch"
                );
                self.set_active_path(path);
                true
            }
            None => false,
        }
    }

    /// Show `id`: its ancestor chain followed by its newest descendants.
    pub fn select_message(&mut self, id: &Uuid) -> bool {
        if !self.store.contains(id) {
            tracing::warn!(
                conversation_id = %self.id,
                message_id = %id,
                "Conversation: select_message on unknown message"
            );
            return false;
        }
        let mut path = self.store.ancestor_ids(id);
        path.extend(deepest_latest_extension(&self.tree(), id));
        self.set_active_path(path);
        true
    }

    /// Replace the active path. Entries are not validated here; rendering drops
    /// ids that do not resolve.
    pub fn set_active_path(&mut self, path: Vec<Uuid>) {
        if self.active_path != path {
            self.active_path = path;
            self.touch();
        }
    }

    /// The part of the path shown above `id`: the active path prefix before it
    /// when `id` is on the path, otherwise the ancestor chain of its parent.
    pub fn path_before(&self, id: &Uuid) -> Vec<Uuid> {
        if let Some(position) = self.active_path.iter().position(|entry| entry == id) {
            return self.active_path[..position].to_vec();
        }
        self.store
            .get(id)
            .and_then(|message| message.parent_id)
            .map(|parent_id| self.store.ancestor_ids(&parent_id))
            .unwrap_or_default()
    }

    /// Add a message without touching the active path.
    pub fn add_message(&mut self, message: Message) -> Result<Uuid> {
        let id = self.store.insert(message)?;
        self.touch();
        Ok(id)
    }

    /// Add a message and append it to the active path.
    pub fn push_message(&mut self, message: Message) -> Result<Uuid> {
        let id = self.add_message(message)?;
        self.active_path.push(id);
        Ok(id)
    }

    /// Overwrite a pending placeholder once.
    pub fn finalize_message(
        &mut self,
        id: &Uuid,
        content: String,
        reasoning: Option<String>,
        status: MessageStatus,
    ) -> Result<&Message> {
        let message = self.store.finalize(id, content, reasoning, status)?;
        self.updated_at = Utc::now();
        self.dirty = true;
        Ok(message)
    }

    /// History sent to the generator: root → ... → `anchor`, without pending placeholders.
    pub fn history_for(&self, anchor: &Uuid) -> Vec<HistoryMessage> {
        self.store
            .ancestors(anchor)
            .into_iter()
            .filter(|message| !message.is_placeholder())
            .map(HistoryMessage::from)
            .collect()
    }

    /// Remove `id` with its subtree and truncate the active path to what remains valid.
    pub fn remove_branch(&mut self, id: &Uuid) -> Result<Vec<Message>> {
        let removed = self.store.remove_subtree(id)?;
        let path = truncate_to_valid_prefix(&self.store, &self.active_path);
        self.active_path = path;
        self.touch();
        Ok(removed)
    }

    /// Whether `id` or any ancestor of it is `ancestor`.
    pub fn is_within(&self, id: &Uuid, ancestor: &Uuid) -> bool {
        self.store
            .ancestors(id)
            .iter()
            .any(|message| message.id == *ancestor)
    }

    /// `path_before(id)` followed by `id` itself.
    pub fn path_through(&self, id: &Uuid) -> Result<Vec<Uuid>> {
        if !self.store.contains(id) {
            return Err(TreeError::UnknownMessage(*id));
        }
        let mut path = self.path_before(id);
        path.push(*id);
        Ok(path)
    }

    /// Placeholders still waiting for content.
    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.store
            .iter()
            .filter(|message| message.status.is_pending())
            .map(|message| message.id)
            .collect()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.mark_dirty();
    }

    /// Mark the conversation as dirty (needs persistence)
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag (after successful persistence)
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Check if the conversation needs to be persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
