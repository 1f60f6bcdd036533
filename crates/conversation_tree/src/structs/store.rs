use std::collections::{HashMap, HashSet};

use chat_core::{Message, MessageStatus};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TreeError};

/// The single owned table of every message in a conversation.
///
/// Entries keep insertion order, which is the tie-break for siblings sharing a
/// timestamp. Parent references are plain ids; a parent must already be present
/// when a child is inserted, so the parent graph is always a forest.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(try_from = "Vec<Message>", into = "Vec<Message>")]
pub struct MessageStore {
    messages: IndexMap<Uuid, Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from messages in insertion order, validating ids and parent links.
    pub fn from_messages<I>(messages: I) -> Result<Self>
    where
        I: IntoIterator<Item = Message>,
    {
        let mut table = IndexMap::new();
        for message in messages {
            if table.contains_key(&message.id) {
                return Err(TreeError::DuplicateId(message.id));
            }
            table.insert(message.id, message);
        }

        for message in table.values() {
            if let Some(parent_id) = message.parent_id {
                if !table.contains_key(&parent_id) {
                    return Err(TreeError::DanglingParent {
                        id: message.id,
                        parent_id,
                    });
                }
            }
        }

        check_acyclic(&table)?;

        Ok(Self { messages: table })
    }

    /// Insert a new message. Its parent, if any, must already be stored.
    pub fn insert(&mut self, message: Message) -> Result<Uuid> {
        if self.messages.contains_key(&message.id) {
            return Err(TreeError::DuplicateId(message.id));
        }
        if let Some(parent_id) = message.parent_id {
            if !self.messages.contains_key(&parent_id) {
                return Err(TreeError::DanglingParent {
                    id: message.id,
                    parent_id,
                });
            }
        }

        let id = message.id;
        tracing::debug!(
            message_id = %id,
            parent_id = ?message.parent_id,
            role = %message.role,
            store_size = self.messages.len() + 1,
            "MessageStore: inserting message"
        );
        self.messages.insert(id, message);
        Ok(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.messages.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Overwrite a pending placeholder with its final content.
    ///
    /// Succeeds at most once per message; the id and parent never change.
    pub fn finalize(
        &mut self,
        id: &Uuid,
        content: String,
        reasoning: Option<String>,
        status: MessageStatus,
    ) -> Result<&Message> {
        if status.is_pending() {
            return Err(TreeError::PendingFinalStatus(*id));
        }
        let message = self
            .messages
            .get_mut(id)
            .ok_or(TreeError::UnknownMessage(*id))?;
        if !message.status.is_pending() {
            return Err(TreeError::AlreadyFinalized(*id));
        }

        message.content = content;
        message.reasoning = reasoning;
        message.status = status;
        Ok(message)
    }

    /// The chain root → ... → `id`, inclusive. Empty when `id` is unknown.
    pub fn ancestors(&self, id: &Uuid) -> Vec<&Message> {
        let mut chain = Vec::new();
        let mut current = self.messages.get(id);
        while let Some(message) = current {
            chain.push(message);
            if chain.len() > self.messages.len() {
                break;
            }
            current = message.parent_id.and_then(|parent| self.messages.get(&parent));
        }
        chain.reverse();
        chain
    }

    pub fn ancestor_ids(&self, id: &Uuid) -> Vec<Uuid> {
        self.ancestors(id).into_iter().map(|m| m.id).collect()
    }

    /// `id` and every message below it, in insertion order.
    pub fn subtree_ids(&self, id: &Uuid) -> Vec<Uuid> {
        if !self.messages.contains_key(id) {
            return Vec::new();
        }
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for message in self.messages.values() {
            if let Some(parent_id) = message.parent_id {
                children.entry(parent_id).or_default().push(message.id);
            }
        }

        let mut members: HashSet<Uuid> = HashSet::from([*id]);
        let mut pending = vec![*id];
        while let Some(current) = pending.pop() {
            for child in children.get(&current).into_iter().flatten() {
                if members.insert(*child) {
                    pending.push(*child);
                }
            }
        }
        self.messages
            .keys()
            .filter(|key| members.contains(key))
            .copied()
            .collect()
    }

    /// Remove `id` and its whole subtree. Returns the removed messages.
    pub fn remove_subtree(&mut self, id: &Uuid) -> Result<Vec<Message>> {
        if !self.messages.contains_key(id) {
            return Err(TreeError::UnknownMessage(*id));
        }
        let removed: Vec<Message> = self
            .subtree_ids(id)
            .iter()
            .filter_map(|member| self.messages.shift_remove(member))
            .collect();

        tracing::info!(
            message_id = %id,
            removed = removed.len(),
            store_size = self.messages.len(),
            "MessageStore: removed subtree"
        );
        Ok(removed)
    }
}

fn check_acyclic(table: &IndexMap<Uuid, Message>) -> Result<()> {
    let mut settled: HashSet<Uuid> = HashSet::new();
    for start in table.keys() {
        let mut trail = Vec::new();
        let mut on_trail = HashSet::new();
        let mut current = Some(*start);
        while let Some(id) = current {
            if settled.contains(&id) {
                break;
            }
            if !on_trail.insert(id) {
                return Err(TreeError::Cycle(id));
            }
            trail.push(id);
            current = table.get(&id).and_then(|message| message.parent_id);
        }
        settled.extend(trail);
    }
    Ok(())
}

impl TryFrom<Vec<Message>> for MessageStore {
    type Error = TreeError;

    fn try_from(messages: Vec<Message>) -> Result<Self> {
        Self::from_messages(messages)
    }
}

impl From<MessageStore> for Vec<Message> {
    fn from(store: MessageStore) -> Self {
        store.messages.into_values().collect()
    }
}
