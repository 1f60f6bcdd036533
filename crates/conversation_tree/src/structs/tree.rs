use std::collections::{HashMap, VecDeque};

use chat_core::Message;
use uuid::Uuid;

use crate::structs::store::MessageStore;

/// A message together with its derived position in the tree.
#[derive(Debug, Clone)]
pub struct TreeNode<'a> {
    pub message: &'a Message,
    /// Child ids, oldest first.
    pub children: Vec<Uuid>,
    /// 0 for roots.
    pub depth: usize,
}

impl TreeNode<'_> {
    pub fn id(&self) -> Uuid {
        self.message.id
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The most recently created child.
    pub fn latest_child(&self) -> Option<Uuid> {
        self.children.last().copied()
    }
}

/// Navigable view of a [`MessageStore`]: ordered roots plus an id → node index.
///
/// Always rebuilt from the store, never persisted.
#[derive(Debug, Clone, Default)]
pub struct MessageTree<'a> {
    roots: Vec<Uuid>,
    nodes: HashMap<Uuid, TreeNode<'a>>,
}

impl<'a> MessageTree<'a> {
    /// Build the tree. Siblings (and roots) are sorted by ascending timestamp;
    /// equal timestamps keep store insertion order.
    pub fn build(store: &'a MessageStore) -> Self {
        let mut nodes: HashMap<Uuid, TreeNode<'a>> = store
            .iter()
            .map(|message| {
                (
                    message.id,
                    TreeNode {
                        message,
                        children: Vec::new(),
                        depth: 0,
                    },
                )
            })
            .collect();

        let mut roots = Vec::new();
        for message in store.iter() {
            match message.parent_id {
                None => roots.push(message.id),
                Some(parent_id) => match nodes.get_mut(&parent_id) {
                    Some(parent) => parent.children.push(message.id),
                    None => {
                        tracing::warn!(
                            message_id = %message.id,
                            parent_id = %parent_id,
                            "MessageTree: parent missing, treating message as root"
                        );
                        roots.push(message.id);
                    }
                },
            }
        }

        let timestamp_of = |id: &Uuid| store.get(id).map(|message| message.timestamp);
        roots.sort_by_key(timestamp_of);
        for node in nodes.values_mut() {
            node.children.sort_by_key(timestamp_of);
        }

        let mut queue: VecDeque<(Uuid, usize)> = roots.iter().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = queue.pop_front() {
            if let Some(node) = nodes.get_mut(&id) {
                node.depth = depth;
                queue.extend(node.children.iter().map(|child| (*child, depth + 1)));
            }
        }

        tracing::debug!(
            node_count = nodes.len(),
            root_count = roots.len(),
            "MessageTree: built"
        );

        Self { roots, nodes }
    }

    /// Root ids, oldest first.
    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    pub fn node(&self, id: &Uuid) -> Option<&TreeNode<'a>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of `id`, oldest first. Empty for unknown ids.
    pub fn children(&self, id: &Uuid) -> &[Uuid] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// The sibling set `id` belongs to: the roots for a root, otherwise its
    /// parent's children. `None` for unknown ids.
    pub fn siblings(&self, id: &Uuid) -> Option<&[Uuid]> {
        let node = self.nodes.get(id)?;
        match node.message.parent_id {
            Some(parent_id) if self.nodes.contains_key(&parent_id) => {
                Some(self.children(&parent_id))
            }
            _ => Some(&self.roots),
        }
    }

    /// Nodes in depth-first order, children oldest first.
    pub fn walk(&self) -> Vec<&TreeNode<'a>> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<Uuid> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                ordered.push(node);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        ordered
    }
}

/// Turn the flat store into a navigable tree.
pub fn build_tree(store: &MessageStore) -> MessageTree<'_> {
    MessageTree::build(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_children_sorted_by_timestamp() {
        let now = Utc::now();
        let mut store = MessageStore::new();
        let root = store
            .insert(Message::user("root", None).with_timestamp(now))
            .unwrap();
        let late = store
            .insert(Message::assistant("late", Some(root)).with_timestamp(now + Duration::seconds(5)))
            .unwrap();
        let early = store
            .insert(Message::assistant("early", Some(root)).with_timestamp(now + Duration::seconds(1)))
            .unwrap();

        let tree = build_tree(&store);
        assert_eq!(tree.children(&root), &[early, late]);
        assert_eq!(tree.node(&late).unwrap().depth, 1);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let now = Utc::now();
        let mut store = MessageStore::new();
        let root = store
            .insert(Message::user("root", None).with_timestamp(now))
            .unwrap();
        let first = store
            .insert(Message::assistant("first", Some(root)).with_timestamp(now))
            .unwrap();
        let second = store
            .insert(Message::assistant("second", Some(root)).with_timestamp(now))
            .unwrap();

        let tree = build_tree(&store);
        assert_eq!(tree.children(&root), &[first, second]);
        assert_eq!(tree.node(&root).unwrap().latest_child(), Some(second));
    }

    #[test]
    fn test_walk_is_depth_first() {
        let mut store = MessageStore::new();
        let a = store.insert(Message::user("a", None)).unwrap();
        let b = store.insert(Message::assistant("b", Some(a))).unwrap();
        let c = store.insert(Message::user("c", Some(b))).unwrap();
        let d = store.insert(Message::assistant("d", Some(a))).unwrap();

        let tree = build_tree(&store);
        let order: Vec<Uuid> = tree.walk().iter().map(|node| node.id()).collect();
        assert_eq!(order, vec![a, b, c, d]);
    }
}
