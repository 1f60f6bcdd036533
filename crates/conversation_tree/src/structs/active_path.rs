use uuid::Uuid;

use crate::structs::store::MessageStore;
use crate::structs::tree::{MessageTree, TreeNode};

/// Map `active_path` ids to tree nodes for rendering.
///
/// Ids that do not resolve are dropped rather than reported, so a stale path
/// degrades by skipping entries.
pub fn resolve_active_path<'t, 'a>(
    tree: &'t MessageTree<'a>,
    active_path: &[Uuid],
) -> Vec<&'t TreeNode<'a>> {
    active_path
        .iter()
        .filter_map(|id| {
            let node = tree.node(id);
            if node.is_none() {
                tracing::debug!(message_id = %id, "ActivePath: dropping unresolved entry");
            }
            node
        })
        .collect()
}

/// Ids below `from` obtained by always descending into the most recently
/// created child until a leaf. Does not include `from` itself.
pub fn deepest_latest_extension(tree: &MessageTree<'_>, from: &Uuid) -> Vec<Uuid> {
    let mut extension = Vec::new();
    let mut current = tree.node(from);
    while let Some(child) = current.and_then(|node| node.latest_child()) {
        extension.push(child);
        if extension.len() > tree.len() {
            break;
        }
        current = tree.node(&child);
    }
    extension
}

/// Longest prefix of `active_path` that is a valid root → child chain in `store`.
pub fn truncate_to_valid_prefix(store: &MessageStore, active_path: &[Uuid]) -> Vec<Uuid> {
    let mut valid: Vec<Uuid> = Vec::with_capacity(active_path.len());
    for id in active_path {
        let Some(message) = store.get(id) else {
            break;
        };
        if message.parent_id != valid.last().copied() {
            break;
        }
        valid.push(*id);
    }
    if valid.len() != active_path.len() {
        tracing::debug!(
            original_len = active_path.len(),
            valid_len = valid.len(),
            "ActivePath: truncated to valid prefix"
        );
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::tree::build_tree;
    use chat_core::Message;

    #[test]
    fn test_resolve_drops_missing_ids() {
        let mut store = MessageStore::new();
        let a = store.insert(Message::user("a", None)).unwrap();
        let b = store.insert(Message::assistant("b", Some(a))).unwrap();
        let tree = build_tree(&store);

        let path = vec![a, Uuid::new_v4(), b];
        let resolved: Vec<Uuid> = resolve_active_path(&tree, &path)
            .iter()
            .map(|node| node.id())
            .collect();
        assert_eq!(resolved, vec![a, b]);
        assert!(resolve_active_path(&tree, &[]).is_empty());
    }

    #[test]
    fn test_deepest_latest_follows_newest_child() {
        let mut store = MessageStore::new();
        let root = store.insert(Message::user("root", None)).unwrap();
        let _old = store.insert(Message::assistant("old", Some(root))).unwrap();
        let new = store.insert(Message::assistant("new", Some(root))).unwrap();
        let follow_up = store.insert(Message::user("follow", Some(new))).unwrap();
        let tree = build_tree(&store);

        assert_eq!(deepest_latest_extension(&tree, &root), vec![new, follow_up]);
        assert!(deepest_latest_extension(&tree, &follow_up).is_empty());
    }

    #[test]
    fn test_truncate_stops_at_broken_link() {
        let mut store = MessageStore::new();
        let a = store.insert(Message::user("a", None)).unwrap();
        let b = store.insert(Message::assistant("b", Some(a))).unwrap();
        let other_root = store.insert(Message::user("other", None)).unwrap();

        assert_eq!(truncate_to_valid_prefix(&store, &[a, b]), vec![a, b]);
        assert_eq!(truncate_to_valid_prefix(&store, &[a, other_root, b]), vec![a]);
        assert_eq!(truncate_to_valid_prefix(&store, &[b]), Vec::<Uuid>::new());
    }
}
