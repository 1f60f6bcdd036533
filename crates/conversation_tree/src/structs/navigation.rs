use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::structs::active_path::deepest_latest_extension;
use crate::structs::tree::MessageTree;

/// Position of a message among its siblings. Computed on demand, never stored.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchNavigation {
    pub current_index: usize,
    pub total_branches: usize,
    pub can_navigate_left: bool,
    pub can_navigate_right: bool,
}

impl BranchNavigation {
    /// Result for a message with no alternatives (or one not in the tree).
    pub fn single() -> Self {
        Self::at(0, 1)
    }

    fn at(current_index: usize, total_branches: usize) -> Self {
        Self {
            current_index,
            total_branches,
            can_navigate_left: current_index > 0,
            can_navigate_right: current_index + 1 < total_branches,
        }
    }

    pub fn has_alternatives(&self) -> bool {
        self.total_branches > 1
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

/// Sibling position of `node_id`.
pub fn branch_navigation(tree: &MessageTree<'_>, node_id: &Uuid) -> BranchNavigation {
    let Some(siblings) = tree.siblings(node_id) else {
        return BranchNavigation::single();
    };
    match siblings.iter().position(|id| id == node_id) {
        Some(index) => BranchNavigation::at(index, siblings.len()),
        None => BranchNavigation::single(),
    }
}

/// Compute the active path after switching `node_id` to its neighbouring sibling.
///
/// The new path keeps everything before `node_id`, swaps in the sibling and then
/// follows the sibling's newest descendants down to a leaf. Returns `None` when
/// there is no sibling in that direction or `node_id` is not on `active_path`.
pub fn navigate_branch(
    tree: &MessageTree<'_>,
    active_path: &[Uuid],
    node_id: &Uuid,
    direction: Direction,
) -> Option<Vec<Uuid>> {
    let navigation = branch_navigation(tree, node_id);
    let target_index = match direction {
        Direction::Left if navigation.can_navigate_left => navigation.current_index - 1,
        Direction::Right if navigation.can_navigate_right => navigation.current_index + 1,
        _ => {
            tracing::debug!(
                message_id = %node_id,
                direction = ?direction,
                "BranchNavigator: no sibling in requested direction"
            );
            return None;
        }
    };

    let Some(position) = active_path.iter().position(|id| id == node_id) else {
        tracing::debug!(
            message_id = %node_id,
            "BranchNavigator: message is not on the active path"
        );
        return None;
    };

    let sibling = *tree.siblings(node_id)?.get(target_index)?;

    let mut path = active_path[..position].to_vec();
    path.push(sibling);
    path.extend(deepest_latest_extension(tree, &sibling));

    tracing::debug!(
        from = %node_id,
        to = %sibling,
        path_len = path.len(),
        "BranchNavigator: switched branch"
    );
    Some(path)
}
