//! `conversation_tree` keeps every message of a branching conversation in one
//! flat table and derives the tree, the displayed path and branch positions from it.

pub mod error;
pub mod structs;

// Re-export the public API
pub use error::TreeError;
pub use structs::active_path::{
    deepest_latest_extension, resolve_active_path, truncate_to_valid_prefix,
};
pub use structs::conversation::Conversation;
pub use structs::navigation::{branch_navigation, navigate_branch, BranchNavigation, Direction};
pub use structs::store::MessageStore;
pub use structs::tree::{build_tree, MessageTree, TreeNode};
