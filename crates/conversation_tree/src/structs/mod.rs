pub mod active_path;
pub mod conversation;
pub mod navigation;
pub mod store;
pub mod tree;
