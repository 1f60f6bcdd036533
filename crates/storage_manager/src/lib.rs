//! # Storage Manager
//!
//! Loads and saves whole conversation snapshots. Only id-stable round-tripping
//! is promised; callers never depend on the on-disk layout.

pub mod error;
pub mod file_storage;
pub mod memory;
pub mod storage;

// Re-exports
pub use error::{Result, StorageError};
pub use file_storage::FileConversationStorage;
pub use memory::MemoryConversationStorage;
pub use storage::ConversationStorage;
