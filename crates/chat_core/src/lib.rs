//! chat_core - Core types for the branching chat engine
//!
//! This crate provides the foundational types used across all chat-related crates:
//! - `message` - Message records, roles, placeholder sentinels
//! - `config` - Layered configuration (files + environment)
//! - `paths` - Well-known data locations

pub mod config;
pub mod message;
pub mod paths;

// Re-export commonly used types
pub use config::{Config, GenerationConfig};
pub use message::{
    failure_content, HistoryMessage, Message, MessageStatus, Role, GENERATING_PLACEHOLDER,
    INTERRUPTED_PLACEHOLDER,
};
