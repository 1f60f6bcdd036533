//! Message module - message records shared across the workspace

mod content;
mod role;

pub use content::{
    failure_content, HistoryMessage, Message, MessageStatus, GENERATING_PLACEHOLDER,
    INTERRUPTED_PLACEHOLDER,
};
pub use role::Role;
