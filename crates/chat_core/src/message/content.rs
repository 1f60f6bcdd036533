//! Message - a single record in a conversation's flat message table
//!
//! Messages point at their parent by id only. Tree views are derived elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;

/// Content held by an assistant placeholder while its generation is in flight.
pub const GENERATING_PLACEHOLDER: &str = "generating…";

/// Content committed when a generation is cancelled before anything streamed.
pub const INTERRUPTED_PLACEHOLDER: &str = "generation interrupted";

/// Content committed when a generation fails.
pub fn failure_content(reason: impl AsRef<str>) -> String {
    format!("generation failed: {}", reason.as_ref())
}

/// Lifecycle of a message's content.
///
/// Only `Pending` messages may be overwritten, and only once.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Placeholder awaiting the result of a generation.
    Pending,
    #[default]
    Complete,
    /// Generation was cancelled; content holds whatever had streamed.
    Interrupted,
    /// Generation failed; content explains the failure.
    Failed,
}

impl MessageStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// One message in the flat store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,

    /// Model "thinking" trace, only meaningful for assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Creation time. Only used to order siblings.
    pub timestamp: DateTime<Utc>,

    /// `None` for conversation roots.
    pub parent_id: Option<Uuid>,

    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    fn new(role: Role, content: String, parent_id: Option<Uuid>, status: MessageStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            reasoning: None,
            timestamp: Utc::now(),
            parent_id,
            status,
        }
    }

    pub fn user(content: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self::new(Role::User, content.into(), parent_id, MessageStatus::Complete)
    }

    pub fn system(content: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self::new(Role::System, content.into(), parent_id, MessageStatus::Complete)
    }

    pub fn assistant(content: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self::new(
            Role::Assistant,
            content.into(),
            parent_id,
            MessageStatus::Complete,
        )
    }

    /// Create an assistant placeholder holding [`GENERATING_PLACEHOLDER`].
    pub fn placeholder(parent_id: Option<Uuid>) -> Self {
        Self::new(
            Role::Assistant,
            GENERATING_PLACEHOLDER.to_string(),
            parent_id,
            MessageStatus::Pending,
        )
    }

    /// Override the creation time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_placeholder(&self) -> bool {
        self.status.is_pending()
    }
}

/// A `{role, content}` pair sent to the generator as conversation history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl HistoryMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for HistoryMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}
