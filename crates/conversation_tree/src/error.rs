use thiserror::Error;
use uuid::Uuid;

/// Errors raised while mutating or loading a message store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("message not found: {0}")]
    UnknownMessage(Uuid),

    #[error("duplicate message id: {0}")]
    DuplicateId(Uuid),

    #[error("message {id} references missing parent {parent_id}")]
    DanglingParent { id: Uuid, parent_id: Uuid },

    #[error("parent chain of message {0} forms a cycle")]
    Cycle(Uuid),

    #[error("message {0} has already been finalized")]
    AlreadyFinalized(Uuid),

    #[error("message {0} cannot be finalized as pending")]
    PendingFinalStatus(Uuid),
}

pub type Result<T> = std::result::Result<T, TreeError>;
