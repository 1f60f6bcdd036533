use chat_core::Role;
use conversation_tree::TreeError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("a generation is already in progress")]
    Busy,

    #[error("message content cannot be empty")]
    EmptyContent,

    #[error("message not found: {0}")]
    UnknownMessage(Uuid),

    #[error("only user messages can be edited, {id} is a {role} message")]
    NotEditable { id: Uuid, role: Role },

    #[error("{role} message {id} cannot be regenerated")]
    NotRegenerable { id: Uuid, role: Role },

    #[error("message {0} belongs to the generation in progress")]
    InFlight(Uuid),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
