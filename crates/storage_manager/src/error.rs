//! Storage error types

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot for {requested} contains conversation {found}")]
    IdMismatch { requested: Uuid, found: Uuid },
}

pub type Result<T> = std::result::Result<T, StorageError>;
