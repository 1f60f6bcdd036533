//! The text generation collaborator.

use async_trait::async_trait;
use chat_core::{GenerationConfig, HistoryMessage};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::stream::StreamSink;

/// Final output of a successful generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    pub content: String,
    pub reasoning: Option<String>,
}

impl GenerationResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Provider(String),

    #[error("timed out after {0}s")]
    TimedOut(u64),
}

impl GenerationError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Produces an assistant reply for a linear history.
///
/// Implementations stream partial output through `sink` and should return
/// [`GenerationError::Cancelled`] promptly once `cancel_token` fires.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        history: &[HistoryMessage],
        config: &GenerationConfig,
        cancel_token: CancellationToken,
        sink: &StreamSink,
    ) -> Result<GenerationResult, GenerationError>;
}
