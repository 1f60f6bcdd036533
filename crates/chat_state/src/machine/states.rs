//! Generation states

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::GenerationTrigger;

/// Whether a conversation has a generation in flight.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GenerationState {
    /// Ready for a new send, edit or regenerate.
    #[default]
    Idle,

    /// The generator is producing content for the placeholder `message_id`.
    Generating {
        message_id: Uuid,
        trigger: GenerationTrigger,
    },

    /// Cancellation was requested; waiting for the generator to wind down.
    Cancelling { message_id: Uuid },
}

impl GenerationState {
    /// True while a placeholder is awaiting its final content.
    pub fn is_loading(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// The placeholder being generated, if any.
    pub fn message_id(&self) -> Option<Uuid> {
        match self {
            Self::Idle => None,
            Self::Generating { message_id, .. } | Self::Cancelling { message_id } => {
                Some(*message_id)
            }
        }
    }

    /// Get a human-readable description of the current state.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Ready for input",
            Self::Generating { .. } => "Receiving AI response",
            Self::Cancelling { .. } => "Stopping",
        }
    }
}
