//! Chat events - Defines events that trigger state transitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user intent that started a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTrigger {
    Send,
    Edit,
    Regenerate,
}

/// Defines the events that can trigger state transitions in the FSM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEvent {
    /// A placeholder was created and the generator is about to be called.
    GenerationStarted {
        message_id: Uuid,
        trigger: GenerationTrigger,
    },

    /// The user asked to abort the in-flight generation.
    CancelRequested,

    /// The placeholder was finalized with the generator's result.
    GenerationCompleted,

    /// The placeholder was finalized with partial content after cancellation.
    GenerationCancelled,

    /// The placeholder was finalized with an error explanation.
    GenerationFailed { error: String },
}
