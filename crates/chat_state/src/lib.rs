//! chat_state - Generation lifecycle for branching conversations
//!
//! This crate drives a conversation tree: it accepts user intents, calls a
//! [`Generator`] for assistant replies, streams partial output into buffers and
//! tracks the generation state machine.

pub mod generator;
pub mod machine;
pub mod orchestrator;
pub mod stream;

// Re-export commonly used types
pub use generator::{GenerationError, GenerationResult, Generator};
pub use machine::{ChatEvent, GenerationState, GenerationTrigger, StateMachine, StateTransition};
pub use orchestrator::{
    ActiveEntry, ConversationOrchestrator, GenerationOutcome, OrchestratorError, Result,
};
pub use stream::{ConversationUpdate, StreamBuffers, StreamSink};
