//! State machine module
//!
//! Contains the FSM tracking whether a conversation is generating.

mod events;
mod states;
mod transitions;

pub use events::{ChatEvent, GenerationTrigger};
pub use states::GenerationState;
pub use transitions::{StateMachine, StateTransition};
