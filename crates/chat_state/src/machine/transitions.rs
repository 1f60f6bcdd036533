//! State transitions - FSM transition logic
//!
//! Implements the state machine that handles event-driven state transitions.

use super::events::ChatEvent;
use super::states::GenerationState;

/// Represents a state transition result.
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// The state before the transition.
    pub from: GenerationState,
    /// The state after the transition.
    pub to: GenerationState,
    /// The event that triggered the transition.
    pub event: ChatEvent,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine for one conversation's generation lifecycle.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current_state: GenerationState,
    history: Vec<StateTransition>,
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self {
            current_state: GenerationState::Idle,
            history: Vec::new(),
            max_history: 50,
        }
    }

    pub fn state(&self) -> &GenerationState {
        &self.current_state
    }

    /// Get the transition history, oldest first.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Handle an event and transition to a new state.
    pub fn handle_event(&mut self, event: ChatEvent) -> StateTransition {
        let old_state = self.current_state.clone();
        let new_state = Self::compute_next_state(&old_state, &event);
        let changed = old_state != new_state;

        self.current_state = new_state.clone();

        let transition = StateTransition {
            from: old_state,
            to: new_state,
            event,
            changed,
        };

        self.history.push(transition.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        transition
    }

    fn compute_next_state(state: &GenerationState, event: &ChatEvent) -> GenerationState {
        use ChatEvent::*;
        use GenerationState::*;

        match (state, event) {
            (
                Idle,
                GenerationStarted {
                    message_id,
                    trigger,
                },
            ) => Generating {
                message_id: *message_id,
                trigger: *trigger,
            },

            (Generating { message_id, .. }, CancelRequested) => Cancelling {
                message_id: *message_id,
            },

            (
                Generating { .. } | Cancelling { .. },
                GenerationCompleted | GenerationCancelled | GenerationFailed { .. },
            ) => Idle,

            // Anything else leaves the state alone (a second start while busy,
            // a cancel while idle, a duplicate cancel).
            _ => state.clone(),
        }
    }

    /// Check if a transition is valid without executing it.
    pub fn can_transition(&self, event: &ChatEvent) -> bool {
        Self::compute_next_state(&self.current_state, event) != self.current_state
    }
}
