//! Conversation orchestration.
//!
//! [`ConversationOrchestrator`] owns one conversation and turns user intents
//! (send, edit, regenerate, abort, navigate) into tree mutations and generator
//! calls. At most one generation runs at a time.
//!
//! Locks are never held across an await: every public operation mutates the
//! conversation inside a short critical section, then awaits the generator or
//! storage with the lock released.

mod error;
mod generation;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chat_core::{Config, Message, MessageStatus, INTERRUPTED_PLACEHOLDER};
use conversation_tree::{BranchNavigation, Conversation, Direction};
use storage_manager::{ConversationStorage, StorageError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::generator::Generator;
use crate::machine::{GenerationState, StateMachine, StateTransition};
use crate::stream::{lock_buffers, ConversationUpdate, StreamBuffers};

pub use error::{OrchestratorError, Result};
pub use generation::GenerationOutcome;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// A message on the active path together with its sibling position.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEntry {
    pub message: Message,
    pub navigation: BranchNavigation,
}

struct OrchestratorState {
    conversation: Conversation,
    machine: StateMachine,
    cancel_token: Option<CancellationToken>,
}

pub struct ConversationOrchestrator {
    conversation_id: Uuid,
    inner: Mutex<OrchestratorState>,
    buffers: Arc<Mutex<StreamBuffers>>,
    generator: Arc<dyn Generator>,
    storage: Option<Arc<dyn ConversationStorage>>,
    config: Config,
    updates: broadcast::Sender<ConversationUpdate>,
}

impl ConversationOrchestrator {
    /// Wrap `conversation`. Placeholders left pending by an earlier session
    /// are committed as interrupted, since nothing will ever finish them.
    pub fn new(mut conversation: Conversation, generator: Arc<dyn Generator>) -> Self {
        for id in conversation.pending_ids() {
            tracing::warn!(
                conversation_id = %conversation.id,
                message_id = %id,
                "ConversationOrchestrator: interrupting placeholder left by a previous session"
            );
            if let Err(error) = conversation.finalize_message(
                &id,
                INTERRUPTED_PLACEHOLDER.to_string(),
                None,
                MessageStatus::Interrupted,
            ) {
                tracing::error!(
                    message_id = %id,
                    error = %error,
                    "ConversationOrchestrator: failed to recover placeholder"
                );
            }
        }

        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            conversation_id: conversation.id,
            inner: Mutex::new(OrchestratorState {
                conversation,
                machine: StateMachine::new(),
                cancel_token: None,
            }),
            buffers: Arc::new(Mutex::new(StreamBuffers::default())),
            generator,
            storage: None,
            config: Config::default(),
            updates,
        }
    }

    /// Load `conversation_id` from `storage`, or start it empty when it has
    /// never been saved. The orchestrator keeps saving to the same storage.
    pub async fn open(
        conversation_id: Uuid,
        generator: Arc<dyn Generator>,
        storage: Arc<dyn ConversationStorage>,
    ) -> std::result::Result<Self, StorageError> {
        let conversation = match storage.load(conversation_id).await? {
            Some(conversation) => conversation,
            None => {
                tracing::info!(
                    conversation_id = %conversation_id,
                    "ConversationOrchestrator: starting new conversation"
                );
                Conversation::new(conversation_id)
            }
        };
        Ok(Self::new(conversation, generator).with_storage(storage))
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ConversationStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationUpdate> {
        self.updates.subscribe()
    }

    pub fn state(&self) -> GenerationState {
        self.lock_state().machine.state().clone()
    }

    /// True from placeholder creation until it is finalized.
    pub fn is_loading(&self) -> bool {
        self.lock_state().machine.state().is_loading()
    }

    pub fn state_history(&self) -> Vec<StateTransition> {
        self.lock_state().machine.history().to_vec()
    }

    /// Reasoning streamed so far for the in-flight generation.
    pub fn current_thinking(&self) -> String {
        lock_buffers(&self.buffers).thinking.clone()
    }

    /// Answer text streamed so far for the in-flight generation.
    pub fn current_answer(&self) -> String {
        lock_buffers(&self.buffers).answer.clone()
    }

    /// A copy of the conversation as it is right now.
    pub fn snapshot(&self) -> Conversation {
        self.lock_state().conversation.clone()
    }

    /// Run `f` against the conversation without copying it.
    pub fn read<R>(&self, f: impl FnOnce(&Conversation) -> R) -> R {
        f(&self.lock_state().conversation)
    }

    pub fn get_message(&self, id: &Uuid) -> Option<Message> {
        self.lock_state().conversation.get(id).cloned()
    }

    pub fn active_path(&self) -> Vec<Uuid> {
        self.lock_state().conversation.active_path().to_vec()
    }

    /// What a renderer shows: the resolved active path with a branch
    /// indicator for each message.
    pub fn active_entries(&self) -> Vec<ActiveEntry> {
        let state = self.lock_state();
        let conversation = &state.conversation;
        conversation
            .active_messages()
            .into_iter()
            .map(|message| ActiveEntry {
                navigation: conversation.branch_navigation(&message.id),
                message: message.clone(),
            })
            .collect()
    }

    pub fn branch_navigation(&self, id: &Uuid) -> BranchNavigation {
        self.lock_state().conversation.branch_navigation(id)
    }

    /// Show the neighbouring sibling of `id`. Returns `false` when there is
    /// nothing to switch to.
    pub async fn navigate_branch(&self, id: &Uuid, direction: Direction) -> bool {
        let navigated = {
            let mut state = self.lock_state();
            let navigated = state.conversation.navigate_branch(id, direction);
            if navigated {
                self.publish_active_path(&state.conversation);
            }
            navigated
        };
        if navigated {
            self.auto_save().await;
        }
        navigated
    }

    /// Show `id` with its ancestors and newest descendants.
    pub async fn select_message(&self, id: &Uuid) -> bool {
        let selected = {
            let mut state = self.lock_state();
            let selected = state.conversation.select_message(id);
            if selected {
                self.publish_active_path(&state.conversation);
            }
            selected
        };
        if selected {
            self.auto_save().await;
        }
        selected
    }

    /// Delete `id` and everything below it. Refused while the in-flight
    /// placeholder lives in that subtree. Returns how many messages went.
    pub async fn remove_branch(&self, id: &Uuid) -> Result<usize> {
        let removed = {
            let mut state = self.lock_state();
            if !state.conversation.store().contains(id) {
                return Err(OrchestratorError::UnknownMessage(*id));
            }
            if let Some(pending) = state.machine.state().message_id() {
                if state.conversation.is_within(&pending, id) {
                    tracing::warn!(
                        conversation_id = %self.conversation_id,
                        message_id = %id,
                        "ConversationOrchestrator: refusing to remove branch with generation in flight"
                    );
                    return Err(OrchestratorError::InFlight(*id));
                }
            }
            let removed = state.conversation.remove_branch(id)?;
            self.publish_active_path(&state.conversation);
            removed.len()
        };
        self.auto_save().await;
        Ok(removed)
    }

    /// Persist the conversation now. A no-op without storage.
    pub async fn save(&self) -> std::result::Result<(), StorageError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let snapshot = self.snapshot();
        storage.save(self.conversation_id, &snapshot).await?;

        let mut state = self.lock_state();
        // Only clear when nothing changed while the write was in progress.
        if state.conversation.updated_at == snapshot.updated_at {
            state.conversation.clear_dirty();
        }
        Ok(())
    }

    async fn auto_save(&self) {
        if !self.config.auto_save || self.storage.is_none() {
            return;
        }
        let dirty = self.lock_state().conversation.is_dirty();
        if !dirty {
            return;
        }
        if let Err(error) = self.save().await {
            tracing::warn!(
                conversation_id = %self.conversation_id,
                error = %error,
                "ConversationOrchestrator: auto-save failed"
            );
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, update: ConversationUpdate) {
        let _ = self.updates.send(update);
    }

    fn publish_active_path(&self, conversation: &Conversation) {
        self.publish(ConversationUpdate::ActivePathChanged {
            conversation_id: self.conversation_id,
            active_path: conversation.active_path().to_vec(),
        });
    }

    fn publish_state(&self, state: &GenerationState) {
        self.publish(ConversationUpdate::StateChanged {
            conversation_id: self.conversation_id,
            state: state.clone(),
        });
    }
}

