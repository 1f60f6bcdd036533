//! Send, edit, regenerate and abort.
//!
//! All three generating intents share one routine: add a pending placeholder
//! under an anchor message, stream the generator into the buffers, then
//! finalize the placeholder exactly once whatever the outcome.

use std::time::Duration;

use chat_core::{
    failure_content, HistoryMessage, Message, MessageStatus, Role, INTERRUPTED_PLACEHOLDER,
};
use conversation_tree::Conversation;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ConversationOrchestrator, OrchestratorError, OrchestratorState, Result};
use crate::generator::{GenerationError, GenerationResult};
use crate::machine::{ChatEvent, GenerationTrigger};
use crate::stream::{lock_buffers, ConversationUpdate, StreamSink};

/// What a send, edit or regenerate produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// The user message created by a send or edit.
    pub user_message_id: Option<Uuid>,
    /// The assistant message that held the placeholder.
    pub message_id: Uuid,
    pub status: MessageStatus,
}

struct PreparedGeneration {
    placeholder_id: Uuid,
    history: Vec<HistoryMessage>,
    cancel_token: CancellationToken,
    episode: u64,
}

/// Finalizes the placeholder if the generation future is dropped before the
/// generator returned, so a placeholder is never left pending.
struct InFlight<'a> {
    orchestrator: &'a ConversationOrchestrator,
    prepared: PreparedGeneration,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(&mut self, result: std::result::Result<GenerationResult, GenerationError>) -> MessageStatus {
        self.finished = true;
        self.orchestrator.finalize_generation(&self.prepared, result)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                message_id = %self.prepared.placeholder_id,
                "ConversationOrchestrator: generation dropped before completion"
            );
            self.prepared.cancel_token.cancel();
            self.orchestrator
                .finalize_generation(&self.prepared, Err(GenerationError::Cancelled));
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl ConversationOrchestrator {
    /// Add a user message under `parent_id` (or the current leaf) and generate
    /// a reply to it.
    pub async fn send_message(
        &self,
        content: impl Into<String>,
        parent_id: Option<Uuid>,
    ) -> Result<GenerationOutcome> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(OrchestratorError::EmptyContent);
        }

        let (user_id, prepared) = {
            let mut state = self.lock_state();
            self.ensure_idle(&state)?;

            let mut path = match parent_id {
                Some(parent_id) => state
                    .conversation
                    .path_through(&parent_id)
                    .map_err(|_| OrchestratorError::UnknownMessage(parent_id))?,
                None => state.conversation.active_path().to_vec(),
            };
            let parent = path.last().copied();

            let user_id =
                self.add_message(&mut state.conversation, Message::user(content, parent))?;
            path.push(user_id);
            let prepared =
                self.start_generation(&mut state, user_id, path, GenerationTrigger::Send)?;
            (user_id, prepared)
        };

        Ok(self.run_generation(prepared, Some(user_id)).await)
    }

    /// Create an edited copy of user message `id` as its sibling and generate
    /// a reply on the new branch. The original branch is kept.
    pub async fn edit_user_message(
        &self,
        id: &Uuid,
        new_content: impl Into<String>,
    ) -> Result<GenerationOutcome> {
        let new_content = new_content.into();
        if new_content.trim().is_empty() {
            return Err(OrchestratorError::EmptyContent);
        }

        let (sibling_id, prepared) = {
            let mut state = self.lock_state();
            self.ensure_idle(&state)?;

            let target = state
                .conversation
                .get(id)
                .cloned()
                .ok_or(OrchestratorError::UnknownMessage(*id))?;
            if target.role != Role::User {
                return Err(OrchestratorError::NotEditable {
                    id: *id,
                    role: target.role,
                });
            }

            let mut path = state.conversation.path_before(id);
            let sibling_id = self.add_message(
                &mut state.conversation,
                Message::user(new_content, target.parent_id),
            )?;
            path.push(sibling_id);
            let prepared =
                self.start_generation(&mut state, sibling_id, path, GenerationTrigger::Edit)?;
            (sibling_id, prepared)
        };

        Ok(self.run_generation(prepared, Some(sibling_id)).await)
    }

    /// Generate an alternative reply. For an assistant message the new reply
    /// becomes its sibling; for a user message it becomes a new child.
    pub async fn regenerate_message(&self, id: &Uuid) -> Result<GenerationOutcome> {
        let prepared = {
            let mut state = self.lock_state();
            self.ensure_idle(&state)?;

            let target = state
                .conversation
                .get(id)
                .cloned()
                .ok_or(OrchestratorError::UnknownMessage(*id))?;
            let (anchor_id, path) = match (target.role, target.parent_id) {
                (Role::Assistant, Some(parent_id)) => (parent_id, state.conversation.path_before(id)),
                (Role::User, _) => (*id, state.conversation.path_through(id)?),
                (role, _) => {
                    return Err(OrchestratorError::NotRegenerable { id: *id, role });
                }
            };

            self.start_generation(&mut state, anchor_id, path, GenerationTrigger::Regenerate)?
        };

        Ok(self.run_generation(prepared, None).await)
    }

    /// Ask the in-flight generation to stop. Returns `false` when there is
    /// nothing to abort or an abort is already pending.
    pub fn abort_request(&self) -> bool {
        let mut state = self.lock_state();
        let Some(token) = state.cancel_token.clone() else {
            return false;
        };
        if token.is_cancelled() {
            return false;
        }

        token.cancel();
        let transition = state.machine.handle_event(ChatEvent::CancelRequested);
        tracing::info!(
            conversation_id = %self.conversation_id,
            to = ?transition.to,
            "ConversationOrchestrator: abort requested"
        );
        self.publish_state(&transition.to);
        true
    }

    fn ensure_idle(&self, state: &OrchestratorState) -> Result<()> {
        if state.machine.state().is_loading() {
            tracing::warn!(
                conversation_id = %self.conversation_id,
                "ConversationOrchestrator: rejected request while generating"
            );
            return Err(OrchestratorError::Busy);
        }
        Ok(())
    }

    fn add_message(&self, conversation: &mut Conversation, message: Message) -> Result<Uuid> {
        let added = message.clone();
        let id = conversation.add_message(message)?;
        self.publish(ConversationUpdate::MessageAdded {
            conversation_id: self.conversation_id,
            message: added,
        });
        Ok(id)
    }

    /// Insert the placeholder under `anchor_id`, show `path` plus the
    /// placeholder, and move the state machine to generating.
    fn start_generation(
        &self,
        state: &mut OrchestratorState,
        anchor_id: Uuid,
        mut path: Vec<Uuid>,
        trigger: GenerationTrigger,
    ) -> Result<PreparedGeneration> {
        let placeholder_id =
            self.add_message(&mut state.conversation, Message::placeholder(Some(anchor_id)))?;
        path.push(placeholder_id);
        state.conversation.set_active_path(path);
        self.publish_active_path(&state.conversation);

        let history = self.history_for(&state.conversation, &anchor_id);
        let cancel_token = CancellationToken::new();
        state.cancel_token = Some(cancel_token.clone());

        let transition = state.machine.handle_event(ChatEvent::GenerationStarted {
            message_id: placeholder_id,
            trigger,
        });
        self.publish_state(&transition.to);

        let episode = lock_buffers(&self.buffers).begin_episode();

        tracing::info!(
            conversation_id = %self.conversation_id,
            message_id = %placeholder_id,
            trigger = ?trigger,
            history_len = history.len(),
            "ConversationOrchestrator: generation started"
        );

        Ok(PreparedGeneration {
            placeholder_id,
            history,
            cancel_token,
            episode,
        })
    }

    fn history_for(&self, conversation: &Conversation, anchor_id: &Uuid) -> Vec<HistoryMessage> {
        let mut history = conversation.history_for(anchor_id);
        if let Some(prompt) = &self.config.generation.system_prompt {
            let starts_with_system = history
                .first()
                .is_some_and(|message| message.role == Role::System);
            if !prompt.trim().is_empty() && !starts_with_system {
                history.insert(0, HistoryMessage::new(Role::System, prompt.clone()));
            }
        }
        history
    }

    async fn run_generation(
        &self,
        prepared: PreparedGeneration,
        user_message_id: Option<Uuid>,
    ) -> GenerationOutcome {
        let message_id = prepared.placeholder_id;
        let mut in_flight = InFlight {
            orchestrator: self,
            prepared,
            finished: false,
        };

        let sink = StreamSink::new(
            self.buffers.clone(),
            in_flight.prepared.episode,
            self.conversation_id,
            message_id,
            self.updates.clone(),
        );
        let generation = self.generator.generate(
            &in_flight.prepared.history,
            &self.config.generation,
            in_flight.prepared.cancel_token.clone(),
            &sink,
        );

        let result = match self.config.generation_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), generation).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::TimedOut(secs)),
            },
            None => generation.await,
        };

        let status = in_flight.finish(result);
        drop(in_flight);
        self.auto_save().await;

        GenerationOutcome {
            user_message_id,
            message_id,
            status,
        }
    }

    /// Commit the placeholder's final content and return to idle.
    fn finalize_generation(
        &self,
        prepared: &PreparedGeneration,
        result: std::result::Result<GenerationResult, GenerationError>,
    ) -> MessageStatus {
        let (thinking, answer) = lock_buffers(&self.buffers).end_episode(prepared.episode);
        // Read before the timeout arm cancels the token itself.
        let aborted = prepared.cancel_token.is_cancelled();

        // A generator that finished despite a late abort still counts as done.
        let (content, reasoning, status, event) = match result {
            Ok(result) => (
                result.content,
                result.reasoning.or_else(|| non_empty(thinking)),
                MessageStatus::Complete,
                ChatEvent::GenerationCompleted,
            ),
            Err(error @ GenerationError::TimedOut(_)) if !aborted => {
                prepared.cancel_token.cancel();
                let failure = failure_content(error.to_string());
                let content = if answer.is_empty() {
                    failure
                } else {
                    format!("{}\n\n{}", answer, failure)
                };
                (
                    content,
                    non_empty(thinking),
                    MessageStatus::Failed,
                    ChatEvent::GenerationFailed {
                        error: error.to_string(),
                    },
                )
            }
            Err(error) if aborted || error.is_cancelled() => {
                let content = if answer.is_empty() {
                    INTERRUPTED_PLACEHOLDER.to_string()
                } else {
                    answer
                };
                (
                    content,
                    non_empty(thinking),
                    MessageStatus::Interrupted,
                    ChatEvent::GenerationCancelled,
                )
            }
            Err(error) => (
                failure_content(error.to_string()),
                non_empty(thinking),
                MessageStatus::Failed,
                ChatEvent::GenerationFailed {
                    error: error.to_string(),
                },
            ),
        };

        let mut state = self.lock_state();
        match state
            .conversation
            .finalize_message(&prepared.placeholder_id, content, reasoning, status)
        {
            Ok(message) => {
                let message = message.clone();
                self.publish(ConversationUpdate::MessageFinalized {
                    conversation_id: self.conversation_id,
                    message,
                });
            }
            Err(error) => {
                tracing::error!(
                    conversation_id = %self.conversation_id,
                    message_id = %prepared.placeholder_id,
                    error = %error,
                    "ConversationOrchestrator: failed to finalize placeholder"
                );
            }
        }

        let transition = state.machine.handle_event(event);
        state.cancel_token = None;
        self.publish_state(&transition.to);

        tracing::info!(
            conversation_id = %self.conversation_id,
            message_id = %prepared.placeholder_id,
            status = ?status,
            "ConversationOrchestrator: generation finished"
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chat_core::{Config, GenerationConfig};
    use conversation_tree::Conversation;

    use super::*;
    use crate::generator::MockGenerator;
    use crate::machine::GenerationState;

    fn orchestrator_with(mock: MockGenerator) -> ConversationOrchestrator {
        ConversationOrchestrator::new(Conversation::default(), Arc::new(mock))
    }

    #[tokio::test]
    async fn test_failure_is_written_into_message() {
        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _, _, _| Err(GenerationError::provider("boom")));
        let orchestrator = orchestrator_with(mock);

        let outcome = orchestrator.send_message("hello", None).await.unwrap();

        assert_eq!(outcome.status, MessageStatus::Failed);
        let message = orchestrator.get_message(&outcome.message_id).unwrap();
        assert_eq!(message.content, "generation failed: boom");
        assert_eq!(orchestrator.state(), GenerationState::Idle);
        assert!(!orchestrator.is_loading());
    }

    #[tokio::test]
    async fn test_history_starts_with_system_prompt() {
        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .withf(|history, _, _, _| {
                history.len() == 2
                    && history[0] == HistoryMessage::new(Role::System, "be brief")
                    && history[1] == HistoryMessage::new(Role::User, "hello")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(GenerationResult::new("hi")));
        let config = Config {
            generation: GenerationConfig {
                system_prompt: Some("be brief".to_string()),
                ..GenerationConfig::default()
            },
            ..Config::default()
        };
        let orchestrator = orchestrator_with(mock).with_config(config);

        let outcome = orchestrator.send_message("hello", None).await.unwrap();
        assert_eq!(outcome.status, MessageStatus::Complete);
    }

    #[tokio::test]
    async fn test_streamed_thinking_becomes_reasoning() {
        let mut mock = MockGenerator::new();
        mock.expect_generate().returning(|_, _, _, sink| {
            sink.on_thinking("pondering");
            sink.on_answer("do");
            sink.on_answer("ne");
            Ok(GenerationResult::new("done"))
        });
        let orchestrator = orchestrator_with(mock);

        let outcome = orchestrator.send_message("hello", None).await.unwrap();

        let message = orchestrator.get_message(&outcome.message_id).unwrap();
        assert_eq!(message.content, "done");
        assert_eq!(message.reasoning.as_deref(), Some("pondering"));
        assert!(orchestrator.current_answer().is_empty());
        assert!(orchestrator.current_thinking().is_empty());
    }

    #[tokio::test]
    async fn test_edit_assistant_message_is_rejected() {
        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _, _, _| Ok(GenerationResult::new("hi")));
        let orchestrator = orchestrator_with(mock);
        let outcome = orchestrator.send_message("hello", None).await.unwrap();

        let result = orchestrator
            .edit_user_message(&outcome.message_id, "rewritten")
            .await;

        assert_eq!(
            result,
            Err(OrchestratorError::NotEditable {
                id: outcome.message_id,
                role: Role::Assistant,
            })
        );
        assert_eq!(orchestrator.read(|c| c.len()), 2);
    }

    #[tokio::test]
    async fn test_empty_and_unknown_inputs_are_rejected() {
        let mut mock = MockGenerator::new();
        mock.expect_generate().never();
        let orchestrator = orchestrator_with(mock);
        let unknown = Uuid::new_v4();

        assert_eq!(
            orchestrator.send_message("   ", None).await,
            Err(OrchestratorError::EmptyContent)
        );
        assert_eq!(
            orchestrator.send_message("hi", Some(unknown)).await,
            Err(OrchestratorError::UnknownMessage(unknown))
        );
        assert_eq!(
            orchestrator.regenerate_message(&unknown).await,
            Err(OrchestratorError::UnknownMessage(unknown))
        );
        assert!(orchestrator.read(|c| c.is_empty()));
    }

    #[tokio::test]
    async fn test_regenerate_system_message_is_rejected() {
        let mut mock = MockGenerator::new();
        mock.expect_generate().never();
        let mut conversation = Conversation::default();
        let system = conversation
            .push_message(Message::system("rules", None))
            .unwrap();
        let orchestrator = ConversationOrchestrator::new(conversation, Arc::new(mock));

        let result = orchestrator.regenerate_message(&system).await;
        assert_eq!(
            result,
            Err(OrchestratorError::NotRegenerable {
                id: system,
                role: Role::System,
            })
        );
    }

    #[tokio::test]
    async fn test_regenerate_user_message_adds_child() {
        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .times(2)
            .returning(|_, _, _, _| Ok(GenerationResult::new("reply")));
        let orchestrator = orchestrator_with(mock);
        let first = orchestrator.send_message("hello", None).await.unwrap();
        let user = first.user_message_id.unwrap();

        let second = orchestrator.regenerate_message(&user).await.unwrap();

        assert_eq!(second.user_message_id, None);
        assert_eq!(orchestrator.active_path(), vec![user, second.message_id]);
        let navigation = orchestrator.branch_navigation(&second.message_id);
        assert_eq!(navigation.total_branches, 2);
        assert_eq!(navigation.current_index, 1);
    }

    #[test]
    fn test_pending_placeholders_are_recovered_on_load() {
        let mut conversation = Conversation::default();
        let user = conversation.push_message(Message::user("hi", None)).unwrap();
        let placeholder = conversation
            .push_message(Message::placeholder(Some(user)))
            .unwrap();

        let orchestrator =
            ConversationOrchestrator::new(conversation, Arc::new(MockGenerator::new()));

        let message = orchestrator.get_message(&placeholder).unwrap();
        assert_eq!(message.status, MessageStatus::Interrupted);
        assert_eq!(message.content, INTERRUPTED_PLACEHOLDER);
        assert!(!orchestrator.is_loading());
    }

    #[test]
    fn test_abort_while_idle_is_noop() {
        let orchestrator = orchestrator_with(MockGenerator::new());
        assert!(!orchestrator.abort_request());
        assert!(orchestrator.state_history().is_empty());
    }
}
