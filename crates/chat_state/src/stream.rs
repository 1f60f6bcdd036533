//! Streaming buffers and the update feed.
//!
//! While a generation runs, partial reasoning and answer text accumulate in
//! [`StreamBuffers`]. Each generation is an episode; a [`StreamSink`] only
//! writes while its episode is the current one, so callbacks arriving after
//! the placeholder was finalized are dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chat_core::Message;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::machine::GenerationState;

/// Change notifications for a conversation, for renderers and logs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationUpdate {
    StateChanged {
        conversation_id: Uuid,
        state: GenerationState,
    },
    MessageAdded {
        conversation_id: Uuid,
        message: Message,
    },
    ThinkingDelta {
        conversation_id: Uuid,
        message_id: Uuid,
        delta: String,
    },
    AnswerDelta {
        conversation_id: Uuid,
        message_id: Uuid,
        delta: String,
    },
    MessageFinalized {
        conversation_id: Uuid,
        message: Message,
    },
    ActivePathChanged {
        conversation_id: Uuid,
        active_path: Vec<Uuid>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBuffers {
    pub episode: u64,
    pub thinking: String,
    pub answer: String,
}

impl StreamBuffers {
    /// Clear both buffers and open a new episode.
    pub fn begin_episode(&mut self) -> u64 {
        self.episode += 1;
        self.thinking.clear();
        self.answer.clear();
        self.episode
    }

    /// Take the buffered text of `episode` and close it. Returns empty
    /// buffers when `episode` is no longer current.
    pub fn end_episode(&mut self, episode: u64) -> (String, String) {
        if self.episode != episode {
            return (String::new(), String::new());
        }
        self.episode += 1;
        (
            std::mem::take(&mut self.thinking),
            std::mem::take(&mut self.answer),
        )
    }
}

pub(crate) fn lock_buffers(buffers: &Mutex<StreamBuffers>) -> MutexGuard<'_, StreamBuffers> {
    buffers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle a generator uses to report partial output. Cheap to clone; clones
/// share the episode they were created for.
#[derive(Debug, Clone)]
pub struct StreamSink {
    buffers: Arc<Mutex<StreamBuffers>>,
    episode: u64,
    conversation_id: Uuid,
    message_id: Uuid,
    updates: Option<broadcast::Sender<ConversationUpdate>>,
}

impl StreamSink {
    pub(crate) fn new(
        buffers: Arc<Mutex<StreamBuffers>>,
        episode: u64,
        conversation_id: Uuid,
        message_id: Uuid,
        updates: broadcast::Sender<ConversationUpdate>,
    ) -> Self {
        Self {
            buffers,
            episode,
            conversation_id,
            message_id,
            updates: Some(updates),
        }
    }

    /// A sink with private buffers and no subscribers, for driving a
    /// generator outside an orchestrator.
    pub fn detached() -> Self {
        let buffers = Arc::new(Mutex::new(StreamBuffers::default()));
        let episode = lock_buffers(&buffers).begin_episode();
        Self {
            buffers,
            episode,
            conversation_id: Uuid::nil(),
            message_id: Uuid::nil(),
            updates: None,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn on_thinking(&self, delta: &str) {
        if self.append(delta, |buffers| &mut buffers.thinking) {
            self.publish(ConversationUpdate::ThinkingDelta {
                conversation_id: self.conversation_id,
                message_id: self.message_id,
                delta: delta.to_string(),
            });
        }
    }

    pub fn on_answer(&self, delta: &str) {
        if self.append(delta, |buffers| &mut buffers.answer) {
            self.publish(ConversationUpdate::AnswerDelta {
                conversation_id: self.conversation_id,
                message_id: self.message_id,
                delta: delta.to_string(),
            });
        }
    }

    /// Reasoning received so far in this sink's episode.
    pub fn thinking(&self) -> String {
        let buffers = lock_buffers(&self.buffers);
        if buffers.episode == self.episode {
            buffers.thinking.clone()
        } else {
            String::new()
        }
    }

    /// Answer text received so far in this sink's episode.
    pub fn answer(&self) -> String {
        let buffers = lock_buffers(&self.buffers);
        if buffers.episode == self.episode {
            buffers.answer.clone()
        } else {
            String::new()
        }
    }

    fn append(&self, delta: &str, field: impl FnOnce(&mut StreamBuffers) -> &mut String) -> bool {
        let mut buffers = lock_buffers(&self.buffers);
        if buffers.episode != self.episode {
            tracing::debug!(
                message_id = %self.message_id,
                episode = self.episode,
                current_episode = buffers.episode,
                "StreamSink: dropping late callback"
            );
            return false;
        }
        field(&mut buffers).push_str(delta);
        tracing::trace!(
            message_id = %self.message_id,
            delta_len = delta.len(),
            "StreamSink: appended delta"
        );
        true
    }

    fn publish(&self, update: ConversationUpdate) {
        if let Some(updates) = &self.updates {
            // No receivers is fine.
            let _ = updates.send(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_appends_deltas() {
        let sink = StreamSink::detached();
        sink.on_thinking("hmm ");
        sink.on_thinking("ok");
        sink.on_answer("Hel");
        sink.on_answer("lo");

        assert_eq!(sink.thinking(), "hmm ok");
        assert_eq!(sink.answer(), "Hello");
    }

    #[test]
    fn test_late_callbacks_are_dropped() {
        let buffers = Arc::new(Mutex::new(StreamBuffers::default()));
        let (updates, mut rx) = broadcast::channel(8);
        let episode = lock_buffers(&buffers).begin_episode();
        let sink = StreamSink::new(
            buffers.clone(),
            episode,
            Uuid::new_v4(),
            Uuid::new_v4(),
            updates,
        );

        sink.on_answer("kept");
        let (_, answer) = lock_buffers(&buffers).end_episode(episode);
        assert_eq!(answer, "kept");

        sink.on_answer("late");
        assert!(lock_buffers(&buffers).answer.is_empty());
        assert!(sink.answer().is_empty());

        assert!(matches!(
            rx.try_recv(),
            Ok(ConversationUpdate::AnswerDelta { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_end_of_stale_episode_is_empty() {
        let mut buffers = StreamBuffers::default();
        let first = buffers.begin_episode();
        let _second = buffers.begin_episode();
        buffers.answer.push_str("current");

        assert_eq!(buffers.end_episode(first), (String::new(), String::new()));
        assert_eq!(buffers.answer, "current");
    }
}
