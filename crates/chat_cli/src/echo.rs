//! Offline generator that streams the last user message back word by word.

use std::time::Duration;

use async_trait::async_trait;
use chat_core::{GenerationConfig, HistoryMessage, Role};
use chat_state::{GenerationError, GenerationResult, Generator, StreamSink};
use tokio_util::sync::CancellationToken;

pub struct EchoGenerator {
    delay: Duration,
}

impl EchoGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(
        &self,
        history: &[HistoryMessage],
        config: &GenerationConfig,
        cancel_token: CancellationToken,
        sink: &StreamSink,
    ) -> Result<GenerationResult, GenerationError> {
        let prompt = history
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .ok_or_else(|| GenerationError::provider("no user message to answer"))?;

        let thinking = format!(
            "{} message(s) of history, the last one has {} word(s).",
            history.len(),
            prompt.split_whitespace().count()
        );
        sink.on_thinking(&thinking);

        let model = config.model.as_deref().unwrap_or("echo");
        let reply = format!("[{}] You said: {}", model, prompt);
        let mut content = String::new();
        for word in reply.split_inclusive(' ') {
            tokio::select! {
                _ = cancel_token.cancelled() => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
            sink.on_answer(word);
            content.push_str(word);
        }

        Ok(GenerationResult::new(content).with_reasoning(thinking))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_last_user_message() {
        let generator = EchoGenerator::new(Duration::ZERO);
        let history = vec![
            HistoryMessage::new(Role::User, "first"),
            HistoryMessage::new(Role::Assistant, "reply"),
            HistoryMessage::new(Role::User, "hello world"),
        ];
        let sink = StreamSink::detached();

        let result = generator
            .generate(
                &history,
                &GenerationConfig::default(),
                CancellationToken::new(),
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(result.content, "[echo] You said: hello world");
        assert_eq!(sink.answer(), result.content);
        assert_eq!(sink.thinking(), result.reasoning.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_generation() {
        let generator = EchoGenerator::new(Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();

        let result = generator
            .generate(
                &[HistoryMessage::new(Role::User, "hi")],
                &GenerationConfig::default(),
                token,
                &StreamSink::detached(),
            )
            .await;

        assert_eq!(result, Err(GenerationError::Cancelled));
    }

    #[tokio::test]
    async fn test_history_without_user_message_fails() {
        let generator = EchoGenerator::new(Duration::ZERO);
        let result = generator
            .generate(
                &[HistoryMessage::new(Role::System, "rules")],
                &GenerationConfig::default(),
                CancellationToken::new(),
                &StreamSink::detached(),
            )
            .await;

        assert!(matches!(result, Err(GenerationError::Provider(_))));
    }
}
