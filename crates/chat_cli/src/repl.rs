//! Interactive chat loop.

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use chat_core::{Config, MessageStatus};
use chat_state::{
    ConversationOrchestrator, ConversationUpdate, GenerationOutcome, Generator,
};
use colored::Colorize;
use conversation_tree::Direction;
use storage_manager::ConversationStorage;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::render::{render_active_path, render_tree};

pub const HELP: &str = "\
  <text>              send a message after the last one shown
  /edit <n> <text>    edit user message n into a new branch
  /regen <n>          regenerate message n
  /left <n>           show the previous sibling of message n
  /right <n>          show the next sibling of message n
  /rm <n>             delete message n and everything below it
  /tree               list every message with its number
  /select <k>         show message k from the last /tree listing
  /show               print the current path again
  /new                start a new conversation
  /help               this text
  /quit               leave (Ctrl-C while generating aborts)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    Edit { position: usize, content: String },
    Regenerate(usize),
    Navigate { position: usize, direction: Direction },
    Remove(usize),
    Tree,
    Select(usize),
    Show,
    New,
    Help,
    Quit,
}

fn parse_position(arg: Option<&str>) -> anyhow::Result<usize> {
    let arg = arg.ok_or_else(|| anyhow!("missing message number"))?;
    match arg.parse::<usize>() {
        Ok(position) if position > 0 => Ok(position),
        _ => bail!("invalid message number: {}", arg),
    }
}

impl ReplCommand {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let input = input.trim();
        let Some(command) = input.strip_prefix('/') else {
            return Ok(Self::Send(input.to_string()));
        };

        let mut parts = command.splitn(3, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let first = parts.next();
        let rest = parts.next().map(str::trim).filter(|rest| !rest.is_empty());

        let parsed = match name {
            "edit" => Self::Edit {
                position: parse_position(first)?,
                content: rest
                    .ok_or_else(|| anyhow!("usage: /edit <n> <text>"))?
                    .to_string(),
            },
            "regen" => Self::Regenerate(parse_position(first)?),
            "left" => Self::Navigate {
                position: parse_position(first)?,
                direction: Direction::Left,
            },
            "right" => Self::Navigate {
                position: parse_position(first)?,
                direction: Direction::Right,
            },
            "rm" => Self::Remove(parse_position(first)?),
            "tree" => Self::Tree,
            "select" => Self::Select(parse_position(first)?),
            "show" => Self::Show,
            "new" => Self::New,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command /{} (try /help)", other),
        };
        Ok(parsed)
    }
}

pub struct ChatSession {
    orchestrator: ConversationOrchestrator,
    generator: Arc<dyn Generator>,
    storage: Arc<dyn ConversationStorage>,
    config: Config,
    tree_ids: Vec<Uuid>,
}

impl ChatSession {
    pub async fn open(
        conversation_id: Uuid,
        generator: Arc<dyn Generator>,
        storage: Arc<dyn ConversationStorage>,
        config: Config,
    ) -> anyhow::Result<Self> {
        let orchestrator =
            ConversationOrchestrator::open(conversation_id, generator.clone(), storage.clone())
                .await?
                .with_config(config.clone());
        Ok(Self {
            orchestrator,
            generator,
            storage,
            config,
            tree_ids: Vec::new(),
        })
    }

    pub fn conversation_id(&self) -> Uuid {
        self.orchestrator.conversation_id()
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("{}", "🌳 branchchat".cyan().bold());
        println!(
            "{}",
            format!("Conversation: {}", self.conversation_id()).dimmed()
        );
        println!("{}", "Type /help for commands".dimmed());
        self.print_path();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{} ", ">".cyan().bold());
            io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match ReplCommand::parse(&line) {
                Ok(command) => command,
                Err(error) => {
                    println!("{}", format!("❌ {}", error).red());
                    continue;
                }
            };
            match self.execute(command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => println!("{}", format!("❌ {}", error).red()),
            }
        }

        self.orchestrator.save().await?;
        println!("{}", "👋 Goodbye!".cyan());
        Ok(())
    }

    /// Returns `false` when the loop should stop.
    pub async fn execute(&mut self, command: ReplCommand) -> anyhow::Result<bool> {
        match command {
            ReplCommand::Send(content) => {
                let generation = self.orchestrator.send_message(content, None);
                self.drive(generation).await?;
            }
            ReplCommand::Edit { position, content } => {
                let id = self.message_at(position)?;
                let generation = self.orchestrator.edit_user_message(&id, content);
                self.drive(generation).await?;
            }
            ReplCommand::Regenerate(position) => {
                let id = self.message_at(position)?;
                let generation = self.orchestrator.regenerate_message(&id);
                self.drive(generation).await?;
            }
            ReplCommand::Navigate {
                position,
                direction,
            } => {
                let id = self.message_at(position)?;
                if !self.orchestrator.navigate_branch(&id, direction).await {
                    bail!("no branch in that direction");
                }
                self.print_path();
            }
            ReplCommand::Remove(position) => {
                let id = self.message_at(position)?;
                let removed = self.orchestrator.remove_branch(&id).await?;
                println!("{}", format!("🗑  removed {} message(s)", removed).dimmed());
                self.print_path();
            }
            ReplCommand::Tree => {
                let (listing, ids) = self.orchestrator.read(render_tree);
                self.tree_ids = ids;
                print!("{}", listing);
            }
            ReplCommand::Select(index) => {
                let id = *self
                    .tree_ids
                    .get(index - 1)
                    .ok_or_else(|| anyhow!("no message {} in the last /tree listing", index))?;
                if !self.orchestrator.select_message(&id).await {
                    bail!("message {} no longer exists", index);
                }
                self.print_path();
            }
            ReplCommand::Show => self.print_path(),
            ReplCommand::New => {
                self.orchestrator.save().await?;
                let orchestrator = ConversationOrchestrator::open(
                    Uuid::new_v4(),
                    self.generator.clone(),
                    self.storage.clone(),
                )
                .await?
                .with_config(self.config.clone());
                self.orchestrator = orchestrator;
                self.tree_ids.clear();
                println!(
                    "{}",
                    format!("Conversation: {}", self.conversation_id()).dimmed()
                );
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn message_at(&self, position: usize) -> anyhow::Result<Uuid> {
        self.orchestrator
            .active_entries()
            .get(position - 1)
            .map(|entry| entry.message.id)
            .ok_or_else(|| anyhow!("no message {} on the current path", position))
    }

    fn print_path(&self) {
        let entries = self.orchestrator.active_entries();
        if entries.is_empty() {
            println!("{}", "(empty conversation)".dimmed());
        } else {
            print!("{}", render_active_path(&entries));
        }
    }

    /// Stream a generation to the terminal until it finishes. Ctrl-C aborts it.
    async fn drive<F>(&self, generation: F) -> anyhow::Result<()>
    where
        F: Future<Output = chat_state::Result<GenerationOutcome>>,
    {
        let mut updates = self.orchestrator.subscribe();
        tokio::pin!(generation);

        let mut printer = DeltaPrinter::default();
        let result = loop {
            tokio::select! {
                result = &mut generation => break result,
                _ = tokio::signal::ctrl_c() => {
                    if self.orchestrator.abort_request() {
                        println!();
                        let state = self.orchestrator.state();
                        println!("{}", format!("⏹  {}…", state.description()).yellow());
                    }
                }
                Ok(update) = updates.recv() => printer.print(&update)?,
            }
        };
        // Deltas still queued when the generation finished.
        while let Ok(update) = updates.try_recv() {
            printer.print(&update)?;
        }
        println!();

        let outcome = result?;
        match outcome.status {
            MessageStatus::Interrupted => println!("{}", "generation interrupted".yellow()),
            MessageStatus::Failed => println!("{}", "generation failed".red()),
            MessageStatus::Complete | MessageStatus::Pending => {}
        }
        self.print_path();
        Ok(())
    }
}

#[derive(Default, PartialEq)]
enum Phase {
    #[default]
    Idle,
    Thinking,
    Answering,
}

#[derive(Default)]
struct DeltaPrinter {
    phase: Phase,
}

impl DeltaPrinter {
    fn print(&mut self, update: &ConversationUpdate) -> io::Result<()> {
        match update {
            ConversationUpdate::ThinkingDelta { delta, .. } => {
                if self.phase != Phase::Thinking {
                    print!("{} ", "thinking:".dimmed());
                    self.phase = Phase::Thinking;
                }
                print!("{}", delta.dimmed());
            }
            ConversationUpdate::AnswerDelta { delta, .. } => {
                if self.phase != Phase::Answering {
                    if self.phase == Phase::Thinking {
                        println!();
                    }
                    print!("{} ", "assistant:".green().bold());
                    self.phase = Phase::Answering;
                }
                print!("{}", delta.green());
            }
            _ => return Ok(()),
        }
        io::stdout().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_send() {
        assert_eq!(
            ReplCommand::parse("  hello there ").unwrap(),
            ReplCommand::Send("hello there".to_string())
        );
    }

    #[test]
    fn test_edit_keeps_whole_text() {
        assert_eq!(
            ReplCommand::parse("/edit 3 say it   differently").unwrap(),
            ReplCommand::Edit {
                position: 3,
                content: "say it   differently".to_string(),
            }
        );
        assert!(ReplCommand::parse("/edit 3").is_err());
    }

    #[test]
    fn test_navigation_commands() {
        assert_eq!(
            ReplCommand::parse("/left 2").unwrap(),
            ReplCommand::Navigate {
                position: 2,
                direction: Direction::Left,
            }
        );
        assert_eq!(
            ReplCommand::parse("/right 1").unwrap(),
            ReplCommand::Navigate {
                position: 1,
                direction: Direction::Right,
            }
        );
    }

    #[test]
    fn test_invalid_positions_are_rejected() {
        assert!(ReplCommand::parse("/regen").is_err());
        assert!(ReplCommand::parse("/regen 0").is_err());
        assert!(ReplCommand::parse("/select two").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let error = ReplCommand::parse("/frobnicate").unwrap_err();
        assert!(error.to_string().contains("/frobnicate"));
    }
}
