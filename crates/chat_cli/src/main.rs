mod echo;
mod render;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chat_core::Config;
use chat_state::{ConversationOrchestrator, Generator};
use clap::{Parser, Subcommand};
use colored::Colorize;
use storage_manager::{ConversationStorage, FileConversationStorage};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::echo::EchoGenerator;
use crate::render::{render_active_path, render_tree};
use crate::repl::ChatSession;

#[derive(Parser)]
#[command(name = "branchchat")]
#[command(about = "Branching conversations in the terminal")]
#[command(version)]
struct Cli {
    /// Directory conversations are stored in
    #[arg(long, env = "BRANCHCHAT_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Conversation to open; a new one is started when omitted
    #[arg(long, short)]
    conversation: Option<Uuid>,

    /// Pause between streamed words, in milliseconds
    #[arg(long, default_value_t = 60)]
    delay_ms: u64,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat (default)
    Chat,
    /// Send a single message and print the reply
    Send {
        /// Message content
        message: String,
    },
    /// List stored conversations
    List,
    /// Print a conversation's current path and full tree
    Show,
    /// Delete a stored conversation
    Delete,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            fmt::layer()
                .with_target(true)
                .with_line_number(debug)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn require_conversation(conversation: Option<Uuid>) -> anyhow::Result<Uuid> {
    match conversation {
        Some(id) => Ok(id),
        None => bail!("--conversation is required for this command"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = Config::new();
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = Some(dir);
    }
    let storage_dir = config.storage_dir();
    tracing::debug!(storage_dir = %storage_dir.display(), "branchchat: starting");

    let storage: Arc<dyn ConversationStorage> =
        Arc::new(FileConversationStorage::new(&storage_dir));
    let generator: Arc<dyn Generator> =
        Arc::new(EchoGenerator::new(Duration::from_millis(cli.delay_ms)));

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let conversation_id = cli.conversation.unwrap_or_else(Uuid::new_v4);
            let mut session = ChatSession::open(conversation_id, generator, storage, config).await?;
            session.run().await
        }
        Commands::Send { message } => {
            let conversation_id = cli.conversation.unwrap_or_else(Uuid::new_v4);
            let orchestrator = ConversationOrchestrator::open(conversation_id, generator, storage)
                .await?
                .with_config(config);
            let outcome = orchestrator.send_message(message, None).await?;
            orchestrator.save().await?;

            print!("{}", render_active_path(&orchestrator.active_entries()));
            println!(
                "{}",
                format!("Conversation: {} ({:?})", conversation_id, outcome.status).dimmed()
            );
            Ok(())
        }
        Commands::List => {
            let ids = storage.list().await?;
            if ids.is_empty() {
                println!("{}", "No stored conversations".dimmed());
            }
            for id in ids {
                println!("{}", id);
            }
            Ok(())
        }
        Commands::Show => {
            let conversation_id = require_conversation(cli.conversation)?;
            let Some(conversation) = storage.load(conversation_id).await? else {
                bail!("conversation {} not found", conversation_id);
            };
            let orchestrator = ConversationOrchestrator::new(conversation, generator);
            print!("{}", render_active_path(&orchestrator.active_entries()));
            println!("{}", "─".repeat(50).dimmed());
            let (listing, _) = orchestrator.read(render_tree);
            print!("{}", listing);
            Ok(())
        }
        Commands::Delete => {
            let conversation_id = require_conversation(cli.conversation)?;
            if storage.delete(conversation_id).await? {
                println!("{}", format!("✅ Deleted {}", conversation_id).green());
            } else {
                println!("{}", format!("❌ No conversation {}", conversation_id).red());
            }
            Ok(())
        }
    }
}
