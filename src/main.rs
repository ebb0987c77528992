//! convsync - command-line driver for the conversation session layer.
//!
//! Logs a user in against the conversation store (creating their first
//! conversation if they have none), optionally performs one action, and
//! prints the resulting state.

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use serde_json::Map;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use convsync::adapters::ChannelMessageStream;
use convsync::bridge::PersistenceBridge;
use convsync::config::SyncConfig;
use convsync::models::MessageRole;
use convsync::orchestrator::SessionOrchestrator;
use convsync::session::SessionManager;
use convsync::store::StoreClient;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
usage: convsync <user-id> [command]

commands:
  list                      list conversations (default)
  new [title]               create and select a new conversation
  select <thread-id>        select a conversation and show its messages
  rename <id> <title>       rename a conversation
  delete <id>               delete a conversation
  say <text>                add a user message to the current conversation

environment:
  CONVSYNC_STORE_URL, CONVSYNC_DEFAULT_TITLE, CONVSYNC_MESSAGE_LIMIT,
  CONVSYNC_REMOUNT_DELAY_MS, CONVSYNC_TIMEOUT_SECS, CONVSYNC_PERSIST,
  CONVSYNC_INITIAL_CONTEXT, RUST_LOG";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("convsync=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_id(raw: Option<&String>, what: &str) -> Result<i64> {
    let raw = raw.ok_or_else(|| eyre!("missing {}\n\n{}", what, USAGE))?;
    raw.parse::<i64>()
        .wrap_err_with(|| format!("invalid {}: {:?}", what, raw))
}

/// Last recorded failure with its recovery hint.
fn describe_error(manager: &SessionManager) -> String {
    match (manager.last_error(), manager.last_error_hint()) {
        (Some(reason), Some(hint)) => format!("{} ({})", reason, hint),
        (Some(reason), None) => reason,
        (None, _) => "unknown error".to_string(),
    }
}

fn print_state(manager: &SessionManager) {
    let current = manager.current_conversation().map(|c| c.conversation_id);
    let conversations = manager.conversations();
    if conversations.is_empty() {
        println!("(no conversations)");
    }
    for conv in conversations {
        let marker = if Some(conv.conversation_id) == current {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:>5}  {}  {}  {}",
            marker,
            conv.conversation_id,
            conv.thread_id,
            conv.updated_at.format("%Y-%m-%d %H:%M"),
            conv.display_title()
        );
    }
}

fn print_messages(manager: &SessionManager) {
    for message in manager.messages() {
        println!("[{}] {}", message.role, message.text());
    }
}

async fn run(config: SyncConfig, user_id: i64, command: &[String]) -> Result<()> {
    let store = Arc::new(StoreClient::from_config(&config));
    let manager = Arc::new(SessionManager::new(store.clone(), config.clone()));
    let stream = Arc::new(ChannelMessageStream::new());

    let mut bridge = PersistenceBridge::new(store, stream);
    if let Ok(context) = std::env::var("CONVSYNC_INITIAL_CONTEXT") {
        bridge = bridge.with_initial_context(context);
    }
    let orchestrator = SessionOrchestrator::new(manager.clone()).with_bridge(Arc::new(bridge));

    orchestrator.handle_login(user_id).await;
    if !manager.is_loaded() {
        return Err(eyre!(
            "could not load conversations from {}: {}",
            config.store_url,
            describe_error(&manager)
        ));
    }

    match command.first().map(String::as_str) {
        None | Some("list") => {}
        Some("new") => {
            let title = command[1..].join(" ");
            let conv = orchestrator
                .create_new_conversation(&title)
                .await
                .wrap_err("could not create conversation")?;
            println!("Created conversation {} ({})", conv.conversation_id, conv.thread_id);
        }
        Some("select") => {
            let thread_id = command
                .get(1)
                .ok_or_else(|| eyre!("missing thread id\n\n{}", USAGE))?;
            if !orchestrator.switch_conversation(thread_id).await.is_selected() {
                return Err(eyre!("no conversation with thread id {:?}", thread_id));
            }
            print_messages(&manager);
        }
        Some("rename") => {
            let id = parse_id(command.get(1), "conversation id")?;
            let title = command[2..].join(" ");
            if title.trim().is_empty() {
                return Err(eyre!("missing title\n\n{}", USAGE));
            }
            orchestrator
                .rename_conversation(id, &title)
                .await
                .wrap_err("could not rename conversation")?;
        }
        Some("delete") => {
            let id = parse_id(command.get(1), "conversation id")?;
            if !orchestrator.delete_conversation(id).await {
                return Err(eyre!(
                    "could not delete conversation {}: {}",
                    id,
                    describe_error(&manager)
                ));
            }
        }
        Some("say") => {
            let text = command[1..].join(" ");
            let message = manager
                .add_message(MessageRole::User, &text, Map::new())
                .await
                .ok_or_else(|| eyre!("message not saved: {}", describe_error(&manager)))?;
            println!("Saved message {}", message.message_id);
        }
        Some(other) => return Err(eyre!("unknown command {:?}\n\n{}", other, USAGE)),
    }

    print_state(&manager);
    orchestrator.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--version") {
        println!("convsync {}", VERSION);
        return Ok(());
    }
    if args.is_empty() || args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    color_eyre::install()?;
    init_tracing();

    let user_id = parse_id(args.first(), "user id")?;
    let config = SyncConfig::from_env();
    tracing::debug!("Using store at {}", config.store_url);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config, user_id, &args[1..]))
}
