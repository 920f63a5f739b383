use clap::Subcommand;
use taskflow_core::chat::{
    complete_command, slash_suggestions, ChatMessage, ChatSession, Role, SendOutcome, SlashCommand,
    ERROR_REPLY, SLASH_COMMANDS, STOPPED_REPLY,
};
use taskflow_core::{ApiClient, Config, TaskCache};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::CmdResult;

#[derive(Subcommand)]
pub enum ChatAction {
    /// Send one message and print the reply
    Send {
        /// Message or slash command, e.g. "/add Buy milk"
        message: String,
        /// Continue this conversation instead of starting a new one
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// Interactive chat; Ctrl-C stops a pending reply
    Repl {
        /// Resume this conversation (default: the most recent one)
        #[arg(long)]
        conversation: Option<i64>,
        /// Start a fresh conversation
        #[arg(long, conflicts_with = "conversation")]
        new: bool,
    },
    /// List conversations
    Conversations,
    /// Print the messages of a conversation
    History {
        /// Conversation ID
        id: i64,
    },
    /// Rename a conversation
    Rename {
        /// Conversation ID
        id: i64,
        /// New title
        title: String,
    },
    /// Delete a conversation
    Delete {
        /// Conversation ID
        id: i64,
    },
    /// List slash commands, optionally filtered by prefix
    Commands {
        /// Typed prefix, e.g. "/de"
        prefix: Option<String>,
    },
}

fn print_command(c: &SlashCommand) {
    println!("{:<10} {:<20} e.g. {}", c.command, c.description, c.example);
}

fn print_message(m: &ChatMessage) {
    let who = match m.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    println!("{who}: {}", m.content);
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::debug!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn list_commands(prefix: Option<String>) {
    let prefix = prefix.unwrap_or_else(|| "/".into());
    let commands = if prefix.starts_with('/') {
        slash_suggestions(&prefix)
    } else {
        SLASH_COMMANDS.to_vec()
    };
    for c in &commands {
        print_command(c);
    }
}

pub fn run(action: ChatAction) -> CmdResult {
    // Offline; no config or backend needed.
    if let ChatAction::Commands { prefix } = action {
        list_commands(prefix);
        return Ok(());
    }

    let config = Config::load()?;
    let api = super::api_client(&config)?;
    let mut session = ChatSession::with_config(api.clone(), &config.chat);
    let mut cache = TaskCache::new(api);
    super::runtime()?.block_on(dispatch(action, &mut session, &mut cache))
}

async fn dispatch(
    action: ChatAction,
    session: &mut ChatSession<ApiClient>,
    cache: &mut TaskCache<ApiClient>,
) -> CmdResult {
    match action {
        ChatAction::Send { message, conversation } => {
            if let Some(id) = conversation {
                session.select(id).await?;
            }
            match session.send(&message, ctrl_c(), cache).await {
                SendOutcome::Ignored => return Err("message is empty".into()),
                SendOutcome::Replied(reply) => println!("{}", reply.response),
                SendOutcome::Stopped => println!("{STOPPED_REPLY}"),
                SendOutcome::Failed(e) => {
                    println!("{ERROR_REPLY}");
                    return Err(e.into());
                }
            }
        }
        ChatAction::Repl { conversation, new } => repl(session, cache, conversation, new).await?,
        ChatAction::Conversations => {
            session.load_conversations().await?;
            if session.conversations().is_empty() {
                println!("No conversations yet");
            }
            for c in session.conversations() {
                let updated = c.updated_at.as_deref().unwrap_or("");
                println!("{:>5}  {}  {updated}", c.id, c.title);
            }
        }
        ChatAction::History { id } => {
            session.select(id).await?;
            for m in session.messages() {
                print_message(m);
            }
        }
        ChatAction::Rename { id, title } => {
            let title = title.trim();
            if title.is_empty() {
                return Err("title must not be empty".into());
            }
            session.rename(id, title).await?;
            println!("Conversation renamed: {id}");
        }
        ChatAction::Delete { id } => {
            session.delete(id).await?;
            println!("Conversation deleted: {id}");
        }
        ChatAction::Commands { prefix } => list_commands(prefix),
    }
    Ok(())
}

/// A lone `/word` that is not a full command asks for suggestions.
fn wants_suggestions(input: &str) -> bool {
    input.starts_with('/')
        && !input.contains(char::is_whitespace)
        && !SLASH_COMMANDS.iter().any(|c| c.command == input)
}

async fn repl(
    session: &mut ChatSession<ApiClient>,
    cache: &mut TaskCache<ApiClient>,
    conversation: Option<i64>,
    new: bool,
) -> CmdResult {
    match conversation {
        Some(id) => session.select(id).await?,
        None if !new => session.load_conversations().await?,
        None => {}
    }
    for m in session.messages() {
        print_message(m);
    }
    println!("Type \"/\" for commands, \"/new\" for a new chat, \"exit\" to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input == "exit" || input == "quit" {
            break;
        }
        if input == "/new" {
            session.new_chat();
            for m in session.messages() {
                print_message(m);
            }
            continue;
        }
        if wants_suggestions(input) {
            let suggestions = slash_suggestions(input);
            for c in &suggestions {
                print_command(c);
            }
            if let [only] = suggestions.as_slice() {
                println!("-> {}", complete_command(only));
            }
            continue;
        }

        match session.send(input, ctrl_c(), cache).await {
            SendOutcome::Ignored => {}
            SendOutcome::Replied(reply) => println!("assistant: {}", reply.response),
            SendOutcome::Stopped => println!("assistant: {STOPPED_REPLY}"),
            SendOutcome::Failed(e) => {
                tracing::debug!(error = %e, "chat turn failed");
                println!("assistant: {ERROR_REPLY}");
            }
        }
    }
    Ok(())
}
