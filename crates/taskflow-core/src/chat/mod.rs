//! Chat assistant: message types, conversation titles and slash commands.
//!
//! The assistant itself runs on the backend. The client keeps the visible
//! transcript, persists each turn, and refreshes the task cache after every
//! reply since the assistant may have changed tasks.

pub mod session;

pub use session::{ChatSession, SendOutcome};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ApiError;

pub const GREETING: &str =
    "Hi! I can help you manage your tasks. Try \"Add a task to buy milk\" or \"List my tasks\".";
pub const STOPPED_REPLY: &str = "⏹️ Response stopped by user.";
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";
pub const HISTORY_LIMIT: u32 = 50;

const TITLE_MAX: usize = 50;
const TITLE_PREFIXES: [&str; 7] = [
    "add task",
    "create task",
    "new task",
    "add a task",
    "create a task",
    "add",
    "create",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat/save-message`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SaveMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
}

/// Reply of `POST /api/chat/`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    pub response: String,
    /// Model that produced the reply
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Backend endpoints the chat assistant uses.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_chat(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply, ApiError>;
    async fn save_message(&self, message: &SaveMessage) -> Result<(), ApiError>;
    async fn chat_history(&self, conversation_id: i64, limit: u32) -> Result<Vec<ChatMessage>, ApiError>;
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;
    async fn create_conversation(&self, title: &str) -> Result<Conversation, ApiError>;
    async fn rename_conversation(&self, id: i64, title: &str) -> Result<Conversation, ApiError>;
    async fn delete_conversation(&self, id: i64) -> Result<(), ApiError>;
}

/// Derive a conversation title from its first message.
pub fn conversation_title(first_message: &str) -> String {
    let mut title = first_message.trim().to_string();

    let lower = title.to_lowercase();
    if let Some(prefix) = TITLE_PREFIXES.iter().find(|p| lower.starts_with(*p)) {
        if let Some(rest) = title.get(prefix.len()..) {
            title = rest.trim().to_string();
        }
    }

    let mut chars = title.chars();
    if let Some(first) = chars.next() {
        title = first.to_uppercase().chain(chars).collect();
    }

    if title.chars().count() > TITLE_MAX {
        title = title.chars().take(TITLE_MAX - 3).collect::<String>() + "...";
    }

    if title.is_empty() {
        title = first_message.chars().take(TITLE_MAX).collect();
        if first_message.chars().count() > TITLE_MAX {
            title.push_str("...");
        }
    }
    title
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

pub const SLASH_COMMANDS: [SlashCommand; 6] = [
    SlashCommand {
        command: "/add",
        description: "Add a new task",
        example: "/add Buy groceries",
    },
    SlashCommand {
        command: "/list",
        description: "Show all tasks",
        example: "/list",
    },
    SlashCommand {
        command: "/delete",
        description: "Delete a task",
        example: "/delete 5",
    },
    SlashCommand {
        command: "/complete",
        description: "Mark task as done",
        example: "/complete 3",
    },
    SlashCommand {
        command: "/update",
        description: "Update a task",
        example: "/update 2 New title",
    },
    SlashCommand {
        command: "/search",
        description: "Search tasks",
        example: "/search work",
    },
];

/// Commands to offer while `input` starts with `/`.
///
/// Returns nothing for ordinary input, and every command when the typed
/// prefix matches none.
pub fn slash_suggestions(input: &str) -> Vec<SlashCommand> {
    if !input.starts_with('/') {
        return Vec::new();
    }
    let typed = input.split_whitespace().next().unwrap_or("/").to_lowercase();
    let matching: Vec<SlashCommand> = SLASH_COMMANDS
        .iter()
        .copied()
        .filter(|c| c.command.starts_with(&typed))
        .collect();
    if matching.is_empty() {
        SLASH_COMMANDS.to_vec()
    } else {
        matching
    }
}

/// Input after picking `command` from the suggestions.
pub fn complete_command(command: &SlashCommand) -> String {
    format!("{} ", command.command)
}
