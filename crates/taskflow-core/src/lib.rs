//! # TaskFlow Core Library
//!
//! This library provides the client-side logic for the TaskFlow to-do app.
//! Tasks, chat and notifications all live on a remote backend; this crate
//! caches what the user is looking at, decides when a due date should
//! produce a reminder, and drives the chat assistant. The `taskflow` CLI is
//! a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Reminder Engine**: merges local due-date checks with the backend
//!   notification feed and deduplicates by task id against a persisted
//!   24-hour ledger
//! - **Task Cache**: per-query cache with optimistic mutations and rollback
//! - **Chat**: conversation-aware client for the assistant endpoint
//! - **Storage**: TOML configuration, SQLite key-value store, OS keyring
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: reminder state machine, driven by [`reminder::spawn`]
//! - [`TaskCache`]: cached task lists over any [`TaskBackend`]
//! - [`ChatSession`]: chat transcript and conversations
//! - [`ApiClient`]: HTTP implementation of every backend trait
//! - [`Config`]: application configuration management

pub mod api;
pub mod chat;
pub mod dashboard;
pub mod error;
pub mod reminder;
pub mod storage;
pub mod task;
mod wire;

pub use api::ApiClient;
pub use chat::{ChatBackend, ChatMessage, ChatSession, Conversation, SendOutcome};
pub use dashboard::Summary;
pub use error::{ApiError, ConfigError, CoreError, Result, StorageError, ValidationError};
pub use reminder::{FeedNotification, NotificationFeed, ReminderEngine, ReminderNotification};
pub use storage::{Config, DismissedLedger, KeyValueStore, MemoryStore, SqliteStore};
pub use task::{
    SortOption, Task, TaskBackend, TaskCache, TaskCategory, TaskCreate, TaskPriority, TaskQuery,
    TaskUpdate,
};
