mod config;
pub mod kv;
pub mod ledger;
pub mod secrets;

pub use config::{
    ApiConfig, AuthConfig, ChatConfig, Config, DashboardConfig, NotificationPermission,
    NotificationsConfig, RemindersConfig,
};
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use ledger::DismissedLedger;

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/taskflow[-dev]/` based on TASKFLOW_ENV.
///
/// Set TASKFLOW_ENV=dev to use the development data directory, or
/// TASKFLOW_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = match std::env::var_os("TASKFLOW_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("TASKFLOW_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("taskflow-dev")
            } else {
                base_dir.join("taskflow")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
