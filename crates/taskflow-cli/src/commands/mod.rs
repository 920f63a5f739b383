pub mod auth;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod task;
pub mod watch;

use taskflow_core::storage::secrets;
use taskflow_core::{ApiClient, Config};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Runtime for commands that talk to the backend.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Client for the configured backend, authenticated with the stored token.
pub fn api_client(config: &Config) -> Result<ApiClient, Box<dyn std::error::Error>> {
    Ok(ApiClient::from_config(&config.api, secrets::api_token())?)
}
