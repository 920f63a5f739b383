//! Thin wrapper around the OS keyring for credential storage.

use crate::error::Result;

const SERVICE: &str = "taskflow";
const TOKEN_KEY: &str = "api_token";

/// Environment variable that takes precedence over the keyring.
pub const TOKEN_ENV: &str = "TASKFLOW_TOKEN";

pub fn get(key: &str) -> Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    match entry.get_password() {
        Ok(pw) => Ok(Some(pw)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

pub fn delete(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE, key)?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Bearer token for the backend: `TASKFLOW_TOKEN` first, then the keyring.
///
/// A keyring that cannot be reached is treated as holding no token.
pub fn api_token() -> Option<String> {
    if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()) {
        return Some(token);
    }
    get(TOKEN_KEY).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "keyring unavailable");
        None
    })
}

pub fn store_api_token(token: &str) -> Result<()> {
    set(TOKEN_KEY, token)
}

pub fn clear_api_token() -> Result<()> {
    delete(TOKEN_KEY)
}
