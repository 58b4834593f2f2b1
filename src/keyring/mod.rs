//! OS keyring storage for the default token.
//!
//! The token is kept in the operating system's credential store, one
//! entry per API base URL:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)
//!
//! Failures are returned to the caller, which falls back to `--token`
//! or `KV_TOKEN`.

use crate::errors::{KvError, Result};

const SERVICE_NAME: &str = "keyvalue";

fn entry_key(base_url: &str) -> String {
    format!("token:{}", base_url.trim_end_matches('/'))
}

fn entry(base_url: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(SERVICE_NAME, &entry_key(base_url))
        .map_err(|e| KvError::KeyringError(format!("failed to create keyring entry: {e}")))
}

/// Remember `token` as the default for `base_url`.
pub fn store_token(base_url: &str, token: &str) -> Result<()> {
    entry(base_url)?
        .set_password(token)
        .map_err(|e| KvError::KeyringError(format!("failed to store token in keyring: {e}")))
}

/// Returns `None` if no token is stored.
pub fn get_token(base_url: &str) -> Result<Option<String>> {
    match entry(base_url)?.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(KvError::KeyringError(format!(
            "failed to read from keyring: {e}"
        ))),
    }
}

pub fn delete_token(base_url: &str) -> Result<()> {
    match entry(base_url)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(KvError::KeyringError(format!(
            "failed to delete from keyring: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_key_ignores_trailing_slash() {
        assert_eq!(entry_key("https://key-value.co/"), "token:https://key-value.co");
        assert_eq!(entry_key("https://key-value.co"), "token:https://key-value.co");
    }
}
