//! `kv auth keyring`: keep a default token in the OS keyring.
//!
//! The entry is keyed by the service URL, so tokens for different
//! deployments do not collide. Without the `keyring-store` feature the
//! command returns an error explaining how to enable it.

use crate::cli::output;
use crate::cli::Cli;
use crate::errors::{KvError, Result};

/// Save `--token` as the default token, or remove the saved one.
pub fn execute_keyring(cli: &Cli, delete: bool) -> Result<()> {
    #[cfg(feature = "keyring-store")]
    {
        let cwd = std::env::current_dir()?;
        let api_url = crate::config::Settings::load(&cwd)?
            .apply_overrides(cli.url.as_deref(), None, None)
            .api_url;

        if delete {
            crate::keyring::delete_token(&api_url)?;
            output::success("Token removed from OS keyring.");
        } else {
            // Only an explicit --token is saved, never one read back from the keyring.
            let token = cli
                .token
                .as_deref()
                .ok_or(KvError::MissingToken { operation: "keyring" })?;
            crate::keyring::store_token(&api_url, token)?;
            output::success(&format!("Token saved to OS keyring for {api_url}."));
            output::tip("Commands without --token or KV_TOKEN will use it.");
        }

        Ok(())
    }

    #[cfg(not(feature = "keyring-store"))]
    {
        let _ = (cli, delete);
        output::tip("Pass --token or set KV_TOKEN instead.");
        Err(KvError::KeyringError(
            "keyring support not compiled, rebuild with `cargo build --features keyring-store`"
                .into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn keyring_disabled_returns_error() {
        #[cfg(not(feature = "keyring-store"))]
        {
            use clap::Parser;
            let cli = crate::cli::Cli::parse_from(["kv", "--token", "abc", "auth", "keyring"]);
            let result = super::execute_keyring(&cli, false);
            let msg = result.unwrap_err().to_string();
            assert!(
                msg.contains("keyring support not compiled"),
                "unexpected error: {msg}"
            );
        }
    }
}
