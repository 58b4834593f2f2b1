//! `kv encrypt`: store and read JSON encrypted on this machine.
//!
//! The service only ever holds the envelope produced by
//! `crypto::seal`; the password never leaves the client.

use crate::cli::output;
use crate::cli::{
    prompt_new_password, prompt_password, read_json_arg, settings, Cli, EncryptAction,
};
use crate::client::{KvClient, StoreOptions};
use crate::crypto;
use crate::errors::Result;

/// Execute the `encrypt` command.
pub fn execute(cli: &Cli, action: &EncryptAction) -> Result<()> {
    let settings = settings(cli)?;
    let client = KvClient::new(settings.client_config());

    match action {
        EncryptAction::Store { data, ttl } => {
            let data = read_json_arg(data)?;
            let password = prompt_new_password()?;

            let envelope = crypto::seal(&data, password.as_bytes(), &settings.argon2_params())?;
            let options = StoreOptions {
                ttl: *ttl,
                ..StoreOptions::default()
            };
            let stored = client.store(&envelope, &options)?;

            output::success(&format!("Stored encrypted data (version: {})", stored.version));
            output::tip("The service only sees ciphertext. Keep the password safe.");
        }
        EncryptAction::Read { password } => {
            let record = client.retrieve(None)?;
            let password = prompt_password(password.as_deref())?;
            let data = crypto::open(&record.data, password.as_bytes())?;

            output::info(&format!("Version: {}", record.version));
            output::json(&data);
        }
    }
    Ok(())
}
