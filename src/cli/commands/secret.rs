//! `kv secret`: one-time secrets.
//!
//! `create` stores under `--token` when given, otherwise under a freshly
//! generated token. `read` reveals the secret once and marks it consumed.

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{prompt_new_password, prompt_password, settings, Cli, SecretAction};
use crate::client::KvClient;
use crate::errors::{KvError, Result};
use crate::secret::{self, ReadOutcome};

/// Execute the `secret` command.
pub fn execute(cli: &Cli, action: &SecretAction) -> Result<()> {
    let settings = settings(cli)?;
    let client = KvClient::new(settings.client_config());

    match action {
        SecretAction::Create {
            text,
            password,
            prompt_password: prompt,
            ttl,
        } => {
            let password: Option<Zeroizing<String>> = match (password, prompt) {
                (Some(pw), _) => Some(Zeroizing::new(pw.clone())),
                (None, true) => Some(prompt_new_password()?),
                (None, false) => None,
            };

            let token = match client.token() {
                Some(token) => token.to_string(),
                None => client.generate(None)?.token,
            };

            let created = secret::create(
                &client,
                &token,
                text,
                password.as_deref().map(String::as_str),
                *ttl,
                &settings.argon2_params(),
            )?;

            output::success("One-time secret created");
            println!("Token: {}", created.token);
            println!("Share URL: {}/secret/{}", client.base_url(), created.token);
            if let Some(expires) = created.expires_at {
                println!("Expires: {}", expires.to_rfc3339());
            }
            if created.password_protected {
                output::tip("Share the password through a different channel.");
            }
            output::warning("The secret can be read only once.");
        }
        SecretAction::Read {
            secret_token,
            password,
            prompt_password: prompt,
        } => {
            let password: Option<Zeroizing<String>> = match (password, prompt) {
                (Some(pw), _) => Some(Zeroizing::new(pw.clone())),
                (None, true) => Some(prompt_password(None)?),
                (None, false) => None,
            };

            match secret::read(&client, secret_token, password.as_deref().map(String::as_str))? {
                ReadOutcome::Revealed(revealed) => {
                    output::success("Secret retrieved");
                    println!("{}", revealed.secret);
                    output::info(&format!("Created: {}", revealed.created_at.to_rfc3339()));
                    if revealed.consumed {
                        output::warning("This secret has been consumed and can no longer be read.");
                    }
                }
                ReadOutcome::NotFound => {
                    return Err(KvError::CommandFailed("secret not found or already read".into()))
                }
                ReadOutcome::AlreadyRead => {
                    return Err(KvError::CommandFailed("this secret has already been read".into()))
                }
            }
        }
    }
    Ok(())
}
