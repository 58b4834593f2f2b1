//! `kv get`: retrieve and print the stored record.

use crate::cli::output;
use crate::cli::{client, Cli};
use crate::errors::Result;

/// Execute the `get` command.
pub fn execute(cli: &Cli, raw: bool) -> Result<()> {
    let client = client(cli)?;
    let record = client.retrieve(None)?;

    if raw {
        output::json(&record.data);
        return Ok(());
    }

    output::info(&format!("Version: {}", record.version));
    if let Some(updated) = record.updated_at {
        output::info(&format!("Updated: {}", updated.to_rfc3339()));
    }
    let expires = record
        .expires_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "Never".into());
    output::info(&format!("Expires: {expires}"));
    output::json(&record.data);

    Ok(())
}
