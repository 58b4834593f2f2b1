//! `kv delete`: remove the record stored under the token.

use crate::cli::output;
use crate::cli::{client, confirm, Cli};
use crate::errors::Result;

/// Execute the `delete` command.
pub fn execute(cli: &Cli, force: bool, show: bool) -> Result<()> {
    let client = client(cli)?;

    // Check first so a missing record is reported instead of failing.
    let current = match client.retrieve(None) {
        Ok(record) => record,
        Err(e) if e.is_not_found() => {
            output::info("No data found for this token, nothing to delete.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if show {
        output::info(&format!("Version: {}", current.version));
        let expires = current
            .expires_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "Never".into());
        output::info(&format!("Expires: {expires}"));
        output::json(&current.data);
    }

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        output::warning("This will permanently delete all data for this token.");
        if !confirm("Delete stored data?")? {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    client.delete(None)?;
    output::success("Data deleted.");

    match client.retrieve(None) {
        Err(e) if e.is_not_found() => output::success("Confirmed: no data found for token."),
        Ok(_) => output::warning("Data still exists after deletion."),
        Err(e) => return Err(e),
    }

    Ok(())
}
