//! `kv lifecycle`: create, verify, update, delete, and verify again.

use serde_json::json;

use crate::cli::output;
use crate::cli::{client, Cli};
use crate::client::{KvClient, StoreOptions, Transport};
use crate::errors::{KvError, Result};

/// Execute the `lifecycle` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let client = client(cli)?;
    output::heading("Complete Lifecycle Demo");
    run(&client)?;
    output::success("Lifecycle demo complete!");
    Ok(())
}

/// Each step fails the whole run if the service does not behave as expected.
pub fn run<T: Transport>(client: &KvClient<T>) -> Result<()> {
    let mut data = json!({
        "demo": "lifecycle",
        "timestamp": "2025-10-23T10:00:00Z",
        "value": 42
    });

    let created = client.store(&data, &StoreOptions::default())?;
    output::success(&format!("1. Created (version: {})", created.version));

    let current = client.retrieve(None)?;
    output::success(&format!(
        "2. Data found (version: {}, value: {})",
        current.version, current.data["value"]
    ));

    data["value"] = json!(100);
    data["updated"] = json!(true);
    let updated = client.store(&data, &StoreOptions::default())?;
    output::success(&format!("3. Updated (version: {})", updated.version));

    client.delete(None)?;
    output::success("4. Deleted");

    match client.retrieve(None) {
        Err(e) if e.is_not_found() => output::success("5. Confirmed: data is gone"),
        Ok(_) => {
            return Err(KvError::CommandFailed(
                "data still exists after deletion".into(),
            ))
        }
        Err(e) => return Err(e),
    }

    match client.delete(None) {
        Err(e) if e.is_not_found() => {
            output::success("6. Second delete returned 404 Not Found as expected")
        }
        Ok(_) => {
            return Err(KvError::CommandFailed(
                "second delete unexpectedly succeeded".into(),
            ))
        }
        Err(e) => return Err(e),
    }

    Ok(())
}
