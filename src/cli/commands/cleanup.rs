//! `kv cleanup`: delete the record when it is test data or expiring.

use serde_json::Value;

use crate::cli::output;
use crate::cli::{client, confirm, Cli};
use crate::client::RetrieveResponse;
use crate::errors::Result;

/// Why a record qualifies for cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    Forced,
    TestData,
    Expiring,
}

impl CleanupReason {
    pub fn describe(&self) -> &'static str {
        match self {
            CleanupReason::Forced => "--force flag specified",
            CleanupReason::TestData => "test/demo data detected",
            CleanupReason::Expiring => "data has an expiration set",
        }
    }
}

/// Data marked with a truthy `demo`, `test` or `_test` field, or whose
/// `description` mentions "test".
pub fn is_test_data(data: &Value) -> bool {
    let truthy = |key: &str| match data.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    };

    let described_as_test = data
        .get("description")
        .and_then(Value::as_str)
        .is_some_and(|d| d.to_lowercase().contains("test"));

    truthy("demo") || truthy("test") || truthy("_test") || described_as_test
}

/// Decide whether `record` should be deleted.
pub fn cleanup_reason(record: &RetrieveResponse, force: bool) -> Option<CleanupReason> {
    if force {
        Some(CleanupReason::Forced)
    } else if is_test_data(&record.data) {
        Some(CleanupReason::TestData)
    } else if record.expires_at.is_some() {
        Some(CleanupReason::Expiring)
    } else {
        None
    }
}

/// Execute the `cleanup` command.
pub fn execute(cli: &Cli, force: bool, yes: bool) -> Result<()> {
    let client = client(cli)?;

    let record = match client.retrieve(None) {
        Ok(record) => record,
        Err(e) if e.is_not_found() => {
            output::success("No data found, already clean.");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    output::info(&format!("Version: {}", record.version));
    let expires = record
        .expires_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "Never".into());
    output::info(&format!("Expires: {expires}"));
    let kind = if is_test_data(&record.data) {
        "Test/Demo data"
    } else {
        "Regular data"
    };
    output::info(&format!("Type: {kind}"));

    let Some(reason) = cleanup_reason(&record, force) else {
        output::info("No cleanup needed.");
        return Ok(());
    };
    output::info(&format!("Cleanup reason: {}", reason.describe()));

    if !yes && !confirm("Proceed with cleanup?")? {
        output::info("Cleanup cancelled.");
        return Ok(());
    }

    client.delete(None)?;
    output::success("Cleanup complete.");
    Ok(())
}
