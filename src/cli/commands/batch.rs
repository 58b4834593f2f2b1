//! `kv batch` / `kv batch-demo`: many operations in one request.

use std::fs;

use serde_json::json;

use crate::cli::output;
use crate::cli::{client, Cli};
use crate::client::{BatchOperation, BatchResponse, KvClient, PatchOps, Transport};
use crate::errors::{KvError, Result};

/// Parse a JSON array of operations.
pub fn parse_operations(text: &str) -> Result<Vec<BatchOperation>> {
    serde_json::from_str(text)
        .map_err(|e| KvError::CommandFailed(format!("invalid batch operations: {e}")))
}

/// Execute the `batch` command.
pub fn execute(cli: &Cli, file: &str) -> Result<()> {
    let text = fs::read_to_string(file)
        .map_err(|e| KvError::CommandFailed(format!("failed to read {file}: {e}")))?;
    let operations = parse_operations(&text)?;

    let client = client(cli)?;
    let response = client.batch(&operations)?;
    output::print_batch_results(&response);

    if response.summary.failed > 0 {
        output::warning(&format!(
            "{} of {} operations failed",
            response.summary.failed, response.summary.total
        ));
    }
    Ok(())
}

/// Execute the `batch-demo` command.
pub fn execute_demo(cli: &Cli) -> Result<()> {
    let client = client(cli)?;
    output::heading("Batch Operations Example");
    run_demo(&client)?;
    output::success("Batch demo complete");
    Ok(())
}

/// Summaries of the four demo batches.
#[derive(Debug)]
pub struct DemoReport {
    pub tokens: Vec<String>,
    pub store: BatchResponse,
    pub mixed: BatchResponse,
    pub patch: BatchResponse,
    pub delete: BatchResponse,
}

/// Generate three tokens, then store, mix, patch, and delete in batches.
pub fn run_demo<T: Transport>(client: &KvClient<T>) -> Result<DemoReport> {
    let tokens = (0..3)
        .map(|_| client.generate(None).map(|g| g.token))
        .collect::<Result<Vec<_>>>()?;
    output::success(&format!("Generated {} tokens", tokens.len()));
    let [t1, t2, t3] = [&tokens[0], &tokens[1], &tokens[2]].map(|t| t.to_string());

    println!("\nBatch store:");
    let store = client.batch(&[
        BatchOperation::Store {
            token: t1.clone(),
            data: json!({"sensor": "temp-1", "value": 23.5}),
            ttl: None,
        },
        BatchOperation::Store {
            token: t2.clone(),
            data: json!({"sensor": "temp-2", "value": 24.1}),
            ttl: None,
        },
        BatchOperation::Store {
            token: t3.clone(),
            data: json!({"sensor": "temp-3", "value": 22.8}),
            ttl: Some(3600),
        },
    ])?;
    output::print_batch_results(&store);

    println!("\nMixed batch:");
    let mixed = client.batch(&[
        BatchOperation::Retrieve { token: t1.clone() },
        BatchOperation::Store {
            token: t2.clone(),
            data: json!({"sensor": "temp-2", "value": 25.0, "updated": true}),
            ttl: None,
        },
        BatchOperation::Retrieve { token: t3.clone() },
    ])?;
    output::print_batch_results(&mixed);

    println!("\nBatch patch:");
    let versions = client.batch(&[
        BatchOperation::Retrieve { token: t1.clone() },
        BatchOperation::Retrieve { token: t2.clone() },
    ])?;
    let version_of = |i: usize| -> Result<u64> {
        versions
            .results
            .get(i)
            .and_then(|r| r.version)
            .ok_or_else(|| KvError::InvalidResponse("batch retrieve returned no version".into()))
    };
    let patch = client.batch(&[
        BatchOperation::Patch {
            token: t1.clone(),
            version: version_of(0)?,
            patch: PatchOps::new().set("value", 30.0),
        },
        BatchOperation::Patch {
            token: t2.clone(),
            version: version_of(1)?,
            patch: PatchOps::new().set("value", 31.0),
        },
    ])?;
    println!("Patched {} records", patch.summary.succeeded);

    println!("\nBatch delete:");
    let delete = client.batch(&[
        BatchOperation::Delete { token: t1 },
        BatchOperation::Delete { token: t2 },
        BatchOperation::Delete { token: t3 },
    ])?;
    println!("Deleted {} records", delete.summary.succeeded);

    Ok(DemoReport {
        tokens,
        store,
        mixed,
        patch,
        delete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_operation_file() {
        let ops = parse_operations(
            r#"[
                {"action": "store", "token": "a-b-c-d-e", "data": {"x": 1}, "ttl": 60},
                {"action": "retrieve", "token": "a-b-c-d-e"},
                {"action": "patch", "token": "a-b-c-d-e", "version": 2, "patch": {"set": {"x": 2}}},
                {"action": "delete", "token": "a-b-c-d-e"}
            ]"#,
        )
        .unwrap();

        let actions: Vec<_> = ops.iter().map(|o| o.action()).collect();
        assert_eq!(actions, ["store", "retrieve", "patch", "delete"]);
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(parse_operations(r#"[{"action": "upsert", "token": "x"}]"#).is_err());
        assert!(parse_operations(r#"{"action": "retrieve"}"#).is_err());
    }
}
