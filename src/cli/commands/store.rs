//! `kv store`: replace the record with a JSON document.

use std::fs;

use serde_json::Value;

use crate::cli::output;
use crate::cli::{client, read_json_arg, Cli};
use crate::client::StoreOptions;
use crate::errors::{KvError, Result};

/// Execute the `store` command.
pub fn execute(cli: &Cli, data: &str, ttl: Option<u64>, schema: Option<&str>) -> Result<()> {
    let data = read_json_arg(data)?;
    let schema = schema.map(load_schema).transpose()?;

    let client = client(cli)?;
    let options = StoreOptions {
        token: None,
        ttl,
        schema,
    };
    let stored = client.store(&data, &options)?;

    output::success(&format!("Stored (version: {})", stored.version));
    if let Some(size) = stored.size {
        let tier = stored.tier.as_deref().unwrap_or("unknown");
        output::info(&format!("Size: {size} bytes, tier: {tier}"));
    }
    if let Some(expires) = stored.expires_at {
        output::info(&format!("Expires: {}", expires.to_rfc3339()));
    }
    Ok(())
}

fn load_schema(path: &str) -> Result<Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| KvError::CommandFailed(format!("failed to read schema {path}: {e}")))?;
    serde_json::from_str(&text)
        .map_err(|e| KvError::CommandFailed(format!("schema {path} is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_schema_reads_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(&path, r#"{"type":"object","required":["temperature"]}"#).unwrap();

        let schema = load_schema(path.to_str().unwrap()).unwrap();
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn load_schema_rejects_missing_and_invalid() {
        let dir = TempDir::new().unwrap();
        assert!(load_schema(dir.path().join("nope.json").to_str().unwrap()).is_err());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{oops").unwrap();
        assert!(load_schema(bad.to_str().unwrap()).is_err());
    }
}
