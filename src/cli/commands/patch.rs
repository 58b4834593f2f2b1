//! `kv patch`: apply set/remove operations against a known version.

use crate::cli::output;
use crate::cli::{client, parse_set_arg, Cli};
use crate::client::{PatchOps, PatchOptions};
use crate::errors::{KvError, Result};

/// Build the operation set from repeated `--set` / `--remove` flags.
pub fn build_ops(set: &[String], remove: &[String]) -> Result<PatchOps> {
    let mut ops = PatchOps::new();
    for arg in set {
        let (path, value) = parse_set_arg(arg)?;
        ops = ops.set(path, value);
    }
    for path in remove {
        ops = ops.remove(path.trim());
    }
    Ok(ops)
}

/// Execute the `patch` command.
pub fn execute(
    cli: &Cli,
    version: u64,
    set: &[String],
    remove: &[String],
    ttl: Option<u64>,
) -> Result<()> {
    let ops = build_ops(set, remove)?;
    if ops.is_empty() && ttl.is_none() {
        return Err(KvError::CommandFailed(
            "nothing to do: pass --set, --remove or --ttl".into(),
        ));
    }

    let client = client(cli)?;
    let options = PatchOptions { token: None, ttl };

    match client.patch(version, &ops, &options) {
        Ok(patched) => {
            output::success(&format!("Patched (v{version} \u{2192} v{})", patched.version));
            output::json(&patched.data);
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            output::tip("The record changed since that version. Run `kv get` and retry.");
            Err(e)
        }
        Err(e) => Err(e),
    }
}
