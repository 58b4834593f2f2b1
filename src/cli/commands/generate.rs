//! `kv generate`: ask the service for fresh tokens.

use crate::cli::output;
use crate::cli::{client, Cli};
use crate::errors::{KvError, Result};

/// Execute the `generate` command.
pub fn execute(cli: &Cli, count: u32, captcha: Option<&str>) -> Result<()> {
    if count == 0 {
        return Err(KvError::CommandFailed("count must be at least 1".into()));
    }

    let client = client(cli)?;
    for _ in 0..count {
        let generated = client.generate(captcha)?;
        println!("{}", generated.token);
    }

    if count == 1 {
        output::tip("Use it with `--token <TOKEN>` or export KV_TOKEN.");
    }
    Ok(())
}
