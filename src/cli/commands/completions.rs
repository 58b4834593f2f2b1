//! `kv completions`: print a shell completion script.
//!
//! Usage:
//!   kv completions bash > ~/.bash_completion.d/kv
//!   kv completions zsh

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::{KvError, Result};

/// Execute the `completions` command.
pub fn execute(shell: &str) -> Result<()> {
    let mut cmd = Cli::command();
    generate(parse_shell(shell)?, &mut cmd, "kv", &mut io::stdout());
    Ok(())
}

fn parse_shell(name: &str) -> Result<Shell> {
    match name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" | "ps" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        other => Err(KvError::CommandFailed(format!(
            "unknown shell '{other}' (supported: bash, zsh, fish, powershell, elvish)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_shells() {
        assert_eq!(parse_shell("bash").unwrap(), Shell::Bash);
        assert_eq!(parse_shell("Zsh").unwrap(), Shell::Zsh);
        assert_eq!(parse_shell("ps").unwrap(), Shell::PowerShell);
    }

    #[test]
    fn unknown_shell_fails() {
        let err = parse_shell("csh").unwrap_err();
        assert!(err.to_string().contains("unknown shell 'csh'"));
        assert!(parse_shell("").is_err());
    }
}
