//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::client::KvClient;
use crate::config::Settings;
use crate::errors::{KvError, Result};
use crate::signal::SignalKind;

/// Command-line client for the key-value.co store.
#[derive(Parser)]
#[command(
    name = "kv",
    about = "Command-line client for the key-value.co store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL (default: https://key-value.co)
    #[arg(long, env = "API_URL", global = true)]
    pub url: Option<String>,

    /// Token identifying the record to operate on
    #[arg(long, env = "KV_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log requests and responses to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate new tokens
    Generate {
        /// Number of tokens to generate
        #[arg(short, long, default_value = "1")]
        count: u32,
        /// Turnstile captcha token, if the service requires one
        #[arg(long)]
        captcha: Option<String>,
    },

    /// Store JSON data under the token (replaces existing data)
    Store {
        /// JSON document, or `-` to read from stdin
        data: String,
        /// Time-to-live in seconds
        #[arg(long)]
        ttl: Option<u64>,
        /// JSON schema file to validate against on the server
        #[arg(long)]
        schema: Option<String>,
    },

    /// Retrieve the data stored under the token
    Get {
        /// Print only the data, without version metadata
        #[arg(long)]
        raw: bool,
    },

    /// Delete the data stored under the token
    Delete {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
        /// Show the current data before deleting
        #[arg(long)]
        show: bool,
    },

    /// Apply a partial update against a known version
    Patch {
        /// Version the update is based on
        #[arg(long)]
        version: u64,
        /// Set a dot-notation path, e.g. `stats.count=42`
        #[arg(long = "set", value_name = "PATH=JSON")]
        set: Vec<String>,
        /// Remove a dot-notation path
        #[arg(long = "remove", value_name = "PATH")]
        remove: Vec<String>,
        /// New time-to-live in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Walk through partial updates and version conflicts
    PatchDemo {
        #[command(subcommand)]
        demo: PatchDemo,
    },

    /// Run a list of operations from a JSON file in one request
    Batch {
        /// File holding a JSON array of operations
        file: String,
    },

    /// Generate tokens and run store/retrieve/patch/delete batches on them
    BatchDemo,

    /// Query, analyze, and export the event history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Store and read client-side encrypted data
    Encrypt {
        #[command(subcommand)]
        action: EncryptAction,
    },

    /// Create and read one-time secrets
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Create, update, delete, and verify a record end to end
    Lifecycle,

    /// Delete the record if it is test data or expiring
    Cleanup {
        /// Delete regardless of content
        #[arg(long)]
        force: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Track this machine's public IP address
    Ip {
        #[command(subcommand)]
        action: IpAction,
    },

    /// Publish synthetic sensor signals
    Signal {
        #[command(subcommand)]
        mode: SignalMode,
    },

    /// Sync the clipboard between devices
    Clipboard {
        #[command(subcommand)]
        action: ClipboardAction,
    },

    /// Manage the stored default token
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

#[derive(clap::Subcommand)]
pub enum PatchDemo {
    /// Set, update, and remove fields step by step
    Demo,
    /// Concurrent writers incrementing a shared counter
    Counter {
        /// Number of simulated writers
        #[arg(short, long, default_value = "5")]
        writers: u32,
    },
    /// Updates deep inside a nested document
    Nested,
}

#[derive(clap::Subcommand)]
pub enum HistoryAction {
    /// Show one page of events
    View {
        #[arg(long, default_value = "50")]
        limit: u32,
        /// Only events with a lower sequence number
        #[arg(long)]
        before: Option<u64>,
        /// Only events since this ISO-8601 timestamp
        #[arg(long)]
        since: Option<String>,
        /// Only events of this type
        #[arg(long = "type")]
        event_type: Option<String>,
    },
    /// Fetch all events and print statistics
    Analyze {
        #[arg(long, default_value = "1000")]
        max_events: usize,
    },
    /// Write all events to a JSON file
    Export {
        #[arg(short, long, default_value = "history.json")]
        output: String,
        #[arg(long, default_value = "1000")]
        max_events: usize,
    },
    /// Produce a stream of updates to populate the history
    Generate {
        #[arg(short, long, default_value = "20")]
        count: u32,
        /// Seconds between updates
        #[arg(long, default_value = "0.2")]
        interval: f64,
    },
}

#[derive(clap::Subcommand)]
pub enum EncryptAction {
    /// Encrypt a JSON document locally and store it
    Store {
        /// JSON document, or `-` to read from stdin
        data: String,
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Retrieve and decrypt the stored document
    Read {
        /// Decryption password (otherwise KV_PASSWORD or a prompt)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(clap::Subcommand)]
pub enum SecretAction {
    /// Store a secret that can be read once (uses --token or generates one)
    Create {
        /// The secret to share
        text: String,
        /// Password-protect the secret
        #[arg(long, conflicts_with = "prompt_password")]
        password: Option<String>,
        /// Prompt for a password
        #[arg(long)]
        prompt_password: bool,
        /// Time-to-live in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Reveal a secret and mark it consumed
    Read {
        /// The secret's token
        #[arg(value_name = "TOKEN")]
        secret_token: String,
        #[arg(long, conflicts_with = "prompt_password")]
        password: Option<String>,
        #[arg(long)]
        prompt_password: bool,
    },
}

#[derive(clap::Subcommand)]
pub enum IpAction {
    /// Look up the current IP and store it once
    Update,
    /// Show the stored IP record
    Get,
    /// Check periodically and record changes
    Monitor {
        /// Seconds between checks
        #[arg(long, default_value = "300")]
        interval: u64,
        /// Stop after this many checks
        #[arg(long)]
        max_runs: Option<u32>,
    },
}

#[derive(clap::Subcommand)]
pub enum SignalMode {
    /// One sensor, one value per sample
    Simple {
        /// Sensor type or alias (temp, hum, press, mem, volt, vib, pwr)
        #[arg(long = "type", default_value = "temperature")]
        sensor: String,
        #[arg(long, default_value = "sine", value_parser = parse_signal)]
        signal: SignalKind,
        /// Seconds between samples
        #[arg(long, default_value = "2")]
        interval: f64,
        /// Stop after this many samples
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Several sensors per sample, e.g. `temp:amp=10:freq=0.2,hum,press`
    Complex {
        #[arg(long, default_value = "temperature,humidity,pressure")]
        sensors: String,
        #[arg(long, default_value = "random-walk", value_parser = parse_signal)]
        signal: SignalKind,
        #[arg(long, default_value = "5")]
        interval: f64,
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Show recent sensor events
    History {
        #[arg(long, default_value = "50")]
        limit: u32,
    },
}

#[derive(clap::Subcommand)]
pub enum ClipboardAction {
    /// Upload the local clipboard
    Push,
    /// Copy the cloud clipboard to the local one
    Pull,
    /// Show what is in the cloud clipboard
    Status,
    /// Keep syncing until interrupted
    Monitor {
        /// Seconds between checks
        #[arg(long, default_value = "2")]
        interval: u64,
        #[arg(long, value_enum, default_value = "push")]
        mode: MonitorMode,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum MonitorMode {
    /// Push local changes
    Push,
    /// Pull cloud changes
    Pull,
}

/// Auth subcommands.
#[derive(clap::Subcommand)]
pub enum AuthAction {
    /// Save the --token value to the OS keyring as the default token
    Keyring {
        /// Remove the token from the keyring instead of saving
        #[arg(long)]
        delete: bool,
    },
}

fn parse_signal(s: &str) -> std::result::Result<SignalKind, String> {
    s.parse().map_err(|e: KvError| e.to_string())
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve settings: `.keyvalue.toml`, then `API_URL` / `KV_TOKEN` / flags.
///
/// With the `keyring-store` feature a token saved by `kv auth keyring`
/// is used when nothing else provides one.
pub fn settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    #[allow(unused_mut)]
    let mut settings = Settings::load(&cwd)?.apply_overrides(
        cli.url.as_deref(),
        cli.token.as_deref(),
        cli.timeout,
    );

    #[cfg(feature = "keyring-store")]
    if settings.token.is_none() {
        match crate::keyring::get_token(&settings.api_url) {
            Ok(token) => settings.token = token,
            Err(e) => log::debug!("keyring lookup skipped: {e}"),
        }
    }

    Ok(settings)
}

/// Build a client from the resolved settings.
pub fn client(cli: &Cli) -> Result<KvClient> {
    Ok(KvClient::new(settings(cli)?.client_config()))
}

/// The token every record-level command needs.
pub fn require_token(cli: &Cli, operation: &'static str) -> Result<String> {
    settings(cli)?
        .token
        .ok_or(KvError::MissingToken { operation })
}

/// Parse a JSON document argument; `-` reads stdin.
pub fn read_json_arg(arg: &str) -> Result<Value> {
    let text = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        arg.to_string()
    };

    serde_json::from_str(&text)
        .map_err(|e| KvError::CommandFailed(format!("invalid JSON data: {e}")))
}

/// Parse a `path=value` argument. The value is JSON when it parses as
/// JSON and a plain string otherwise.
pub fn parse_set_arg(arg: &str) -> Result<(String, Value)> {
    let (path, raw) = arg
        .split_once('=')
        .ok_or_else(|| KvError::CommandFailed(format!("expected PATH=VALUE, got '{arg}'")))?;

    let path = path.trim();
    if path.is_empty() {
        return Err(KvError::CommandFailed(format!("empty path in '{arg}'")));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((path.to_string(), value))
}

/// Get the encryption password, trying in order:
/// 1. the explicit `--password` value
/// 2. `KV_PASSWORD` env var (scripted use)
/// 3. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password(explicit: Option<&str>) -> Result<Zeroizing<String>> {
    if let Some(pw) = explicit.filter(|p| !p.is_empty()) {
        return Ok(Zeroizing::new(pw.to_string()));
    }

    if let Ok(pw) = std::env::var("KV_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter password")
        .interact()
        .map_err(|e| KvError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation. Respects `KV_PASSWORD`.
pub fn prompt_new_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("KV_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Choose password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map_err(|e| KvError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Ask a yes/no question, defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| KvError::CommandFailed(format!("confirm prompt: {e}")))
}

/// Install a Ctrl-C handler and return the flag it sets.
pub fn stop_flag() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .map_err(|e| KvError::CommandFailed(format!("failed to install Ctrl-C handler: {e}")))?;
    Ok(stop)
}

/// Sleep for `duration`, returning early once `stop` is set.
///
/// Returns `false` if the sleep was interrupted.
pub fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
    false
}

/// Seconds (possibly fractional, never negative) as a `Duration`.
pub fn seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs.max(0.0))
        .map_err(|_| KvError::CommandFailed(format!("invalid interval: {secs} seconds")))
}

/// Shorten a token for display.
pub fn token_preview(token: &str) -> String {
    let head: String = token.chars().take(20).collect();
    if head.len() < token.len() {
        format!("{head}...")
    } else {
        head
    }
}
