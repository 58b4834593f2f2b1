//! `kv ip`: record this machine's public IP under the token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;

use crate::cli::output;
use crate::cli::{settings, sleep_unless_stopped, stop_flag, Cli, IpAction};
use crate::client::{KvClient, Transport};
use crate::errors::{KvError, Result};
use crate::ip::{self, IpUpdate};

/// Execute the `ip` command.
pub fn execute(cli: &Cli, action: &IpAction) -> Result<()> {
    let settings = settings(cli)?;
    let config = settings.client_config();
    let timeout = config.timeout;
    let client = KvClient::new(config);

    match action {
        IpAction::Update => {
            let update = ip::update(&client, &ip::external_ip(timeout)?)?;
            print_update(&update);
        }
        IpAction::Get => match ip::stored_record(&client)? {
            Some(record) => {
                println!("IP: {}", record.ip);
                println!("Last updated: {}", record.last_updated.to_rfc3339());
                println!("Changed: {}", record.changed);
                if let Some(prev) = &record.previous_ip {
                    println!("Previous IP: {prev}");
                }
                if !record.history.is_empty() {
                    println!("History:");
                    for entry in &record.history {
                        let when = entry
                            .timestamp
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "unknown".into());
                        println!("  {} ({when})", entry.ip);
                    }
                }
            }
            None => output::info("No IP data stored yet."),
        },
        IpAction::Monitor { interval, max_runs } => {
            let stop = stop_flag()?;
            output::info(&format!("Starting IP monitor (checking every {interval}s)"));
            output::tip("Press Ctrl+C to stop");
            let runs = monitor(
                &client,
                || ip::external_ip(timeout),
                Duration::from_secs(*interval),
                *max_runs,
                &stop,
            );
            output::info(&format!("Monitoring stopped after {runs} checks"));
        }
    }
    Ok(())
}

fn print_update(update: &IpUpdate) {
    if update.changed {
        output::success(&format!("IP updated: {}", update.current_ip));
        if let Some(prev) = &update.previous_ip {
            output::info(&format!("Previous IP: {prev}"));
        }
    } else {
        output::info(&format!("IP unchanged: {}", update.current_ip));
    }
    output::info(&format!("Version: {}", update.stored.version));
}

/// Check the IP every `interval` until `max_runs` is reached or `stop`
/// is set. Errors in one round are reported and do not end the loop.
///
/// Returns the number of checks performed.
pub fn monitor<T, F>(
    client: &KvClient<T>,
    mut lookup: F,
    interval: Duration,
    max_runs: Option<u32>,
    stop: &AtomicBool,
) -> u32
where
    T: Transport,
    F: FnMut() -> Result<String>,
{
    let mut runs = 0;
    while max_runs.is_none_or(|max| runs < max) && !stop.load(Ordering::SeqCst) {
        runs += 1;
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");

        match lookup().and_then(|current| ip::update(client, &current)) {
            Ok(update) if update.changed => {
                println!("[{now}] IP CHANGED!");
                println!("  Old: {}", update.previous_ip.as_deref().unwrap_or("none"));
                println!("  New: {}", update.current_ip);
            }
            Ok(update) => println!("[{now}] IP unchanged: {}", update.current_ip),
            Err(e @ KvError::MissingToken { .. }) => {
                output::error(&e.to_string());
                break;
            }
            Err(e) => output::error(&format!("[{now}] {e}")),
        }

        let more = max_runs.is_none_or(|max| runs < max);
        if more && !sleep_unless_stopped(interval, stop) {
            break;
        }
    }
    runs
}
