//! `kv clipboard`: share clipboard text through the record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;

use crate::cli::output;
use crate::cli::{client, sleep_unless_stopped, stop_flag, Cli, ClipboardAction, MonitorMode};
use crate::client::{KvClient, Transport};
use crate::clipboard::{self, Clipboard, ClipboardMonitor, ClipboardRecord, SystemClipboard};
use crate::errors::{KvError, Result};

/// Execute the `clipboard` command.
pub fn execute(cli: &Cli, action: &ClipboardAction) -> Result<()> {
    let client = client(cli)?;

    match action {
        ClipboardAction::Push => {
            let mut local = SystemClipboard::new()?;
            match clipboard::push(&client, &mut local)? {
                Some(record) => {
                    output::success(&format!("Pushed {} characters", record.length));
                    println!("{}", record.preview());
                }
                None => output::warning("Local clipboard is empty, nothing pushed."),
            }
        }
        ClipboardAction::Pull => {
            let mut local = SystemClipboard::new()?;
            match clipboard::pull(&client, &mut local)? {
                Some(record) => {
                    output::success(&format!(
                        "Pulled {} characters from {}",
                        record.length, record.device
                    ));
                    println!("{}", record.preview());
                }
                None => output::info("Cloud clipboard is empty."),
            }
        }
        ClipboardAction::Status => match clipboard::fetch(&client)? {
            Some(record) => print_status(&record),
            None => output::info("Cloud clipboard is empty."),
        },
        ClipboardAction::Monitor { interval, mode } => {
            let mut local = SystemClipboard::new()?;
            let stop = stop_flag()?;
            output::info(&format!(
                "Monitoring clipboard ({} mode, every {interval}s)",
                match mode {
                    MonitorMode::Push => "push",
                    MonitorMode::Pull => "pull",
                }
            ));
            output::tip("Press Ctrl+C to stop");
            let syncs = monitor(
                &client,
                &mut local,
                *mode,
                Duration::from_secs(*interval),
                None,
                &stop,
            )?;
            output::info(&format!("Monitoring stopped after {syncs} syncs"));
        }
    }
    Ok(())
}

fn print_status(record: &ClipboardRecord) {
    output::heading("Cloud Clipboard");
    println!("Device:  {}", record.device);
    println!("Length:  {} characters", record.length);
    println!("Updated: {}", record.timestamp.to_rfc3339());
    println!("\n{}", record.preview());
}

/// Poll until `max_polls` is reached or `stop` is set, syncing in the
/// direction given by `mode`. Transient errors are reported and skipped.
///
/// Returns the number of polls that synced something.
pub fn monitor<T: Transport>(
    client: &KvClient<T>,
    local: &mut dyn Clipboard,
    mode: MonitorMode,
    interval: Duration,
    max_polls: Option<u32>,
    stop: &AtomicBool,
) -> Result<u32> {
    let mut tracker = ClipboardMonitor::new();
    let mut polls = 0;
    let mut syncs = 0;

    while max_polls.is_none_or(|max| polls < max) && !stop.load(Ordering::SeqCst) {
        polls += 1;
        let result = match mode {
            MonitorMode::Push => tracker.poll_push(client, local),
            MonitorMode::Pull => tracker.poll_pull(client, local),
        };
        let now = Local::now().format("%H:%M:%S");

        match result {
            Ok(Some(record)) => {
                syncs += 1;
                let verb = match mode {
                    MonitorMode::Push => "Pushed",
                    MonitorMode::Pull => "Pulled",
                };
                println!("[{now}] {verb} {} characters: {}", record.length, record.preview());
            }
            Ok(None) => {}
            Err(e @ KvError::MissingToken { .. }) => return Err(e),
            Err(e) => output::error(&format!("[{now}] {e}")),
        }

        if max_polls.is_none_or(|max| polls < max) && !sleep_unless_stopped(interval, stop) {
            break;
        }
    }
    Ok(syncs)
}
