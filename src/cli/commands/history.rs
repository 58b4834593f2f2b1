//! `kv history`: view, analyze, export, and generate event history.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::json;

use crate::cli::output;
use crate::cli::{client, seconds, Cli, HistoryAction};
use crate::client::{HistoryQuery, KvClient, PatchOps, PatchOptions, StoreOptions, Transport};
use crate::errors::{KvError, Result};
use crate::history::{fetch_all, HistoryExport, HistoryStats};

const STATUSES: &[&str] = &["active", "idle", "busy", "maintenance"];

/// Execute the `history` command.
pub fn execute(cli: &Cli, action: &HistoryAction) -> Result<()> {
    let client = client(cli)?;

    match action {
        HistoryAction::View {
            limit,
            before,
            since,
            event_type,
        } => view(&client, *limit, *before, since.clone(), event_type.clone()),
        HistoryAction::Analyze { max_events } => analyze(&client, *max_events),
        HistoryAction::Export { output, max_events } => {
            export(&client, Path::new(output), *max_events)
        }
        HistoryAction::Generate { count, interval } => {
            let pause = seconds(*interval)?;
            output::heading(&format!("Generating {count} Test Events"));
            let version = generate(&client, *count, pause)?;
            output::success(&format!("Generated {count} events (latest version: {version})"));
            Ok(())
        }
    }
}

fn view<T: Transport>(
    client: &KvClient<T>,
    limit: u32,
    before: Option<u64>,
    since: Option<String>,
    event_type: Option<String>,
) -> Result<()> {
    let query = HistoryQuery {
        limit,
        before,
        since,
        event_type,
        ..HistoryQuery::default()
    };
    let page = client.history(&query)?;

    output::info(&format!("Showing {} events", page.events.len()));
    if let Some(before) = page.pagination.before {
        output::info(&format!("Before seq: {before}"));
    }
    if let Some(since) = &page.pagination.since {
        output::info(&format!("Since: {since}"));
    }
    output::print_history_table(&page.events);

    match page.events.iter().map(|e| e.seq).min() {
        Some(oldest) if page.pagination.has_more => output::tip(&format!(
            "More events available. Use --before {oldest} to fetch the next page."
        )),
        _ => output::info("No more events."),
    }
    Ok(())
}

fn analyze<T: Transport>(client: &KvClient<T>, max_events: usize) -> Result<()> {
    output::info("Fetching all events...");
    let events = fetch_all(client, &HistoryQuery::default(), max_events)?;
    if events.is_empty() {
        output::info("No events to analyze.");
        return Ok(());
    }

    let stats = HistoryStats::from_events(&events);
    print_stats(&stats);
    Ok(())
}

fn print_stats(stats: &HistoryStats) {
    let fmt = |t: Option<chrono::DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".into())
    };

    println!("Basic statistics:");
    println!("  Total events: {}", stats.total);
    println!("  Oldest event: {}", fmt(stats.oldest));
    println!("  Newest event: {}", fmt(stats.newest));

    println!("\nEvent types:");
    for (kind, count) in &stats.event_types {
        println!("  {kind}: {count}");
    }

    if !stats.classified_types.is_empty() {
        println!("\nClassified types:");
        for (kind, count) in &stats.classified_types {
            println!("  {kind}: {count}");
        }
    }

    if let Some(n) = &stats.numeric {
        println!("\nNumeric values:");
        println!("  Count: {}", n.count);
        println!("  Min: {}", n.min);
        println!("  Max: {}", n.max);
        println!("  Avg: {:.2}", n.mean);
    }

    if let Some(duration) = stats.duration() {
        println!("\nTime range:");
        println!("  Duration: {}s", duration.num_seconds());
        if let Some(rate) = stats.events_per_minute() {
            println!("  Avg rate: {rate:.2} events/minute");
        }
    }
}

fn export<T: Transport>(client: &KvClient<T>, path: &Path, max_events: usize) -> Result<()> {
    output::info("Fetching all events...");
    let events = fetch_all(client, &HistoryQuery::default(), max_events)?;
    if events.is_empty() {
        output::info("No events to export.");
        return Ok(());
    }

    HistoryExport::new(&events).write_to(path)?;
    output::success(&format!("Exported {} events to {}", events.len(), path.display()));
    Ok(())
}

/// Store an initial record and apply `count - 1` random patches to it.
///
/// Returns the final version.
pub fn generate<T: Transport>(client: &KvClient<T>, count: u32, interval: Duration) -> Result<u64> {
    if count == 0 {
        return Err(KvError::CommandFailed("count must be at least 1".into()));
    }

    let initial = json!({
        "counter": 0,
        "status": "active",
        "metadata": {"created": Utc::now(), "source": "kv history generate"}
    });
    let mut version = client.store(&initial, &StoreOptions::default())?.version;
    println!("Initialized (version: {version})");

    let mut rng = rand::rng();
    for i in 1..count {
        let (ops, label) = match rng.random_range(0..3) {
            0 => (
                PatchOps::new().set("counter", i),
                format!("Incremented counter to {i}"),
            ),
            1 => {
                let status = STATUSES.choose(&mut rng).copied().unwrap_or("active");
                (
                    PatchOps::new().set("status", status),
                    format!("Changed status to '{status}'"),
                )
            }
            _ => (
                PatchOps::new()
                    .set("metadata.last_update", json!(Utc::now()))
                    .set("metadata.update_count", i),
                "Updated metadata".to_string(),
            ),
        };

        let patched = client.patch(version, &ops, &PatchOptions::default())?;
        println!("[{i:3}] {label} (v{version} \u{2192} v{})", patched.version);
        version = patched.version;

        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    Ok(version)
}
