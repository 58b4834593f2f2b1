//! `kv patch-demo`: partial updates and optimistic concurrency.
//!
//! - `demo`: set, update, remove, and add fields one version at a time
//! - `counter`: several writer threads increment one counter through
//!   `update_with_retry`
//! - `nested`: updates deep inside a nested document

use std::thread;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};

use crate::cli::output;
use crate::cli::{client, Cli, PatchDemo};
use crate::client::{KvClient, PatchOps, PatchOptions, StoreOptions, Transport};
use crate::concurrency::{update_with_retry, RetryPolicy};
use crate::errors::{KvError, Result};

/// Execute the `patch-demo` command.
pub fn execute(cli: &Cli, demo: &PatchDemo) -> Result<()> {
    let client = client(cli)?;
    match demo {
        PatchDemo::Demo => {
            output::heading("Basic PATCH Demo");
            let final_data = run_basic(&client)?;
            println!("Final data:");
            output::json(&final_data);
            output::success("Basic PATCH demo complete!");
        }
        PatchDemo::Counter { writers } => {
            output::heading("Concurrent Counter Demo");
            println!("Simulating {writers} concurrent writers\n");
            let report = run_counter(
                &client,
                *writers,
                &RetryPolicy::default(),
                Duration::from_millis(300),
            )?;
            print_counter_report(&report, *writers);
        }
        PatchDemo::Nested => {
            output::heading("Nested Object Updates Demo");
            let final_data = run_nested(&client)?;
            let departments = final_data["departments"]
                .as_object()
                .map(|d| d.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            println!("Departments: {departments}");
            println!("Total employees: {}", total_headcount(&final_data));
            output::success("Nested updates demo complete!");
        }
    }
    Ok(())
}

fn step<T: Transport>(
    client: &KvClient<T>,
    version: u64,
    label: &str,
    ops: &PatchOps,
) -> Result<(u64, Value)> {
    let patched = client.patch(version, ops, &PatchOptions::default())?;
    println!("{label} (v{version} \u{2192} v{})", patched.version);
    Ok((patched.version, patched.data))
}

/// Run the basic walk-through and return the final stored data.
pub fn run_basic<T: Transport>(client: &KvClient<T>) -> Result<Value> {
    let initial = json!({
        "user": "alice",
        "profile": {"name": "Alice Smith", "email": "alice@example.com"},
        "settings": {"theme": "dark", "notifications": true},
        "stats": {"loginCount": 10, "lastLogin": "2025-10-20"}
    });
    let stored = client.store(&initial, &StoreOptions::default())?;
    println!("1. Stored initial data (version: {})", stored.version);

    let (version, data) = step(
        client,
        stored.version,
        "2. Updated profile.name",
        &PatchOps::new().set("profile.name", "Alice Johnson"),
    )?;
    println!("   Name: {}", data["profile"]["name"]);

    let (version, data) = step(
        client,
        version,
        "3. Updated stats and theme",
        &PatchOps::new()
            .set("stats.loginCount", 11)
            .set("stats.lastLogin", Utc::now().format("%Y-%m-%d").to_string())
            .set("settings.theme", "light"),
    )?;
    println!("   Stats: {}", data["stats"]);

    let (version, data) = step(
        client,
        version,
        "4. Removed settings.notifications",
        &PatchOps::new().remove("settings.notifications"),
    )?;
    println!("   Settings: {}", data["settings"]);

    let (_, data) = step(
        client,
        version,
        "5. Added preferences",
        &PatchOps::new()
            .set("preferences.language", "en")
            .set("preferences.timezone", "UTC"),
    )?;
    println!("   Preferences: {}\n", data["preferences"]);

    Ok(client.retrieve(None)?.data)
}

/// Outcome of the concurrent counter simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterReport {
    pub final_counter: u64,
    pub final_version: u64,
    pub attempts: u32,
    pub conflicts: u32,
    pub successful: u32,
    pub failed: u32,
}

/// Start `writers` threads that each increment the shared counter once.
///
/// Each writer pauses for a random time up to `think_time` between
/// reading and patching, which makes conflicts likely.
pub fn run_counter<T: Transport + Sync>(
    client: &KvClient<T>,
    writers: u32,
    policy: &RetryPolicy,
    think_time: Duration,
) -> Result<CounterReport> {
    if writers == 0 {
        return Err(KvError::CommandFailed("need at least one writer".into()));
    }

    let init = client.store(&json!({"counter": 0, "writers": {}}), &StoreOptions::default())?;
    println!("Counter initialized (version: {})\n", init.version);

    let outcomes: Vec<Result<_>> = thread::scope(|scope| {
        let handles: Vec<_> = (1..=writers)
            .map(|id| {
                scope.spawn(move || {
                    update_with_retry(client, &PatchOptions::default(), policy, |data| {
                        let counter = data["counter"].as_u64().unwrap_or(0);
                        let max_ms = think_time.as_millis() as u64;
                        if max_ms > 0 {
                            let pause = rand::rng().random_range(max_ms / 3..=max_ms);
                            thread::sleep(Duration::from_millis(pause));
                        }
                        Ok(PatchOps::new().set("counter", counter + 1).set(
                            format!("writers.writer_{id}"),
                            json!({"increments": 1, "timestamp": Utc::now()}),
                        ))
                    })
                    .map(|outcome| (id, outcome))
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(KvError::CommandFailed("writer thread panicked".into())))
            })
            .collect()
    });

    let mut report = CounterReport {
        final_counter: 0,
        final_version: 0,
        attempts: 0,
        conflicts: 0,
        successful: 0,
        failed: 0,
    };

    for outcome in outcomes {
        match outcome {
            Ok((id, o)) => {
                report.successful += 1;
                report.attempts += o.attempts;
                report.conflicts += o.conflicts;
                let before = o.snapshot["counter"].as_u64().unwrap_or(0);
                println!(
                    "Writer {id}: counter {before} \u{2192} {} (v{} \u{2192} v{}, {} retries)",
                    o.response.data["counter"], o.based_on, o.response.version, o.conflicts
                );
            }
            Err(KvError::RetriesExhausted { attempts }) => {
                report.failed += 1;
                report.attempts += attempts;
                report.conflicts += attempts;
            }
            Err(e) => return Err(e),
        }
    }

    let last = client.retrieve(None)?;
    report.final_counter = last.data["counter"].as_u64().unwrap_or(0);
    report.final_version = last.version;
    Ok(report)
}

fn print_counter_report(report: &CounterReport, writers: u32) {
    println!();
    output::heading("Results");
    println!("Final counter value: {}", report.final_counter);
    println!("Final version: {}", report.final_version);
    println!("Total attempts: {}", report.attempts);
    println!("Successful updates: {}", report.successful);
    println!("Conflicts encountered: {}", report.conflicts);
    println!(
        "Average retries per writer: {:.1}",
        f64::from(report.conflicts) / f64::from(writers)
    );
    if report.failed == 0 {
        output::success("All writers completed successfully!");
    } else {
        output::warning(&format!("{} writers gave up after repeated conflicts", report.failed));
    }
}

/// Run the nested-document walk-through and return the final stored data.
pub fn run_nested<T: Transport>(client: &KvClient<T>) -> Result<Value> {
    let data = json!({
        "company": "Acme Corp",
        "departments": {
            "engineering": {"headcount": 50, "budget": 5_000_000, "projects": ["api", "dashboard", "mobile"]},
            "sales": {"headcount": 30, "budget": 2_000_000, "quota": 10_000_000}
        },
        "metrics": {"revenue": 8_000_000, "growth": 0.25}
    });
    let stored = client.store(&data, &StoreOptions::default())?;
    println!("1. Stored nested structure (version: {})", stored.version);

    let (version, data) = step(
        client,
        stored.version,
        "2. Updated engineering department",
        &PatchOps::new()
            .set("departments.engineering.headcount", 55)
            .set("departments.engineering.budget", 5_500_000)
            .set("departments.engineering.lead", "Alice Johnson"),
    )?;
    println!("   Engineering: {}", data["departments"]["engineering"]);

    let (version, data) = step(
        client,
        version,
        "3. Added marketing department",
        &PatchOps::new()
            .set("departments.marketing.headcount", 20)
            .set("departments.marketing.budget", 3_000_000)
            .set("departments.marketing.channels", json!(["social", "email", "ads"])),
    )?;
    println!("   Marketing: {}", data["departments"]["marketing"]);

    let (version, data) = step(
        client,
        version,
        "4. Updated company metrics",
        &PatchOps::new()
            .set("metrics.revenue", 9_000_000)
            .set("metrics.growth", 0.30)
            .set("metrics.employees", 105),
    )?;
    println!("   Metrics: {}", data["metrics"]);

    step(
        client,
        version,
        "5. Removed departments.sales.quota",
        &PatchOps::new().remove("departments.sales.quota"),
    )?;
    println!();

    Ok(client.retrieve(None)?.data)
}

/// Sum of `headcount` over all departments.
pub fn total_headcount(data: &Value) -> u64 {
    data["departments"]
        .as_object()
        .map(|departments| {
            departments
                .values()
                .filter_map(|d| d["headcount"].as_u64())
                .sum()
        })
        .unwrap_or(0)
}
