//! `kv signal`: publish synthetic sensor readings.
//!
//! Both publishing modes delete the existing record first and then
//! replace it with a fresh reading every interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::cli::output;
use crate::cli::{client, seconds, sleep_unless_stopped, stop_flag, Cli, SignalMode};
use crate::client::{HistoryQuery, KvClient, StoreOptions, Transport};
use crate::errors::{KvError, Result};
use crate::signal::{
    heat_index, parse_sensor_list, round2, sensor, SensorSpec, SignalGenerator, SignalKind,
    SignalParams,
};

/// Execute the `signal` command.
pub fn execute(cli: &Cli, mode: &SignalMode) -> Result<()> {
    let client = client(cli)?;

    match mode {
        SignalMode::Simple {
            sensor: name,
            signal,
            interval,
            iterations,
        } => {
            let pause = seconds(*interval)?;
            let spec = SensorSpec {
                config: sensor(name)?,
                params: SignalParams::default(),
            };
            output::heading("Simple Sensor Mode");
            println!("Sensor: {}  Signal: {signal}  Interval: {interval}s\n", spec.config.name);
            let stop = stop_flag()?;
            clear(&client)?;
            let n = publish(&client, &[spec], *signal, false, pause, *iterations, &stop)?;
            output::success(&format!("Stopped after {n} iterations"));
        }
        SignalMode::Complex {
            sensors,
            signal,
            interval,
            iterations,
        } => {
            let pause = seconds(*interval)?;
            let specs = parse_sensor_list(sensors)?;
            output::heading("Complex Multi-Sensor Mode");
            for spec in &specs {
                println!("  {}", spec.config.name);
            }
            println!("Signal: {signal}  Interval: {interval}s\n");
            let stop = stop_flag()?;
            clear(&client)?;
            let n = publish(&client, &specs, *signal, true, pause, *iterations, &stop)?;
            output::success(&format!("Stopped after {n} iterations"));
            if let Ok(last) = client.retrieve(None) {
                output::info(&format!("Final version: {}", last.version));
            }
        }
        SignalMode::History { limit } => show_history(&client, *limit)?,
    }
    Ok(())
}

/// Delete the current record; a missing record is fine.
pub fn clear<T: Transport>(client: &KvClient<T>) -> Result<()> {
    match client.delete(None) {
        Ok(_) => output::success("Existing data deleted"),
        Err(e) if e.is_not_found() => output::info("No existing data"),
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Build the payload for one simple-mode sample.
pub fn simple_payload(spec: &SensorSpec, value: f64, signal: SignalKind, iteration: u32) -> Value {
    json!({
        "sensor_type": spec.config.name,
        "value": round2(value),
        "unit": spec.config.unit,
        "timestamp": Utc::now(),
        "iteration": iteration,
        "signal": signal.as_str(),
    })
}

/// Build the payload for one complex-mode sample.
pub fn complex_payload(readings: &[(&SensorSpec, f64)], signal: SignalKind, iteration: u32) -> Value {
    let mut sensors = Map::new();
    for (spec, value) in readings {
        sensors.insert(
            spec.config.name.to_string(),
            json!({
                "value": round2(*value),
                "unit": spec.config.unit,
                "description": spec.config.description,
            }),
        );
    }

    let find = |name: &str| {
        readings
            .iter()
            .find(|(s, _)| s.config.name == name)
            .map(|(_, v)| round2(*v))
    };

    let mut payload = json!({
        "timestamp": Utc::now(),
        "iteration": iteration,
        "signal_type": signal.as_str(),
        "sensors": sensors,
        "system_status": "online",
        "sample_count": iteration,
    });
    if let (Some(t), Some(h)) = (find("temperature"), find("humidity")) {
        payload["heat_index"] = json!(round2(heat_index(t, h)));
    }
    payload
}

/// Store one sample per interval until `iterations` is reached or `stop` is set.
///
/// Returns the number of samples stored.
pub fn publish<T: Transport>(
    client: &KvClient<T>,
    specs: &[SensorSpec],
    signal: SignalKind,
    complex: bool,
    interval: Duration,
    iterations: Option<u32>,
    stop: &AtomicBool,
) -> Result<u32> {
    if specs.is_empty() {
        return Err(KvError::InvalidRequest("No sensors given".into()));
    }
    let mut generators: Vec<SignalGenerator> =
        specs.iter().map(|s| SignalGenerator::new(s.config)).collect();
    let mut rng = rand::rng();
    let mut iteration = 0;

    while iterations.is_none_or(|max| iteration < max) && !stop.load(Ordering::SeqCst) {
        iteration += 1;

        let values: Vec<f64> = generators
            .iter_mut()
            .zip(specs)
            .map(|(g, spec)| g.next_value(signal, &spec.params, &mut rng))
            .collect();
        let readings: Vec<(&SensorSpec, f64)> = specs.iter().zip(values).collect();

        let payload = if complex {
            complex_payload(&readings, signal, iteration)
        } else {
            simple_payload(readings[0].0, readings[0].1, signal, iteration)
        };

        let stored = client.store(&payload, &StoreOptions::default())?;
        let line: Vec<String> = readings
            .iter()
            .map(|(s, v)| format!("{}: {v:.2} {}", s.config.name, s.config.unit))
            .collect();
        println!("[{iteration:4}] {} (v{})", line.join(" | "), stored.version);

        if iterations.is_none_or(|max| iteration < max) && !sleep_unless_stopped(interval, stop) {
            break;
        }
    }
    Ok(iteration)
}

fn show_history<T: Transport>(client: &KvClient<T>, limit: u32) -> Result<()> {
    let query = HistoryQuery {
        limit,
        ..HistoryQuery::default()
    };
    let page = client.history(&query)?;
    output::info(&format!("Found {} events", page.events.len()));

    for event in &page.events {
        let when = event
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let summary = match event.payload_data() {
            Some(data) if data.get("value").is_some() => format!(
                "{}: {} {}",
                data["sensor_type"].as_str().unwrap_or("?"),
                data["value"],
                data["unit"].as_str().unwrap_or(""),
            ),
            Some(data) if data.get("sensors").is_some() => format!(
                "{} sensors (iteration: {})",
                data["sensors"].as_object().map_or(0, |s| s.len()),
                data["iteration"],
            ),
            _ => event.payload_type().unwrap_or("store").to_string(),
        };
        let classified = event.classified_type.as_deref().unwrap_or("unclassified");
        println!("[{:4}] {when} | {summary} (type: {classified})", event.seq);
    }

    if page.pagination.has_more {
        output::tip("More events available (use --limit to see more)");
    }
    Ok(())
}
