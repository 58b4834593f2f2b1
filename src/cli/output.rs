//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;
use serde_json::Value;

use crate::client::{BatchResponse, HistoryEvent};
use crate::cli::token_preview;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a bold section heading.
pub fn heading(msg: &str) {
    println!("{}\n", style(format!("=== {msg} ===")).bold());
}

/// Pretty-print a JSON value.
pub fn json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

/// Render at most `max_keys` top-level fields of an object.
pub fn data_preview(data: &Value, max_keys: usize) -> String {
    match data {
        Value::Object(map) => {
            let head: serde_json::Map<String, Value> = map
                .iter()
                .take(max_keys)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut text = Value::Object(head).to_string();
            if map.len() > max_keys {
                text.push_str(&format!(" (+{} more)", map.len() - max_keys));
            }
            text
        }
        other => other.to_string(),
    }
}

/// Print a table of history events (Seq, Created, Type, Classified, Value, Data).
pub fn print_history_table(events: &[HistoryEvent]) {
    if events.is_empty() {
        info("No events found.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Seq", "Created", "Type", "Classified", "Value", "Data"]);

    for e in events {
        let value = match (e.numeric_value, e.text_value.as_deref()) {
            (Some(n), _) => n.to_string(),
            (None, Some(t)) => t.to_string(),
            (None, None) => String::new(),
        };
        table.add_row(vec![
            e.seq.to_string(),
            e.created_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            e.payload_type().unwrap_or("unknown").to_string(),
            e.classified_type.clone().unwrap_or_else(|| "unclassified".into()),
            value,
            e.payload_data().map(|d| data_preview(d, 3)).unwrap_or_default(),
        ]);
    }

    println!("{table}");
}

/// Print per-operation batch results followed by the summary line.
pub fn print_batch_results(response: &BatchResponse) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Action", "Token", "Result"]);

    for (i, r) in response.results.iter().enumerate() {
        let outcome = if r.success {
            let mut text = style("ok").green().to_string();
            if let Some(v) = r.version {
                text.push_str(&format!(" v{v}"));
            }
            if let Some(data) = &r.data {
                text.push_str(&format!(" {}", data_preview(data, 3)));
            }
            text
        } else {
            style(r.error.as_deref().unwrap_or("failed")).red().to_string()
        };
        table.add_row(vec![
            (i + 1).to_string(),
            r.action.clone(),
            token_preview(&r.token),
            outcome,
        ]);
    }

    println!("{table}");
    let s = &response.summary;
    println!(
        "Total: {}  Succeeded: {}  Failed: {}  Success rate: {}",
        s.total, s.succeeded, s.failed, s.success_rate
    );
}
