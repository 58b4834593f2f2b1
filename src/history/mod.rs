//! Event history helpers: full pagination, statistics, and export.
//!
//! The history endpoint pages backwards by `seq`.  `fetch_all` drives
//! that cursor: each next page asks for `before = oldest seq seen`, and
//! the loop stops as soon as the service says there is nothing more, a
//! page comes back empty, the cap is reached, or the cursor fails to
//! move strictly downwards.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::client::{HistoryEvent, HistoryQuery, KvClient, Transport, MAX_HISTORY_LIMIT};
use crate::errors::Result;

/// Fetch up to `max_events` events, newest first.
///
/// `base` supplies the token and filters; its `limit` and `before` are
/// replaced by the pager.
pub fn fetch_all<T: Transport>(
    client: &KvClient<T>,
    base: &HistoryQuery,
    max_events: usize,
) -> Result<Vec<HistoryEvent>> {
    let mut events: Vec<HistoryEvent> = Vec::new();
    let mut before = base.before;

    while events.len() < max_events {
        let query = HistoryQuery {
            limit: MAX_HISTORY_LIMIT,
            before,
            ..base.clone()
        };
        let page = client.history(&query)?;
        let has_more = page.pagination.has_more;

        let fresh: Vec<HistoryEvent> = page
            .events
            .into_iter()
            .filter(|e| before.is_none_or(|b| e.seq < b))
            .collect();

        let Some(oldest) = fresh.iter().map(|e| e.seq).min() else {
            break;
        };
        debug!("history page: {} events, oldest seq {oldest}", fresh.len());
        events.extend(fresh);

        if !has_more || oldest == 0 {
            break;
        }
        before = Some(oldest);
    }

    events.truncate(max_events);
    Ok(events)
}

/// Summary statistics over a slice of history events.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryStats {
    pub total: usize,
    pub newest: Option<DateTime<Utc>>,
    pub oldest: Option<DateTime<Utc>>,
    /// Counts by `payload.type` (`unknown` when absent).
    pub event_types: Vec<(String, usize)>,
    /// Counts by classified type, for classified events only.
    pub classified_types: Vec<(String, usize)>,
    pub numeric: Option<NumericStats>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl HistoryStats {
    pub fn from_events(events: &[HistoryEvent]) -> Self {
        let timestamps: Vec<DateTime<Utc>> = events.iter().filter_map(|e| e.created_at).collect();

        let event_types = most_common(
            events
                .iter()
                .filter(|e| e.payload.is_object())
                .map(|e| e.payload_type().unwrap_or("unknown").to_string()),
        );
        let classified_types =
            most_common(events.iter().filter_map(|e| e.classified_type.clone()));

        let values: Vec<f64> = events.iter().filter_map(|e| e.numeric_value).collect();
        let numeric = (!values.is_empty()).then(|| NumericStats {
            count: values.len(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: values.iter().sum::<f64>() / values.len() as f64,
        });

        Self {
            total: events.len(),
            newest: timestamps.iter().max().copied(),
            oldest: timestamps.iter().min().copied(),
            event_types,
            classified_types,
            numeric,
        }
    }

    /// Time between oldest and newest event, if at least two are timestamped.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.oldest, self.newest) {
            (Some(first), Some(last)) if last > first => Some(last - first),
            _ => None,
        }
    }

    pub fn events_per_minute(&self) -> Option<f64> {
        let secs = self.duration()?.num_milliseconds() as f64 / 1000.0;
        (secs > 0.0).then(|| self.total as f64 / secs * 60.0)
    }
}

/// Count occurrences, most frequent first (ties broken by name).
fn most_common(items: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

/// Export document written by `kv history export`.
#[derive(Debug, Serialize)]
pub struct HistoryExport<'a> {
    pub token: &'static str,
    pub exported_at: DateTime<Utc>,
    pub event_count: usize,
    pub events: &'a [HistoryEvent],
}

impl<'a> HistoryExport<'a> {
    pub fn new(events: &'a [HistoryEvent]) -> Self {
        Self {
            token: "***hidden***",
            exported_at: Utc::now(),
            event_count: events.len(),
            events,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
