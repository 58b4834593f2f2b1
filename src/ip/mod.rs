//! Public IP tracker.
//!
//! Looks up the machine's external IP, compares it with the record
//! stored under the token, and writes back the current IP together with
//! a short history of previous addresses.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{KvClient, StoreOptions, StoreResponse, Transport};
use crate::errors::{KvError, Result};

/// Lookup services, tried in order.
pub const IP_SERVICES: &[&str] = &[
    "https://api.ipify.org?format=json",
    "https://ifconfig.me/ip",
    "https://icanhazip.com",
];

/// Number of previous addresses kept in the record.
pub const HISTORY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpHistoryEntry {
    pub ip: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// The record stored under the tracker token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpRecord {
    pub ip: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub previous_ip: Option<String>,
    #[serde(default)]
    pub history: Vec<IpHistoryEntry>,
}

impl IpRecord {
    /// Build the next record from the stored one and the current IP.
    pub fn next(stored: Option<&IpRecord>, current_ip: &str, now: DateTime<Utc>) -> Self {
        let previous_ip = stored.map(|s| s.ip.clone());
        let changed = previous_ip.as_deref() != Some(current_ip);

        let mut history: Vec<IpHistoryEntry> = stored
            .map(|s| {
                let keep = s.history.len().saturating_sub(HISTORY_LEN - 1);
                s.history[keep..].to_vec()
            })
            .unwrap_or_default();

        if let (true, Some(prev)) = (changed, stored) {
            history.push(IpHistoryEntry {
                ip: prev.ip.clone(),
                timestamp: Some(prev.last_updated),
            });
        }

        Self {
            ip: current_ip.to_string(),
            last_updated: now,
            changed,
            previous_ip,
            history,
        }
    }
}

/// Result of one tracker run.
#[derive(Debug, Clone)]
pub struct IpUpdate {
    pub current_ip: String,
    pub previous_ip: Option<String>,
    pub changed: bool,
    pub stored: StoreResponse,
}

/// Read the stored record; `None` when nothing (or something foreign) is stored.
pub fn stored_record<T: Transport>(client: &KvClient<T>) -> Result<Option<IpRecord>> {
    match client.retrieve(None) {
        Ok(resp) => Ok(serde_json::from_value(resp.data).ok()),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Store `current_ip`, recording a change if it differs from the stored IP.
pub fn update<T: Transport>(client: &KvClient<T>, current_ip: &str) -> Result<IpUpdate> {
    let stored = stored_record(client)?;
    let record = IpRecord::next(stored.as_ref(), current_ip, Utc::now());

    let response = client.store(&serde_json::to_value(&record)?, &StoreOptions::default())?;

    Ok(IpUpdate {
        current_ip: record.ip,
        previous_ip: record.previous_ip,
        changed: record.changed,
        stored: response,
    })
}

/// Parse a lookup service body: `{"ip": ".."}` or a bare address.
pub fn parse_ip_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed).ok()?;
        return value.get("ip")?.as_str().map(str::to_string);
    }
    Some(trimmed.to_string())
}

/// Ask each lookup service in turn for the external IP.
pub fn external_ip(timeout: Duration) -> Result<String> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into();

    for service in IP_SERVICES {
        let body = agent
            .get(*service)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string());

        match body {
            Ok(text) => match parse_ip_body(&text) {
                Some(ip) => {
                    debug!("external IP {ip} from {service}");
                    return Ok(ip);
                }
                None => warn!("unexpected response from {service}"),
            },
            Err(e) => warn!("failed to get IP from {service}: {e}"),
        }
    }

    Err(KvError::Transport(
        "failed to get external IP from all services".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    #[test]
    fn first_run_has_no_previous_ip() {
        let record = IpRecord::next(None, "203.0.113.7", at("2025-01-01T00:00:00Z"));
        assert!(record.changed);
        assert!(record.previous_ip.is_none());
        assert!(record.history.is_empty());
    }

    #[test]
    fn unchanged_ip_keeps_history() {
        let stored = IpRecord {
            ip: "203.0.113.7".into(),
            last_updated: at("2025-01-01T00:00:00Z"),
            changed: true,
            previous_ip: None,
            history: vec![],
        };
        let record = IpRecord::next(Some(&stored), "203.0.113.7", at("2025-01-01T00:05:00Z"));
        assert!(!record.changed);
        assert_eq!(record.previous_ip.as_deref(), Some("203.0.113.7"));
        assert!(record.history.is_empty());
    }

    #[test]
    fn change_appends_previous_ip_and_caps_history() {
        let history: Vec<IpHistoryEntry> = (0..12)
            .map(|i| IpHistoryEntry {
                ip: format!("10.0.0.{i}"),
                timestamp: None,
            })
            .collect();
        let stored = IpRecord {
            ip: "203.0.113.7".into(),
            last_updated: at("2025-01-01T00:00:00Z"),
            changed: false,
            previous_ip: None,
            history,
        };

        let record = IpRecord::next(Some(&stored), "198.51.100.1", at("2025-01-02T00:00:00Z"));
        assert!(record.changed);
        assert_eq!(record.history.len(), HISTORY_LEN);
        assert_eq!(record.history[0].ip, "10.0.0.3");
        let last = record.history.last().unwrap();
        assert_eq!(last.ip, "203.0.113.7");
        assert_eq!(last.timestamp, Some(at("2025-01-01T00:00:00Z")));
    }

    #[test]
    fn parses_json_and_plain_bodies() {
        assert_eq!(
            parse_ip_body(r#"{"ip":"203.0.113.7"}"#).as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(parse_ip_body("198.51.100.1\n").as_deref(), Some("198.51.100.1"));
        assert!(parse_ip_body("  ").is_none());
        assert!(parse_ip_body(r#"{"addr":"x"}"#).is_none());
    }
}
