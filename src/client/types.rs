//! Request and response types for the Key-Value API.
//!
//! Request bodies are explicit structs: every optional field carries a
//! `skip_serializing_if` so an unset option is omitted from the JSON
//! rather than sent as `null`.  Response structs default every field the
//! service may leave out.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Maximum number of operations accepted in one batch request.
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// Maximum page size accepted by the history endpoint.
pub const MAX_HISTORY_LIMIT: u32 = 200;

/// Page size used when the caller does not pick one.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

// ── Per-call options ─────────────────────────────────────────────────

/// Options for `KvClient::store`.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Token override (defaults to the client token).
    pub token: Option<String>,
    /// Time-to-live in seconds.
    pub ttl: Option<u64>,
    /// JSON schema the service validates `data` against.
    pub schema: Option<Value>,
}

impl StoreOptions {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }
}

/// Options for `KvClient::patch`.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    pub token: Option<String>,
    pub ttl: Option<u64>,
}

impl PatchOptions {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ttl: None,
        }
    }
}

/// Query for `KvClient::history`.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub token: Option<String>,
    /// Page size, 1..=200.
    pub limit: u32,
    /// Only events with `seq < before`.
    pub before: Option<u64>,
    /// Only events created at or after this ISO-8601 timestamp.
    pub since: Option<String>,
    /// Only events with this classified type.
    pub event_type: Option<String>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            token: None,
            limit: DEFAULT_HISTORY_LIMIT,
            before: None,
            since: None,
            event_type: None,
        }
    }
}

// ── Request bodies ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    #[serde(rename = "turnstileToken", skip_serializing_if = "Option::is_none")]
    pub turnstile_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StoreBody<'a> {
    pub data: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatchBody<'a> {
    pub version: u64,
    pub patch: &'a PatchOps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchBody<'a> {
    pub operations: &'a [BatchOperation],
}

/// Partial update: dot-path assignments and removals.
///
/// Empty `set`/`remove` collections are left out of the wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchOps {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl PatchOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` at the dot-separated `path` (e.g. `"profile.name"`).
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(path.into(), value.into());
        self
    }

    /// Remove the field at the dot-separated `path`.
    pub fn remove(mut self, path: impl Into<String>) -> Self {
        self.remove.push(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// One entry of a batch request, tagged by `action` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum BatchOperation {
    Store {
        token: String,
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl: Option<u64>,
    },
    Retrieve {
        token: String,
    },
    Delete {
        token: String,
    },
    Patch {
        token: String,
        version: u64,
        patch: PatchOps,
    },
}

impl BatchOperation {
    pub fn token(&self) -> &str {
        match self {
            BatchOperation::Store { token, .. }
            | BatchOperation::Retrieve { token }
            | BatchOperation::Delete { token }
            | BatchOperation::Patch { token, .. } => token,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            BatchOperation::Store { .. } => "store",
            BatchOperation::Retrieve { .. } => "retrieve",
            BatchOperation::Delete { .. } => "delete",
            BatchOperation::Patch { .. } => "patch",
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tier: Option<String>,
    pub version: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    pub version: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchResponse {
    #[serde(default)]
    pub success: bool,
    pub version: u64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tier: Option<String>,
}

/// A single append-only history event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub seq: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub classified_type: Option<String>,
    #[serde(default)]
    pub numeric_value: Option<f64>,
    #[serde(default)]
    pub text_value: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub payload: Value,
}

impl HistoryEvent {
    /// The `payload.type` field (`store`, `patch`, ...), if present.
    pub fn payload_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    /// The record data captured by this event, if present.
    pub fn payload_data(&self) -> Option<&Value> {
        self.payload.get("data")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryPagination {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub before: Option<u64>,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub events: Vec<HistoryEvent>,
    #[serde(default)]
    pub pagination: HistoryPagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(
        rename = "successRate",
        default,
        deserialize_with = "string_or_number"
    )]
    pub success_rate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub success: bool,
    pub results: Vec<BatchResult>,
    #[serde(default)]
    pub summary: BatchSummary,
}

/// The service reports `successRate` as `"100%"`; accept a bare number too.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_body_omits_unset_options() {
        let data = json!({"temperature": 23.5});
        let body = StoreBody {
            data: &data,
            ttl: None,
            schema: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"data": {"temperature": 23.5}})
        );
    }

    #[test]
    fn patch_ops_omit_empty_sections() {
        let ops = PatchOps::new().remove("settings.notifications");
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!({"remove": ["settings.notifications"]})
        );
        assert!(PatchOps::new().is_empty());
    }

    #[test]
    fn batch_operation_is_tagged_by_action() {
        let op = BatchOperation::Patch {
            token: "a-b-c-d-e".into(),
            version: 3,
            patch: PatchOps::new().set("value", 30.0),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({
                "action": "patch",
                "token": "a-b-c-d-e",
                "version": 3,
                "patch": {"set": {"value": 30.0}}
            })
        );

        let parsed: BatchOperation =
            serde_json::from_value(json!({"action": "retrieve", "token": "t"})).unwrap();
        assert_eq!(parsed.action(), "retrieve");
        assert_eq!(parsed.token(), "t");
    }

    #[test]
    fn batch_summary_accepts_numeric_rate() {
        let summary: BatchSummary = serde_json::from_value(
            json!({"total": 2, "succeeded": 1, "failed": 1, "successRate": 50}),
        )
        .unwrap();
        assert_eq!(summary.success_rate, "50");

        let summary: BatchSummary =
            serde_json::from_value(json!({"successRate": "100%"})).unwrap();
        assert_eq!(summary.success_rate, "100%");
    }

    #[test]
    fn history_event_tolerates_sparse_fields() {
        let event: HistoryEvent = serde_json::from_value(json!({
            "seq": 7,
            "created_at": "2025-01-01T00:00:00Z",
            "payload": {"type": "patch", "data": {"counter": 1}}
        }))
        .unwrap();
        assert_eq!(event.seq, 7);
        assert_eq!(event.payload_type(), Some("patch"));
        assert_eq!(event.payload_data(), Some(&json!({"counter": 1})));
        assert!(event.numeric_value.is_none());
    }
}
