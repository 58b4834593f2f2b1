//! In-memory stand-in for the Key-Value service.
//!
//! `FakeService` implements `Transport`, keeps one versioned record per
//! token plus an event log, and remembers every request it was sent.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use keyvalue::client::{ApiRequest, ApiResponse, ClientConfig, KvClient, Method, Transport};
use keyvalue::Result;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone)]
struct Record {
    data: Value,
    version: u64,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    records: HashMap<String, Record>,
    events: HashMap<String, Vec<Value>>,
    requests: Vec<ApiRequest>,
    generated: u32,
}

#[derive(Default)]
pub struct FakeService {
    state: Mutex<State>,
}

pub const TOKEN: &str = "alpha-bravo-charlie-delta-echo";

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn stored(&self, token: &str) -> Option<(Value, u64)> {
        let state = self.state.lock().unwrap();
        state.records.get(token).map(|r| (r.data.clone(), r.version))
    }

    /// Bump the record behind the client's back, as another writer would.
    pub fn touch(&self, token: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.records.get_mut(token) {
            record.version += 1;
        }
    }
}

/// A client with `TOKEN` as its default token.
pub fn client(service: &FakeService) -> KvClient<&FakeService> {
    KvClient::with_transport(
        ClientConfig::with_token(TOKEN).base_url("http://fake.test"),
        service,
    )
}

/// A client with no default token.
pub fn anonymous(service: &FakeService) -> KvClient<&FakeService> {
    KvClient::with_transport(ClientConfig::default().base_url("http://fake.test"), service)
}

fn respond(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        retry_after: None,
        body: body.to_string(),
    }
}

fn error(status: u16, message: &str) -> ApiResponse {
    respond(status, json!({"success": false, "error": message}))
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return };
    let mut node = root;
    for part in parts {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .unwrap()
            .entry(part)
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut().unwrap().insert(last.to_string(), value);
}

fn remove_path(root: &mut Value, path: &str) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return };
    let mut node = root;
    for part in parts {
        match node.get_mut(part) {
            Some(next) => node = next,
            None => return,
        }
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(last);
    }
}

impl State {
    fn log(&mut self, token: &str, kind: &str, data: &Value) {
        let events = self.events.entry(token.to_string()).or_default();
        let seq = events.len() as u64 + 1;
        let numeric = data.get("value").and_then(Value::as_f64);
        events.push(json!({
            "seq": seq,
            "created_at": Utc::now(),
            "classified_type": if numeric.is_some() { "numeric" } else { "object" },
            "numeric_value": numeric,
            "payload": {"type": kind, "data": data},
        }));
    }

    fn record_json(record: &Record) -> Value {
        json!({
            "success": true,
            "data": record.data,
            "version": record.version,
            "updated_at": record.updated_at,
            "expires_at": record.expires_at,
        })
    }

    fn store(&mut self, token: &str, data: Value, ttl: Option<u64>) -> Value {
        let version = self.records.get(token).map_or(1, |r| r.version + 1);
        let now = Utc::now();
        let record = Record {
            data: data.clone(),
            version,
            updated_at: now,
            expires_at: ttl
                .and_then(|s| chrono::Duration::try_seconds(i64::try_from(s).ok()?))
                .and_then(|d| now.checked_add_signed(d)),
        };
        self.log(token, "store", &data);
        self.records.insert(token.to_string(), record.clone());
        json!({
            "success": true,
            "message": "Data stored successfully",
            "size": data.to_string().len(),
            "tier": "free",
            "version": record.version,
            "updated_at": record.updated_at,
            "expires_at": record.expires_at,
        })
    }

    fn patch(&mut self, token: &str, version: u64, ops: &Value) -> std::result::Result<Value, (u16, String)> {
        let Some(record) = self.records.get_mut(token) else {
            return Err((404, "Token not found".into()));
        };
        if record.version != version {
            return Err((
                409,
                format!("Version mismatch: expected {version}, current {}", record.version),
            ));
        }
        if let Some(set) = ops.get("set").and_then(Value::as_object) {
            for (path, value) in set {
                set_path(&mut record.data, path, value.clone());
            }
        }
        if let Some(remove) = ops.get("remove").and_then(Value::as_array) {
            for path in remove.iter().filter_map(Value::as_str) {
                remove_path(&mut record.data, path);
            }
        }
        record.version += 1;
        record.updated_at = Utc::now();
        let body = Self::record_json(record);
        let data = record.data.clone();
        self.log(token, "patch", &data);
        Ok(body)
    }

    fn delete(&mut self, token: &str) -> bool {
        let existed = self.records.remove(token).is_some();
        if existed {
            self.log(token, "delete", &Value::Null);
        }
        existed
    }

    fn history(&self, token: &str, query: &[(&'static str, String)]) -> Value {
        let param = |name: &str| {
            query
                .iter()
                .find(|(k, _)| *k == name)
                .and_then(|(_, v)| v.parse::<u64>().ok())
        };
        let limit = param("limit").unwrap_or(50) as usize;
        let before = param("before");

        let mut matching: Vec<&Value> = self
            .events
            .get(token)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| before.is_none_or(|b| e["seq"].as_u64().unwrap_or(0) < b))
                    .collect()
            })
            .unwrap_or_default();
        matching.reverse();
        let has_more = matching.len() > limit;
        matching.truncate(limit);

        json!({
            "success": true,
            "events": matching,
            "pagination": {"limit": limit, "before": before, "has_more": has_more},
        })
    }

    fn batch_item(&mut self, op: &Value) -> Value {
        let token = op["token"].as_str().unwrap_or_default().to_string();
        let action = op["action"].as_str().unwrap_or_default().to_string();
        let fail = |msg: &str| {
            json!({"success": false, "token": token, "action": action, "error": msg})
        };

        match action.as_str() {
            "store" => {
                let resp = self.store(&token, op["data"].clone(), op["ttl"].as_u64());
                json!({"success": true, "token": token, "action": action, "version": resp["version"]})
            }
            "retrieve" => match self.records.get(&token) {
                Some(r) => json!({
                    "success": true, "token": token, "action": action,
                    "data": r.data, "version": r.version,
                }),
                None => fail("Token not found"),
            },
            "delete" => {
                if self.delete(&token) {
                    json!({"success": true, "token": token, "action": action})
                } else {
                    fail("Token not found")
                }
            }
            "patch" => {
                let version = op["version"].as_u64().unwrap_or(0);
                match self.patch(&token, version, &op["patch"]) {
                    Ok(body) => json!({
                        "success": true, "token": token, "action": action,
                        "data": body["data"], "version": body["version"],
                    }),
                    Err((_, msg)) => fail(&msg),
                }
            }
            _ => fail("Unknown action"),
        }
    }
}

impl Transport for FakeService {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        let token = request.token.clone().unwrap_or_default();
        let body = request.body.clone().unwrap_or(Value::Null);

        let response = match (request.method, request.path) {
            (Method::Post, "/api/generate") => {
                state.generated += 1;
                let n = state.generated;
                respond(200, json!({"success": true, "token": format!("fake-token-number-{n}")}))
            }
            (Method::Post, "/api/store") => {
                if body["data"].is_null() {
                    error(400, "Missing data")
                } else {
                    let resp = state.store(&token, body["data"].clone(), body["ttl"].as_u64());
                    respond(200, resp)
                }
            }
            (Method::Get, "/api/retrieve") => match state.records.get(&token) {
                Some(record) => respond(200, State::record_json(record)),
                None => error(404, "Token not found"),
            },
            (Method::Delete, "/api/delete") => {
                if state.delete(&token) {
                    respond(200, json!({"success": true, "message": "Data deleted successfully"}))
                } else {
                    error(404, "Token not found")
                }
            }
            (Method::Patch, "/api/store") => {
                let version = body["version"].as_u64().unwrap_or(0);
                match state.patch(&token, version, &body["patch"]) {
                    Ok(resp) => respond(200, resp),
                    Err((status, msg)) => error(status, &msg),
                }
            }
            (Method::Get, "/api/history") => respond(200, state.history(&token, &request.query)),
            (Method::Post, "/api/batch") => {
                let ops = body["operations"].as_array().cloned().unwrap_or_default();
                let results: Vec<Value> = ops.iter().map(|op| state.batch_item(op)).collect();
                let succeeded = results.iter().filter(|r| r["success"] == true).count();
                let total = results.len();
                respond(
                    200,
                    json!({
                        "success": true,
                        "results": results,
                        "summary": {
                            "total": total,
                            "succeeded": succeeded,
                            "failed": total - succeeded,
                            "successRate": format!("{:.1}%", succeeded as f64 * 100.0 / total as f64),
                        },
                    }),
                )
            }
            _ => error(404, "No such endpoint"),
        };
        Ok(response)
    }
}
