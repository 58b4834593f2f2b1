//! Key-Value API client.
//!
//! `KvClient` wraps the seven remote endpoints (generate, store,
//! retrieve, delete, patch, history, batch).  Each method:
//!
//! 1. resolves the token (per-call override, else the client default)
//!    and fails with `MissingToken` before any request if neither is set,
//! 2. issues exactly one request through the `Transport`,
//! 3. maps a non-2xx status onto a `KvError` variant.
//!
//! The client never retries.  Conflict handling is the caller's job; see
//! `crate::concurrency` for the usual re-read-and-retry loop.

pub mod transport;
pub mod types;

use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{KvError, Result};

pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport, TOKEN_HEADER};
pub use types::*;

/// Public service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://key-value.co";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Immutable connection settings for one client instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Blocking client for the Key-Value API.
pub struct KvClient<T: Transport = HttpTransport> {
    base_url: String,
    token: Option<String>,
    transport: T,
}

impl KvClient<HttpTransport> {
    /// Build a client that talks HTTP with the configured timeout.
    pub fn new(config: ClientConfig) -> Self {
        let transport = HttpTransport::new(config.timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> KvClient<T> {
    /// Build a client over an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.filter(|t| !t.trim().is_empty()),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The default token, if one was configured.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Generate a new memorable token.  Does not require authentication.
    pub fn generate(&self, turnstile_token: Option<&str>) -> Result<GenerateResponse> {
        let body = GenerateBody {
            turnstile_token: turnstile_token.filter(|t| !t.is_empty()),
        };
        self.execute(Method::Post, "/api/generate", None, Vec::new(), Some(&body))
    }

    /// Store `data` under the token, replacing any previous record.
    pub fn store(&self, data: &Value, options: &StoreOptions) -> Result<StoreResponse> {
        let token = self.resolve_token(options.token.as_deref(), "store")?;
        let body = StoreBody {
            data,
            ttl: options.ttl,
            schema: options.schema.as_ref(),
        };
        self.execute(Method::Post, "/api/store", Some(token), Vec::new(), Some(&body))
    }

    /// Fetch the current record.  Fails with `NotFound` if nothing is stored.
    pub fn retrieve(&self, token: Option<&str>) -> Result<RetrieveResponse> {
        let token = self.resolve_token(token, "retrieve")?;
        self.execute::<(), _>(Method::Get, "/api/retrieve", Some(token), Vec::new(), None)
    }

    /// Delete the record.
    pub fn delete(&self, token: Option<&str>) -> Result<DeleteResponse> {
        let token = self.resolve_token(token, "delete")?;
        self.execute::<(), _>(Method::Delete, "/api/delete", Some(token), Vec::new(), None)
    }

    /// Apply `ops` if the stored version still equals `version`.
    ///
    /// A stale version fails with `Conflict`; re-read and try again.
    pub fn patch(
        &self,
        version: u64,
        ops: &PatchOps,
        options: &PatchOptions,
    ) -> Result<PatchResponse> {
        let token = self.resolve_token(options.token.as_deref(), "patch")?;
        let body = PatchBody {
            version,
            patch: ops,
            ttl: options.ttl,
        };
        self.execute(Method::Patch, "/api/store", Some(token), Vec::new(), Some(&body))
    }

    /// Query one page of the token's event history, newest first.
    pub fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse> {
        let token = self.resolve_token(query.token.as_deref(), "history")?;
        if query.limit == 0 || query.limit > MAX_HISTORY_LIMIT {
            return Err(KvError::InvalidRequest(format!(
                "history limit must be between 1 and {MAX_HISTORY_LIMIT} (got {})",
                query.limit
            )));
        }

        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(before) = query.before {
            params.push(("before", before.to_string()));
        }
        if let Some(since) = &query.since {
            params.push(("since", since.clone()));
        }
        if let Some(event_type) = &query.event_type {
            params.push(("type", event_type.clone()));
        }

        self.execute::<(), _>(Method::Get, "/api/history", Some(token), params, None)
    }

    /// Submit up to 100 independent operations in one request.
    ///
    /// Results come back in submission order; a failed item does not
    /// affect its siblings.
    pub fn batch(&self, operations: &[BatchOperation]) -> Result<BatchResponse> {
        if operations.is_empty() {
            return Err(KvError::InvalidRequest(
                "at least one operation is required".into(),
            ));
        }
        if operations.len() > MAX_BATCH_OPERATIONS {
            return Err(KvError::InvalidRequest(format!(
                "maximum {MAX_BATCH_OPERATIONS} operations per batch request (got {})",
                operations.len()
            )));
        }

        let body = BatchBody { operations };
        self.execute(Method::Post, "/api/batch", None, Vec::new(), Some(&body))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn resolve_token<'a>(
        &'a self,
        explicit: Option<&'a str>,
        operation: &'static str,
    ) -> Result<&'a str> {
        explicit
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(self.token.as_deref())
            .ok_or(KvError::MissingToken { operation })
    }

    fn execute<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &'static str,
        token: Option<&str>,
        query: Vec<(&'static str, String)>,
        body: Option<&B>,
    ) -> Result<R> {
        let body = body.map(serde_json::to_value).transpose()?;
        let request = ApiRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            path,
            query,
            token: token.map(str::to_string),
            body,
        };

        debug!("{} {}", method.as_str(), request.url);
        let response = self.transport.send(&request)?;
        debug!("{} {} -> {}", method.as_str(), path, response.status);

        if !response.is_success() {
            let err = error_for_response(&response);
            // A missing record is routine for most callers.
            if err.is_not_found() {
                debug!("{} {} failed: {err}", method.as_str(), path);
            } else {
                warn!("{} {} failed: {err}", method.as_str(), path);
            }
            return Err(err);
        }

        let text = if response.body.trim().is_empty() {
            "{}"
        } else {
            response.body.as_str()
        };
        serde_json::from_str(text).map_err(|e| KvError::InvalidResponse(format!("{path}: {e}")))
    }
}

/// Map a non-2xx response onto the error taxonomy.
pub fn error_for_response(response: &ApiResponse) -> KvError {
    let parsed: Value = serde_json::from_str(&response.body).unwrap_or_else(|_| {
        let text = if response.body.is_empty() {
            "Invalid JSON response".to_string()
        } else {
            response.body.clone()
        };
        serde_json::json!({ "error": text })
    });

    let message = parsed
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    match response.status {
        400 => {
            let detail = parsed
                .get("validationErrors")
                .filter(|v| !v.is_null())
                .or_else(|| parsed.get("details").filter(|v| !v.is_null()));
            let errors = match detail {
                Some(Value::Array(items)) => items.clone(),
                Some(other) => vec![other.clone()],
                None => Vec::new(),
            };
            KvError::Validation { message, errors }
        }
        404 => KvError::NotFound { message },
        409 => KvError::Conflict { message },
        429 => KvError::RateLimited {
            message,
            retry_after: response
                .retry_after
                .as_deref()
                .and_then(|v| v.trim().parse().ok()),
        },
        status => KvError::Api {
            status,
            message,
            body: response.body.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use serde_json::json;

    use super::*;

    /// Replays canned responses and records every request.
    #[derive(Default)]
    struct Scripted {
        responses: RefCell<VecDeque<ApiResponse>>,
        requests: RefCell<Vec<ApiRequest>>,
    }

    impl Scripted {
        fn reply(self, status: u16, body: Value) -> Self {
            self.responses.borrow_mut().push_back(ApiResponse {
                status,
                retry_after: None,
                body: body.to_string(),
            });
            self
        }

        fn reply_raw(self, status: u16, retry_after: Option<&str>, body: &str) -> Self {
            self.responses.borrow_mut().push_back(ApiResponse {
                status,
                retry_after: retry_after.map(str::to_string),
                body: body.to_string(),
            });
            self
        }

        fn sent(&self) -> Vec<ApiRequest> {
            self.requests.borrow().clone()
        }
    }

    impl Transport for Scripted {
        fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.requests.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| KvError::Transport("no scripted response".into()))
        }
    }

    fn client(transport: Scripted) -> KvClient<Scripted> {
        KvClient::with_transport(
            ClientConfig::with_token("alpha-bravo-charlie-delta-echo").base_url("http://kv.test/"),
            transport,
        )
    }

    fn anonymous(transport: Scripted) -> KvClient<Scripted> {
        KvClient::with_transport(ClientConfig::default().base_url("http://kv.test"), transport)
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let c = client(Scripted::default());
        assert_eq!(c.base_url(), "http://kv.test");
    }

    #[test]
    fn blank_default_token_counts_as_missing() {
        let c = KvClient::with_transport(ClientConfig::with_token("   "), Scripted::default());
        assert!(c.token().is_none());
    }

    #[test]
    fn generate_sends_no_token_and_empty_body() {
        let c = client(Scripted::default().reply(200, json!({"success": true, "token": "a-b-c-d-e"})));
        let resp = c.generate(None).unwrap();
        assert_eq!(resp.token, "a-b-c-d-e");

        let sent = c.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].url, "http://kv.test/api/generate");
        assert!(sent[0].token.is_none());
        assert_eq!(sent[0].body, Some(json!({})));
    }

    #[test]
    fn generate_forwards_captcha_token() {
        let c = anonymous(Scripted::default().reply(200, json!({"token": "x"})));
        c.generate(Some("cf-123")).unwrap();
        assert_eq!(
            c.transport().sent()[0].body,
            Some(json!({"turnstileToken": "cf-123"}))
        );
    }

    #[test]
    fn generate_omits_empty_captcha_token() {
        let c = anonymous(Scripted::default().reply(200, json!({"token": "x"})));
        c.generate(Some("")).unwrap();
        assert_eq!(c.transport().sent()[0].body, Some(json!({})));
    }

    #[test]
    fn store_builds_body_with_optional_fields() {
        let c = client(Scripted::default().reply(200, json!({"success": true, "version": 1})));
        let options = StoreOptions {
            ttl: Some(3600),
            schema: Some(json!({"type": "object"})),
            ..StoreOptions::default()
        };
        let resp = c.store(&json!({"temperature": 23.5}), &options).unwrap();
        assert_eq!(resp.version, 1);

        let sent = &c.transport().sent()[0];
        assert_eq!(sent.path, "/api/store");
        assert_eq!(sent.token.as_deref(), Some("alpha-bravo-charlie-delta-echo"));
        assert_eq!(
            sent.body,
            Some(json!({
                "data": {"temperature": 23.5},
                "ttl": 3600,
                "schema": {"type": "object"}
            }))
        );
    }

    #[test]
    fn explicit_token_overrides_default() {
        let c = client(Scripted::default().reply(200, json!({"version": 2, "data": {}})));
        c.retrieve(Some("other-token")).unwrap();
        assert_eq!(c.transport().sent()[0].token.as_deref(), Some("other-token"));
    }

    #[test]
    fn missing_token_fails_before_any_request() {
        let c = anonymous(Scripted::default());

        assert!(matches!(
            c.store(&json!(1), &StoreOptions::default()),
            Err(KvError::MissingToken { operation: "store" })
        ));
        assert!(matches!(
            c.retrieve(None),
            Err(KvError::MissingToken { operation: "retrieve" })
        ));
        assert!(matches!(
            c.delete(Some("  ")),
            Err(KvError::MissingToken { operation: "delete" })
        ));
        assert!(matches!(
            c.patch(1, &PatchOps::new(), &PatchOptions::default()),
            Err(KvError::MissingToken { operation: "patch" })
        ));
        assert!(matches!(
            c.history(&HistoryQuery::default()),
            Err(KvError::MissingToken { operation: "history" })
        ));

        assert!(c.transport().sent().is_empty());
    }

    #[test]
    fn patch_sends_version_and_ops() {
        let c = client(Scripted::default().reply(200, json!({"version": 6, "data": {"a": 1}})));
        let ops = PatchOps::new().set("profile.name", "Alice").remove("old");
        let resp = c
            .patch(5, &ops, &PatchOptions { token: None, ttl: Some(60) })
            .unwrap();
        assert_eq!(resp.version, 6);

        let sent = &c.transport().sent()[0];
        assert_eq!(sent.method, Method::Patch);
        assert_eq!(sent.path, "/api/store");
        assert_eq!(
            sent.body,
            Some(json!({
                "version": 5,
                "patch": {"set": {"profile.name": "Alice"}, "remove": ["old"]},
                "ttl": 60
            }))
        );
    }

    #[test]
    fn conflict_status_maps_to_conflict() {
        let c = client(Scripted::default().reply(409, json!({"error": "Version mismatch"})));
        let err = c.patch(1, &PatchOps::new().set("a", 1), &PatchOptions::default()).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Version conflict: Version mismatch");
    }

    #[test]
    fn not_found_status_maps_to_not_found() {
        let c = client(Scripted::default().reply(404, json!({"error": "No data found"})));
        assert!(c.retrieve(None).unwrap_err().is_not_found());
    }

    #[test]
    fn validation_errors_are_carried() {
        let c = client(Scripted::default().reply(
            400,
            json!({"error": "Invalid data", "validationErrors": [{"path": "temp"}]}),
        ));
        match c.store(&json!({}), &StoreOptions::default()).unwrap_err() {
            KvError::Validation { message, errors } => {
                assert_eq!(message, "Invalid data");
                assert_eq!(errors, vec![json!({"path": "temp"})]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_details_fallback() {
        let c = client(Scripted::default().reply(400, json!({"error": "bad", "details": "ttl too large"})));
        match c.store(&json!({}), &StoreOptions::default()).unwrap_err() {
            KvError::Validation { errors, .. } => assert_eq!(errors, vec![json!("ttl too large")]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let c = client(Scripted::default().reply_raw(429, Some("17"), r#"{"error":"slow down"}"#));
        match c.retrieve(None).unwrap_err() {
            KvError::RateLimited { message, retry_after } => {
                assert_eq!(message, "slow down");
                assert_eq!(retry_after, Some(17));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn other_status_keeps_raw_body() {
        let c = client(Scripted::default().reply_raw(502, None, "<html>bad gateway</html>"));
        match c.delete(None).unwrap_err() {
            KvError::Api { status, message, body } => {
                assert_eq!(status, 502);
                assert_eq!(message, "<html>bad gateway</html>");
                assert_eq!(body, "<html>bad gateway</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_error_body_falls_back_to_status_text() {
        let c = client(Scripted::default().reply_raw(500, None, r#"{"detail":"x"}"#));
        match c.delete(None).unwrap_err() {
            KvError::Api { message, .. } => assert_eq!(message, "HTTP 500"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn transport_errors_pass_through() {
        let c = client(Scripted::default());
        assert!(matches!(c.retrieve(None), Err(KvError::Transport(_))));
    }

    #[test]
    fn malformed_success_body_is_invalid_response() {
        let c = client(Scripted::default().reply_raw(200, None, r#"{"data": 1}"#));
        assert!(matches!(c.retrieve(None), Err(KvError::InvalidResponse(_))));
    }

    #[test]
    fn history_builds_query_string() {
        let c = client(Scripted::default().reply(
            200,
            json!({"events": [], "pagination": {"has_more": false}}),
        ));
        let query = HistoryQuery {
            limit: 10,
            before: Some(42),
            since: Some("2025-01-01T00:00:00Z".into()),
            event_type: Some("temperature".into()),
            ..HistoryQuery::default()
        };
        c.history(&query).unwrap();

        let sent = &c.transport().sent()[0];
        assert_eq!(sent.method, Method::Get);
        assert_eq!(
            sent.query,
            vec![
                ("limit", "10".to_string()),
                ("before", "42".to_string()),
                ("since", "2025-01-01T00:00:00Z".to_string()),
                ("type", "temperature".to_string()),
            ]
        );
    }

    #[test]
    fn history_rejects_out_of_range_limit() {
        let c = client(Scripted::default());
        let query = HistoryQuery {
            limit: 201,
            ..HistoryQuery::default()
        };
        assert!(matches!(c.history(&query), Err(KvError::InvalidRequest(_))));
        assert!(c.transport().sent().is_empty());
    }

    #[test]
    fn batch_rejects_empty_and_oversized_lists_locally() {
        let c = anonymous(Scripted::default());
        assert!(matches!(c.batch(&[]), Err(KvError::InvalidRequest(_))));

        let ops: Vec<BatchOperation> = (0..101)
            .map(|i| BatchOperation::Retrieve {
                token: format!("token-{i}"),
            })
            .collect();
        assert!(matches!(c.batch(&ops), Err(KvError::InvalidRequest(_))));
        assert!(c.transport().sent().is_empty());
    }

    #[test]
    fn batch_posts_operations_without_token_header() {
        let c = client(Scripted::default().reply(
            200,
            json!({
                "success": true,
                "results": [
                    {"success": true, "token": "t1", "action": "retrieve", "data": {"v": 1}, "version": 3},
                    {"success": false, "token": "t2", "action": "delete", "error": "Not found"}
                ],
                "summary": {"total": 2, "succeeded": 1, "failed": 1, "successRate": "50%"}
            }),
        ));
        let ops = vec![
            BatchOperation::Retrieve { token: "t1".into() },
            BatchOperation::Delete { token: "t2".into() },
        ];
        let resp = c.batch(&ops).unwrap();
        assert_eq!(resp.results.len(), 2);
        assert!(resp.results[0].success);
        assert_eq!(resp.results[1].error.as_deref(), Some("Not found"));
        assert_eq!(resp.summary.success_rate, "50%");

        let sent = &c.transport().sent()[0];
        assert!(sent.token.is_none());
        assert_eq!(sent.path, "/api/batch");
        assert_eq!(sent.body.as_ref().unwrap()["operations"].as_array().unwrap().len(), 2);
    }
}
