//! HTTP transport seam.
//!
//! `KvClient` never talks to the network directly: it builds an
//! `ApiRequest` and hands it to a `Transport`.  `HttpTransport` is the
//! production implementation (a blocking `ureq` agent); tests plug in an
//! in-memory fake and can assert exactly which requests were sent.

use std::time::Duration;

use serde_json::Value;

use crate::errors::{KvError, Result};

/// Header carrying the record token.
pub const TOKEN_HEADER: &str = "X-KV-Token";

/// HTTP methods used by the Key-Value API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A fully-resolved API request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    /// Path relative to the base URL (e.g. `/api/store`).
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
    /// Value for the `X-KV-Token` header, if the endpoint is authenticated.
    pub token: Option<String>,
    pub body: Option<Value>,
}

/// Raw response: status, `Retry-After` header, body text.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the raw response.
///
/// Non-2xx statuses are *not* errors at this layer; the client maps them.
/// Only transport failures (timeouts, connection errors) are returned as
/// `Err`.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}

/// Blocking HTTP transport backed by a `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpTransport {
    /// Build an agent whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: config.into(),
            timeout,
        }
    }

    fn map_error(&self, err: ureq::Error) -> KvError {
        match err {
            ureq::Error::Timeout(_) => KvError::Timeout {
                seconds: self.timeout.as_secs(),
            },
            other => KvError::Transport(other.to_string()),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let result = match request.method {
            Method::Get | Method::Delete => {
                let mut builder = if request.method == Method::Get {
                    self.agent.get(&request.url)
                } else {
                    self.agent.delete(&request.url)
                };
                for (key, value) in &request.query {
                    builder = builder.query(*key, value);
                }
                if let Some(token) = &request.token {
                    builder = builder.header(TOKEN_HEADER, token);
                }
                builder.call()
            }
            Method::Post | Method::Patch => {
                let mut builder = if request.method == Method::Post {
                    self.agent.post(&request.url)
                } else {
                    self.agent.patch(&request.url)
                };
                for (key, value) in &request.query {
                    builder = builder.query(*key, value);
                }
                if let Some(token) = &request.token {
                    builder = builder.header(TOKEN_HEADER, token);
                }
                let body = request
                    .body
                    .clone()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                builder.send_json(&body)
            }
        };

        let mut response = result.map_err(|e| self.map_error(e))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| self.map_error(e))?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let mut resp = ApiResponse {
            status: 200,
            retry_after: None,
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 204;
        assert!(resp.is_success());
        resp.status = 409;
        assert!(!resp.is_success());
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::Patch.as_str(), "PATCH");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }
}
