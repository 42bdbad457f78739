//! HTTP plumbing underneath `AgriClient`.
//!
//! - Blocking transport using `ureq` (no async).
//! - Non-2xx statuses are returned as data, not errors; status mapping is the
//!   client's job.

use http::Method;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API base URL, e.g. `/plots/3/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        ApiResponse {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[cfg_attr(test, mockall::automock)]
pub trait HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        UreqTransport {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        let auth = request.bearer.as_ref().map(|t| format!("Bearer {}", t));

        let result = if request.method == Method::GET || request.method == Method::DELETE {
            let mut req = if request.method == Method::GET {
                self.agent.get(&url)
            } else {
                self.agent.delete(&url)
            };
            req = req.header("Accept", "application/json");
            for (k, v) in &request.query {
                req = req.query(k, v);
            }
            if let Some(a) = auth.as_deref() {
                req = req.header("Authorization", a);
            }
            req.call()
        } else {
            let mut req = if request.method == Method::PUT {
                self.agent.put(&url)
            } else if request.method == Method::PATCH {
                self.agent.patch(&url)
            } else {
                self.agent.post(&url)
            };
            req = req.header("Accept", "application/json");
            for (k, v) in &request.query {
                req = req.query(k, v);
            }
            if let Some(a) = auth.as_deref() {
                req = req.header("Authorization", a);
            }
            match &request.body {
                Some(body) => req.send_json(body),
                None => req.send_json(Value::Object(Default::default())),
            }
        };

        let mut res = result.map_err(|e| TransportError(e.to_string()))?;
        let status = res.status().as_u16();
        let body = res
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError(format!("reading response body failed: {}", e)))?;
        Ok(ApiResponse { status, body })
    }
}
