//! Single HTTP request execution: request normalization, a pluggable
//! transport, retry with exponential backoff, and structured response
//! normalization.

mod executor;
mod transport;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub use executor::{HttpExecutor, DEFAULT_RETRIES};
pub use transport::{HttpTransport, PreparedRequest, RawResponse, ReqwestTransport};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const KNOWN_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

pub(crate) fn is_known_method(method: &str) -> bool {
    KNOWN_METHODS.contains(&method.to_ascii_uppercase().as_str())
}

/// One HTTP request to perform.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl RequestConfig {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        RequestConfig {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            follow_redirects: true,
        }
    }
}

/// Response body, parsed according to the response content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl ResponseBody {
    /// Flatten to a string for storage in the variable map.
    pub fn to_variable_string(&self) -> String {
        match self {
            ResponseBody::Json(v) => v.to_string(),
            ResponseBody::Text(t) => t.clone(),
            ResponseBody::Binary(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

/// Normalized response.
#[derive(Debug, Clone, Serialize)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub final_url: String,
}
