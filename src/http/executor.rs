//! Request preparation, the retry loop, and response normalization.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;

use crate::error::HttpError;

use super::transport::{HttpTransport, PreparedRequest, RawResponse};
use super::{is_known_method, HttpResponse, RequestConfig, ResponseBody};

pub const DEFAULT_RETRIES: u32 = 3;

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 10_000;

/// Executes single HTTP requests against a pluggable transport.
#[derive(Clone)]
pub struct HttpExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl HttpExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        HttpExecutor { transport }
    }

    /// Build an executor over the default `reqwest` transport.
    pub fn with_default_transport() -> Result<Self, HttpError> {
        Ok(HttpExecutor::new(Arc::new(
            super::transport::ReqwestTransport::new()?,
        )))
    }

    /// Single attempt, no retries.
    pub async fn execute(&self, config: &RequestConfig) -> Result<HttpResponse, HttpError> {
        self.execute_with_retry(config, 0).await
    }

    /// Up to `retries` additional attempts with exponential backoff.
    /// Permanent failures (DNS, TLS, invalid request) fail fast.
    pub async fn execute_with_retry(
        &self,
        config: &RequestConfig,
        retries: u32,
    ) -> Result<HttpResponse, HttpError> {
        let prepared = prepare(config)?;
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            match self.transport.send(&prepared).await {
                Ok(raw) => return Ok(normalize(raw, started)),
                Err(err) if err.is_retryable() && attempt < retries => {
                    let backoff = backoff_delay(attempt);
                    tracing::warn!(
                        url = %prepared.url,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// `min(2^attempt * 1s, 10s)`.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS
        .checked_shl(attempt)
        .unwrap_or(BACKOFF_CAP_MS)
        .min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}

/// Validate method/URL and normalize headers and body.
pub(crate) fn prepare(config: &RequestConfig) -> Result<PreparedRequest, HttpError> {
    let method = config.method.to_ascii_uppercase();
    if !is_known_method(&method) {
        return Err(HttpError::InvalidMethod(config.method.clone()));
    }

    let url = url::Url::parse(&config.url)
        .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", config.url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HttpError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let mut headers = config.headers.clone();
    let content_type = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.clone());

    let body = match &config.body {
        None => None,
        Some(value) => {
            let serialized = serialize_body(value, content_type.as_deref())?;
            if content_type.is_none() {
                headers.insert("Content-Type".to_string(), "application/json".to_string());
            }
            Some(serialized)
        }
    };

    Ok(PreparedRequest {
        method,
        url: url.to_string(),
        headers,
        body,
        timeout: config.timeout,
        follow_redirects: config.follow_redirects,
    })
}

/// Strings (including pre-built multipart payloads) pass through; form
/// content types get urlencoded serialization; everything else is JSON.
fn serialize_body(body: &Value, content_type: Option<&str>) -> Result<String, HttpError> {
    if let Value::String(s) = body {
        return Ok(s.clone());
    }

    let is_form = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if is_form {
        let Value::Object(map) = body else {
            return Err(HttpError::InvalidBody(
                "form-urlencoded body must be an object".to_string(),
            ));
        };
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in map {
            let flat = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            serializer.append_pair(key, &flat);
        }
        return Ok(serializer.finish());
    }

    serde_json::to_string(body).map_err(|e| HttpError::InvalidBody(e.to_string()))
}

fn normalize(raw: RawResponse, started: Instant) -> HttpResponse {
    let content_type = raw
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.to_ascii_lowercase())
        .unwrap_or_default();

    let body = if content_type.contains("json") {
        match serde_json::from_slice::<Value>(&raw.body) {
            Ok(value) => ResponseBody::Json(value),
            // Broken JSON degrades to text rather than failing the request.
            Err(_) => ResponseBody::Text(String::from_utf8_lossy(&raw.body).into_owned()),
        }
    } else if content_type.starts_with("text/") {
        ResponseBody::Text(String::from_utf8_lossy(&raw.body).into_owned())
    } else {
        ResponseBody::Binary(raw.body)
    };

    HttpResponse {
        status: raw.status,
        status_text: raw.status_text,
        headers: raw.headers,
        body,
        response_time_ms: started.elapsed().as_millis() as u64,
        timestamp: Utc::now(),
        final_url: raw.final_url,
    }
}
