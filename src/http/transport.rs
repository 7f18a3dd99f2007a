//! Transport seam between request preparation and the wire.
//!
//! Production uses a pooled `reqwest` client; tests inject fakes that
//! script success/failure sequences.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::HttpError;

/// A fully validated, normalized request ready to send.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
    pub follow_redirects: bool,
}

/// Raw wire response before normalization.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub final_url: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, HttpError>;
}

/// `reqwest`-backed transport with a shared connection pool.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| HttpError::Network(e.to_string()))?;
        Ok(ReqwestTransport { client })
    }

    fn client_for(&self, request: &PreparedRequest) -> Result<reqwest::Client, HttpError> {
        if request.follow_redirects {
            return Ok(self.client.clone());
        }
        // Redirect policy is client-level in reqwest; non-following
        // requests get a one-off client.
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::Network(e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, HttpError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| HttpError::InvalidMethod(request.method.clone()))?;

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &request.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| HttpError::InvalidHeaders(format!("bad header name '{key}'")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeaders(format!("bad value for header '{key}'")))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .client_for(request)?
            .request(method, &request.url)
            .headers(headers)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, started))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(&e, started))?
            .to_vec();

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            final_url,
        })
    }
}

/// Map a `reqwest` failure onto the error taxonomy. Connection-phase
/// failures (DNS, refused, TLS) are permanent; timeouts and mid-transfer
/// failures are transient.
fn classify_reqwest_error(error: &reqwest::Error, started: Instant) -> HttpError {
    let message = error_chain(error);
    if error.is_timeout() {
        return HttpError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
    }
    if error.is_builder() {
        return HttpError::InvalidUrl(message);
    }
    if error.is_connect() {
        let lowered = message.to_lowercase();
        if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl") {
            return HttpError::Ssl(message);
        }
        return HttpError::Dns(message);
    }
    HttpError::Network(message)
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
