use thiserror::Error;

/// HTTP-layer errors, classified by retryability.
///
/// `Network` and `Timeout` are transient and eligible for the retry loop.
/// DNS/connection failures, TLS failures and the `Invalid*` family are
/// permanent: retrying them cannot succeed, so the executor fails fast.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("TLS error: {0}")]
    Ssl(String),
    #[error("DNS or connection failure: {0}")]
    Dns(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("invalid header: {0}")]
    InvalidHeaders(String),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Network(_) | HttpError::Timeout { .. })
    }
}
