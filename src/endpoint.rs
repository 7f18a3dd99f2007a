//! One-off endpoint tester: run a single stored request against an
//! environment, outside any flow.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::environment::{BackendError, EnvironmentManager};
use crate::error::NodeError;
use crate::http::{HttpExecutor, HttpResponse, RequestConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRIES};
use crate::interpolate::{interpolate, interpolate_body, interpolate_headers, interpolate_url};

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("endpoint not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Loads an endpoint configuration, interpolates it against the
/// environment, and executes it with the default retry policy.
pub struct EndpointTester {
    environment: Arc<EnvironmentManager>,
    http: HttpExecutor,
}

impl EndpointTester {
    pub fn new(environment: Arc<EnvironmentManager>, http: HttpExecutor) -> Self {
        EndpointTester { environment, http }
    }

    pub async fn test_endpoint(
        &self,
        endpoint_id: &str,
        environment_id: &str,
        overrides: HashMap<String, String>,
    ) -> Result<HttpResponse, EndpointError> {
        let endpoint = self
            .environment
            .load_endpoint_config(endpoint_id)
            .await
            .map_err(|e| match e {
                BackendError::NotFound(id) => EndpointError::NotFound(id),
                other => EndpointError::Backend(other.to_string()),
            })?;

        let base = self
            .environment
            .load_environment_variables(environment_id)
            .await;
        let vars = EnvironmentManager::merge_variables(base, overrides);

        let request = RequestConfig {
            method: interpolate(&endpoint.method, &vars),
            url: interpolate_url(&endpoint.url, &vars)?,
            headers: interpolate_headers(&endpoint.headers, &vars),
            body: endpoint.body.as_ref().map(|b| interpolate_body(b, &vars)),
            timeout: endpoint
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            follow_redirects: true,
        };

        tracing::info!(endpoint_id, environment_id, method = %request.method, "testing endpoint");

        let response = self
            .http
            .execute_with_retry(&request, DEFAULT_RETRIES)
            .await
            .map_err(NodeError::from)?;
        Ok(response)
    }
}
