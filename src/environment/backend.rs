//! Backend collaborator contract.
//!
//! Environments, endpoint configurations and flow definitions are
//! backend-owned resources fetched at run time. The wire contract for flow
//! definitions is this crate's own [`FlowConfig`] serde shape.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::flow::FlowConfig;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// One entry of a backend environment variable set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn enabled_default() -> bool {
    true
}

/// Stored request configuration for the one-off endpoint tester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn get_environment_variables(
        &self,
        environment_id: &str,
    ) -> Result<Vec<EnvironmentVariable>, BackendError>;

    async fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointConfig, BackendError>;

    async fn get_flow(&self, flow_id: &str) -> Result<FlowConfig, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_variable_defaults() {
        let var: EnvironmentVariable =
            serde_json::from_str(r#"{"key": "base_url"}"#).unwrap();
        assert!(var.enabled);
        assert!(var.value.is_none());
        assert!(var.description.is_none());
    }

    #[test]
    fn test_endpoint_config_roundtrip() {
        let json = r#"{
            "id": "ep1",
            "method": "POST",
            "url": "http://{{base}}/items",
            "headers": {"Accept": "application/json"}
        }"#;
        let cfg: EndpointConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.method, "POST");
        assert!(cfg.body.is_none());
        assert!(cfg.timeout_ms.is_none());
    }
}
