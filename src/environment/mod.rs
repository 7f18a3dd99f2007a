//! Environment manager: loads and caches variable sets, endpoint
//! configurations and flow definitions from the backend collaborator.

mod backend;
mod cache;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use backend::{BackendClient, BackendError, EndpointConfig, EnvironmentVariable};
use cache::TtlCache;

use crate::flow::FlowConfig;
use crate::interpolate::is_identifier;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Result of [`EnvironmentManager::validate_variable_context`].
#[derive(Debug, Clone)]
pub struct VariableContextReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

pub struct EnvironmentManager {
    backend: Arc<dyn BackendClient>,
    variables: TtlCache<HashMap<String, String>>,
    endpoints: TtlCache<EndpointConfig>,
    flows: TtlCache<FlowConfig>,
}

impl EnvironmentManager {
    pub fn new(backend: Arc<dyn BackendClient>, cache_ttl: Duration) -> Self {
        EnvironmentManager {
            backend,
            variables: TtlCache::new(cache_ttl),
            endpoints: TtlCache::new(cache_ttl),
            flows: TtlCache::new(cache_ttl),
        }
    }

    /// Load an environment's variables as a flat map.
    ///
    /// Disabled entries are dropped; entries with invalid identifier keys
    /// are dropped with a warning; missing values become empty strings.
    /// Backend failure degrades to an empty map — a flow can still run
    /// with zero variables, while a hard failure here would abort it.
    pub async fn load_environment_variables(&self, environment_id: &str) -> HashMap<String, String> {
        if let Some(cached) = self.variables.get(environment_id) {
            return cached;
        }

        let records = match self.backend.get_environment_variables(environment_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    environment_id,
                    error = %e,
                    "failed to load environment variables, continuing with none"
                );
                return HashMap::new();
            }
        };

        let mut vars = HashMap::new();
        for record in records {
            if !record.enabled {
                continue;
            }
            if !is_identifier(&record.key) {
                tracing::warn!(key = %record.key, "dropping variable with invalid identifier key");
                continue;
            }
            vars.insert(record.key, record.value.unwrap_or_default());
        }

        self.variables.insert(environment_id, vars.clone());
        vars
    }

    /// Load a stored endpoint configuration. Failures propagate: a missing
    /// endpoint is fatal to the caller.
    pub async fn load_endpoint_config(
        &self,
        endpoint_id: &str,
    ) -> Result<EndpointConfig, BackendError> {
        if let Some(cached) = self.endpoints.get(endpoint_id) {
            return Ok(cached);
        }
        let config = self.backend.get_endpoint(endpoint_id).await?;
        self.endpoints.insert(endpoint_id, config.clone());
        Ok(config)
    }

    /// Load a flow definition. Failures propagate.
    pub async fn load_flow_config(&self, flow_id: &str) -> Result<FlowConfig, BackendError> {
        if let Some(cached) = self.flows.get(flow_id) {
            return Ok(cached);
        }
        let config = self.backend.get_flow(flow_id).await?;
        self.flows.insert(flow_id, config.clone());
        Ok(config)
    }

    /// Shallow merge; override values win key-for-key.
    pub fn merge_variables(
        base: HashMap<String, String>,
        overrides: HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut merged = base;
        merged.extend(overrides);
        merged
    }

    pub fn validate_variable_context(vars: &HashMap<String, String>) -> VariableContextReport {
        let errors: Vec<String> = vars
            .keys()
            .filter(|k| !is_identifier(k))
            .map(|k| format!("invalid variable name: '{k}'"))
            .collect();
        VariableContextReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn invalidate_environment(&self, environment_id: &str) {
        self.variables.invalidate(environment_id);
    }

    pub fn clear_cache(&self) {
        self.variables.clear();
        self.endpoints.clear();
        self.flows.clear();
    }
}
