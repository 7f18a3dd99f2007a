use serde::{Deserialize, Serialize};

/// Engine-wide limits and defaults. Injected into [`FlowExecutor`]
/// construction; there is no global configuration.
///
/// [`FlowExecutor`]: super::FlowExecutor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Traversal depth cap; protects against pathological graphs that
    /// static validation did not catch.
    pub max_depth: usize,
    /// Flow-level deadline when the caller does not pass one.
    pub max_execution_time_ms: u64,
    /// Ceiling applied to delay node durations.
    pub delay_ceiling_ms: u64,
    /// Wall-clock bound for a single condition evaluation.
    pub expr_timeout_ms: u64,
    /// TTL for the environment manager's caches.
    pub cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_depth: 50,
            max_execution_time_ms: 600_000,
            delay_ceiling_ms: 30_000,
            expr_timeout_ms: 5_000,
            cache_ttl_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_depth, 50);
        assert_eq!(config.max_execution_time_ms, 600_000);
        assert_eq!(config.delay_ceiling_ms, 30_000);
        assert_eq!(config.expr_timeout_ms, 5_000);
        assert_eq!(config.cache_ttl_secs, 300);
    }

    #[test]
    fn test_partial_deserialization() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_depth": 10}"#).unwrap();
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.max_execution_time_ms, 600_000);
    }
}
