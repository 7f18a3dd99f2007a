use thiserror::Error;

/// Flow-level errors. Any of these aborts the whole run: the executor turns
/// them into a `Failed` result status while keeping the partial trace.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow not found: {0}")]
    NotFound(String),
    #[error("flow validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("circular dependency detected at node: {0}")]
    CircularDependency(String),
    #[error("max traversal depth {limit} exceeded at node: {node_id}")]
    MaxDepthExceeded { node_id: String, limit: usize },
    #[error("flow execution exceeded {limit_ms}ms deadline")]
    Timeout { limit_ms: u64 },
    #[error("backend error: {0}")]
    Backend(String),
    #[error("internal error: {0}")]
    Internal(String),
}
