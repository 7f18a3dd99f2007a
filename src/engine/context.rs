//! Per-run execution state and the result types returned to callers.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::http::HttpResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Completed,
    CompletedWithErrors,
    Failed,
}

/// Outcome of one node execution.
#[derive(Debug, Clone, Serialize)]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub status: NodeStatus,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Normalized response, for `http_request` nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HttpResponse>,
    /// Variant-specific payload for the other node kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One accumulated error; `node_id` is `None` for orchestration-level
/// failures.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionError {
    pub node_id: Option<String>,
    pub message: String,
}

/// Terminal artifact of a flow run. Always well-formed: failure modes are
/// encoded in `status` and `errors`, never thrown across the API boundary.
#[derive(Debug, Clone, Serialize)]
pub struct FlowExecutionResult {
    pub run_id: Uuid,
    pub flow_id: String,
    pub status: FlowStatus,
    pub execution_time_ms: u64,
    pub node_results: Vec<NodeExecutionResult>,
    pub errors: Vec<ExecutionError>,
    pub variables: HashMap<String, String>,
    pub execution_path: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state scoped to one run. Never shared across concurrent runs.
pub(crate) struct ExecutionContext {
    pub variables: HashMap<String, String>,
    pub node_results: Vec<NodeExecutionResult>,
    pub execution_path: Vec<String>,
    pub errors: Vec<ExecutionError>,
    pub started_at: Instant,
    pub max_execution_time: Duration,
    pub visited: HashSet<String>,
    pub in_progress: HashSet<String>,
}

impl ExecutionContext {
    pub fn new(max_execution_time: Duration) -> Self {
        ExecutionContext {
            variables: HashMap::new(),
            node_results: Vec::new(),
            execution_path: Vec::new(),
            errors: Vec::new(),
            started_at: Instant::now(),
            max_execution_time,
            visited: HashSet::new(),
            in_progress: HashSet::new(),
        }
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.started_at.elapsed() > self.max_execution_time
    }
}
