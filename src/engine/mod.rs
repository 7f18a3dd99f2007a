//! Flow executor: loads a flow, validates it, then walks the graph from its
//! start nodes, gating each edge on the source node's outcome.
//!
//! Node failures are contained: a failed node produces an error-status
//! result and suppresses its success-gated edges, but sibling branches keep
//! running. Only orchestration-level failures (missing flow, validation,
//! runaway traversal, the flow deadline) abort the run, and even those
//! return a `Failed` result carrying the partial trace instead of an `Err`.

mod config;
mod context;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use uuid::Uuid;

pub use config::EngineConfig;
pub use context::{
    ExecutionError, FlowExecutionResult, FlowStatus, NodeExecutionResult, NodeStatus,
};

use context::ExecutionContext;

use crate::environment::{BackendClient, BackendError, EnvironmentManager};
use crate::error::{FlowError, HttpError, NodeError};
use crate::expr;
use crate::flow::{validate_flow, EdgeKind, FlowConfig, FlowEdge, FlowNode, NodeData};
use crate::http::{HttpExecutor, HttpResponse, RequestConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::interpolate::{interpolate, interpolate_body, interpolate_headers, interpolate_url};

/// Adjacency view over a loaded flow. Start nodes and sibling edges keep
/// their declaration order, which makes traversal deterministic.
struct FlowIndex<'a> {
    nodes: HashMap<&'a str, &'a FlowNode>,
    outgoing: HashMap<&'a str, Vec<&'a FlowEdge>>,
    starts: Vec<&'a str>,
}

impl<'a> FlowIndex<'a> {
    fn new(flow: &'a FlowConfig) -> Self {
        let mut nodes = HashMap::new();
        for node in &flow.nodes {
            nodes.insert(node.id.as_str(), node);
        }

        let mut outgoing: HashMap<&str, Vec<&FlowEdge>> = HashMap::new();
        for edge in &flow.edges {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }

        let starts = flow
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !flow.edges.iter().any(|e| e.target == *id))
            .collect();

        FlowIndex {
            nodes,
            outgoing,
            starts,
        }
    }

    fn edges_from(&self, node_id: &str) -> &[&'a FlowEdge] {
        self.outgoing.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// What a node execution produced, as far as edge gating is concerned.
struct NodeOutcome {
    status: NodeStatus,
    condition: Option<bool>,
}

fn edge_should_fire(kind: EdgeKind, outcome: &NodeOutcome) -> bool {
    match kind {
        EdgeKind::Always => true,
        EdgeKind::Success => outcome.status == NodeStatus::Success,
        EdgeKind::Error => outcome.status == NodeStatus::Error,
        EdgeKind::True => outcome.condition == Some(true),
        EdgeKind::False => outcome.condition == Some(false),
    }
}

/// Payload of a successful node execution.
struct NodePayload {
    response: Option<HttpResponse>,
    data: Option<Value>,
    condition: Option<bool>,
}

pub struct FlowExecutor {
    config: EngineConfig,
    environment: Arc<EnvironmentManager>,
    http: HttpExecutor,
}

impl FlowExecutor {
    pub fn new(
        environment: Arc<EnvironmentManager>,
        http: HttpExecutor,
        config: EngineConfig,
    ) -> Self {
        FlowExecutor {
            config,
            environment,
            http,
        }
    }

    /// Wire up an executor over a backend with the default HTTP transport.
    pub fn with_backend(
        backend: Arc<dyn BackendClient>,
        config: EngineConfig,
    ) -> Result<Self, HttpError> {
        let environment = Arc::new(EnvironmentManager::new(
            backend,
            Duration::from_secs(config.cache_ttl_secs),
        ));
        let http = HttpExecutor::with_default_transport()?;
        Ok(FlowExecutor::new(environment, http, config))
    }

    pub fn environment(&self) -> &Arc<EnvironmentManager> {
        &self.environment
    }

    /// Execute a flow end to end. Never returns `Err`: every failure mode
    /// is folded into the result's status and error list.
    pub async fn execute_flow(
        &self,
        flow_id: &str,
        environment_id: &str,
        overrides: HashMap<String, String>,
        max_execution_time: Option<Duration>,
    ) -> FlowExecutionResult {
        let started = Instant::now();
        let deadline = max_execution_time
            .unwrap_or(Duration::from_millis(self.config.max_execution_time_ms));
        let mut ctx = ExecutionContext::new(deadline);

        tracing::info!(flow_id, environment_id, "starting flow execution");

        let fatal = self
            .run(flow_id, environment_id, overrides, &mut ctx)
            .await
            .err();

        let status = match &fatal {
            Some(err) => {
                tracing::error!(flow_id, error = %err, "flow execution failed");
                ctx.errors.push(ExecutionError {
                    node_id: None,
                    message: err.to_string(),
                });
                FlowStatus::Failed
            }
            None if ctx.errors.is_empty() => FlowStatus::Completed,
            None => FlowStatus::CompletedWithErrors,
        };

        FlowExecutionResult {
            run_id: Uuid::new_v4(),
            flow_id: flow_id.to_string(),
            status,
            execution_time_ms: started.elapsed().as_millis() as u64,
            node_results: ctx.node_results,
            errors: ctx.errors,
            variables: ctx.variables,
            execution_path: ctx.execution_path,
            timestamp: Utc::now(),
        }
    }

    async fn run(
        &self,
        flow_id: &str,
        environment_id: &str,
        overrides: HashMap<String, String>,
        ctx: &mut ExecutionContext,
    ) -> Result<(), FlowError> {
        let flow = self
            .environment
            .load_flow_config(flow_id)
            .await
            .map_err(|e| match e {
                BackendError::NotFound(id) => FlowError::NotFound(id),
                other => FlowError::Backend(other.to_string()),
            })?;

        validate_flow(&flow)?;

        let base = self
            .environment
            .load_environment_variables(environment_id)
            .await;
        ctx.variables = EnvironmentManager::merge_variables(base, overrides);

        let index = FlowIndex::new(&flow);
        for start in &index.starts {
            self.visit(&index, start, 0, ctx).await?;
        }
        Ok(())
    }

    /// Execute one node and recurse into its fired edges. Boxed because the
    /// recursion depth is data-dependent.
    fn visit<'a>(
        &'a self,
        index: &'a FlowIndex<'a>,
        node_id: &'a str,
        depth: usize,
        ctx: &'a mut ExecutionContext,
    ) -> BoxFuture<'a, Result<(), FlowError>> {
        async move {
            if depth > self.config.max_depth {
                return Err(FlowError::MaxDepthExceeded {
                    node_id: node_id.to_string(),
                    limit: self.config.max_depth,
                });
            }
            if ctx.in_progress.contains(node_id) {
                // Validation catches static cycles; this guards dynamic ones.
                return Err(FlowError::CircularDependency(node_id.to_string()));
            }
            if ctx.visited.contains(node_id) {
                // Diamond join: second path into an already-executed node.
                return Ok(());
            }
            if ctx.deadline_exceeded() {
                return Err(FlowError::Timeout {
                    limit_ms: ctx.max_execution_time.as_millis() as u64,
                });
            }

            let node = index
                .nodes
                .get(node_id)
                .ok_or_else(|| FlowError::Internal(format!("unknown node id: {node_id}")))?;

            ctx.in_progress.insert(node_id.to_string());
            let outcome = self.execute_node(node, ctx).await;

            for edge in index.edges_from(node_id) {
                if edge_should_fire(edge.kind, &outcome) {
                    self.visit(index, edge.target.as_str(), depth + 1, &mut *ctx)
                        .await?;
                }
            }

            ctx.in_progress.remove(node_id);
            ctx.visited.insert(node_id.to_string());
            Ok(())
        }
        .boxed()
    }

    /// Execute one node, record its result, and derive the edge-gating
    /// outcome. Node errors land in the trace here and do not propagate.
    async fn execute_node(&self, node: &FlowNode, ctx: &mut ExecutionContext) -> NodeOutcome {
        let started = Instant::now();
        tracing::debug!(node_id = %node.id, kind = node.data.kind(), "executing node");
        ctx.execution_path.push(node.id.clone());

        let (result, outcome) = match self.run_node(node, ctx).await {
            Ok(payload) => {
                let outcome = NodeOutcome {
                    status: NodeStatus::Success,
                    condition: payload.condition,
                };
                let result = NodeExecutionResult {
                    node_id: node.id.clone(),
                    status: NodeStatus::Success,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                    response: payload.response,
                    data: payload.data,
                    error: None,
                };
                (result, outcome)
            }
            Err(err) => {
                tracing::warn!(node_id = %node.id, error = %err, "node failed");
                ctx.errors.push(ExecutionError {
                    node_id: Some(node.id.clone()),
                    message: err.to_string(),
                });
                let result = NodeExecutionResult {
                    node_id: node.id.clone(),
                    status: NodeStatus::Error,
                    execution_time_ms: started.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                    response: None,
                    data: None,
                    error: Some(err.to_string()),
                };
                (
                    result,
                    NodeOutcome {
                        status: NodeStatus::Error,
                        condition: None,
                    },
                )
            }
        };

        ctx.node_results.push(result);
        outcome
    }

    async fn run_node(
        &self,
        node: &FlowNode,
        ctx: &mut ExecutionContext,
    ) -> Result<NodePayload, NodeError> {
        match &node.data {
            NodeData::HttpRequest(cfg) => {
                let request = RequestConfig {
                    method: interpolate(&cfg.method, &ctx.variables),
                    url: interpolate_url(&cfg.url, &ctx.variables)?,
                    headers: interpolate_headers(&cfg.headers, &ctx.variables),
                    body: cfg
                        .body
                        .as_ref()
                        .map(|b| interpolate_body(b, &ctx.variables)),
                    timeout: cfg
                        .timeout_ms
                        .map(Duration::from_millis)
                        .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
                    follow_redirects: true,
                };
                let response = self.http.execute_with_retry(&request, cfg.retries).await?;

                if cfg.save_response {
                    if let Some(name) = &cfg.response_variable {
                        ctx.variables
                            .insert(name.clone(), response.body.to_variable_string());
                    }
                }

                Ok(NodePayload {
                    response: Some(response),
                    data: None,
                    condition: None,
                })
            }
            NodeData::Delay(cfg) => {
                let clamped = cfg.duration_ms.min(self.config.delay_ceiling_ms);
                if clamped < cfg.duration_ms {
                    tracing::warn!(
                        node_id = %node.id,
                        requested_ms = cfg.duration_ms,
                        clamped_ms = clamped,
                        "delay duration clamped"
                    );
                }
                tokio::time::sleep(Duration::from_millis(clamped)).await;
                Ok(NodePayload {
                    response: None,
                    data: Some(json!({ "duration_ms": clamped })),
                    condition: None,
                })
            }
            NodeData::Condition(cfg) => {
                let value = expr::evaluate_with_timeout(
                    &cfg.condition,
                    &ctx.variables,
                    Duration::from_millis(self.config.expr_timeout_ms),
                )?;
                let result = expr::truthy(&value);
                Ok(NodePayload {
                    response: None,
                    data: Some(json!({ "result": value })),
                    condition: Some(result),
                })
            }
            NodeData::VariableSet(cfg) => {
                let resolved = interpolate(&cfg.value, &ctx.variables);
                ctx.variables.insert(cfg.variable.clone(), resolved.clone());
                Ok(NodePayload {
                    response: None,
                    data: Some(json!({ "variable": cfg.variable, "value": resolved })),
                    condition: None,
                })
            }
        }
    }
}
