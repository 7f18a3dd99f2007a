//! End-to-end flow execution tests over a scripted backend and transport.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use apiflow::environment::{
    BackendClient, BackendError, EndpointConfig, EnvironmentManager, EnvironmentVariable,
};
use apiflow::http::{HttpTransport, PreparedRequest, RawResponse};
use apiflow::{
    EngineConfig, FlowConfig, FlowExecutor, FlowStatus, HttpError, HttpExecutor, NodeStatus,
};

struct MockBackend {
    flows: HashMap<String, FlowConfig>,
    variables: Vec<EnvironmentVariable>,
}

impl MockBackend {
    fn new(flows: Vec<FlowConfig>, variables: Vec<(&str, &str)>) -> Arc<Self> {
        Arc::new(MockBackend {
            flows: flows.into_iter().map(|f| (f.id.clone(), f)).collect(),
            variables: variables
                .into_iter()
                .map(|(key, value)| EnvironmentVariable {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                    enabled: true,
                    description: None,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn get_environment_variables(
        &self,
        _environment_id: &str,
    ) -> Result<Vec<EnvironmentVariable>, BackendError> {
        Ok(self.variables.clone())
    }

    async fn get_endpoint(&self, endpoint_id: &str) -> Result<EndpointConfig, BackendError> {
        Err(BackendError::NotFound(endpoint_id.to_string()))
    }

    async fn get_flow(&self, flow_id: &str) -> Result<FlowConfig, BackendError> {
        self.flows
            .get(flow_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(flow_id.to_string()))
    }
}

struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, HttpError>>>,
    calls: Mutex<Vec<PreparedRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<RawResponse, HttpError>>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<PreparedRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, HttpError> {
        self.calls.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or(Err(HttpError::Network("script exhausted".to_string())))
    }
}

fn json_response(body: serde_json::Value) -> RawResponse {
    RawResponse {
        status: 200,
        status_text: "OK".to_string(),
        headers: HashMap::from([(
            "content-type".to_string(),
            "application/json".to_string(),
        )]),
        body: body.to_string().into_bytes(),
        final_url: "http://api.test/items/5".to_string(),
    }
}

fn flow(value: serde_json::Value) -> FlowConfig {
    serde_json::from_value(value).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn executor(
    backend: Arc<MockBackend>,
    transport: Arc<ScriptedTransport>,
    config: EngineConfig,
) -> FlowExecutor {
    init_tracing();
    let environment = Arc::new(EnvironmentManager::new(backend, Duration::from_secs(300)));
    FlowExecutor::new(environment, HttpExecutor::new(transport), config)
}

#[tokio::test]
async fn test_variable_set_feeds_http_request() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "set_x", "type": "variable_set", "data": {"variable": "x", "value": "5"}},
                {"id": "fetch", "type": "http_request", "data": {
                    "method": "GET",
                    "url": "{{base}}/items/{{x}}",
                    "headers": {"Authorization": "Bearer {{token}}"},
                    "save_response": true,
                    "response_variable": "resp"
                }}
            ],
            "edges": [{"source": "set_x", "target": "fetch", "type": "success"}]
        }))],
        vec![("base", "http://api.test"), ("token", "abc")],
    );
    let transport = ScriptedTransport::new(vec![Ok(json_response(json!({"id": 5})))]);
    let executor = executor(backend, transport.clone(), EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::Completed);
    assert_eq!(result.execution_path, vec!["set_x", "fetch"]);
    assert!(result.errors.is_empty());
    assert_eq!(result.variables.get("resp").unwrap(), "{\"id\":5}");

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "http://api.test/items/5");
    assert_eq!(calls[0].method, "GET");
    assert_eq!(calls[0].headers.get("Authorization").unwrap(), "Bearer abc");

    let fetch = &result.node_results[1];
    assert_eq!(fetch.status, NodeStatus::Success);
    assert_eq!(fetch.response.as_ref().unwrap().status, 200);
}

#[tokio::test]
async fn test_overrides_win_over_environment() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "set", "type": "variable_set", "data": {"variable": "out", "value": "{{who}}"}}
            ],
            "edges": []
        }))],
        vec![("who", "environment")],
    );
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let overrides = HashMap::from([("who".to_string(), "override".to_string())]);
    let result = executor.execute_flow("f1", "env1", overrides, None).await;

    assert_eq!(result.status, FlowStatus::Completed);
    assert_eq!(result.variables.get("out").unwrap(), "override");
}

#[tokio::test]
async fn test_templated_method_resolves_at_runtime() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "a", "type": "http_request", "data": {"method": "{{verb}}", "url": "http://api.test/x"}}
            ],
            "edges": []
        }))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![Ok(json_response(json!({"ok": true})))]);
    let executor = executor(backend, transport.clone(), EngineConfig::default());

    // Resolves through overrides; request preparation uppercases it.
    let overrides = HashMap::from([("verb".to_string(), "post".to_string())]);
    let result = executor.execute_flow("f1", "env1", overrides, None).await;
    assert_eq!(result.status, FlowStatus::Completed);
    assert_eq!(transport.calls()[0].method, "POST");

    // Unresolved, the literal placeholder is rejected per request, not
    // ahead of the whole flow.
    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;
    assert_eq!(result.status, FlowStatus::CompletedWithErrors);
    assert_eq!(result.node_results[0].status, NodeStatus::Error);
    assert!(result.node_results[0]
        .error
        .as_ref()
        .unwrap()
        .contains("invalid HTTP method"));
}

#[tokio::test]
async fn test_condition_selects_true_branch() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "set_x", "type": "variable_set", "data": {"variable": "x", "value": "5"}},
                {"id": "check", "type": "condition", "data": {"condition": "x > 3"}},
                {"id": "when_true", "type": "variable_set", "data": {"variable": "branch", "value": "high"}},
                {"id": "when_false", "type": "variable_set", "data": {"variable": "branch", "value": "low"}}
            ],
            "edges": [
                {"source": "set_x", "target": "check", "type": "always"},
                {"source": "check", "target": "when_true", "type": "true"},
                {"source": "check", "target": "when_false", "type": "false"}
            ]
        }))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::Completed);
    assert_eq!(result.execution_path, vec!["set_x", "check", "when_true"]);
    assert_eq!(result.variables.get("branch").unwrap(), "high");

    let check = &result.node_results[1];
    assert_eq!(check.data.as_ref().unwrap()["result"], json!(true));
}

#[tokio::test]
async fn test_error_edge_routes_around_failed_request() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "fetch", "type": "http_request", "data": {"method": "GET", "url": "http://down.test/x"}},
                {"id": "next", "type": "variable_set", "data": {"variable": "path", "value": "success"}},
                {"id": "recover", "type": "variable_set", "data": {"variable": "path", "value": "recovered"}}
            ],
            "edges": [
                {"source": "fetch", "target": "next", "type": "success"},
                {"source": "fetch", "target": "recover", "type": "error"}
            ]
        }))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![Err(HttpError::Dns(
        "name not resolved".to_string(),
    ))]);
    let executor = executor(backend, transport.clone(), EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::CompletedWithErrors);
    assert_eq!(result.execution_path, vec!["fetch", "recover"]);
    assert_eq!(result.variables.get("path").unwrap(), "recovered");
    // Permanent DNS failure, no retries.
    assert_eq!(transport.calls().len(), 1);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].node_id.as_deref(), Some("fetch"));
    assert_eq!(result.node_results[0].status, NodeStatus::Error);
    assert!(result.node_results[0].error.as_ref().unwrap().contains("DNS"));
}

#[tokio::test]
async fn test_node_error_does_not_abort_sibling_start() {
    // Parses fine but fails at evaluation: the identifier is unbound.
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "bad", "type": "condition", "data": {"condition": "missing_var > 5"}},
                {"id": "after_bad", "type": "variable_set", "data": {"variable": "a", "value": "1"}},
                {"id": "good", "type": "variable_set", "data": {"variable": "b", "value": "2"}}
            ],
            "edges": [{"source": "bad", "target": "after_bad", "type": "true"}]
        }))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::CompletedWithErrors);
    assert_eq!(result.execution_path, vec!["bad", "good"]);
    assert_eq!(result.variables.get("b").unwrap(), "2");
    assert!(!result.variables.contains_key("a"));
    assert_eq!(result.errors[0].node_id.as_deref(), Some("bad"));
}

#[tokio::test]
async fn test_cyclic_flow_fails_validation_before_executing() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "a", "type": "delay", "data": {"duration": 1}},
                {"id": "b", "type": "delay", "data": {"duration": 1}}
            ],
            "edges": [
                {"source": "a", "target": "b", "type": "always"},
                {"source": "b", "target": "a", "type": "always"}
            ]
        }))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::Failed);
    assert!(result.node_results.is_empty());
    assert!(result.execution_path.is_empty());
    assert!(result.errors[0].message.contains("circular dependency"));
}

#[tokio::test]
async fn test_missing_flow_fails() {
    let backend = MockBackend::new(vec![], vec![]);
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let result = executor
        .execute_flow("ghost", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::Failed);
    assert!(result.errors[0].message.contains("flow not found"));
    assert!(result.errors[0].node_id.is_none());
}

#[tokio::test]
async fn test_deadline_keeps_partial_results() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "a", "type": "delay", "data": {"duration": 30}},
                {"id": "b", "type": "delay", "data": {"duration": 30}},
                {"id": "c", "type": "delay", "data": {"duration": 30}}
            ],
            "edges": [
                {"source": "a", "target": "b", "type": "always"},
                {"source": "b", "target": "c", "type": "always"}
            ]
        }))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), Some(Duration::from_millis(10)))
        .await;

    assert_eq!(result.status, FlowStatus::Failed);
    assert_eq!(result.node_results.len(), 1);
    assert_eq!(result.execution_path, vec!["a"]);
    assert!(result.errors.last().unwrap().message.contains("deadline"));
}

#[tokio::test]
async fn test_depth_cap_aborts_runaway_chain() {
    let count = 55;
    let nodes: Vec<serde_json::Value> = (0..count)
        .map(|i| json!({"id": format!("n{i}"), "type": "delay", "data": {"duration": 0}}))
        .collect();
    let edges: Vec<serde_json::Value> = (0..count - 1)
        .map(|i| json!({"source": format!("n{i}"), "target": format!("n{}", i + 1), "type": "always"}))
        .collect();

    let backend = MockBackend::new(
        vec![flow(json!({"id": "f1", "nodes": nodes, "edges": edges}))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::Failed);
    // Depths 0..=50 execute before the cap trips at depth 51.
    assert_eq!(result.node_results.len(), 51);
    assert!(result
        .errors
        .last()
        .unwrap()
        .message
        .contains("max traversal depth"));
}

#[tokio::test]
async fn test_diamond_join_runs_shared_node_once() {
    let backend = MockBackend::new(
        vec![flow(json!({
            "id": "f1",
            "nodes": [
                {"id": "top", "type": "variable_set", "data": {"variable": "t", "value": "1"}},
                {"id": "left", "type": "variable_set", "data": {"variable": "l", "value": "1"}},
                {"id": "right", "type": "variable_set", "data": {"variable": "r", "value": "1"}},
                {"id": "join", "type": "variable_set", "data": {"variable": "j", "value": "1"}}
            ],
            "edges": [
                {"source": "top", "target": "left", "type": "always"},
                {"source": "top", "target": "right", "type": "always"},
                {"source": "left", "target": "join", "type": "always"},
                {"source": "right", "target": "join", "type": "always"}
            ]
        }))],
        vec![],
    );
    let transport = ScriptedTransport::new(vec![]);
    let executor = executor(backend, transport, EngineConfig::default());

    let result = executor
        .execute_flow("f1", "env1", HashMap::new(), None)
        .await;

    assert_eq!(result.status, FlowStatus::Completed);
    assert_eq!(
        result.execution_path,
        vec!["top", "left", "join", "right"]
    );
    assert_eq!(result.node_results.len(), 4);
}
