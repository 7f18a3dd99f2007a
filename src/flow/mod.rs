//! Flow definitions: a directed graph of typed nodes and conditionally
//! traversed edges.

mod validator;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use validator::validate_flow;

/// A named flow graph. Immutable once loaded for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

/// One node of a flow. The payload is a closed tagged union: unknown
/// `type` values fail deserialization instead of surfacing at execution
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(flatten)]
    pub data: NodeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeData {
    HttpRequest(HttpRequestNode),
    Delay(DelayNode),
    Condition(ConditionNode),
    VariableSet(VariableSetNode),
}

impl NodeData {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeData::HttpRequest(_) => "http_request",
            NodeData::Delay(_) => "delay",
            NodeData::Condition(_) => "condition",
            NodeData::VariableSet(_) => "variable_set",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequestNode {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub save_response: bool,
    #[serde(default)]
    pub response_variable: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayNode {
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionNode {
    pub condition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSetNode {
    pub variable: String,
    pub value: String,
}

/// Directed edge, gated by the source node's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,
}

/// Unrecognized edge types deserialize as `Always`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Success,
    Error,
    True,
    False,
    #[default]
    #[serde(other)]
    Always,
}
