//! Static flow validation, run before any node executes.

use std::collections::HashMap;

use petgraph::stable_graph::StableDiGraph;

use crate::error::FlowError;
use crate::expr::test_expression;
use crate::http::is_known_method;
use crate::interpolate::{contains_placeholder, is_identifier};

use super::{FlowConfig, NodeData};

/// Validate a flow graph. All violations are aggregated so a flow author
/// sees every problem at once.
pub fn validate_flow(flow: &FlowConfig) -> Result<(), FlowError> {
    let mut issues = Vec::new();

    if flow.nodes.is_empty() {
        issues.push("flow has no nodes".to_string());
    }

    let mut seen = HashMap::new();
    for node in &flow.nodes {
        if seen.insert(node.id.as_str(), ()).is_some() {
            issues.push(format!("duplicate node id: '{}'", node.id));
        }
    }

    // Build the graph over valid edges only; dangling edges are reported
    // separately and excluded from the topology checks.
    let mut graph: StableDiGraph<&str, ()> = StableDiGraph::new();
    let mut indices = HashMap::new();
    for node in &flow.nodes {
        indices.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
    }
    for edge in &flow.edges {
        match (indices.get(edge.source.as_str()), indices.get(edge.target.as_str())) {
            (Some(&source), Some(&target)) => {
                graph.add_edge(source, target, ());
            }
            _ => issues.push(format!(
                "edge references unknown node: '{}' -> '{}'",
                edge.source, edge.target
            )),
        }
    }

    if !flow.nodes.is_empty() {
        let has_start = graph.node_indices().any(|idx| {
            graph
                .neighbors_directed(idx, petgraph::Direction::Incoming)
                .count()
                == 0
        });
        if !has_start {
            issues.push("no start node: every node has an incoming edge".to_string());
        }
    }

    if petgraph::algo::is_cyclic_directed(&graph) {
        issues.push("circular dependency detected in flow graph".to_string());
    }

    for node in &flow.nodes {
        validate_node(node.id.as_str(), &node.data, &mut issues);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(FlowError::Validation(issues))
    }
}

fn validate_node(node_id: &str, data: &NodeData, issues: &mut Vec<String>) {
    match data {
        NodeData::HttpRequest(cfg) => {
            if cfg.url.trim().is_empty() {
                issues.push(format!("node '{node_id}': http_request requires a url"));
            }
            // Templated methods resolve at run time; request preparation
            // rejects whatever they interpolate to if it is not a method.
            if !contains_placeholder(&cfg.method) && !is_known_method(&cfg.method) {
                issues.push(format!(
                    "node '{node_id}': unknown HTTP method '{}'",
                    cfg.method
                ));
            }
            if cfg.save_response && cfg.response_variable.is_none() {
                issues.push(format!(
                    "node '{node_id}': save_response requires response_variable"
                ));
            }
            if let Some(name) = &cfg.response_variable {
                if !is_identifier(name) {
                    issues.push(format!(
                        "node '{node_id}': invalid response_variable '{name}'"
                    ));
                }
            }
        }
        NodeData::Condition(cfg) => {
            if cfg.condition.trim().is_empty() {
                issues.push(format!("node '{node_id}': condition requires an expression"));
            } else {
                let check = test_expression(&cfg.condition);
                if let Some(error) = check.error {
                    issues.push(format!("node '{node_id}': invalid condition: {error}"));
                }
            }
        }
        NodeData::VariableSet(cfg) => {
            if !is_identifier(&cfg.variable) {
                issues.push(format!(
                    "node '{node_id}': invalid variable name '{}'",
                    cfg.variable
                ));
            }
        }
        // Duration is unsigned at the type level; the executor clamps it.
        NodeData::Delay(_) => {}
    }
}
