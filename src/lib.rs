//! Flow execution engine for API testing.
//!
//! A flow is a directed graph of typed nodes (HTTP requests, delays,
//! conditions, variable assignments) joined by edges that are gated on the
//! source node's outcome. The [`FlowExecutor`] loads a flow and its
//! environment from a [`BackendClient`], validates the graph, then walks it
//! while threading a shared variable map through interpolation, condition
//! evaluation, and response capture.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use apiflow::{BackendClient, EngineConfig, FlowExecutor};
//!
//! async fn run(backend: Arc<dyn BackendClient>) {
//!     let executor = FlowExecutor::with_backend(backend, EngineConfig::default()).unwrap();
//!     let result = executor
//!         .execute_flow("flow-1", "env-1", HashMap::new(), None)
//!         .await;
//!     println!("{:?} via {:?}", result.status, result.execution_path);
//! }
//! ```

pub mod endpoint;
pub mod engine;
pub mod environment;
pub mod error;
pub mod expr;
pub mod flow;
pub mod http;
pub mod interpolate;

pub use endpoint::{EndpointError, EndpointTester};
pub use engine::{
    EngineConfig, ExecutionError, FlowExecutionResult, FlowExecutor, FlowStatus,
    NodeExecutionResult, NodeStatus,
};
pub use environment::{
    BackendClient, BackendError, EndpointConfig, EnvironmentManager, EnvironmentVariable,
};
pub use error::{FlowError, HttpError, NodeError};
pub use flow::{validate_flow, EdgeKind, FlowConfig, FlowEdge, FlowNode, NodeData};
pub use http::{HttpExecutor, HttpResponse, HttpTransport, RequestConfig, ResponseBody};
