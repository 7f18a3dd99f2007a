//! Error types, layered the way failures propagate: HTTP transport errors,
//! node-level errors, and flow-level (orchestration-fatal) errors.

mod flow_error;
mod http_error;
mod node_error;

pub use flow_error::FlowError;
pub use http_error::HttpError;
pub use node_error::NodeError;
