use thiserror::Error;

use crate::expr::ExprError;

use super::HttpError;

/// Node-level errors. Caught by the flow executor and converted into an
/// error-status node result; they never abort the run by themselves.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("variable interpolation error: {0}")]
    Interpolation(String),
    #[error("condition evaluation failed: {0}")]
    Condition(#[from] ExprError),
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
}
