//! Safe expression evaluation for condition nodes.
//!
//! Conditions are authored as small boolean/arithmetic expressions
//! (`status == 200 && retries < 3`). They are evaluated by a purpose-built
//! interpreter — lexer, Pratt parser, tree evaluator — that is seeded only
//! with the caller's variable map and a whitelisted function table, so an
//! expression has no path to the process, filesystem or network. A static
//! safety filter additionally rejects host-language constructs up front and
//! reports them as [`ExprError::Unsafe`].

mod error;
mod eval;
mod lexer;
mod parser;
mod safety;

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

pub use error::ExprError;
pub use eval::truthy;
pub use safety::{MAX_BRACE_NESTING, MAX_EXPRESSION_LEN};

pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a dry-run validation, see [`test_expression`].
#[derive(Debug, Clone)]
pub struct ExpressionCheck {
    pub is_valid: bool,
    pub error: Option<String>,
}

/// Evaluate `expression` against `vars` with the default 5s timeout.
pub fn evaluate(expression: &str, vars: &HashMap<String, String>) -> Result<Value, ExprError> {
    evaluate_with_timeout(expression, vars, DEFAULT_EVAL_TIMEOUT)
}

/// Evaluate with an explicit wall-clock bound.
///
/// Context keys that are not valid identifiers are unreachable from the
/// grammar and are ignored rather than filtered eagerly.
pub fn evaluate_with_timeout(
    expression: &str,
    vars: &HashMap<String, String>,
    timeout: Duration,
) -> Result<Value, ExprError> {
    safety::check_expression(expression)?;
    let tokens = lexer::tokenize(expression)?;
    let ast = parser::parse(&tokens)?;
    eval::Evaluator::new(vars, timeout).eval(&ast).map_err(|e| {
        tracing::debug!(
            expression = %error::snippet(expression),
            error = %e,
            "expression evaluation failed"
        );
        e
    })
}

/// Validate syntax and safety without evaluating.
pub fn test_expression(expression: &str) -> ExpressionCheck {
    let outcome = safety::check_expression(expression)
        .and_then(|_| lexer::tokenize(expression))
        .and_then(|tokens| parser::parse(&tokens).map(|_| ()));
    match outcome {
        Ok(()) => ExpressionCheck {
            is_valid: true,
            error: None,
        },
        Err(e) => ExpressionCheck {
            is_valid: false,
            error: Some(e.to_string()),
        },
    }
}
