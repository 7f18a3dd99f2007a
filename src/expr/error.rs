use thiserror::Error;

/// Cap on how much of an offending expression is echoed back in errors.
const SNIPPET_LEN: usize = 120;

/// Truncate an expression for inclusion in error messages and logs.
pub(crate) fn snippet(expr: &str) -> String {
    if expr.chars().count() <= SNIPPET_LEN {
        expr.to_string()
    } else {
        let head: String = expr.chars().take(SNIPPET_LEN).collect();
        format!("{head}…")
    }
}

/// Expression evaluation errors.
///
/// `Unsafe` marks expressions rejected by the static safety filter before
/// any parsing or evaluation happens; it must surface clearly and is never
/// silently ignored.
#[derive(Debug, Clone, Error)]
pub enum ExprError {
    #[error("unsafe expression rejected ({reason}): {expression}")]
    Unsafe { reason: String, expression: String },
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("evaluation error: {0}")]
    Eval(String),
    #[error("expression evaluation timed out after {0}ms")]
    Timeout(u64),
}

impl ExprError {
    pub(crate) fn unsafe_expr(reason: impl Into<String>, expr: &str) -> Self {
        ExprError::Unsafe {
            reason: reason.into(),
            expression: snippet(expr),
        }
    }
}
