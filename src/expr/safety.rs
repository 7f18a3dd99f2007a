//! Static safety filter, applied before parsing.
//!
//! The interpreter itself has no access to the host environment, so these
//! checks are not the sandbox boundary. They exist to report obviously
//! hostile or malformed inputs (`while(true){}`, `process.exit(1)`) as
//! safety violations rather than as incidental parse errors.

use super::error::ExprError;

pub const MAX_EXPRESSION_LEN: usize = 1000;
pub const MAX_BRACE_NESTING: usize = 3;

/// Identifiers that signal an attempt to reach host facilities or to build
/// code dynamically. None of them exist in the expression language.
const FORBIDDEN_IDENTIFIERS: &[&str] = &[
    "eval",
    "require",
    "import",
    "process",
    "global",
    "window",
    "document",
    "console",
    "setTimeout",
    "setInterval",
    "fetch",
    "XMLHttpRequest",
    "constructor",
    "prototype",
    "__proto__",
];

/// Loop and function-declaration keywords; the grammar has neither.
const FORBIDDEN_KEYWORDS: &[&str] = &["for", "while", "do", "function"];

/// Reject an expression before it reaches the parser.
pub fn check_expression(expr: &str) -> Result<(), ExprError> {
    if expr.trim().is_empty() {
        return Err(ExprError::unsafe_expr("empty expression", expr));
    }
    if expr.len() > MAX_EXPRESSION_LEN {
        return Err(ExprError::unsafe_expr(
            format!("expression exceeds {MAX_EXPRESSION_LEN} characters"),
            expr,
        ));
    }
    if expr.matches('{').count() > MAX_BRACE_NESTING {
        return Err(ExprError::unsafe_expr(
            format!("more than {MAX_BRACE_NESTING} opening braces"),
            expr,
        ));
    }
    if expr.contains("=>") {
        return Err(ExprError::unsafe_expr("arrow function declaration", expr));
    }

    for word in words(expr) {
        if FORBIDDEN_KEYWORDS.contains(&word) {
            return Err(ExprError::unsafe_expr(
                format!("loop or function construct '{word}'"),
                expr,
            ));
        }
        if FORBIDDEN_IDENTIFIERS.contains(&word) {
            return Err(ExprError::unsafe_expr(
                format!("forbidden identifier '{word}'"),
                expr,
            ));
        }
    }

    Ok(())
}

/// Split into identifier-shaped words, ignoring string/number context.
/// Over-matching is fine here: a false positive only rejects an expression
/// that embeds a forbidden word in a string literal.
fn words(expr: &str) -> impl Iterator<Item = &str> {
    expr.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}
