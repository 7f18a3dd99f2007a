//! `{{name}}` variable interpolation.
//!
//! Substitution is best-effort: unknown placeholders are left verbatim and
//! logged, never turned into an error. Only well-formed placeholders
//! (`[A-Za-z0-9_]+` between double braces) are touched.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::NodeError;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("valid placeholder regex"))
}

/// True if `s` is usable as a variable name / placeholder identifier.
pub(crate) fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True if `s` carries at least one well-formed `{{name}}` placeholder.
pub(crate) fn contains_placeholder(s: &str) -> bool {
    placeholder_re().is_match(s)
}

/// Substitute `{{name}}` placeholders in `text` against `vars`.
pub fn interpolate(text: &str, vars: &HashMap<String, String>) -> String {
    placeholder_re()
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => value.clone(),
                None => {
                    tracing::warn!(variable = name, "unresolved placeholder left verbatim");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Recursively interpolate a JSON tree: string leaves and object keys are
/// interpolated, everything else passes through unchanged. `null` becomes
/// the empty string so it can be embedded in URLs and headers safely.
pub fn interpolate_value(value: &Value, vars: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, vars)),
        Value::Null => Value::String(String::new()),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| interpolate_value(v, vars)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (interpolate(k, vars), interpolate_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Interpolate a URL template and check the result still parses as an
/// absolute URL.
pub fn interpolate_url(template: &str, vars: &HashMap<String, String>) -> Result<String, NodeError> {
    let resolved = interpolate(template, vars);
    url::Url::parse(&resolved)
        .map_err(|e| NodeError::Interpolation(format!("resolved URL '{resolved}' is invalid: {e}")))?;
    Ok(resolved)
}

/// Interpolate both keys and values of a header map.
pub fn interpolate_headers(
    headers: &HashMap<String, String>,
    vars: &HashMap<String, String>,
) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (interpolate(k, vars), interpolate(v, vars)))
        .collect()
}

/// Interpolate a request body template.
pub fn interpolate_body(body: &Value, vars: &HashMap<String, String>) -> Value {
    interpolate_value(body, vars)
}
