//! Tree-walking evaluator with type coercion and a whitelisted function
//! table. Evaluation is bounded by a wall-clock deadline checked as the
//! tree is walked.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::error::ExprError;
use super::parser::{BinaryOp, Expr, UnaryOp};

pub struct Evaluator<'a> {
    vars: &'a HashMap<String, String>,
    deadline: Instant,
    timeout: Duration,
    steps: u32,
}

const DEADLINE_CHECK_INTERVAL: u32 = 64;

impl<'a> Evaluator<'a> {
    pub fn new(vars: &'a HashMap<String, String>, timeout: Duration) -> Self {
        Evaluator {
            vars,
            deadline: Instant::now() + timeout,
            timeout,
            steps: 0,
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        self.steps = self.steps.wrapping_add(1);
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() > self.deadline {
            return Err(ExprError::Timeout(self.timeout.as_millis() as u64));
        }

        match expr {
            Expr::Number(n) => number(*n),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Var(name) => self
                .vars
                .get(name)
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| ExprError::Eval(format!("unknown identifier '{name}'"))),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => number(-to_number(&value)?),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                call_function(name, &args)
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, ExprError> {
        // Short-circuit before evaluating the right-hand side.
        match op {
            BinaryOp::And => {
                let l = self.eval(lhs)?;
                if !truthy(&l) {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(rhs)?;
                return Ok(Value::Bool(truthy(&r)));
            }
            BinaryOp::Or => {
                let l = self.eval(lhs)?;
                if truthy(&l) {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(rhs)?;
                return Ok(Value::Bool(truthy(&r)));
            }
            _ => {}
        }

        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        match op {
            BinaryOp::Add => {
                // Numeric addition when both sides coerce, else concatenation.
                match (as_number(&l), as_number(&r)) {
                    (Some(a), Some(b)) => number(a + b),
                    _ => Ok(Value::String(format!("{}{}", display(&l), display(&r)))),
                }
            }
            BinaryOp::Sub => number(to_number(&l)? - to_number(&r)?),
            BinaryOp::Mul => number(to_number(&l)? * to_number(&r)?),
            BinaryOp::Div => number(to_number(&l)? / to_number(&r)?),
            BinaryOp::Rem => number(to_number(&l)? % to_number(&r)?),
            BinaryOp::Eq => Ok(Value::Bool(loose_eq(&l, &r))),
            BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&l, &r))),
            BinaryOp::Lt => compare(&l, &r, |o| o == std::cmp::Ordering::Less),
            BinaryOp::Le => compare(&l, &r, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::Gt => compare(&l, &r, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::Ge => compare(&l, &r, |o| o != std::cmp::Ordering::Less),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }
}

/// Truthiness: null and empty strings are false, zero is false, everything
/// else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Best-effort numeric coercion: numbers, numeric strings, booleans, null.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

fn to_number(value: &Value) -> Result<f64, ExprError> {
    as_number(value).ok_or_else(|| ExprError::Eval(format!("cannot convert {value} to a number")))
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn number(n: f64) -> Result<Value, ExprError> {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Eval(format!("non-finite arithmetic result: {n}")))
}

/// Loose equality: numeric when both sides coerce, string comparison
/// otherwise.
fn loose_eq(l: &Value, r: &Value) -> bool {
    match (as_number(l), as_number(r)) {
        (Some(a), Some(b)) => a == b,
        _ => display(l) == display(r),
    }
}

fn compare(
    l: &Value,
    r: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, ExprError> {
    let ordering = match (as_number(l), as_number(r)) {
        (Some(a), Some(b)) => a
            .partial_cmp(&b)
            .ok_or_else(|| ExprError::Eval("NaN is not comparable".to_string()))?,
        _ => display(l).cmp(&display(r)),
    };
    Ok(Value::Bool(accept(ordering)))
}

fn call_function(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let arity = |n: usize| -> Result<(), ExprError> {
        if args.len() == n {
            Ok(())
        } else {
            Err(ExprError::Eval(format!(
                "{name}() takes {n} argument(s), got {}",
                args.len()
            )))
        }
    };

    match name {
        "abs" => {
            arity(1)?;
            number(to_number(&args[0])?.abs())
        }
        "floor" => {
            arity(1)?;
            number(to_number(&args[0])?.floor())
        }
        "ceil" => {
            arity(1)?;
            number(to_number(&args[0])?.ceil())
        }
        "round" => {
            arity(1)?;
            number(to_number(&args[0])?.round())
        }
        "min" => {
            arity(2)?;
            number(to_number(&args[0])?.min(to_number(&args[1])?))
        }
        "max" => {
            arity(2)?;
            number(to_number(&args[0])?.max(to_number(&args[1])?))
        }
        "len" => {
            arity(1)?;
            let n = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                other => {
                    return Err(ExprError::Eval(format!("len() does not apply to {other}")));
                }
            };
            Ok(json!(n))
        }
        "contains" => {
            arity(2)?;
            Ok(Value::Bool(
                display(&args[0]).contains(&display(&args[1])),
            ))
        }
        "starts_with" => {
            arity(2)?;
            Ok(Value::Bool(
                display(&args[0]).starts_with(&display(&args[1])),
            ))
        }
        "ends_with" => {
            arity(2)?;
            Ok(Value::Bool(
                display(&args[0]).ends_with(&display(&args[1])),
            ))
        }
        "lower" => {
            arity(1)?;
            Ok(Value::String(display(&args[0]).to_lowercase()))
        }
        "upper" => {
            arity(1)?;
            Ok(Value::String(display(&args[0]).to_uppercase()))
        }
        "trim" => {
            arity(1)?;
            Ok(Value::String(display(&args[0]).trim().to_string()))
        }
        "parse_int" => {
            arity(1)?;
            match as_number(&args[0]) {
                Some(n) => number(n.trunc()),
                None => Ok(Value::Null),
            }
        }
        "parse_float" => {
            arity(1)?;
            match as_number(&args[0]) {
                Some(n) => number(n),
                None => Ok(Value::Null),
            }
        }
        "is_nan" => {
            arity(1)?;
            Ok(Value::Bool(as_number(&args[0]).is_none()))
        }
        other => Err(ExprError::Eval(format!("unknown function '{other}'"))),
    }
}
