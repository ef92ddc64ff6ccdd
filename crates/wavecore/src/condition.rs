//! Typed relation predicates.
//!
//! Conditions are a closed expression tree evaluated against one emitted
//! value. Paths are JSON pointers into that value; an empty path is the value
//! itself.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison operators for [`ConditionExpr::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Array membership or substring.
    Contains,
}

/// Boolean expression over a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionExpr {
    Always,
    Truthy {
        #[serde(default)]
        path: String,
    },
    Exists {
        path: String,
    },
    Compare {
        #[serde(default)]
        path: String,
        op: CompareOp,
        value: Value,
    },
    All {
        conditions: Vec<ConditionExpr>,
    },
    Any {
        conditions: Vec<ConditionExpr>,
    },
    Not {
        condition: Box<ConditionExpr>,
    },
}

impl ConditionExpr {
    /// `value at path <op> operand`
    pub fn compare(path: impl Into<String>, op: CompareOp, operand: impl Into<Value>) -> Self {
        ConditionExpr::Compare {
            path: path.into(),
            op,
            value: operand.into(),
        }
    }

    pub fn truthy(path: impl Into<String>) -> Self {
        ConditionExpr::Truthy { path: path.into() }
    }

    pub fn negate(self) -> Self {
        ConditionExpr::Not {
            condition: Box::new(self),
        }
    }

    /// Evaluate against `value`. Errors describe type mismatches that make
    /// the comparison meaningless.
    pub fn evaluate(&self, value: &Value) -> Result<bool, String> {
        match self {
            ConditionExpr::Always => Ok(true),
            ConditionExpr::Truthy { path } => Ok(value.pointer(path).is_some_and(Value::is_truthy)),
            ConditionExpr::Exists { path } => Ok(value.pointer(path).is_some()),
            ConditionExpr::Compare { path, op, value: operand } => {
                let target = value.pointer(path).unwrap_or(&Value::Null);
                compare(target, *op, operand)
            }
            ConditionExpr::All { conditions } => {
                for condition in conditions {
                    if !condition.evaluate(value)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConditionExpr::Any { conditions } => {
                for condition in conditions {
                    if condition.evaluate(value)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ConditionExpr::Not { condition } => Ok(!condition.evaluate(value)?),
        }
    }
}

fn compare(target: &Value, op: CompareOp, operand: &Value) -> Result<bool, String> {
    match op {
        CompareOp::Eq => Ok(target == operand),
        CompareOp::Ne => Ok(target != operand),
        CompareOp::Contains => match (target, operand) {
            (Value::Array(items), needle) => Ok(items.contains(needle)),
            (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
            _ => Err(format!(
                "cannot test whether {} contains {}",
                target.kind(),
                operand.kind()
            )),
        },
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            let ordering = order(target, operand)?;
            Ok(match op {
                CompareOp::Gt => ordering == Some(Ordering::Greater),
                CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                CompareOp::Lt => ordering == Some(Ordering::Less),
                _ => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            })
        }
    }
}

fn order(left: &Value, right: &Value) -> Result<Option<Ordering>, String> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        _ => Err(format!("cannot order {} against {}", left.kind(), right.kind())),
    }
}
