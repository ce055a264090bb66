//! Guard Evaluator for docflow
//!
//! Evaluates validated [`GuardExpr`] trees against a caller-supplied
//! [`GuardContext`]. Evaluation is total: a validated guard never
//! errors, it produces a [`GuardVerdict`] that is either satisfied or
//! carries a human-readable reason why not.
//!
//! Comparison semantics are type-aware. Numbers compare numerically,
//! strings lexicographically, booleans support equality only. A
//! comparison between mismatched types is not satisfied rather than an
//! error, and so is any comparison against a field the context does
//! not contain (except `missing`, which is satisfied exactly then).

#![deny(unsafe_code)]

use lifecycle_types::{CompareOp, GuardExpr, GuardContext};
use serde_json::Value;

// ── Verdict ──────────────────────────────────────────────────────────

/// The outcome of evaluating a guard expression
#[derive(Clone, Debug, PartialEq)]
pub enum GuardVerdict {
    /// The guard holds; the transition may proceed
    Satisfied,
    /// The guard does not hold
    NotSatisfied { reason: String },
}

impl GuardVerdict {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// The failure reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Satisfied => None,
            Self::NotSatisfied { reason } => Some(reason),
        }
    }

    fn not_satisfied(reason: impl Into<String>) -> Self {
        Self::NotSatisfied {
            reason: reason.into(),
        }
    }
}

// ── Evaluator ────────────────────────────────────────────────────────

/// Stateless evaluator for guard expressions
#[derive(Clone, Copy, Debug, Default)]
pub struct GuardEvaluator;

impl GuardEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a guard against a context.
    ///
    /// Never errors: structural problems are caught by
    /// `GuardExpr::validate` before the guard is ever stored.
    pub fn evaluate(&self, guard: &GuardExpr, context: &GuardContext) -> GuardVerdict {
        let verdict = self.eval(guard, context);
        if let GuardVerdict::NotSatisfied { reason } = &verdict {
            tracing::debug!(guard = %guard, reason = %reason, "guard not satisfied");
        }
        verdict
    }

    fn eval(&self, guard: &GuardExpr, context: &GuardContext) -> GuardVerdict {
        match guard {
            GuardExpr::Compare { field, op, value } => self.eval_compare(field, *op, value, context),
            GuardExpr::All { exprs } => {
                for expr in exprs {
                    let verdict = self.eval(expr, context);
                    if !verdict.is_satisfied() {
                        return verdict;
                    }
                }
                GuardVerdict::Satisfied
            }
            GuardExpr::Any { exprs } => {
                let mut reasons = Vec::new();
                for expr in exprs {
                    match self.eval(expr, context) {
                        GuardVerdict::Satisfied => return GuardVerdict::Satisfied,
                        GuardVerdict::NotSatisfied { reason } => reasons.push(reason),
                    }
                }
                GuardVerdict::not_satisfied(format!(
                    "no alternative held: {}",
                    reasons.join("; ")
                ))
            }
            GuardExpr::Not { expr } => match self.eval(expr, context) {
                GuardVerdict::Satisfied => {
                    GuardVerdict::not_satisfied(format!("negated condition held: {}", expr))
                }
                GuardVerdict::NotSatisfied { .. } => GuardVerdict::Satisfied,
            },
        }
    }

    fn eval_compare(
        &self,
        field: &str,
        op: CompareOp,
        literal: &Value,
        context: &GuardContext,
    ) -> GuardVerdict {
        let actual = context.get(field);

        if op == CompareOp::Missing {
            return match actual {
                None => GuardVerdict::Satisfied,
                Some(v) => GuardVerdict::not_satisfied(format!(
                    "field '{}' is present with value {}",
                    field, v
                )),
            };
        }

        let Some(actual) = actual else {
            return GuardVerdict::not_satisfied(format!("field '{}' is absent", field));
        };

        match op {
            CompareOp::Eq | CompareOp::Ne => match equal(actual, literal) {
                Some(eq) if (op == CompareOp::Eq) == eq => GuardVerdict::Satisfied,
                Some(_) => GuardVerdict::not_satisfied(format!(
                    "field '{}' is {}, expected {} {}",
                    field, actual, op, literal
                )),
                None => type_mismatch(field, actual, literal),
            },
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
                match ordering(actual, literal) {
                    Some(ord) => {
                        let holds = match op {
                            CompareOp::Lt => ord.is_lt(),
                            CompareOp::Lte => ord.is_le(),
                            CompareOp::Gt => ord.is_gt(),
                            CompareOp::Gte => ord.is_ge(),
                            _ => unreachable!(),
                        };
                        if holds {
                            GuardVerdict::Satisfied
                        } else {
                            GuardVerdict::not_satisfied(format!(
                                "field '{}' is {}, expected {} {}",
                                field, actual, op, literal
                            ))
                        }
                    }
                    None => type_mismatch(field, actual, literal),
                }
            }
            CompareOp::In => {
                // validate() guarantees the literal is an array
                let members = literal.as_array().map(Vec::as_slice).unwrap_or(&[]);
                if members.iter().any(|m| equal(actual, m) == Some(true)) {
                    GuardVerdict::Satisfied
                } else {
                    GuardVerdict::not_satisfied(format!(
                        "field '{}' is {}, not a member of {}",
                        field, actual, literal
                    ))
                }
            }
            CompareOp::Missing => unreachable!(),
        }
    }
}

/// Type-aware equality. `None` means the types are not comparable.
fn equal(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Some(x.as_f64() == y.as_f64()),
        (Value::String(x), Value::String(y)) => Some(x == y),
        (Value::Bool(x), Value::Bool(y)) => Some(x == y),
        _ => None,
    }
}

/// Type-aware ordering. Booleans and mismatched types have no ordering.
fn ordering(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_mismatch(field: &str, actual: &Value, literal: &Value) -> GuardVerdict {
    GuardVerdict::not_satisfied(format!(
        "field '{}' ({}) and literal {} have incompatible types",
        field, actual, literal
    ))
}
