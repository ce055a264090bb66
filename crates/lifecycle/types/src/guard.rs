//! Guard expressions: declarative transition conditions stored as data
//!
//! A guard is a small tagged-union AST authored alongside the workflow
//! metadata. It is validated structurally when the definition is saved,
//! so evaluation at transition time is total — a validated guard never
//! raises, it only answers yes or no.

use crate::{LifecycleError, LifecycleResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Comparison Operators ─────────────────────────────────────────────

/// The operator of a single field comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Field value must be a member of the array literal
    In,
    /// Field must be absent from the context
    Missing,
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::Missing => "missing",
        };
        write!(f, "{}", s)
    }
}

// ── Guard Expression AST ─────────────────────────────────────────────

/// A declarative condition evaluated against a context map to decide
/// whether a transition is allowed.
///
/// Single-clause comparisons are the common case; `All`/`Any`/`Not`
/// allow the conjunctions business rules need in practice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardExpr {
    /// Compare a context field against a literal
    Compare {
        field: String,
        op: CompareOp,
        #[serde(default)]
        value: serde_json::Value,
    },
    /// All sub-expressions must hold
    All { exprs: Vec<GuardExpr> },
    /// At least one sub-expression must hold
    Any { exprs: Vec<GuardExpr> },
    /// The sub-expression must not hold
    Not { expr: Box<GuardExpr> },
}

impl GuardExpr {
    /// Create a field comparison
    pub fn compare(
        field: impl Into<String>,
        op: CompareOp,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Create a `field == value` comparison
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Create a `field is absent` check
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Compare {
            field: field.into(),
            op: CompareOp::Missing,
            value: serde_json::Value::Null,
        }
    }

    /// Create a conjunction
    pub fn all(exprs: Vec<GuardExpr>) -> Self {
        Self::All { exprs }
    }

    /// Create a disjunction
    pub fn any(exprs: Vec<GuardExpr>) -> Self {
        Self::Any { exprs }
    }

    /// Create a negation
    pub fn negate(expr: GuardExpr) -> Self {
        Self::Not {
            expr: Box::new(expr),
        }
    }

    /// Structurally validate the expression.
    ///
    /// Runs at metadata-save time. A guard that passes validation is
    /// guaranteed to evaluate without error against any context.
    pub fn validate(&self) -> LifecycleResult<()> {
        match self {
            Self::Compare { field, op, value } => {
                if field.is_empty() {
                    return Err(LifecycleError::Validation(
                        "guard comparison has an empty field name".into(),
                    ));
                }
                match op {
                    CompareOp::In => {
                        if !value.is_array() {
                            return Err(LifecycleError::Validation(format!(
                                "guard 'in' on field '{}' requires an array literal",
                                field
                            )));
                        }
                    }
                    CompareOp::Missing => {
                        if !value.is_null() {
                            return Err(LifecycleError::Validation(format!(
                                "guard 'missing' on field '{}' takes no literal",
                                field
                            )));
                        }
                    }
                    _ => {
                        if value.is_null() {
                            return Err(LifecycleError::Validation(format!(
                                "guard '{}' on field '{}' requires a literal",
                                op, field
                            )));
                        }
                    }
                }
                Ok(())
            }
            Self::All { exprs } | Self::Any { exprs } => {
                if exprs.is_empty() {
                    return Err(LifecycleError::Validation(
                        "guard composition must have at least one sub-expression".into(),
                    ));
                }
                for expr in exprs {
                    expr.validate()?;
                }
                Ok(())
            }
            Self::Not { expr } => expr.validate(),
        }
    }
}

impl std::fmt::Display for GuardExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compare { field, op, value } => write!(f, "{} {} {}", field, op, value),
            Self::All { exprs } => {
                let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(" and "))
            }
            Self::Any { exprs } => {
                let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(" or "))
            }
            Self::Not { expr } => write!(f, "not ({})", expr),
        }
    }
}

// ── Guard Context ────────────────────────────────────────────────────

/// The context map a guard is evaluated against: string keys to typed
/// values supplied by the caller at transition time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardContext(pub HashMap<String, serde_json::Value>);

impl GuardContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_comparison() {
        assert!(GuardExpr::eq("amount", 100).validate().is_ok());
        assert!(GuardExpr::missing("rejection_reason").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_field() {
        let expr = GuardExpr::eq("", 1);
        assert!(matches!(
            expr.validate(),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_in_requires_array() {
        let bad = GuardExpr::compare("status", CompareOp::In, json!("draft"));
        assert!(bad.validate().is_err());

        let good = GuardExpr::compare("status", CompareOp::In, json!(["draft", "review"]));
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_takes_no_literal() {
        let bad = GuardExpr::compare("field", CompareOp::Missing, json!(1));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_comparison_requires_literal() {
        let bad = GuardExpr::compare("amount", CompareOp::Gt, serde_json::Value::Null);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_empty_composition() {
        assert!(GuardExpr::all(vec![]).validate().is_err());
        assert!(GuardExpr::any(vec![]).validate().is_err());
    }

    #[test]
    fn test_validate_recurses() {
        let nested = GuardExpr::all(vec![
            GuardExpr::eq("a", 1),
            GuardExpr::negate(GuardExpr::compare("b", CompareOp::In, json!("not-an-array"))),
        ]);
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_context_builder() {
        let ctx = GuardContext::new()
            .with_value("amount", 250)
            .with_value("currency", "EUR");
        assert!(ctx.contains("amount"));
        assert_eq!(ctx.get("currency"), Some(&json!("EUR")));
        assert!(!ctx.contains("absent"));
    }

    #[test]
    fn test_guard_serde_round_trip() {
        let expr = GuardExpr::all(vec![
            GuardExpr::eq("status", "ready"),
            GuardExpr::compare("total", CompareOp::Gte, 10),
        ]);
        let encoded = serde_json::to_string(&expr).unwrap();
        let decoded: GuardExpr = serde_json::from_str(&encoded).unwrap();
        assert_eq!(expr, decoded);
    }

    #[test]
    fn test_display() {
        let expr = GuardExpr::any(vec![
            GuardExpr::eq("status", "ready"),
            GuardExpr::missing("hold"),
        ]);
        let shown = format!("{}", expr);
        assert!(shown.contains("status eq"));
        assert!(shown.contains("or"));
    }
}
