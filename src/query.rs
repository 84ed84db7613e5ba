use serde_json::Value;

use crate::store::Document;

/// A filter evaluated against partition documents. Mirrors exactly the
/// subset of the document store's query surface the core needs: match-all,
/// equality, and conjunction. Scoping clauses are conjoined onto whatever
/// filter the caller supplied, so the tree must stay purely additive.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    All,
    And(Vec<FilterExpr>),
    Eq { field: String, value: Value },
}

impl FilterExpr {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjoins `clause` onto `self` without disturbing existing structure.
    pub fn and_with(self, clause: FilterExpr) -> FilterExpr {
        match self {
            FilterExpr::All => clause,
            FilterExpr::And(mut children) => {
                children.push(clause);
                FilterExpr::And(children)
            }
            other => FilterExpr::And(vec![other, clause]),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            FilterExpr::All => true,
            FilterExpr::And(children) => children.iter().all(|child| child.matches(document)),
            FilterExpr::Eq { field, value } => document
                .get(field)
                .map(|actual| values_equal(actual, value))
                .unwrap_or(false),
        }
    }
}

/// Equality with numeric leniency: documents of different vintages store
/// the same number as i64 or f64 and those must compare equal.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(lhs), Value::Number(rhs)) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => false,
        },
        _ => lhs == rhs,
    }
}
