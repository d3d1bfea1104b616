//! A cloneable, data-driven condition tree.
//!
//! The closure-based [`Expression`] combinators in [`crate::expr`] work well
//! for hand-written queries but cannot be cloned once built. `Predicate` is
//! the data equivalent: callers assemble a condition tree once and lower it to
//! SQL each time a query executes, so the same predicate can back both a paged
//! SELECT and an unbounded COUNT.

use rusqlite::types::Value;

use crate::traits::Expression;

/// Comparison operators supported by [`Predicate::Cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn to_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Sort direction for an ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A condition tree over database columns.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `column <op> ?`
    Cmp {
        column: &'static str,
        op: CmpOp,
        value: Value,
    },
    /// Case-insensitive substring match: `LOWER(column) LIKE LOWER('%needle%')`
    Contains {
        column: &'static str,
        needle: String,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn cmp(column: &'static str, op: CmpOp, value: impl Into<Value>) -> Self {
        Self::Cmp {
            column,
            op,
            value: value.into(),
        }
    }

    pub fn contains(column: &'static str, needle: impl Into<String>) -> Self {
        Self::Contains {
            column,
            needle: needle.into(),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the predicate against a row accessor, for callers that need to
    /// apply the same condition to already-materialized values.
    ///
    /// `lookup` maps a column name to its value for one record; comparisons use
    /// the SQLite affinity rules we rely on in practice (text and integers).
    pub fn matches<F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Value,
    {
        match self {
            Self::Cmp { column, op, value } => compare(&lookup(column), *op, value),
            Self::Contains { column, needle } => match lookup(column) {
                Value::Text(text) => text.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            Self::And(a, b) => a.matches(lookup) && b.matches(lookup),
            Self::Or(a, b) => a.matches(lookup) || b.matches(lookup),
        }
    }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> bool {
    let ord = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Null, Value::Null) => std::cmp::Ordering::Equal,
        _ => return matches!(op, CmpOp::Ne),
    };
    match op {
        CmpOp::Eq => ord.is_eq(),
        CmpOp::Ne => ord.is_ne(),
        CmpOp::Gt => ord.is_gt(),
        CmpOp::Gte => ord.is_ge(),
        CmpOp::Lt => ord.is_lt(),
        CmpOp::Lte => ord.is_le(),
    }
}

impl Expression for Predicate {
    fn to_sql(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::Cmp { column, op, value } => {
                params.push(value.clone());
                format!("{} {} ?", column, op.to_sql())
            }
            Self::Contains { column, needle } => {
                params.push(format!("%{}%", needle).into());
                format!("LOWER({}) LIKE LOWER(?)", column)
            }
            Self::And(a, b) => {
                let left = a.to_sql(params);
                let right = b.to_sql(params);
                format!("({} AND {})", left, right)
            }
            Self::Or(a, b) => {
                let left = a.to_sql(params);
                let right = b.to_sql(params);
                format!("({} OR {})", left, right)
            }
        }
    }
}
