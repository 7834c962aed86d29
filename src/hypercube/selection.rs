//! Selection criteria over statistical values
//!
//! A [`Criteria`] is a pure predicate on a [`Stat`]. Primitives test the value
//! or the coordinates and compose with `And`, `Or` and `Not`.
//!
//! # Example
//!
//! ```rust
//! use statcube::hypercube::{CompareOp, Criteria};
//! use statcube::types::Stat;
//!
//! let stat = Stat::with_dims(12.0, &[("geo", "FR"), ("time", "2020")]);
//! let crit = Criteria::and([
//!     Criteria::dim_equal(&[("geo", "FR")]),
//!     Criteria::value(CompareOp::Gt, 10.0),
//! ]);
//! assert!(crit.keep(&stat));
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Stat;

/// Comparison operator for value and coordinate predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
}

impl CompareOp {
    /// Apply the operator with IEEE semantics (any NaN comparison is false, except `!=`)
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Gt => left > right,
            CompareOp::Lt => left < right,
            CompareOp::Ge => left >= right,
            CompareOp::Le => left <= right,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }
}

/// User supplied predicate
pub type StatPredicate = Arc<dyn Fn(&Stat) -> bool + Send + Sync>;

/// Predicate over a stat
#[derive(Clone)]
pub enum Criteria {
    /// Compare the value with a constant
    Value(CompareOp, f64),

    /// The value is not NaN
    ValueDefined,

    /// Every listed coordinate equals the given value
    DimEqual(Vec<(String, String)>),

    /// Every listed coordinate differs from the given value
    ///
    /// An absent coordinate differs from any value.
    DimDifferent(Vec<(String, String)>),

    /// Coordinate parsed as a number compared with a constant
    ///
    /// False when the coordinate is absent or not numeric.
    DimNumeric(String, CompareOp, f64),

    /// All sub-criteria hold (true when empty)
    And(Vec<Criteria>),

    /// At least one sub-criterion holds (false when empty)
    Or(Vec<Criteria>),

    /// Negation
    Not(Box<Criteria>),

    /// Arbitrary predicate
    Custom(StatPredicate),
}

impl Criteria {
    /// Value comparison
    #[must_use]
    pub fn value(op: CompareOp, threshold: f64) -> Self {
        Criteria::Value(op, threshold)
    }

    /// Coordinates equal to every `(label, value)` pair
    #[must_use]
    pub fn dim_equal(pairs: &[(&str, &str)]) -> Self {
        Criteria::DimEqual(owned_pairs(pairs))
    }

    /// Coordinates different from every `(label, value)` pair
    #[must_use]
    pub fn dim_different(pairs: &[(&str, &str)]) -> Self {
        Criteria::DimDifferent(owned_pairs(pairs))
    }

    /// Numeric coordinate comparison
    #[must_use]
    pub fn dim_numeric(label: impl Into<String>, op: CompareOp, threshold: f64) -> Self {
        Criteria::DimNumeric(label.into(), op, threshold)
    }

    /// Conjunction; a single criterion is returned as is
    #[must_use]
    pub fn and<I: IntoIterator<Item = Criteria>>(criteria: I) -> Self {
        let mut all: Vec<Criteria> = criteria.into_iter().collect();
        if all.len() == 1 {
            return all.remove(0);
        }
        Criteria::And(all)
    }

    /// Disjunction; a single criterion is returned as is
    #[must_use]
    pub fn or<I: IntoIterator<Item = Criteria>>(criteria: I) -> Self {
        let mut any: Vec<Criteria> = criteria.into_iter().collect();
        if any.len() == 1 {
            return any.remove(0);
        }
        Criteria::Or(any)
    }

    /// Negation
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(criteria: Criteria) -> Self {
        Criteria::Not(Box::new(criteria))
    }

    /// Wrap a closure
    #[must_use]
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Stat) -> bool + Send + Sync + 'static,
    {
        Criteria::Custom(Arc::new(f))
    }

    /// Evaluate the criteria on a stat
    pub fn keep(&self, stat: &Stat) -> bool {
        match self {
            Criteria::Value(op, threshold) => op.compare(stat.value, *threshold),
            Criteria::ValueDefined => !stat.value.is_nan(),
            Criteria::DimEqual(pairs) => pairs
                .iter()
                .all(|(label, value)| stat.get_dim(label) == Some(value.as_str())),
            Criteria::DimDifferent(pairs) => pairs
                .iter()
                .all(|(label, value)| stat.get_dim(label) != Some(value.as_str())),
            Criteria::DimNumeric(label, op, threshold) => stat
                .get_dim(label)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|v| op.compare(v, *threshold))
                .unwrap_or(false),
            Criteria::And(all) => all.iter().all(|c| c.keep(stat)),
            Criteria::Or(any) => any.iter().any(|c| c.keep(stat)),
            Criteria::Not(inner) => !inner.keep(stat),
            Criteria::Custom(f) => f(stat),
        }
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(l, v)| ((*l).to_string(), (*v).to_string()))
        .collect()
}

impl fmt::Debug for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Value(op, t) => write!(f, "value {} {}", op.symbol(), t),
            Criteria::ValueDefined => write!(f, "value defined"),
            Criteria::DimEqual(pairs) => {
                let parts: Vec<_> = pairs.iter().map(|(l, v)| format!("{}={}", l, v)).collect();
                write!(f, "{}", parts.join(" & "))
            }
            Criteria::DimDifferent(pairs) => {
                let parts: Vec<_> = pairs.iter().map(|(l, v)| format!("{}!={}", l, v)).collect();
                write!(f, "{}", parts.join(" & "))
            }
            Criteria::DimNumeric(l, op, t) => write!(f, "{} {} {}", l, op.symbol(), t),
            Criteria::And(all) => {
                let parts: Vec<_> = all.iter().map(|c| format!("({})", c)).collect();
                write!(f, "{}", parts.join(" AND "))
            }
            Criteria::Or(any) => {
                let parts: Vec<_> = any.iter().map(|c| format!("({})", c)).collect();
                write!(f, "{}", parts.join(" OR "))
            }
            Criteria::Not(inner) => write!(f, "NOT ({})", inner),
            Criteria::Custom(_) => write!(f, "<custom>"),
        }
    }
}
