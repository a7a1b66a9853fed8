//! Query lookups and Q objects for building filters.
//!
//! [`Lookup`] carries the right-hand side of one comparison; [`Q`] combines
//! lookups with `&` (AND), `|` (OR) and `!` (NOT). On hstore columns the
//! right-hand side of most lookups is a mapping or a list of keys, so the
//! containment lookups take a full [`Value`] rather than a string.
//!
//! # Examples
//!
//! ```
//! use hstore_rs_db::query::lookups::{Q, Lookup};
//! use hstore_rs_db::value::Value;
//!
//! // data @> 'a=>1'
//! let q = Q::filter("data", Lookup::Contains(Value::map([("a", 1), ("b", 2)])));
//!
//! // data ? 'a' AND name = 'x'
//! let combined = Q::filter("data", Lookup::Contains(Value::from(vec!["a"])))
//!     & Q::filter("name", Lookup::Exact(Value::from("x")));
//!
//! let negated = !combined;
//! ```

use std::ops;

use crate::value::Value;

/// A field-level lookup operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// `exact`
    Exact(Value),
    /// `iexact`
    IExact(Value),
    /// `contains`: a substring on text columns; a mapping or key list on
    /// hstore columns.
    Contains(Value),
    /// `icontains`
    IContains(Value),
    /// `in`
    In(Vec<Value>),
    /// `gt`
    Gt(Value),
    /// `gte`
    Gte(Value),
    /// `lt`
    Lt(Value),
    /// `lte`
    Lte(Value),
    /// `startswith`
    StartsWith(String),
    /// `endswith`
    EndsWith(String),
    /// `isnull`: a boolean, or a mapping of key to boolean on hstore
    /// columns.
    IsNull(Value),
}

impl Lookup {
    /// The lookup name as written in filter expressions.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Exact(_) => "exact",
            Self::IExact(_) => "iexact",
            Self::Contains(_) => "contains",
            Self::IContains(_) => "icontains",
            Self::In(_) => "in",
            Self::Gt(_) => "gt",
            Self::Gte(_) => "gte",
            Self::Lt(_) => "lt",
            Self::Lte(_) => "lte",
            Self::StartsWith(_) => "startswith",
            Self::EndsWith(_) => "endswith",
            Self::IsNull(_) => "isnull",
        }
    }
}

/// A composable query filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Q {
    /// A single field lookup.
    Filter {
        /// The attribute name.
        field: String,
        /// The lookup operation.
        lookup: Lookup,
    },
    /// Logical AND of multiple conditions.
    And(Vec<Q>),
    /// Logical OR of multiple conditions.
    Or(Vec<Q>),
    /// Logical negation of a condition.
    Not(Box<Q>),
}

impl Q {
    /// Creates a new filter Q object.
    pub fn filter(field: impl Into<String>, lookup: Lookup) -> Self {
        Self::Filter {
            field: field.into(),
            lookup,
        }
    }

    /// Returns `true` if this is an empty AND or OR.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            _ => false,
        }
    }
}

impl ops::BitAnd for Q {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (other, Self::And(mut right)) => {
                right.insert(0, other);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl ops::BitOr for Q {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (other, Self::Or(mut right)) => {
                right.insert(0, other);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

impl ops::Not for Q {
    type Output = Self;

    fn not(self) -> Self::Output {
        // !!q == q
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_names() {
        assert_eq!(Lookup::Contains(Value::Null).name(), "contains");
        assert_eq!(Lookup::IsNull(Value::Bool(true)).name(), "isnull");
        assert_eq!(Lookup::StartsWith("a".into()).name(), "startswith");
    }

    #[test]
    fn test_and_flattens() {
        let a = Q::filter("a", Lookup::Exact(Value::from(1)));
        let b = Q::filter("b", Lookup::Exact(Value::from(2)));
        let c = Q::filter("c", Lookup::Exact(Value::from(3)));
        match (a & b) & c {
            Q::And(children) => assert_eq!(children.len(), 3),
            other => panic!("Expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_or_flattens() {
        let a = Q::filter("a", Lookup::Exact(Value::from(1)));
        let b = Q::filter("b", Lookup::Exact(Value::from(2)));
        let c = Q::filter("c", Lookup::Exact(Value::from(3)));
        match a | (b | c) {
            Q::Or(children) => assert_eq!(children.len(), 3),
            other => panic!("Expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_double_negation() {
        let q = Q::filter("data", Lookup::Contains(Value::from(vec!["a"])));
        assert_eq!(!!q.clone(), q);
    }

    #[test]
    fn test_is_empty() {
        assert!(Q::And(vec![]).is_empty());
        assert!(!Q::filter("a", Lookup::IsNull(Value::Bool(true))).is_empty());
    }
}
