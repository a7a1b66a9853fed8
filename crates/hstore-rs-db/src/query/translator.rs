//! Translation of lookups on hstore columns into SQL fragments.
//!
//! [`PredicateTranslator::translate`] takes one column and one lookup and
//! produces either a SQL fragment with `%s` placeholders or
//! [`Translation::Defer`], which tells the compiler to use the generic
//! lookup SQL instead. Keys are embedded in the SQL as string literals with
//! `'` doubled and `%` written `%%`, so a fragment's only placeholders are
//! its `%s` markers.
//!
//! | lookup | right-hand side | SQL |
//! |---|---|---|
//! | `exact` | mapping | `"c" = %s` |
//! | `gt`, `gte`, `lt`, `lte` | mapping | `("c"->'k')<cast> > %s AND ...` |
//! | `contains` | `{k: [..]}` | `"c"->'k' = ANY(%s)` |
//! | `contains` | `{k: v}` | `("c"->'k')<cast> = %s` |
//! | `contains` | mapping | `"c" @> %s` |
//! | `contains` | `[k]` | `"c" ? %s` |
//! | `contains` | `[k1, k2, ..]` | `"c" ?& %s` |
//! | `isnull` | `{k: bool}` | `("c"->'k') IS [NOT] NULL AND ...` |
//!
//! On a [`Serialized`](HStoreFlavor::Serialized) column every bound value is
//! JSON-encoded the way the column stores it, so `{k: "1"}` binds `"\"1\""`.

use std::collections::BTreeMap;

use hstore_rs_core::{HStoreError, HStoreResult};

use super::annotations::annotate;
use super::lookups::Lookup;
use crate::dict::{normalize, value_text, HStoreDict};
use crate::fields::{ColumnKind, HStoreFlavor};
use crate::serialized::{serialize_dict, serialize_value};
use crate::value::Value;

/// A column as seen by the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// The column name.
    pub name: String,
    /// Whether the column is an hstore column.
    pub kind: ColumnKind,
    /// The hstore flavor, for hstore columns.
    pub flavor: Option<HStoreFlavor>,
}

impl ColumnRef {
    /// An hstore column.
    pub fn hstore(name: impl Into<String>, flavor: HStoreFlavor) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::HStore,
            flavor: Some(flavor),
        }
    }

    /// A non-hstore column.
    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Other,
            flavor: None,
        }
    }

    /// Returns `true` for hstore columns.
    pub const fn is_hstore(&self) -> bool {
        matches!(self.kind, ColumnKind::HStore)
    }

    /// Returns `true` for hstore columns storing JSON-encoded values.
    pub fn is_serialized(&self) -> bool {
        self.flavor == Some(HStoreFlavor::Serialized)
    }

    /// The quoted column name.
    pub fn sql(&self) -> String {
        format!("\"{}\"", self.name)
    }
}

/// A SQL fragment with `%s` placeholders and their parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// The SQL text.
    pub sql: String,
    /// One parameter per `%s`, in order.
    pub params: Vec<Value>,
}

impl SqlFragment {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

/// The outcome of translating one lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// The hstore-specific SQL for the lookup.
    Sql(SqlFragment),
    /// Not an hstore predicate; compile with the generic lookup SQL.
    Defer,
}

/// Translates lookups on hstore columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateTranslator;

impl PredicateTranslator {
    /// Translates `lookup` applied to `column`.
    ///
    /// Non-hstore columns always defer. On hstore columns an unacceptable
    /// right-hand side is [`HStoreError::InvalidPredicate`] and a lookup with
    /// no hstore meaning is [`HStoreError::UnsupportedLookup`].
    pub fn translate(column: &ColumnRef, lookup: &Lookup) -> HStoreResult<Translation> {
        if !column.is_hstore() {
            return Ok(Translation::Defer);
        }
        let col = column.sql();
        let enc = Encoding::for_column(column);
        let translation = match lookup {
            Lookup::Exact(rhs) => Translation::Sql(exact(&col, enc, rhs)?),
            Lookup::Gt(rhs) => Translation::Sql(comparison(&col, enc, lookup.name(), ">", rhs)?),
            Lookup::Gte(rhs) => Translation::Sql(comparison(&col, enc, lookup.name(), ">=", rhs)?),
            Lookup::Lt(rhs) => Translation::Sql(comparison(&col, enc, lookup.name(), "<", rhs)?),
            Lookup::Lte(rhs) => Translation::Sql(comparison(&col, enc, lookup.name(), "<=", rhs)?),
            Lookup::Contains(rhs) | Lookup::IContains(rhs) => {
                contains(&col, enc, lookup.name(), rhs)?
            }
            Lookup::IsNull(rhs) => is_null(&col, rhs)?,
            other => return Err(HStoreError::UnsupportedLookup(other.name().to_string())),
        };
        tracing::debug!(
            column = %column.name,
            lookup = lookup.name(),
            deferred = matches!(translation, Translation::Defer),
            "translated hstore predicate"
        );
        Ok(translation)
    }
}

/// Escapes a key for embedding as a SQL string literal in a fragment.
pub fn escape_key(key: &str) -> String {
    key.replace('\'', "''").replace('%', "%%")
}

/// How bound values are written for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    /// Normalized text.
    Text,
    /// One JSON document per value.
    Json,
}

impl Encoding {
    fn for_column(column: &ColumnRef) -> Self {
        if column.is_serialized() {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// The bound parameter for one predicate value.
    fn param(self, value: &Value) -> Value {
        let text = match self {
            Self::Json => serialize_value(value),
            Self::Text => match normalize(value.clone()) {
                Value::Null => None,
                other => Some(value_text(&other)),
            },
        };
        text.map_or(Value::Null, Value::String)
    }

    fn hstore_param(self, map: &BTreeMap<String, Value>) -> HStoreResult<Value> {
        match self {
            Self::Json => Ok(Value::HStore(serialize_dict(map))),
            Self::Text => Ok(HStoreDict::new(Value::Map(map.clone()), None, None)?.to_value()),
        }
    }
}

fn exact(col: &str, enc: Encoding, rhs: &Value) -> HStoreResult<SqlFragment> {
    let param = match rhs {
        Value::Map(map) => enc.hstore_param(map)?,
        Value::HStore(_) => rhs.clone(),
        other => return Err(HStoreError::invalid_predicate("exact", other.kind_name())),
    };
    Ok(SqlFragment::new(format!("{col} = %s"), vec![param]))
}

fn comparison(
    col: &str,
    enc: Encoding,
    lookup: &str,
    operator: &str,
    rhs: &Value,
) -> HStoreResult<SqlFragment> {
    let map = match rhs {
        Value::Map(map) if !map.is_empty() => map,
        Value::Map(_) => return Err(HStoreError::invalid_predicate(lookup, "empty mapping")),
        other => return Err(HStoreError::invalid_predicate(lookup, other.kind_name())),
    };
    let annotations = annotate(map);
    let mut conditions = Vec::with_capacity(map.len());
    let mut params = Vec::with_capacity(map.len());
    for (key, value) in map {
        conditions.push(format!(
            "({col}->'{}'){} {operator} %s",
            escape_key(key),
            annotations.cast_for(key)
        ));
        params.push(enc.param(value));
    }
    Ok(SqlFragment::new(conditions.join(" AND "), params))
}

fn contains(col: &str, enc: Encoding, lookup: &str, rhs: &Value) -> HStoreResult<Translation> {
    let fragment = match rhs {
        Value::Map(map) if map.len() == 1 => {
            let (key, value) = map.iter().next().ok_or_else(|| {
                HStoreError::invalid_predicate(lookup, "empty mapping")
            })?;
            let key_sql = escape_key(key);
            if let Value::List(items) = value {
                let values = items.iter().map(|item| enc.param(item)).collect();
                SqlFragment::new(
                    format!("{col}->'{key_sql}' = ANY(%s)"),
                    vec![Value::List(values)],
                )
            } else {
                let cast = annotate(map).cast_for(key);
                SqlFragment::new(
                    format!("({col}->'{key_sql}'){cast} = %s"),
                    vec![enc.param(value)],
                )
            }
        }
        Value::Map(map) => {
            SqlFragment::new(format!("{col} @> %s"), vec![enc.hstore_param(map)?])
        }
        Value::HStore(_) => SqlFragment::new(format!("{col} @> %s"), vec![rhs.clone()]),
        Value::List(keys) => match keys.as_slice() {
            [] => return Err(HStoreError::invalid_predicate(lookup, "empty list")),
            [key] => SqlFragment::new(format!("{col} ? %s"), vec![Value::String(value_text(key))]),
            _ => SqlFragment::new(
                format!("{col} ?& %s"),
                vec![Value::List(
                    keys.iter().map(|k| Value::String(value_text(k))).collect(),
                )],
            ),
        },
        Value::String(_) => return Ok(Translation::Defer),
        other => return Err(HStoreError::invalid_predicate(lookup, other.kind_name())),
    };
    Ok(Translation::Sql(fragment))
}

fn is_null(col: &str, rhs: &Value) -> HStoreResult<Translation> {
    let map = match rhs {
        Value::Map(map) if map.is_empty() => {
            return Err(HStoreError::invalid_predicate("isnull", "empty mapping"))
        }
        Value::Map(map) => map,
        _ => return Ok(Translation::Defer),
    };
    let mut conditions = Vec::with_capacity(map.len());
    for (key, value) in map {
        let test = match value {
            Value::Bool(true) => "IS NULL",
            Value::Bool(false) => "IS NOT NULL",
            other => {
                return Err(HStoreError::invalid_predicate(
                    "isnull",
                    format!("{} for key '{key}'", other.kind_name()),
                ))
            }
        };
        conditions.push(format!("({col}->'{}') {test}", escape_key(key)));
    }
    Ok(Translation::Sql(SqlFragment::new(
        conditions.join(" AND "),
        Vec::new(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> ColumnRef {
        ColumnRef::hstore("data", HStoreFlavor::Dictionary)
    }

    fn sql(lookup: Lookup) -> SqlFragment {
        match PredicateTranslator::translate(&data(), &lookup).unwrap() {
            Translation::Sql(fragment) => fragment,
            Translation::Defer => panic!("unexpected defer for {lookup:?}"),
        }
    }

    fn text(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_non_hstore_column_defers() {
        let col = ColumnRef::other("name");
        for lookup in [
            Lookup::Exact(Value::Int(1)),
            Lookup::Contains(Value::map([("a", 1)])),
            Lookup::StartsWith("x".into()),
        ] {
            assert_eq!(
                PredicateTranslator::translate(&col, &lookup).unwrap(),
                Translation::Defer
            );
        }
    }

    #[test]
    fn test_exact_mapping() {
        let f = sql(Lookup::Exact(Value::map([("a", Value::Int(1)), ("b", Value::Bool(true))])));
        assert_eq!(f.sql, "\"data\" = %s");
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Some("1".to_string()));
        expected.insert("b".to_string(), Some("true".to_string()));
        assert_eq!(f.params, vec![Value::HStore(expected)]);
    }

    #[test]
    fn test_exact_rejects_non_mapping() {
        let err = PredicateTranslator::translate(&data(), &Lookup::Exact(Value::Int(3))).unwrap_err();
        assert!(matches!(err, HStoreError::InvalidPredicate { ref lookup, .. } if lookup == "exact"));
    }

    #[test]
    fn test_comparison_casts_by_value_kind() {
        let f = sql(Lookup::Gt(Value::map([("a", Value::Int(1)), ("b", text("3"))])));
        assert_eq!(f.sql, "(\"data\"->'a')::bigint > %s AND (\"data\"->'b') > %s");
        assert_eq!(f.params, vec![text("1"), text("3")]);

        let f = sql(Lookup::Lte(Value::map([("f", Value::Float(1.5))])));
        assert_eq!(f.sql, "(\"data\"->'f')::float8 <= %s");
        assert_eq!(f.params, vec![text("1.5")]);

        let f = sql(Lookup::Gte(Value::map([("ok", Value::Bool(true))])));
        assert_eq!(f.sql, "(\"data\"->'ok')::boolean >= %s");
        assert_eq!(f.params, vec![text("true")]);
    }

    #[test]
    fn test_comparison_rejects_bad_shapes() {
        for lookup in [
            Lookup::Gt(Value::Int(1)),
            Lookup::Lt(Value::map(Vec::<(&str, Value)>::new())),
            Lookup::Gte(Value::from(vec!["a"])),
        ] {
            assert!(matches!(
                PredicateTranslator::translate(&data(), &lookup),
                Err(HStoreError::InvalidPredicate { .. })
            ));
        }
    }

    #[test]
    fn test_contains_single_pair() {
        let f = sql(Lookup::Contains(Value::map([("v", 1)])));
        assert_eq!(f.sql, "(\"data\"->'v')::bigint = %s");
        assert_eq!(f.params, vec![text("1")]);

        let f = sql(Lookup::IContains(Value::map([("name", "x")])));
        assert_eq!(f.sql, "(\"data\"->'name') = %s");
    }

    #[test]
    fn test_contains_single_key_list_uses_any() {
        let f = sql(Lookup::Contains(Value::map([(
            "v",
            Value::List(vec![Value::Int(1), text("b")]),
        )])));
        assert_eq!(f.sql, "\"data\"->'v' = ANY(%s)");
        assert_eq!(f.params, vec![Value::List(vec![text("1"), text("b")])]);
    }

    #[test]
    fn test_contains_multiple_pairs_uses_containment() {
        let f = sql(Lookup::Contains(Value::map([("v", Value::Int(1)), ("v2", text("3"))])));
        assert_eq!(f.sql, "\"data\" @> %s");
        let mut expected = BTreeMap::new();
        expected.insert("v".to_string(), Some("1".to_string()));
        expected.insert("v2".to_string(), Some("3".to_string()));
        assert_eq!(f.params, vec![Value::HStore(expected)]);
    }

    #[test]
    fn test_contains_empty_mapping_matches_everything() {
        let f = sql(Lookup::Contains(Value::map(Vec::<(&str, Value)>::new())));
        assert_eq!(f.sql, "\"data\" @> %s");
        assert_eq!(f.params, vec![Value::HStore(BTreeMap::new())]);
    }

    #[test]
    fn test_contains_keys() {
        let f = sql(Lookup::Contains(Value::from(vec!["a"])));
        assert_eq!(f.sql, "\"data\" ? %s");
        assert_eq!(f.params, vec![text("a")]);

        let f = sql(Lookup::Contains(Value::from(vec!["a", "b"])));
        assert_eq!(f.sql, "\"data\" ?& %s");
        assert_eq!(f.params, vec![Value::List(vec![text("a"), text("b")])]);

        assert!(matches!(
            PredicateTranslator::translate(&data(), &Lookup::Contains(Value::List(vec![]))),
            Err(HStoreError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn test_contains_string_defers_and_other_shapes_fail() {
        assert_eq!(
            PredicateTranslator::translate(&data(), &Lookup::Contains(text("abc"))).unwrap(),
            Translation::Defer
        );
        assert!(matches!(
            PredicateTranslator::translate(&data(), &Lookup::Contains(Value::Int(1))),
            Err(HStoreError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn test_isnull_per_key() {
        let f = sql(Lookup::IsNull(Value::map([("a", true), ("b", false)])));
        assert_eq!(f.sql, "(\"data\"->'a') IS NULL AND (\"data\"->'b') IS NOT NULL");
        assert!(f.params.is_empty());

        assert_eq!(
            PredicateTranslator::translate(&data(), &Lookup::IsNull(Value::Bool(true))).unwrap(),
            Translation::Defer
        );
        assert!(PredicateTranslator::translate(&data(), &Lookup::IsNull(Value::map([("a", 1)])))
            .is_err());
    }

    fn serialized_sql(lookup: Lookup) -> SqlFragment {
        let col = ColumnRef::hstore("data", HStoreFlavor::Serialized);
        match PredicateTranslator::translate(&col, &lookup).unwrap() {
            Translation::Sql(fragment) => fragment,
            Translation::Defer => panic!("unexpected defer for {lookup:?}"),
        }
    }

    #[test]
    fn test_serialized_column_binds_json() {
        let f = serialized_sql(Lookup::Contains(Value::map([("b0", "1")])));
        assert_eq!(f.sql, "(\"data\"->'b0') = %s");
        assert_eq!(f.params, vec![text("\"1\"")]);

        let f = serialized_sql(Lookup::Gt(Value::map([("v", 1)])));
        assert_eq!(f.sql, "(\"data\"->'v')::bigint > %s");
        assert_eq!(f.params, vec![text("1")]);

        let f = serialized_sql(Lookup::Contains(Value::map([(
            "v",
            Value::List(vec![Value::Int(1), text("a")]),
        )])));
        assert_eq!(f.params, vec![Value::List(vec![text("1"), text("\"a\"")])]);

        let f = serialized_sql(Lookup::Exact(Value::map([("s", text("x")), ("n", Value::Null)])));
        let mut expected = BTreeMap::new();
        expected.insert("n".to_string(), None);
        expected.insert("s".to_string(), Some("\"x\"".to_string()));
        assert_eq!(f.params, vec![Value::HStore(expected)]);
    }

    #[test]
    fn test_unsupported_lookup() {
        let err = PredicateTranslator::translate(&data(), &Lookup::StartsWith("a".into()))
            .unwrap_err();
        assert!(matches!(err, HStoreError::UnsupportedLookup(ref name) if name == "startswith"));
    }

    #[test]
    fn test_keys_are_escaped() {
        let f = sql(Lookup::Gt(Value::map([("it's 100%", 1)])));
        assert_eq!(f.sql, "(\"data\"->'it''s 100%%')::bigint > %s");
        assert_eq!(escape_key("a'b%c"), "a''b%%c");
    }
}
