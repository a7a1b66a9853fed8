//! Value-type annotations recorded for dictionary predicates.
//!
//! Before a predicate's values are stringified into bound parameters, the
//! translator records what kind of value each key carried. The annotation
//! picks the SQL cast applied to `column->'key'` so that comparisons happen
//! on the typed value instead of its text form. Annotations live for a single
//! translation call and are never persisted.

use std::collections::BTreeMap;

use crate::value::Value;

/// The recorded pre-stringification kind of one predicate value.
///
/// Booleans keep the value itself because `isnull` predicates need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueAnnotation {
    /// A boolean, with its value.
    Bool(bool),
    /// A date and time.
    Timestamp,
    /// A date.
    Date,
    /// A time of day.
    Time,
    /// An integer.
    Integer,
    /// A float.
    Float,
    /// A decimal.
    Decimal,
    /// Text.
    Text,
    /// Anything else (lists, mappings, null...).
    Other,
}

impl ValueAnnotation {
    /// Records the annotation for a single value.
    ///
    /// Booleans are classified first.
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::DateTime(_) | Value::DateTimeTz(_) => Self::Timestamp,
            Value::Date(_) => Self::Date,
            Value::Time(_) => Self::Time,
            Value::Int(_) => Self::Integer,
            Value::Float(_) => Self::Float,
            Value::Decimal(_) => Self::Decimal,
            Value::String(_) => Self::Text,
            _ => Self::Other,
        }
    }

    /// Returns the SQL cast suffix for this annotation, or `""` for a plain
    /// text comparison.
    ///
    /// ```
    /// use hstore_rs_db::query::annotations::ValueAnnotation;
    /// use hstore_rs_db::value::Value;
    ///
    /// assert_eq!(ValueAnnotation::of(&Value::Int(5)).cast(), "::bigint");
    /// assert_eq!(ValueAnnotation::of(&Value::from("x")).cast(), "");
    /// ```
    pub const fn cast(self) -> &'static str {
        match self {
            Self::Bool(_) => "::boolean",
            Self::Timestamp => "::timestamp",
            Self::Date => "::date",
            Self::Time => "::time",
            Self::Integer => "::bigint",
            Self::Float => "::float8",
            Self::Decimal => "::numeric",
            Self::Text | Self::Other => "",
        }
    }
}

/// Per-call side table of annotations, keyed like the predicate mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueAnnotations {
    entries: BTreeMap<String, ValueAnnotation>,
}

impl ValueAnnotations {
    /// Returns the cast for `key`, or `""` when the key was not annotated.
    pub fn cast_for(&self, key: &str) -> &'static str {
        self.entries.get(key).map_or("", |a| a.cast())
    }

    /// Returns the annotation recorded for `key`.
    pub fn get(&self, key: &str) -> Option<ValueAnnotation> {
        self.entries.get(key).copied()
    }

    /// Returns the number of annotated keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was annotated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the annotation table for a predicate mapping.
pub fn annotate(map: &BTreeMap<String, Value>) -> ValueAnnotations {
    ValueAnnotations {
        entries: map
            .iter()
            .map(|(k, v)| (k.clone(), ValueAnnotation::of(v)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_bool_checked_first_and_keeps_value() {
        assert_eq!(ValueAnnotation::of(&Value::Bool(true)), ValueAnnotation::Bool(true));
        assert_eq!(ValueAnnotation::of(&Value::Bool(false)), ValueAnnotation::Bool(false));
        assert_eq!(ValueAnnotation::Bool(false).cast(), "::boolean");
    }

    #[test]
    fn test_cast_table() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let cases = [
            (Value::DateTime(dt), "::timestamp"),
            (Value::Date(dt.date()), "::date"),
            (Value::Time(dt.time()), "::time"),
            (Value::Int(1), "::bigint"),
            (Value::Float(1.5), "::float8"),
            (Value::Decimal(Decimal::new(15, 1)), "::numeric"),
            (Value::from("text"), ""),
            (Value::List(vec![]), ""),
        ];
        for (value, cast) in cases {
            assert_eq!(ValueAnnotation::of(&value).cast(), cast, "{value:?}");
        }
    }

    #[test]
    fn test_annotate_map() {
        let mut map = BTreeMap::new();
        map.insert("n".to_string(), Value::Int(5));
        map.insert("s".to_string(), Value::from("x"));
        let annotations = annotate(&map);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations.cast_for("n"), "::bigint");
        assert_eq!(annotations.cast_for("s"), "");
        assert_eq!(annotations.cast_for("missing"), "");
        assert_eq!(annotations.get("n"), Some(ValueAnnotation::Integer));
    }
}
