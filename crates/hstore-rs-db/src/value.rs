//! ORM value types for representing database values in a backend-agnostic way.
//!
//! The [`Value`] enum is the core type used throughout the crate to represent
//! dictionary entries, lookup arguments, query parameters, and results. Besides
//! the usual SQL scalars it carries two dictionary shapes: [`Value::Map`], the
//! caller-facing `{key: value}` mapping used in filters and assignments, and
//! [`Value::HStore`], the driver-ready text-to-text literal bound as a single
//! hstore parameter.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// A backend-agnostic representation of a database value.
///
/// # Examples
///
/// ```
/// use hstore_rs_db::value::Value;
///
/// let v = Value::from(42_i64);
/// assert_eq!(v, Value::Int(42));
///
/// let v = Value::from("hello");
/// assert_eq!(v, Value::String("hello".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// An arbitrary-precision decimal number.
    Decimal(Decimal),
    /// A UTF-8 string.
    String(String),
    /// Raw binary data.
    Bytes(Vec<u8>),
    /// A date without time.
    Date(chrono::NaiveDate),
    /// A date and time without timezone.
    DateTime(chrono::NaiveDateTime),
    /// A date and time with UTC timezone.
    DateTimeTz(chrono::DateTime<chrono::Utc>),
    /// A time without date.
    Time(chrono::NaiveTime),
    /// A UUID value.
    Uuid(uuid::Uuid),
    /// A JSON value.
    Json(serde_json::Value),
    /// A list of values (for IN clauses, key lists, etc.).
    List(Vec<Value>),
    /// A string-keyed mapping of values.
    Map(BTreeMap<String, Value>),
    /// An hstore literal: text keys to text-or-null values.
    HStore(BTreeMap<String, Option<String>>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{}", float_text(*v)),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::DateTimeTz(dt) => write!(f, "{dt}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Json(j) => write!(f, "{j}"),
            Self::List(vals) => {
                write!(f, "[")?;
                for (i, v) in vals.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::HStore(map) => {
                write!(f, "{}", crate::dict::to_hstore_literal(map))
            }
        }
    }
}

/// Renders a float the way the stored text form expects it: integral values
/// keep a trailing `.0` so they stay distinguishable from integers.
pub(crate) fn float_text(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

// ── From implementations ───────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<chrono::NaiveDate> for Value {
    fn from(v: chrono::NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Self::DateTimeTz(v)
    }
}

impl From<chrono::NaiveTime> for Value {
    fn from(v: chrono::NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Self::List(v.into_iter().map(Self::from).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl From<BTreeMap<String, Option<String>>> for Value {
    fn from(v: BTreeMap<String, Option<String>>) -> Self {
        Self::HStore(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

impl Value {
    /// Builds a [`Value::Map`] from `(key, value)` pairs.
    ///
    /// ```
    /// use hstore_rs_db::value::Value;
    ///
    /// let m = Value::map([("a", Value::from(1)), ("b", Value::from("x"))]);
    /// assert_eq!(m.as_map().unwrap().len(), 2);
    /// ```
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns `true` if this value is `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for the numeric variants (`Int`, `Float`, `Decimal`).
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Decimal(_))
    }

    /// Attempts to extract a boolean value.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract an integer value.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract a float value.
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to extract a mapping reference.
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Attempts to extract a list reference.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// A short description of the variant, used in error messages.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::DateTime(_) | Self::DateTimeTz(_) => "datetime",
            Self::Time(_) => "time",
            Self::Uuid(_) => "uuid",
            Self::Json(_) => "json",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
            Self::HStore(_) => "hstore",
        }
    }

    /// Converts this value to JSON.
    ///
    /// Decimals keep their digits; temporal values become ISO text.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Self::Null => J::Null,
            Self::Bool(b) => J::Bool(*b),
            Self::Int(i) => J::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            Self::Decimal(d) => d
                .to_string()
                .parse::<serde_json::Number>()
                .ok()
                .or_else(|| d.to_f64().and_then(serde_json::Number::from_f64))
                .map_or(J::Null, J::Number),
            Self::String(s) => J::String(s.clone()),
            Self::Bytes(b) => J::Array(b.iter().map(|x| J::from(*x)).collect()),
            Self::Date(d) => J::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => J::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Self::DateTimeTz(dt) => J::String(dt.to_rfc3339()),
            Self::Time(t) => J::String(t.format("%H:%M:%S%.f").to_string()),
            Self::Uuid(u) => J::String(u.to_string()),
            Self::Json(j) => j.clone(),
            Self::List(l) => J::Array(l.iter().map(Self::to_json).collect()),
            Self::Map(m) => J::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Self::HStore(m) => J::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.clone().map_or(J::Null, J::String)))
                    .collect(),
            ),
        }
    }

    /// Converts parsed JSON into a `Value`.
    ///
    /// Objects become [`Value::Map`] and arrays [`Value::List`]. Integers
    /// become [`Value::Int`], or [`Value::Decimal`] past the `i64` range;
    /// integers too wide for a decimal stay [`Value::Json`] numbers with
    /// their exact digits. Other numbers become [`Value::Float`].
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match json {
            J::Null => Self::Null,
            J::Bool(b) => Self::Bool(b),
            J::Number(n) => Self::from_json_number(n),
            J::String(s) => Self::String(s),
            J::Array(a) => Self::List(a.into_iter().map(Self::from_json).collect()),
            J::Object(o) => Self::Map(o.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect()),
        }
    }

    fn from_json_number(n: serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            return Self::Int(i);
        }
        if let Some(u) = n.as_u64() {
            return Self::Decimal(Decimal::from(u));
        }
        let text = n.to_string();
        let integral = text
            .strip_prefix('-')
            .unwrap_or(&text)
            .bytes()
            .all(|b| b.is_ascii_digit());
        if integral {
            return Decimal::from_str_exact(&text)
                .map_or_else(|_| Self::Json(serde_json::Value::Number(n)), Self::Decimal);
        }
        match n.as_f64() {
            Some(f) => Self::Float(f),
            None => Self::Json(serde_json::Value::Number(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_scalars() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42_i32), Value::Int(42));
        assert_eq!(Value::from(1.5_f64), Value::Float(1.5));
        assert_eq!(Value::from("hi"), Value::String("hi".into()));
    }

    #[test]
    fn test_from_option() {
        let some_val: Option<i64> = Some(42);
        assert_eq!(Value::from(some_val), Value::Int(42));
        let none_val: Option<i64> = None;
        assert_eq!(Value::from(none_val), Value::Null);
    }

    #[test]
    fn test_map_builder() {
        let m = Value::map([("a", 1), ("b", 2)]);
        let inner = m.as_map().unwrap();
        assert_eq!(inner.get("a"), Some(&Value::Int(1)));
        assert_eq!(inner.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_display_float_keeps_fraction() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(1.25).to_string(), "1.25");
    }

    #[test]
    fn test_display_decimal_keeps_scale() {
        let d = Decimal::from_str("1.50").unwrap();
        assert_eq!(Value::Decimal(d).to_string(), "1.50");
    }

    #[test]
    fn test_display_list_and_map() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.to_string(), "[1, 2]");
        let map = Value::map([("k", "v")]);
        assert_eq!(map.to_string(), "{k: v}");
    }

    #[test]
    fn test_to_json_decimal() {
        let d = Decimal::from_str("2.5").unwrap();
        assert_eq!(Value::Decimal(d).to_json(), serde_json::json!(2.5));
        let wide = Value::Decimal(Decimal::from(u64::MAX)).to_json();
        assert_eq!(wide.to_string(), "18446744073709551615");
    }

    #[test]
    fn test_to_json_date() {
        let d = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(Value::Date(d).to_json(), serde_json::json!("2024-01-15"));
    }

    #[test]
    fn test_from_json_shapes() {
        let v = Value::from_json(serde_json::json!({"a": 1, "b": [true, 1.5], "c": null}));
        let m = v.as_map().unwrap();
        assert_eq!(m["a"], Value::Int(1));
        assert_eq!(
            m["b"],
            Value::List(vec![Value::Bool(true), Value::Float(1.5)])
        );
        assert_eq!(m["c"], Value::Null);
    }

    #[test]
    fn test_from_json_wide_integers_keep_digits() {
        let v: serde_json::Value =
            serde_json::from_str("[18446744073709551615, -9223372036854775809, 123456789012345678901234567890]")
                .unwrap();
        let Value::List(items) = Value::from_json(v) else {
            panic!("expected a list");
        };
        assert_eq!(items[0], Value::Decimal(Decimal::from(u64::MAX)));
        assert_eq!(items[1].to_string(), "-9223372036854775809");
        assert!(matches!(items[1], Value::Decimal(_)));
        assert_eq!(items[2].to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(Value::Int(1).kind_name(), "integer");
        assert_eq!(Value::map([("a", 1)]).kind_name(), "mapping");
        assert_eq!(Value::List(vec![]).kind_name(), "list");
    }

    #[test]
    fn test_serde_tagged_roundtrip() {
        let v = Value::map([("n", Value::Int(3))]);
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"type\":\"Map\""));
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
