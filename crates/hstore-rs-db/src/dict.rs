//! The hstore dictionary codec.
//!
//! [`HStoreDict`] wraps the contents of one hstore column. PostgreSQL stores
//! hstore values as text only, so every write goes through a normalization
//! step that turns booleans, numbers and compound values into a reversible
//! text encoding:
//!
//! | written value | stored text |
//! |---|---|
//! | `true` / `false` | `"true"` / `"false"` |
//! | integer, float, decimal | canonical number text (`"3"`, `"1.5"`) |
//! | list or mapping | embedded JSON (`"[1, 2]"`, `"{\"a\": 1}"`) |
//! | anything else | unchanged |
//!
//! When the owning field declares a schema the dictionary is in *schema
//! mode*: writes go through each key's declared sub-field and reads decode
//! them back. A field of the [`Serialized`](HStoreFlavor::Serialized) flavor
//! keeps values typed in memory and encodes each one as JSON on the way to
//! the column.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use hstore_rs_core::{HStoreError, HStoreResult};
use serde::Serialize;

use crate::executor::DbExecutor;
use crate::fields::{HStoreFieldDef, HStoreFlavor};
use crate::query::compiler::{SqlCompiler, WhereNode};
use crate::query::lookups::Lookup;
use crate::query::translator::ColumnRef;
use crate::schema::HStoreSchema;
use crate::serialized::serialize_value;
use crate::value::Value;

/// The accepted inputs to [`HStoreDict::new`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawDict {
    /// No value; yields an empty dictionary.
    Null,
    /// An already-structured mapping.
    Mapping(BTreeMap<String, Value>),
    /// A JSON document that must describe an object.
    Text(String),
    /// Any other value. Always rejected.
    Other(Value),
}

impl From<Value> for RawDict {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Map(m) => Self::Mapping(m),
            Value::String(s) => Self::Text(s),
            Value::HStore(m) => Self::Mapping(
                m.into_iter()
                    .map(|(k, v)| (k, v.map_or(Value::Null, Value::String)))
                    .collect(),
            ),
            Value::Json(serde_json::Value::Object(o)) => {
                Self::Mapping(o.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
            Value::Json(serde_json::Value::Null) => Self::Null,
            Value::Json(serde_json::Value::String(s)) => Self::Text(s),
            other => Self::Other(other),
        }
    }
}

impl From<BTreeMap<String, Value>> for RawDict {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Self::Mapping(m)
    }
}

impl From<BTreeMap<String, Option<String>>> for RawDict {
    fn from(m: BTreeMap<String, Option<String>>) -> Self {
        Value::HStore(m).into()
    }
}

impl From<serde_json::Value> for RawDict {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j).into()
    }
}

impl From<&str> for RawDict {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RawDict {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&HStoreDict> for RawDict {
    fn from(d: &HStoreDict) -> Self {
        Self::Mapping(d.entries.clone())
    }
}

/// Identifies the row a dictionary was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOwner {
    /// The owning table.
    pub table: String,
    /// The primary key column of the owning table.
    pub pk_column: String,
    /// The primary key value of the owning row.
    pub pk: Value,
}

impl RowOwner {
    /// Creates a new owner descriptor.
    pub fn new(table: impl Into<String>, pk_column: impl Into<String>, pk: impl Into<Value>) -> Self {
        Self {
            table: table.into(),
            pk_column: pk_column.into(),
            pk: pk.into(),
        }
    }
}

struct DictConnection {
    executor: Arc<dyn DbExecutor>,
    owner: RowOwner,
}

/// A dictionary bound to an hstore column.
///
/// # Examples
///
/// ```
/// use hstore_rs_db::dict::{HStoreDict, RawDict};
/// use hstore_rs_db::value::Value;
///
/// let mut d = HStoreDict::new(RawDict::Null, None, None).unwrap();
/// d.set("enabled", true);
/// d.set("count", 3);
/// d.set("tags", Value::from(vec!["a", "b"]));
///
/// assert_eq!(d.get("enabled").unwrap(), Value::from("true"));
/// assert_eq!(d.get("count").unwrap(), Value::from("3"));
/// assert_eq!(d.get("tags").unwrap(), Value::from(r#"["a", "b"]"#));
/// ```
#[derive(Serialize, serde::Deserialize)]
#[serde(from = "DictState", into = "DictState")]
pub struct HStoreDict {
    entries: BTreeMap<String, Value>,
    schema_mode: bool,
    serialized: bool,
    field: Option<Arc<HStoreFieldDef>>,
    schema: Option<Arc<HStoreSchema>>,
    connection: Option<DictConnection>,
}

/// The persisted form of an [`HStoreDict`]: entries and the mode flags.
#[derive(Serialize, serde::Deserialize)]
struct DictState {
    entries: BTreeMap<String, Value>,
    schema_mode: bool,
    #[serde(default)]
    serialized: bool,
}

impl From<HStoreDict> for DictState {
    fn from(d: HStoreDict) -> Self {
        Self {
            entries: d.entries,
            schema_mode: d.schema_mode,
            serialized: d.serialized,
        }
    }
}

impl From<DictState> for HStoreDict {
    fn from(state: DictState) -> Self {
        Self {
            entries: state.entries,
            schema_mode: state.schema_mode,
            serialized: state.serialized,
            field: None,
            schema: None,
            connection: None,
        }
    }
}

impl HStoreDict {
    /// Builds a dictionary from a raw input.
    ///
    /// `Null` gives an empty dictionary, a mapping is taken as is and text
    /// must be a JSON object. Everything else fails with
    /// [`HStoreError::ValueFormat`]. Entries are normalized, or written
    /// through the declared sub-fields when a schema is supplied. Entries of
    /// a serialized field are kept as given.
    pub fn new(
        raw: impl Into<RawDict>,
        field: Option<Arc<HStoreFieldDef>>,
        schema: Option<Arc<HStoreSchema>>,
    ) -> HStoreResult<Self> {
        let schema_mode = schema.is_some();
        let serialized = !schema_mode && is_serialized(field.as_deref());
        let entries = match raw.into() {
            RawDict::Null => BTreeMap::new(),
            RawDict::Mapping(m) => m,
            RawDict::Text(text) => parse_json_object(&text)?,
            RawDict::Other(v) => {
                return Err(HStoreError::value_format(format!(
                    "expected a mapping, null or a JSON object string, got {}",
                    v.kind_name()
                )))
            }
        };

        let entries = if serialized {
            entries
        } else if let Some(schema) = &schema {
            entries
                .into_iter()
                .map(|(k, v)| {
                    let v = schema_text(schema, &k, v);
                    (k, v)
                })
                .collect()
        } else {
            entries
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .collect()
        };

        tracing::trace!(
            entries = entries.len(),
            schema_mode,
            serialized,
            "built hstore dictionary"
        );

        Ok(Self {
            entries,
            schema_mode,
            serialized,
            field,
            schema,
            connection: None,
        })
    }

    /// Stores `value` under `key` after write-path normalization.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        let key = key.into();
        let value = if self.serialized {
            value
        } else if let Some(schema) = &self.schema {
            schema_text(schema, &key, value)
        } else {
            normalize(value)
        };
        self.entries.insert(key, value);
    }

    /// Stores every pair of `pairs` through [`set`](Self::set).
    pub fn update<K, V, I>(&mut self, pairs: I)
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.set(k, v);
        }
    }

    /// Returns the value stored under `key`.
    ///
    /// In schema mode the declared sub-field decodes the stored text; keys
    /// without a declaration, and text the declaration cannot decode, come
    /// back raw.
    pub fn get(&self, key: &str) -> HStoreResult<Value> {
        let raw = self
            .entries
            .get(key)
            .ok_or_else(|| HStoreError::KeyNotFound(key.to_string()))?;
        Ok(self.decode(key, raw))
    }

    /// Like [`get`](Self::get), returning `default` for missing keys.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.entries
            .get(key)
            .map_or_else(|| default.into(), |raw| self.decode(key, raw))
    }

    fn decode(&self, key: &str, raw: &Value) -> Value {
        if !self.schema_mode {
            return raw.clone();
        }
        let Some(declared) = self.schema.as_ref().and_then(|s| s.field(key)) else {
            return raw.clone();
        };
        declared.kind.to_value(raw).unwrap_or_else(|_| raw.clone())
    }

    /// Returns the stored value without schema decoding.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes `key` from the in-memory dictionary.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Iterates the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates the stored `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` when writes skip normalization and reads decode through
    /// the declared schema.
    pub const fn schema_mode(&self) -> bool {
        self.schema_mode
    }

    /// Returns `true` when values stay typed and are stored as JSON text.
    pub const fn serialized(&self) -> bool {
        self.serialized
    }

    /// The field definition this dictionary belongs to.
    pub fn field(&self) -> Option<&Arc<HStoreFieldDef>> {
        self.field.as_ref()
    }

    /// The schema used for decoding, if any.
    pub fn schema(&self) -> Option<&Arc<HStoreSchema>> {
        self.schema.as_ref()
    }

    /// Binds the dictionary to `field`, adopting its schema.
    ///
    /// Used after deserialization, which keeps only the entries.
    pub fn rebind_field(&mut self, field: Arc<HStoreFieldDef>) {
        self.schema = field.schema().cloned();
        self.schema_mode = self.schema_mode || self.schema.is_some();
        self.serialized = !self.schema_mode && is_serialized(Some(&field));
        self.field = Some(field);
    }

    /// Serializes the entries as JSON object text; an empty dictionary gives
    /// the empty string.
    pub fn to_text(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        json_text(&Value::Map(self.entries.clone()).to_json())
    }

    /// Returns the entries as a driver-ready text map.
    pub fn to_hstore(&self) -> BTreeMap<String, Option<String>> {
        self.entries
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    _ if self.serialized => serialize_value(v),
                    Value::Null => None,
                    other => Some(value_text(other)),
                };
                (k.clone(), text)
            })
            .collect()
    }

    /// Returns the entries as a [`Value::HStore`] query parameter.
    pub fn to_value(&self) -> Value {
        Value::HStore(self.to_hstore())
    }

    // ── Connection handling ──────────────────────────────────────────

    /// Attaches a database handle and the row this dictionary belongs to.
    pub fn attach_connection(&mut self, executor: Arc<dyn DbExecutor>, owner: RowOwner) {
        self.connection = Some(DictConnection { executor, owner });
    }

    /// Returns `true` if a connection is attached.
    pub const fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Deletes `keys` from the stored row and, once that succeeds, from this
    /// dictionary.
    ///
    /// Fails with [`HStoreError::DatabaseError`] when no connection is
    /// attached and with [`HStoreError::ImproperlyConfigured`] when the
    /// dictionary is not bound to a field.
    pub async fn remove_from_db(&mut self, keys: &[&str]) -> HStoreResult<u64> {
        let conn = self.connection.as_ref().ok_or_else(|| {
            HStoreError::DatabaseError("no connection attached to hstore dictionary".to_string())
        })?;
        let field = self.field.as_ref().ok_or_else(|| {
            HStoreError::ImproperlyConfigured(
                "hstore dictionary is not bound to a field".to_string(),
            )
        })?;

        let compiler = SqlCompiler::new(conn.executor.backend_type());
        let where_node = WhereNode::Condition {
            column: ColumnRef::other(conn.owner.pk_column.clone()),
            lookup: Lookup::Exact(conn.owner.pk.clone()),
        };
        let (sql, params) =
            compiler.compile_hremove(&conn.owner.table, &field.column, keys, Some(&where_node))?;
        let affected = conn.executor.execute_sql(&sql, &params).await?;

        for key in keys {
            self.entries.remove(*key);
        }
        Ok(affected)
    }
}

impl Clone for HStoreDict {
    /// Copies entries, field and schema. The connection is not copied and
    /// must be attached again.
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            schema_mode: self.schema_mode,
            serialized: self.serialized,
            field: self.field.clone(),
            schema: self.schema.clone(),
            connection: None,
        }
    }
}

impl PartialEq for HStoreDict {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for HStoreDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HStoreDict")
            .field("entries", &self.entries)
            .field("schema_mode", &self.schema_mode)
            .field("serialized", &self.serialized)
            .field("field", &self.field.as_ref().map(|fd| fd.name.as_str()))
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

impl fmt::Display for HStoreDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            f.write_str("{}")
        } else {
            f.write_str(&self.to_text())
        }
    }
}

// ── Normalization ──────────────────────────────────────────────────────

/// Write-path normalization outside schema mode.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Bool(b) => Value::String(b.to_string()),
        v @ (Value::Int(_) | Value::Float(_) | Value::Decimal(_)) => Value::String(v.to_string()),
        v @ (Value::List(_) | Value::Map(_)) => Value::String(json_text(&v.to_json())),
        Value::Json(serde_json::Value::Number(n)) => Value::String(n.to_string()),
        Value::Json(j @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
            Value::String(json_text(&j))
        }
        other => other,
    }
}

fn is_serialized(field: Option<&HStoreFieldDef>) -> bool {
    field.is_some_and(|f| f.flavor == HStoreFlavor::Serialized)
}

/// Write-path conversion in schema mode: declared keys use their sub-field's
/// text form, other keys a plain text cast.
fn schema_text(schema: &HStoreSchema, key: &str, value: Value) -> Value {
    match schema.field(key) {
        Some(declared) => declared.kind.to_text(&value).map_or(Value::Null, Value::String),
        None => text_cast(value),
    }
}

/// Write-path cast in schema mode: everything but `Null` becomes text.
fn text_cast(value: Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s),
        other => Value::String(value_text(&other)),
    }
}

/// The text stored for a value.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::List(_) | Value::Map(_) | Value::Json(_) => json_text(&value.to_json()),
        other => other.to_string(),
    }
}

fn parse_json_object(text: &str) -> HStoreResult<BTreeMap<String, Value>> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| HStoreError::ValueFormat {
            message: "only valid JSON formatted strings are accepted".to_string(),
            json_error: Some(e.to_string()),
        })?;
    match Value::from_json(parsed) {
        Value::Map(m) => Ok(m),
        other => Err(HStoreError::value_format(format!(
            "JSON text must describe an object, got {}",
            other.kind_name()
        ))),
    }
}

/// JSON output with `", "` and `": "` separators, matching the text other
/// hstore clients write.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Renders JSON with spaced separators.
pub fn json_text(value: &serde_json::Value) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

// ── hstore text literal ───────────────────────────────────────────────

/// Renders a map in PostgreSQL's hstore text form: `"k"=>"v", "n"=>NULL`.
pub fn to_hstore_literal(map: &BTreeMap<String, Option<String>>) -> String {
    fn quote(s: &str) -> String {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    }

    map.iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{}=>{}", quote(k), quote(v)),
            None => format!("{}=>NULL", quote(k)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses PostgreSQL's hstore text form back into a map.
pub fn parse_hstore_literal(text: &str) -> HStoreResult<BTreeMap<String, Option<String>>> {
    let mut parser = LiteralParser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let mut map = BTreeMap::new();

    parser.skip_ws();
    while !parser.at_end() {
        let key = parser
            .token()?
            .ok_or_else(|| HStoreError::value_format("hstore key cannot be NULL"))?;
        parser.skip_ws();
        parser.expect("=>")?;
        parser.skip_ws();
        let value = parser.token()?;
        map.insert(key, value);
        parser.skip_ws();
        if parser.at_end() {
            break;
        }
        parser.expect(",")?;
        parser.skip_ws();
    }
    Ok(map)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, s: &str) -> HStoreResult<()> {
        for expected in s.chars() {
            if self.chars.get(self.pos) != Some(&expected) {
                return Err(HStoreError::value_format(format!(
                    "malformed hstore literal: expected '{s}' at offset {}",
                    self.pos
                )));
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Reads a quoted string, or a bare word where `NULL` means no value.
    fn token(&mut self) -> HStoreResult<Option<String>> {
        if self.chars.get(self.pos) == Some(&'"') {
            self.pos += 1;
            let mut out = String::new();
            loop {
                match self.chars.get(self.pos) {
                    None => {
                        return Err(HStoreError::value_format(
                            "malformed hstore literal: unterminated string",
                        ))
                    }
                    Some('\\') => {
                        if let Some(c) = self.chars.get(self.pos + 1) {
                            out.push(*c);
                        }
                        self.pos += 2;
                    }
                    Some('"') => {
                        self.pos += 1;
                        return Ok(Some(out));
                    }
                    Some(c) => {
                        out.push(*c);
                        self.pos += 1;
                    }
                }
            }
        }

        let start = self.pos;
        while let Some(c) = self.chars.get(self.pos) {
            if c.is_whitespace() || *c == ',' || *c == '=' {
                break;
            }
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        if word.is_empty() {
            return Err(HStoreError::value_format(format!(
                "malformed hstore literal at offset {start}"
            )));
        }
        if word.eq_ignore_ascii_case("NULL") {
            Ok(None)
        } else {
            Ok(Some(word))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn empty() -> HStoreDict {
        HStoreDict::new(RawDict::Null, None, None).unwrap()
    }

    #[test]
    fn test_empty_inputs_give_empty_dict() {
        for raw in [
            RawDict::Null,
            RawDict::Mapping(BTreeMap::new()),
            RawDict::from("{}"),
        ] {
            let d = HStoreDict::new(raw, None, None).unwrap();
            assert!(d.is_empty());
        }
    }

    #[test]
    fn test_rejected_inputs() {
        let err = HStoreDict::new("not json", None, None).unwrap_err();
        match err {
            HStoreError::ValueFormat { json_error, .. } => assert!(json_error.is_some()),
            other => panic!("unexpected error {other:?}"),
        }

        let err = HStoreDict::new(Value::from(vec!["a"]), None, None).unwrap_err();
        assert!(matches!(err, HStoreError::ValueFormat { json_error: None, .. }));

        let err = HStoreDict::new(Value::Int(3), None, None).unwrap_err();
        assert!(matches!(err, HStoreError::ValueFormat { .. }));

        let err = HStoreDict::new("[1, 2]", None, None).unwrap_err();
        assert!(err.to_string().contains("list"));
    }

    #[test]
    fn test_booleans_normalize_before_numbers() {
        let mut d = empty();
        d.set("t", true);
        d.set("f", false);
        assert_eq!(d.raw("t"), Some(&Value::from("true")));
        assert_eq!(d.raw("f"), Some(&Value::from("false")));
        let parsed: bool = serde_json::from_str(d.raw("t").unwrap().as_str().unwrap()).unwrap();
        assert!(parsed);
    }

    #[test]
    fn test_numbers_normalize_to_canonical_text() {
        let mut d = empty();
        d.set("i", 42);
        d.set("f", 1.5);
        d.set("whole", 2.0);
        d.set("dec", Decimal::from_str("10.25").unwrap());
        assert_eq!(d.raw("i"), Some(&Value::from("42")));
        assert_eq!(d.raw("f"), Some(&Value::from("1.5")));
        assert_eq!(d.raw("whole"), Some(&Value::from("2.0")));
        assert_eq!(d.raw("dec"), Some(&Value::from("10.25")));
        let back: f64 = d.raw("f").unwrap().as_str().unwrap().parse().unwrap();
        assert!((back - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compounds_embed_json() {
        let mut d = empty();
        d.set("list", Value::List(vec![Value::Int(1), Value::Int(2)]));
        d.set("map", Value::map([("a", Value::Decimal(Decimal::new(25, 1)))]));
        assert_eq!(d.raw("list"), Some(&Value::from("[1, 2]")));
        assert_eq!(d.raw("map"), Some(&Value::from("{\"a\": 2.5}")));

        let parsed: serde_json::Value =
            serde_json::from_str(d.raw("list").unwrap().as_str().unwrap()).unwrap();
        assert_eq!(parsed, serde_json::json!([1, 2]));
    }

    #[test]
    fn test_strings_and_other_values_pass_through() {
        let mut d = empty();
        let day = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        d.set("s", "plain");
        d.set("day", day);
        d.set("nothing", Value::Null);
        assert_eq!(d.raw("s"), Some(&Value::from("plain")));
        assert_eq!(d.raw("day"), Some(&Value::Date(day)));
        assert_eq!(d.raw("nothing"), Some(&Value::Null));
    }

    #[test]
    fn test_construction_normalizes_json_text() {
        let d = HStoreDict::new(r#"{"a": 1, "b": true, "c": {"x": [1]}}"#, None, None).unwrap();
        assert_eq!(d.raw("a"), Some(&Value::from("1")));
        assert_eq!(d.raw("b"), Some(&Value::from("true")));
        assert_eq!(d.raw("c"), Some(&Value::from("{\"x\": [1]}")));
    }

    #[test]
    fn test_update_applies_normalization() {
        let mut d = empty();
        d.update([("a", Value::Int(1)), ("b", Value::Bool(false))]);
        assert_eq!(d.len(), 2);
        assert_eq!(d.raw("b"), Some(&Value::from("false")));
    }

    #[test]
    fn test_get_missing_key() {
        let d = empty();
        assert!(matches!(d.get("nope"), Err(HStoreError::KeyNotFound(k)) if k == "nope"));
        assert_eq!(d.get_or("nope", "fallback"), Value::from("fallback"));
    }

    #[test]
    fn test_to_text_and_display() {
        let d = empty();
        assert_eq!(d.to_text(), "");
        assert_eq!(d.to_string(), "{}");

        let mut d = empty();
        d.set("a", 1);
        d.set("b", "x");
        assert_eq!(d.to_text(), r#"{"a": "1", "b": "x"}"#);
        assert_eq!(d.to_string(), d.to_text());
    }

    #[test]
    fn test_to_hstore() {
        let mut d = empty();
        d.set("a", 1);
        d.set("n", Value::Null);
        let h = d.to_hstore();
        assert_eq!(h.get("a"), Some(&Some("1".to_string())));
        assert_eq!(h.get("n"), Some(&None));
    }

    #[test]
    fn test_wide_integers_keep_their_digits() {
        let d = HStoreDict::new(
            r#"{"n": 18446744073709551615, "m": 123456789012345678901234567890}"#,
            None,
            None,
        )
        .unwrap();
        assert_eq!(d.raw("n"), Some(&Value::from("18446744073709551615")));
        assert_eq!(d.raw("m"), Some(&Value::from("123456789012345678901234567890")));
    }

    #[test]
    fn test_schema_mode_stores_same_text_on_both_paths() {
        let schema = HStoreSchema::from_json(&serde_json::json!([
            {"name": "active", "class": "BooleanField"},
            {"name": "count", "class": "IntegerField"}
        ]))
        .unwrap();
        let schema = Arc::new(schema);
        let built = HStoreDict::new(
            Value::map([("active", Value::Bool(true)), ("count", Value::Int(2))]),
            None,
            Some(Arc::clone(&schema)),
        )
        .unwrap();
        let mut assigned = HStoreDict::new(RawDict::Null, None, Some(schema)).unwrap();
        assigned.set("active", true);
        assigned.set("count", 2);

        assert_eq!(built.to_hstore(), assigned.to_hstore());
        assert_eq!(built.raw("active"), Some(&Value::from("True")));
        assert_eq!(built.get("active").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_serialized_field_keeps_types() {
        let field = Arc::new(HStoreFieldDef::new("data", HStoreFlavor::Serialized));
        let mut d = HStoreDict::new(Value::map([("num", 1)]), Some(field), None).unwrap();
        assert!(d.serialized());
        assert_eq!(d.get("num").unwrap(), Value::Int(1));

        d.set("flag", true);
        d.set("text", "1");
        d.set("gone", Value::Null);
        assert_eq!(d.get("flag").unwrap(), Value::Bool(true));

        let stored = d.to_hstore();
        assert_eq!(stored["num"].as_deref(), Some("1"));
        assert_eq!(stored["flag"].as_deref(), Some("true"));
        assert_eq!(stored["text"].as_deref(), Some("\"1\""));
        assert_eq!(stored["gone"], None);
    }

    #[test]
    fn test_clone_drops_connection_keeps_entries() {
        let mut d = empty();
        d.set("k", "v");
        let copy = d.clone();
        assert_eq!(copy, d);
        assert!(!copy.has_connection());
    }

    #[test]
    fn test_serde_keeps_entries_only() {
        let mut d = empty();
        d.set("k", 7);
        let json = serde_json::to_string(&d).unwrap();
        let back: HStoreDict = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert!(back.field().is_none());
        assert!(!back.has_connection());
        assert!(!back.schema_mode());
    }

    #[test]
    fn test_hstore_literal_roundtrip_with_escapes() {
        let mut map = BTreeMap::new();
        map.insert("plain".to_string(), Some("v".to_string()));
        map.insert("quote\"d".to_string(), Some("back\\slash".to_string()));
        map.insert("missing".to_string(), None);
        let literal = to_hstore_literal(&map);
        assert!(literal.contains(r#""missing"=>NULL"#));
        assert!(literal.contains(r#""quote\"d"=>"back\\slash""#));
        assert_eq!(parse_hstore_literal(&literal).unwrap(), map);
    }

    #[test]
    fn test_parse_hstore_literal_bare_words_and_errors() {
        let map = parse_hstore_literal("a=>1, b => NULL").unwrap();
        assert_eq!(map["a"], Some("1".to_string()));
        assert_eq!(map["b"], None);
        assert!(parse_hstore_literal("").unwrap().is_empty());
        assert!(parse_hstore_literal("\"a\"=>\"unterminated").is_err());
        assert!(parse_hstore_literal("\"a\" \"b\"").is_err());
    }

    #[tokio::test]
    async fn test_remove_from_db_requires_connection() {
        let mut d = empty();
        d.set("k", "v");
        let err = d.remove_from_db(&["k"]).await.unwrap_err();
        assert!(matches!(err, HStoreError::DatabaseError(_)));
        assert!(d.contains_key("k"));
    }
}
