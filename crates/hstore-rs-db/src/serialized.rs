//! The serialized-dictionary encoding.
//!
//! Columns of the [`Serialized`](crate::fields::HStoreFlavor::Serialized)
//! flavor store every value as its own JSON document, so numbers, booleans,
//! lists and nested mappings come back with their original types. `Null` is
//! stored as SQL `NULL` so per-key `isnull` filters see it. Text that is not
//! valid JSON is returned as a plain string.

use std::collections::BTreeMap;

use crate::dict::json_text;
use crate::value::Value;

/// Encodes each value as JSON text.
pub fn serialize_dict(map: &BTreeMap<String, Value>) -> BTreeMap<String, Option<String>> {
    map.iter()
        .map(|(k, v)| (k.clone(), serialize_value(v)))
        .collect()
}

/// Encodes one value; `Null` has no text.
pub fn serialize_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Json(serde_json::Value::Null) => None,
        other => Some(json_text(&other.to_json())),
    }
}

/// Decodes each stored value; `NULL` becomes [`Value::Null`].
pub fn deserialize_dict(map: &BTreeMap<String, Option<String>>) -> BTreeMap<String, Value> {
    map.iter()
        .map(|(k, v)| {
            let value = v.as_deref().map_or(Value::Null, deserialize_value);
            (k.clone(), value)
        })
        .collect()
}

/// Decodes one stored value.
pub fn deserialize_value(text: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(text)
        .map_or_else(|_| Value::String(text.to_string()), Value::from_json)
}
