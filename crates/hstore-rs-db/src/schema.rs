//! Schema mode: typed virtual fields declared over one hstore column.
//!
//! A schema is a JSON declaration such as
//!
//! ```json
//! [
//!     {"name": "number", "class": "IntegerField", "kwargs": {"default": 0}},
//!     {"name": "created", "class": "DateTimeField", "kwargs": {"null": true}}
//! ]
//! ```
//!
//! Each entry becomes a [`SchemaField`]. Class names are resolved to a
//! [`VirtualKind`] once, when the declaration is parsed; the kind knows how
//! to decode the stored text and how to encode a native value back to text.
//! [`HStoreSchema::clean`] validates a whole dictionary against the
//! declaration and reports failures per field.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use hstore_rs_core::{HStoreError, HStoreResult, ValidationError};
use rust_decimal::Decimal;

use crate::dict::{value_text, HStoreDict};
use crate::validators::{
    ChoicesValidator, FormatValidator, MaxLengthValidator, MinValueValidator, TextFormat,
    Validator,
};
use crate::value::Value;

/// The type of a virtual field, resolved from its declared class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKind {
    /// `IntegerField`
    Integer,
    /// `BigIntegerField`
    BigInteger,
    /// `SmallIntegerField`
    SmallInteger,
    /// `PositiveIntegerField`
    PositiveInteger,
    /// `FloatField`
    Float,
    /// `DecimalField`
    Decimal,
    /// `BooleanField`
    Boolean,
    /// `NullBooleanField`
    NullBoolean,
    /// `CharField`
    Char,
    /// `TextField`
    Text,
    /// `EmailField`
    Email,
    /// `URLField`
    Url,
    /// `SlugField`
    Slug,
    /// `DateField`
    Date,
    /// `DateTimeField`
    DateTime,
    /// `TimeField`
    Time,
    /// `GenericIPAddressField`
    GenericIpAddress,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

impl VirtualKind {
    /// Resolves a declared class name.
    pub fn from_class_name(name: &str) -> HStoreResult<Self> {
        let kind = match name {
            "IntegerField" => Self::Integer,
            "BigIntegerField" => Self::BigInteger,
            "SmallIntegerField" => Self::SmallInteger,
            "PositiveIntegerField" => Self::PositiveInteger,
            "FloatField" => Self::Float,
            "DecimalField" => Self::Decimal,
            "BooleanField" => Self::Boolean,
            "NullBooleanField" => Self::NullBoolean,
            "CharField" => Self::Char,
            "TextField" => Self::Text,
            "EmailField" => Self::Email,
            "URLField" => Self::Url,
            "SlugField" => Self::Slug,
            "DateField" => Self::Date,
            "DateTimeField" => Self::DateTime,
            "TimeField" => Self::Time,
            "GenericIPAddressField" => Self::GenericIpAddress,
            other => {
                return Err(HStoreError::ImproperlyConfigured(format!(
                    "unknown schema field class '{other}'"
                )))
            }
        };
        Ok(kind)
    }

    /// The class name this kind was declared with.
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Integer => "IntegerField",
            Self::BigInteger => "BigIntegerField",
            Self::SmallInteger => "SmallIntegerField",
            Self::PositiveInteger => "PositiveIntegerField",
            Self::Float => "FloatField",
            Self::Decimal => "DecimalField",
            Self::Boolean => "BooleanField",
            Self::NullBoolean => "NullBooleanField",
            Self::Char => "CharField",
            Self::Text => "TextField",
            Self::Email => "EmailField",
            Self::Url => "URLField",
            Self::Slug => "SlugField",
            Self::Date => "DateField",
            Self::DateTime => "DateTimeField",
            Self::Time => "TimeField",
            Self::GenericIpAddress => "GenericIPAddressField",
        }
    }

    /// Returns `true` for kinds whose native value is text.
    pub const fn is_textual(self) -> bool {
        matches!(
            self,
            Self::Char | Self::Text | Self::Email | Self::Url | Self::Slug | Self::GenericIpAddress
        )
    }

    const fn text_format(self) -> Option<TextFormat> {
        match self {
            Self::Email => Some(TextFormat::Email),
            Self::Url => Some(TextFormat::Url),
            Self::Slug => Some(TextFormat::Slug),
            Self::GenericIpAddress => Some(TextFormat::IpAddress),
            _ => None,
        }
    }

    /// Decodes a stored value into the kind's native value.
    ///
    /// `Null` stays `Null`. Text that does not parse fails with a
    /// [`HStoreError::Validation`] carrying the code `"invalid"`.
    pub fn to_value(self, raw: &Value) -> HStoreResult<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let text = value_text(raw);
        let trimmed = text.trim();
        let decoded = match self {
            Self::Integer | Self::BigInteger | Self::PositiveInteger => {
                trimmed.parse::<i64>().ok().map(Value::Int)
            }
            Self::SmallInteger => trimmed
                .parse::<i16>()
                .ok()
                .map(|v| Value::Int(i64::from(v))),
            Self::Float => trimmed.parse::<f64>().ok().map(Value::Float),
            Self::Decimal => Decimal::from_str(trimmed).ok().map(Value::Decimal),
            Self::Boolean => parse_bool(trimmed).map(Value::Bool),
            Self::NullBoolean => match trimmed {
                "" | "None" | "null" => Some(Value::Null),
                other => parse_bool(other).map(Value::Bool),
            },
            Self::Char | Self::Text | Self::Email | Self::Url | Self::Slug => {
                Some(Value::String(text.clone()))
            }
            Self::GenericIpAddress => Some(Value::String(trimmed.to_string())),
            Self::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .map(Value::Date),
            Self::DateTime => parse_datetime(trimmed),
            Self::Time => TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
                .map(Value::Time),
        };
        decoded.ok_or_else(|| {
            HStoreError::Validation(
                ValidationError::new(
                    format!("'{text}' is not a valid value for {}.", self.class_name()),
                    "invalid",
                )
                .with_param("value", text.clone()),
            )
        })
    }

    /// Encodes a native value as the text stored in the column; `Null`
    /// encodes as `None`.
    pub fn to_text(self, value: &Value) -> Option<String> {
        let text = match value {
            Value::Null => return None,
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Value::DateTimeTz(dt) => dt.to_rfc3339(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Bool(b) if matches!(self, Self::Boolean | Self::NullBoolean) => {
                String::from(if *b { "True" } else { "False" })
            }
            other => value_text(other),
        };
        Some(text)
    }

    /// The text form of `value`, with `Null` rendered as the empty string.
    pub fn value_to_string(self, value: &Value) -> String {
        self.to_text(value).unwrap_or_default()
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "1" | "t" => Some(true),
        "false" | "False" | "0" | "f" => Some(false),
        _ => None,
    }
}

fn parse_datetime(text: &str) -> Option<Value> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Value::DateTimeTz(dt.with_timezone(&chrono::Utc)));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(Value::DateTime)
}

/// Options accepted in a schema entry's `kwargs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaFieldOptions {
    /// Value returned when the key is absent.
    pub default: Option<Value>,
    /// Whether the empty string is acceptable.
    pub blank: bool,
    /// Whether `null` is acceptable.
    pub null: bool,
    /// Maximum length for textual kinds.
    pub max_length: Option<usize>,
    /// Allowed `(value, label)` pairs.
    pub choices: Vec<(Value, String)>,
    /// Human-readable name.
    pub verbose_name: Option<String>,
    /// Help text shown next to the field.
    pub help_text: Option<String>,
}

impl SchemaFieldOptions {
    fn from_kwargs(field: &str, kwargs: &serde_json::Map<String, serde_json::Value>) -> HStoreResult<Self> {
        let mut options = Self::default();
        for (key, value) in kwargs {
            match key.as_str() {
                "default" => options.default = Some(Value::from_json(value.clone())),
                "blank" => options.blank = expect_bool(field, key, value)?,
                "null" => options.null = expect_bool(field, key, value)?,
                "max_length" => {
                    let n = value.as_u64().ok_or_else(|| bad_kwarg(field, key, "a positive integer"))?;
                    options.max_length =
                        Some(usize::try_from(n).map_err(|_| bad_kwarg(field, key, "a positive integer"))?);
                }
                "choices" => options.choices = parse_choices(field, value)?,
                "verbose_name" => options.verbose_name = Some(expect_str(field, key, value)?),
                "help_text" => options.help_text = Some(expect_str(field, key, value)?),
                other => {
                    return Err(HStoreError::ImproperlyConfigured(format!(
                        "schema field '{field}' has unknown option '{other}'"
                    )))
                }
            }
        }
        Ok(options)
    }
}

fn bad_kwarg(field: &str, key: &str, expected: &str) -> HStoreError {
    HStoreError::ImproperlyConfigured(format!(
        "schema field '{field}': option '{key}' must be {expected}"
    ))
}

fn expect_bool(field: &str, key: &str, value: &serde_json::Value) -> HStoreResult<bool> {
    value.as_bool().ok_or_else(|| bad_kwarg(field, key, "a boolean"))
}

fn expect_str(field: &str, key: &str, value: &serde_json::Value) -> HStoreResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| bad_kwarg(field, key, "a string"))
}

fn parse_choices(field: &str, value: &serde_json::Value) -> HStoreResult<Vec<(Value, String)>> {
    let items = value
        .as_array()
        .ok_or_else(|| bad_kwarg(field, "choices", "a list of [value, label] pairs"))?;
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([v, serde_json::Value::String(label)]) => {
                Ok((Value::from_json(v.clone()), label.clone()))
            }
            _ => Err(bad_kwarg(field, "choices", "a list of [value, label] pairs")),
        })
        .collect()
}

/// One declared virtual field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    /// The key this field reads and writes.
    pub name: String,
    /// The resolved type.
    pub kind: VirtualKind,
    /// Declared options.
    pub options: SchemaFieldOptions,
}

impl SchemaField {
    /// The value reported when the key is absent.
    pub fn default_value(&self) -> Value {
        self.options.default.clone().unwrap_or(Value::Null)
    }

    fn validators(&self) -> Vec<Box<dyn Validator>> {
        let mut validators: Vec<Box<dyn Validator>> = Vec::new();
        if let Some(max) = self.options.max_length {
            validators.push(Box::new(MaxLengthValidator::new(max)));
        }
        if let Some(format) = self.kind.text_format() {
            validators.push(Box::new(FormatValidator::new(format)));
        }
        if self.kind == VirtualKind::PositiveInteger {
            validators.push(Box::new(MinValueValidator::new(0.0)));
        }
        if !self.options.choices.is_empty() {
            validators.push(Box::new(ChoicesValidator::new(self.options.choices.clone())));
        }
        validators
    }

    /// Validates the value stored for this field in `dict`.
    pub fn clean(&self, dict: &HStoreDict) -> Result<(), Vec<ValidationError>> {
        let raw = dict
            .raw(&self.name)
            .cloned()
            .unwrap_or_else(|| self.default_value());

        if raw.is_null() {
            return if self.options.null {
                Ok(())
            } else {
                Err(vec![ValidationError::new("This field cannot be null.", "null")])
            };
        }
        if raw.as_str() == Some("") {
            return if self.options.blank {
                Ok(())
            } else {
                Err(vec![ValidationError::new("This field cannot be blank.", "blank")])
            };
        }

        let value = match self.kind.to_value(&raw) {
            Ok(v) => v,
            Err(HStoreError::Validation(e)) => return Err(vec![e]),
            Err(other) => return Err(vec![ValidationError::new(other.to_string(), "invalid")]),
        };

        let errors: Vec<ValidationError> = self
            .validators()
            .iter()
            .filter_map(|v| v.validate(&value).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A parsed schema declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct HStoreSchema {
    fields: Vec<SchemaField>,
}

impl HStoreSchema {
    /// Parses and validates a JSON declaration.
    ///
    /// The declaration must be a non-empty array of objects, each with a
    /// string `name` and `class` and an optional `kwargs` object. Names must
    /// be unique. Every violation is [`HStoreError::ImproperlyConfigured`].
    pub fn from_json(declaration: &serde_json::Value) -> HStoreResult<Self> {
        let entries = declaration.as_array().ok_or_else(|| {
            HStoreError::ImproperlyConfigured("schema must be a list of field declarations".into())
        })?;
        if entries.is_empty() {
            return Err(HStoreError::ImproperlyConfigured(
                "schema must declare at least one field".into(),
            ));
        }

        let mut fields: Vec<SchemaField> = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let obj = entry.as_object().ok_or_else(|| {
                HStoreError::ImproperlyConfigured(format!("schema entry {index} is not an object"))
            })?;
            let name = obj.get("name").and_then(|v| v.as_str()).ok_or_else(|| {
                HStoreError::ImproperlyConfigured(format!("schema entry {index} has no 'name'"))
            })?;
            let class = obj.get("class").and_then(|v| v.as_str()).ok_or_else(|| {
                HStoreError::ImproperlyConfigured(format!("schema field '{name}' has no 'class'"))
            })?;
            if fields.iter().any(|f| f.name == name) {
                return Err(HStoreError::ImproperlyConfigured(format!(
                    "schema field '{name}' is declared twice"
                )));
            }
            let options = match obj.get("kwargs") {
                None | Some(serde_json::Value::Null) => SchemaFieldOptions::default(),
                Some(serde_json::Value::Object(kwargs)) => {
                    SchemaFieldOptions::from_kwargs(name, kwargs)?
                }
                Some(_) => {
                    return Err(HStoreError::ImproperlyConfigured(format!(
                        "schema field '{name}': 'kwargs' must be an object"
                    )))
                }
            };
            fields.push(SchemaField {
                name: name.to_string(),
                kind: VirtualKind::from_class_name(class)?,
                options,
            });
        }

        tracing::debug!(fields = fields.len(), "parsed hstore schema");
        Ok(Self { fields })
    }

    /// The declaration for `name`, if any.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All declarations in order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// The declared names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// The number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always `false` for a parsed schema; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Accessors for every declared field of the hstore attribute `attribute`.
    pub fn virtual_fields(&self, attribute: &str) -> Vec<VirtualField> {
        self.fields
            .iter()
            .map(|f| VirtualField {
                attribute: attribute.to_string(),
                field: f.clone(),
            })
            .collect()
    }

    /// Validates every declared field of `dict`, aggregating failures per
    /// field into one [`HStoreError::Validation`].
    pub fn clean(&self, dict: &HStoreDict) -> HStoreResult<()> {
        let mut field_errors: HashMap<String, Vec<ValidationError>> = HashMap::new();
        for field in &self.fields {
            if let Err(errors) = field.clean(dict) {
                field_errors.insert(field.name.clone(), errors);
            }
        }
        if field_errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(failed = field_errors.len(), "hstore schema validation failed");
            Err(HStoreError::Validation(ValidationError::with_field_errors(field_errors)))
        }
    }
}

/// Accessor pair for one declared field of an hstore attribute.
#[derive(Debug, Clone)]
pub struct VirtualField {
    attribute: String,
    field: SchemaField,
}

impl VirtualField {
    /// The declared key.
    pub fn name(&self) -> &str {
        &self.field.name
    }

    /// The hstore attribute the key lives in.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The declaration backing this accessor.
    pub const fn schema_field(&self) -> &SchemaField {
        &self.field
    }

    /// Reads the decoded value, or the declared default when the key is
    /// absent. Text that cannot be decoded is returned unchanged.
    pub fn get(&self, dict: &HStoreDict) -> Value {
        dict.raw(&self.field.name).map_or_else(
            || self.field.default_value(),
            |raw| self.field.kind.to_value(raw).unwrap_or_else(|_| raw.clone()),
        )
    }

    /// Writes `value` under the declared key.
    pub fn set(&self, dict: &mut HStoreDict, value: impl Into<Value>) {
        let encoded = self
            .field
            .kind
            .to_text(&value.into())
            .map_or(Value::Null, Value::String);
        dict.set(self.field.name.clone(), encoded);
    }
}
