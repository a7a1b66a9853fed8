//! Field type definitions.
//!
//! This module defines the field type system used by model definitions. Each
//! [`FieldType`] variant maps to a SQL column type, and [`FieldDef`] captures
//! the metadata of a single model field. hstore columns come in three
//! [`HStoreFlavor`]s that share the same storage but differ in how values
//! are encoded.

use crate::value::Value;

/// How the values of an hstore column are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HStoreFlavor {
    /// Plain dictionary; values normalized to text.
    Dictionary,
    /// Values are `"<tag>:<pk>"` references to other entities.
    References,
    /// Every value is stored as its own JSON document.
    Serialized,
}

/// The column classification consulted when compiling lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// A PostgreSQL `hstore` column.
    HStore,
    /// Any other column.
    Other,
}

/// The type of a model field, determining its SQL column type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum FieldType {
    /// Auto-incrementing 32-bit integer primary key.
    AutoField,
    /// Auto-incrementing 64-bit integer primary key.
    BigAutoField,
    /// Variable-length string with a max length.
    CharField,
    /// Unlimited-length text.
    TextField,
    /// 32-bit signed integer.
    IntegerField,
    /// 64-bit signed integer.
    BigIntegerField,
    /// 16-bit signed integer.
    SmallIntegerField,
    /// 64-bit floating-point number.
    FloatField,
    /// Fixed-precision decimal number.
    DecimalField {
        /// Maximum total digits.
        max_digits: u32,
        /// Digits after the decimal point.
        decimal_places: u32,
    },
    /// Boolean (true/false).
    BooleanField,
    /// Date without time.
    DateField,
    /// Date and time.
    DateTimeField,
    /// Time without date.
    TimeField,
    /// UUID field.
    UuidField,
    /// JSON data.
    JsonField,
    /// Email address.
    EmailField,
    /// URL.
    UrlField,
    /// Slug (URL-friendly string).
    SlugField,
    /// PostgreSQL hstore column.
    HStore {
        /// The value encoding.
        flavor: HStoreFlavor,
    },
}

impl FieldType {
    /// Shorthand for an hstore field type.
    pub const fn hstore(flavor: HStoreFlavor) -> Self {
        Self::HStore { flavor }
    }

    /// Returns the SQL column type on PostgreSQL.
    pub fn db_type(&self) -> String {
        match self {
            Self::AutoField => "serial".to_string(),
            Self::BigAutoField => "bigserial".to_string(),
            Self::CharField | Self::EmailField | Self::UrlField | Self::SlugField => {
                "varchar".to_string()
            }
            Self::TextField => "text".to_string(),
            Self::IntegerField => "integer".to_string(),
            Self::BigIntegerField => "bigint".to_string(),
            Self::SmallIntegerField => "smallint".to_string(),
            Self::FloatField => "double precision".to_string(),
            Self::DecimalField {
                max_digits,
                decimal_places,
            } => format!("numeric({max_digits}, {decimal_places})"),
            Self::BooleanField => "boolean".to_string(),
            Self::DateField => "date".to_string(),
            Self::DateTimeField => "timestamp".to_string(),
            Self::TimeField => "time".to_string(),
            Self::UuidField => "uuid".to_string(),
            Self::JsonField => "jsonb".to_string(),
            Self::HStore { .. } => "hstore".to_string(),
        }
    }

    /// Classifies the column for lookup compilation.
    pub const fn column_kind(&self) -> ColumnKind {
        match self {
            Self::HStore { .. } => ColumnKind::HStore,
            _ => ColumnKind::Other,
        }
    }

    /// Returns the hstore flavor, if this is an hstore type.
    pub const fn hstore_flavor(&self) -> Option<HStoreFlavor> {
        match self {
            Self::HStore { flavor } => Some(*flavor),
            _ => None,
        }
    }
}

/// Complete definition of a model field.
///
/// Built with the chained setters below, typically inside a model's static
/// [`ModelMeta`](crate::model::ModelMeta).
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The attribute name of this field.
    pub name: &'static str,
    /// The database column name (may differ from `name`).
    pub column: String,
    /// The type of this field.
    pub field_type: FieldType,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Whether NULL is allowed in the database.
    pub null: bool,
    /// Default value for new instances.
    pub default: Option<Value>,
    /// Whether a database index should be created.
    pub db_index: bool,
    /// Maximum character length (for CharField and similar).
    pub max_length: Option<usize>,
    /// Tablespace for this field's index.
    pub db_tablespace: Option<String>,
    /// Human-readable name for the field.
    pub verbose_name: String,
    column_kind: ColumnKind,
}

impl FieldDef {
    /// Creates a new `FieldDef` with default options.
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        let column_kind = field_type.column_kind();
        Self {
            name,
            column: name.to_string(),
            field_type,
            primary_key: false,
            null: false,
            default: None,
            db_index: false,
            max_length: None,
            db_tablespace: None,
            verbose_name: name.replace('_', " "),
            column_kind,
        }
    }

    /// Creates an hstore field of the given flavor.
    pub fn hstore(name: &'static str, flavor: HStoreFlavor) -> Self {
        Self::new(name, FieldType::hstore(flavor))
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Allows NULL values in the database.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Sets the maximum character length.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Marks this field as having a database index.
    #[must_use]
    pub const fn db_index(mut self) -> Self {
        self.db_index = true;
        self
    }

    /// Sets the default value for this field.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the index tablespace.
    #[must_use]
    pub fn db_tablespace(mut self, tablespace: impl Into<String>) -> Self {
        self.db_tablespace = Some(tablespace.into());
        self
    }

    /// Sets the verbose (human-readable) name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// The column classification, computed when the field was defined.
    pub const fn column_kind(&self) -> ColumnKind {
        self.column_kind
    }

    /// Returns `true` for hstore columns.
    pub const fn is_hstore(&self) -> bool {
        matches!(self.column_kind, ColumnKind::HStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_new_defaults() {
        let f = FieldDef::new("first_name", FieldType::CharField);
        assert_eq!(f.name, "first_name");
        assert_eq!(f.column, "first_name");
        assert!(!f.primary_key);
        assert!(!f.null);
        assert!(f.default.is_none());
        assert!(f.db_tablespace.is_none());
        assert_eq!(f.verbose_name, "first name");
        assert_eq!(f.column_kind(), ColumnKind::Other);
    }

    #[test]
    fn test_field_def_builder() {
        let f = FieldDef::hstore("data", HStoreFlavor::Dictionary)
            .column("payload")
            .nullable()
            .db_index()
            .db_tablespace("fast");
        assert_eq!(f.column, "payload");
        assert!(f.null);
        assert!(f.db_index);
        assert_eq!(f.db_tablespace.as_deref(), Some("fast"));
        assert!(f.is_hstore());
    }

    #[test]
    fn test_db_type() {
        assert_eq!(FieldType::hstore(HStoreFlavor::References).db_type(), "hstore");
        assert_eq!(FieldType::hstore(HStoreFlavor::Serialized).db_type(), "hstore");
        assert_eq!(FieldType::IntegerField.db_type(), "integer");
        assert_eq!(
            FieldType::DecimalField {
                max_digits: 10,
                decimal_places: 2
            }
            .db_type(),
            "numeric(10, 2)"
        );
    }

    #[test]
    fn test_column_kind_and_flavor() {
        let t = FieldType::hstore(HStoreFlavor::Serialized);
        assert_eq!(t.column_kind(), ColumnKind::HStore);
        assert_eq!(t.hstore_flavor(), Some(HStoreFlavor::Serialized));
        assert_eq!(FieldType::TextField.hstore_flavor(), None);
    }

    #[test]
    fn test_field_type_serde_tag() {
        let json = serde_json::to_value(FieldType::hstore(HStoreFlavor::Dictionary)).unwrap();
        assert_eq!(json["type"], "HStore");
        assert_eq!(json["flavor"], "Dictionary");
    }
}
