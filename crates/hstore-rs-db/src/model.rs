//! Model trait, model metadata and hstore attributes.
//!
//! The [`Model`] trait is implemented by every entity type. Its
//! [`ModelMeta`] describes the table, its fields and the options the index
//! generator consults (`managed`, `proxy`, `db_tablespace`).
//!
//! An hstore-backed attribute of an entity is an [`HStoreAttribute`]: the
//! field definition plus the current [`HStoreDict`]. Assignments go through
//! [`HStoreAttribute::set`], which converts raw input the same way the field
//! does at load time.

use std::collections::BTreeMap;
use std::sync::Arc;

use hstore_rs_core::{HStoreError, HStoreResult, ValidationError};

use crate::dict::{parse_hstore_literal, HStoreDict, RawDict};
use crate::fields::{ColumnKind, FieldDef, HStoreFieldDef, HStoreFlavor};
use crate::query::translator::ColumnRef;
use crate::serialized::deserialize_dict;
use crate::value::Value;

pub use crate::query::compiler::Row;

/// The core trait for all entity types.
///
/// # Examples
///
/// ```
/// use std::sync::LazyLock;
///
/// use hstore_rs_core::HStoreResult;
/// use hstore_rs_db::fields::{FieldDef, FieldType, HStoreFlavor};
/// use hstore_rs_db::model::{Model, ModelMeta, Row};
/// use hstore_rs_db::value::Value;
///
/// struct Item {
///     id: Value,
///     name: String,
/// }
///
/// impl Model for Item {
///     fn meta() -> &'static ModelMeta {
///         static META: LazyLock<ModelMeta> = LazyLock::new(|| {
///             ModelMeta::new("shop", "item", "shop_item")
///                 .field(FieldDef::new("id", FieldType::BigAutoField).primary_key())
///                 .field(FieldDef::new("name", FieldType::CharField))
///                 .field(FieldDef::hstore("data", HStoreFlavor::Dictionary))
///         });
///         &META
///     }
///
///     fn pk(&self) -> Option<&Value> {
///         Some(&self.id)
///     }
///
///     fn field_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("name", Value::from(self.name.as_str()))]
///     }
///
///     fn from_row(row: &Row) -> HStoreResult<Self> {
///         Ok(Self { id: row.get("id")?, name: row.get("name")? })
///     }
/// }
///
/// assert_eq!(Item::table_name(), "shop_item");
/// ```
pub trait Model: Send + Sync + 'static {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static ModelMeta;

    /// Returns the database table name.
    fn table_name() -> &'static str {
        Self::meta().db_table.as_str()
    }

    /// Returns the name of the primary key column.
    fn pk_field_name() -> &'static str {
        Self::meta().pk_column()
    }

    /// Returns the primary key value, or `None` if unsaved.
    fn pk(&self) -> Option<&Value>;

    /// Returns the non-key column values of this instance.
    fn field_values(&self) -> Vec<(&'static str, Value)>;

    /// Constructs an instance from a database row.
    fn from_row(row: &Row) -> HStoreResult<Self>
    where
        Self: Sized;
}

/// Metadata about a model.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    /// The application label (e.g. "shop").
    pub app_label: &'static str,
    /// The model name in lowercase (e.g. "item").
    pub model_name: &'static str,
    /// The database table name.
    pub db_table: String,
    /// Field definitions.
    pub fields: Vec<FieldDef>,
    /// Whether the schema of this table is managed by the application.
    pub managed: bool,
    /// Whether this model is a proxy over another model's table.
    pub proxy: bool,
    /// Default tablespace for this model's indexes.
    pub db_tablespace: Option<String>,
}

impl ModelMeta {
    /// Creates metadata for a managed, non-proxy model with no fields.
    pub fn new(app_label: &'static str, model_name: &'static str, db_table: impl Into<String>) -> Self {
        Self {
            app_label,
            model_name,
            db_table: db_table.into(),
            fields: Vec::new(),
            managed: true,
            proxy: false,
            db_tablespace: None,
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Marks the table as not managed by the application.
    #[must_use]
    pub const fn unmanaged(mut self) -> Self {
        self.managed = false;
        self
    }

    /// Marks the model as a proxy.
    #[must_use]
    pub const fn proxy(mut self) -> Self {
        self.proxy = true;
        self
    }

    /// Sets the default index tablespace.
    #[must_use]
    pub fn db_tablespace(mut self, tablespace: impl Into<String>) -> Self {
        self.db_tablespace = Some(tablespace.into());
        self
    }

    /// The `app_label.model_name` label.
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Looks up a field by attribute name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The primary key column, `"id"` when none is declared.
    pub fn pk_column(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .map_or("id", |f| f.column.as_str())
    }

    /// The column classification of attribute `name`; unknown names are
    /// [`ColumnKind::Other`].
    pub fn column_kind(&self, name: &str) -> ColumnKind {
        self.get_field(name).map_or(ColumnKind::Other, FieldDef::column_kind)
    }

    /// Resolves attribute `name` to the column the compiler filters on.
    pub fn column_ref(&self, name: &str) -> ColumnRef {
        match self.get_field(name) {
            Some(field) => match field.field_type.hstore_flavor() {
                Some(flavor) => ColumnRef::hstore(field.column.clone(), flavor),
                None => ColumnRef::other(field.column.clone()),
            },
            None => ColumnRef::other(name),
        }
    }

    /// The hstore fields of this model, in declaration order.
    pub fn hstore_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_hstore())
    }
}

/// An ordered list of registered models.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: Vec<&'static ModelMeta>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model. Registering the same label twice is a no-op.
    pub fn register(&mut self, meta: &'static ModelMeta) {
        if self.get(meta.app_label, meta.model_name).is_none() {
            self.models.push(meta);
        }
    }

    /// Registers model type `M`.
    pub fn register_model<M: Model>(&mut self) {
        self.register(M::meta());
    }

    /// Looks up a model by app label and model name.
    pub fn get(&self, app_label: &str, model_name: &str) -> Option<&'static ModelMeta> {
        self.models
            .iter()
            .copied()
            .find(|m| m.app_label == app_label && m.model_name == model_name)
    }

    /// All registered models, in registration order.
    pub fn models(&self) -> &[&'static ModelMeta] {
        &self.models
    }

    /// Returns the number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns `true` if no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn stored_input(field: &HStoreFieldDef, map: BTreeMap<String, Option<String>>) -> RawDict {
    if field.flavor == HStoreFlavor::Serialized && field.schema().is_none() {
        RawDict::Mapping(deserialize_dict(&map))
    } else {
        RawDict::from(Value::HStore(map))
    }
}

/// The value of one hstore-backed attribute of an entity.
#[derive(Debug, Clone)]
pub struct HStoreAttribute {
    field: Arc<HStoreFieldDef>,
    dict: HStoreDict,
}

impl HStoreAttribute {
    /// Creates the attribute with the field's default dictionary.
    pub fn new(field: Arc<HStoreFieldDef>) -> HStoreResult<Self> {
        let dict = field.default_dict()?;
        Ok(Self { field, dict })
    }

    /// Builds the attribute from a column value as loaded from the database:
    /// a decoded hstore map, its text literal, or `NULL`. Columns of a
    /// serialized field are decoded from JSON per key.
    pub fn load(field: Arc<HStoreFieldDef>, value: &Value) -> HStoreResult<Self> {
        let raw = match value {
            Value::String(text) => stored_input(&field, parse_hstore_literal(text)?),
            Value::HStore(map) => stored_input(&field, map.clone()),
            other => RawDict::from(other.clone()),
        };
        let dict = field.assign(raw)?;
        Ok(Self { field, dict })
    }

    /// The current dictionary.
    pub const fn get(&self) -> &HStoreDict {
        &self.dict
    }

    /// The current dictionary, for in-place edits.
    pub fn get_mut(&mut self) -> &mut HStoreDict {
        &mut self.dict
    }

    /// Replaces the dictionary from a raw assignment.
    pub fn set(&mut self, raw: impl Into<RawDict>) -> HStoreResult<()> {
        self.dict = self.field.assign(raw)?;
        Ok(())
    }

    /// The field definition.
    pub const fn field(&self) -> &Arc<HStoreFieldDef> {
        &self.field
    }

    /// The value written to the column; an empty dictionary on a nullable
    /// field is written as `NULL`.
    pub fn to_value(&self) -> Value {
        if self.dict.is_empty() && self.field.null {
            Value::Null
        } else {
            self.dict.to_value()
        }
    }

    /// Validates the dictionary against the field's schema, if any.
    pub fn clean(&self) -> HStoreResult<()> {
        if self.dict.is_empty() && !self.field.blank && !self.field.null {
            return Err(HStoreError::Validation(ValidationError::new(
                "This field cannot be blank.",
                "blank",
            )));
        }
        match self.field.schema() {
            Some(schema) => schema.clean(&self.dict),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldType, HStoreFlavor};
    use std::collections::BTreeMap;
    use std::sync::LazyLock;

    static META: LazyLock<ModelMeta> = LazyLock::new(|| {
        ModelMeta::new("shop", "item", "shop_item")
            .field(FieldDef::new("id", FieldType::BigAutoField).primary_key())
            .field(FieldDef::new("name", FieldType::CharField))
            .field(FieldDef::hstore("data", HStoreFlavor::Dictionary).column("payload"))
            .field(FieldDef::hstore("refs", HStoreFlavor::References))
    });

    #[test]
    fn test_column_kind_and_ref() {
        assert_eq!(META.column_kind("data"), ColumnKind::HStore);
        assert_eq!(META.column_kind("name"), ColumnKind::Other);
        assert_eq!(META.column_kind("nope"), ColumnKind::Other);

        let col = META.column_ref("data");
        assert_eq!(col.name, "payload");
        assert_eq!(col.flavor, Some(HStoreFlavor::Dictionary));
        assert!(!META.column_ref("name").is_hstore());
    }

    #[test]
    fn test_hstore_fields_and_pk() {
        let names: Vec<_> = META.hstore_fields().map(|f| f.name).collect();
        assert_eq!(names, vec!["data", "refs"]);
        assert_eq!(META.pk_column(), "id");
        assert_eq!(META.label(), "shop.item");
    }

    #[test]
    fn test_registry_dedupes() {
        let mut registry = ModelRegistry::new();
        registry.register(&META);
        registry.register(&META);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("shop", "item").is_some());
        assert!(registry.get("shop", "other").is_none());
    }

    #[test]
    fn test_attribute_set_and_value() {
        let field = Arc::new(HStoreFieldDef::new("data", HStoreFlavor::Dictionary));
        let mut attr = HStoreAttribute::new(Arc::clone(&field)).unwrap();
        assert!(attr.get().is_empty());

        attr.set(Value::map([("a", 1)])).unwrap();
        assert_eq!(attr.get().raw("a"), Some(&Value::from("1")));
        attr.get_mut().set("b", true);

        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Some("1".to_string()));
        expected.insert("b".to_string(), Some("true".to_string()));
        assert_eq!(attr.to_value(), Value::HStore(expected));

        assert!(matches!(
            attr.set(Value::Int(5)),
            Err(HStoreError::ValueFormat { .. })
        ));
    }

    #[test]
    fn test_attribute_load_from_literal() {
        let field = Arc::new(HStoreFieldDef::new("data", HStoreFlavor::Dictionary));
        let attr = HStoreAttribute::load(field, &Value::from(r#""k"=>"v""#)).unwrap();
        assert_eq!(attr.get().get("k").unwrap(), Value::from("v"));
    }

    #[test]
    fn test_nullable_empty_writes_null() {
        let field = Arc::new(HStoreFieldDef::new("data", HStoreFlavor::Dictionary).nullable());
        let attr = HStoreAttribute::load(field, &Value::Null).unwrap();
        assert_eq!(attr.to_value(), Value::Null);
        assert!(attr.clean().is_ok());
    }

    #[test]
    fn test_clean_required_empty() {
        let field = Arc::new(HStoreFieldDef::new("data", HStoreFlavor::Dictionary));
        let attr = HStoreAttribute::new(field).unwrap();
        assert!(matches!(attr.clean(), Err(HStoreError::Validation(_))));
    }
}
