//! hstore field definitions.
//!
//! [`HStoreFieldDef`] is the runtime description of one hstore-backed
//! attribute: its column, flavor, default, optional schema and index
//! tablespace. Assigning a raw value through [`HStoreFieldDef::assign`]
//! produces the [`HStoreDict`] stored on the owning entity.

use std::collections::BTreeMap;
use std::sync::Arc;

use hstore_rs_core::{HStoreError, HStoreResult};

use super::types::{FieldDef, HStoreFlavor};
use crate::dict::{HStoreDict, RawDict};
use crate::schema::HStoreSchema;
use crate::value::Value;

/// Definition of an hstore-backed attribute.
#[derive(Debug, Clone)]
pub struct HStoreFieldDef {
    /// The attribute name.
    pub name: String,
    /// The database column name.
    pub column: String,
    /// The value encoding.
    pub flavor: HStoreFlavor,
    /// Whether NULL is allowed in the database.
    pub null: bool,
    /// Whether the field may be left empty.
    pub blank: bool,
    /// The default value; an empty mapping unless configured.
    pub default: Value,
    /// Tablespace for the GiST index on this column.
    pub db_tablespace: Option<String>,
    schema: Option<Arc<HStoreSchema>>,
}

impl HStoreFieldDef {
    /// Creates a field whose column matches its name.
    pub fn new(name: impl Into<String>, flavor: HStoreFlavor) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            flavor,
            null: false,
            blank: false,
            default: Value::Map(BTreeMap::new()),
            db_tablespace: None,
            schema: None,
        }
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Allows NULL values in the database.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Allows the field to be empty.
    #[must_use]
    pub const fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Sets the index tablespace.
    #[must_use]
    pub fn db_tablespace(mut self, tablespace: impl Into<String>) -> Self {
        self.db_tablespace = Some(tablespace.into());
        self
    }

    /// Attaches a schema, switching dictionaries of this field to schema mode.
    #[must_use]
    pub fn with_schema(mut self, schema: HStoreSchema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// The declared schema, if any.
    pub fn schema(&self) -> Option<&Arc<HStoreSchema>> {
        self.schema.as_ref()
    }

    /// Replaces the schema from a new declaration, or removes it when
    /// `declaration` is `None`.
    pub fn reload_schema(&mut self, declaration: Option<&serde_json::Value>) -> HStoreResult<()> {
        self.schema = match declaration {
            Some(decl) => Some(Arc::new(HStoreSchema::from_json(decl)?)),
            None => None,
        };
        tracing::debug!(
            field = %self.name,
            schema_mode = self.schema.is_some(),
            "reloaded hstore schema"
        );
        Ok(())
    }

    /// Converts a raw assignment into the dictionary stored on the entity.
    pub fn assign(self: &Arc<Self>, raw: impl Into<RawDict>) -> HStoreResult<HStoreDict> {
        HStoreDict::new(raw, Some(Arc::clone(self)), self.schema.clone())
    }

    /// The dictionary a new entity starts with.
    pub fn default_dict(self: &Arc<Self>) -> HStoreResult<HStoreDict> {
        self.assign(self.default.clone())
    }

    /// Checks that the default is usable: a non-nullable field cannot
    /// default to NULL, and the default must be a valid dictionary input.
    pub fn validate_default(&self) -> HStoreResult<()> {
        if self.default.is_null() && !self.null {
            return Err(HStoreError::ImproperlyConfigured(format!(
                "hstore field '{}' is not nullable but its default is NULL",
                self.name
            )));
        }
        HStoreDict::new(self.default.clone(), None, self.schema.clone())
            .map(|_| ())
            .map_err(|e| {
                HStoreError::ImproperlyConfigured(format!(
                    "invalid default for hstore field '{}': {e}",
                    self.name
                ))
            })
    }

    /// The static column metadata for this field.
    pub fn field_def(&self, name: &'static str) -> FieldDef {
        let mut def = FieldDef::hstore(name, self.flavor).column(self.column.clone());
        if self.null {
            def = def.nullable();
        }
        if let Some(ts) = &self.db_tablespace {
            def = def.db_tablespace(ts.clone());
        }
        def
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_binds_field() {
        let field = Arc::new(HStoreFieldDef::new("data", HStoreFlavor::Dictionary));
        let d = field.assign(Value::map([("a", 1)])).unwrap();
        assert_eq!(d.raw("a"), Some(&Value::from("1")));
        assert_eq!(d.field().unwrap().name, "data");
        assert!(!d.schema_mode());
    }

    #[test]
    fn test_default_dict_is_empty() {
        let field = Arc::new(HStoreFieldDef::new("data", HStoreFlavor::Dictionary));
        assert!(field.default_dict().unwrap().is_empty());
    }

    #[test]
    fn test_validate_default_rejects_null_on_required_field() {
        let field = HStoreFieldDef::new("data", HStoreFlavor::Dictionary).default(Value::Null);
        assert!(matches!(
            field.validate_default(),
            Err(HStoreError::ImproperlyConfigured(_))
        ));

        let nullable = HStoreFieldDef::new("data", HStoreFlavor::Dictionary)
            .nullable()
            .default(Value::Null);
        assert!(nullable.validate_default().is_ok());
    }

    #[test]
    fn test_validate_default_rejects_non_mapping() {
        let field = HStoreFieldDef::new("data", HStoreFlavor::Dictionary).default(Value::Int(1));
        assert!(field.validate_default().is_err());
    }

    #[test]
    fn test_reload_schema_toggles_schema_mode() {
        let mut field = HStoreFieldDef::new("data", HStoreFlavor::Dictionary);
        field
            .reload_schema(Some(&serde_json::json!([
                {"name": "number", "class": "IntegerField", "kwargs": {"default": 0}}
            ])))
            .unwrap();
        let field = Arc::new(field);
        assert!(field.default_dict().unwrap().schema_mode());

        let mut field = (*field).clone();
        field.reload_schema(None).unwrap();
        assert!(field.schema().is_none());
    }

    #[test]
    fn test_field_def_mirrors_options() {
        let field = HStoreFieldDef::new("data", HStoreFlavor::References)
            .column("refs")
            .nullable()
            .db_tablespace("fast");
        let def = field.field_def("data");
        assert!(def.is_hstore());
        assert_eq!(def.column, "refs");
        assert!(def.null);
        assert_eq!(def.db_tablespace.as_deref(), Some("fast"));
    }
}
