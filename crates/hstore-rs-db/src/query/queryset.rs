//! QuerySet and Manager for building and executing queries on models with
//! hstore columns.
//!
//! The [`QuerySet`] is lazy: it builds a [`Query`] AST and only talks to the
//! database when one of the `*_exec` methods is awaited. Besides the usual
//! filtering it carries the hstore-specific operations:
//!
//! | method | SQL |
//! |---|---|
//! | [`hkeys`](QuerySet::hkeys_exec) | `SELECT DISTINCT skeys("c") ...` |
//! | [`hpeek`](QuerySet::hpeek_exec) | `SELECT "c" -> $1 ... LIMIT 1` |
//! | [`hslice`](QuerySet::hslice_exec) | `SELECT slice("c", $1) ... LIMIT 1` |
//! | [`hremove`](QuerySet::hremove_exec) | `UPDATE ... SET "c" = delete("c", $1)` |
//! | [`hupdate`](QuerySet::hupdate_exec) | `UPDATE ... SET "c" = "c" \|\| $1` |
//!
//! # Examples
//!
//! ```
//! use std::sync::LazyLock;
//!
//! use hstore_rs_core::HStoreResult;
//! use hstore_rs_db::fields::{FieldDef, FieldType, HStoreFlavor};
//! use hstore_rs_db::model::{Model, ModelMeta, Row};
//! use hstore_rs_db::query::compiler::DatabaseBackendType;
//! use hstore_rs_db::query::lookups::{Lookup, Q};
//! use hstore_rs_db::query::queryset::Manager;
//! use hstore_rs_db::value::Value;
//!
//! struct Bag {
//!     id: Value,
//! }
//!
//! impl Model for Bag {
//!     fn meta() -> &'static ModelMeta {
//!         static META: LazyLock<ModelMeta> = LazyLock::new(|| {
//!             ModelMeta::new("app", "databag", "app_databag")
//!                 .field(FieldDef::new("id", FieldType::BigAutoField).primary_key())
//!                 .field(FieldDef::hstore("data", HStoreFlavor::Dictionary))
//!         });
//!         &META
//!     }
//!     fn pk(&self) -> Option<&Value> {
//!         Some(&self.id)
//!     }
//!     fn field_values(&self) -> Vec<(&'static str, Value)> {
//!         vec![]
//!     }
//!     fn from_row(row: &Row) -> HStoreResult<Self> {
//!         Ok(Self { id: row.get("id")? })
//!     }
//! }
//!
//! let qs = Manager::<Bag>::new().filter(Q::filter("data", Lookup::Contains(Value::from(vec!["a"]))));
//! let (sql, _) = qs.to_sql(DatabaseBackendType::PostgreSQL).unwrap();
//! assert_eq!(sql, "SELECT * FROM \"app_databag\" WHERE \"data\" ? $1");
//! ```

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use hstore_rs_core::logging::query_span;
use hstore_rs_core::{HStoreError, HStoreResult};
use tracing::Instrument;

use super::compiler::{DatabaseBackendType, OrderBy, Query, SelectColumn, SqlCompiler, WhereNode};
use super::lookups::Q;
use super::translator::SqlFragment;
use crate::dict::RawDict;
use crate::executor::DbExecutor;
use crate::fields::{FieldDef, HStoreFieldDef, HStoreFlavor};
use crate::model::Model;
use crate::value::Value;

/// The entry point for model-level query operations.
///
/// The `Manager` holds no query state; it creates fresh [`QuerySet`]s.
#[derive(Debug)]
pub struct Manager<M: Model> {
    _phantom: PhantomData<M>,
    using: Option<String>,
}

impl<M: Model> Default for Manager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Manager<M> {
    /// Creates a new manager.
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
            using: None,
        }
    }

    /// Sets the database alias for this manager.
    #[must_use]
    pub fn using(mut self, db: impl Into<String>) -> Self {
        self.using = Some(db.into());
        self
    }

    /// Returns a new `QuerySet` over all rows.
    pub fn all(&self) -> QuerySet<M> {
        QuerySet::new(self.using.clone())
    }

    /// Returns a new `QuerySet` with the given filter applied.
    pub fn filter(&self, q: Q) -> QuerySet<M> {
        self.all().filter(q)
    }

    /// Returns a new `QuerySet` with the given exclusion applied.
    pub fn exclude(&self, q: Q) -> QuerySet<M> {
        self.all().exclude(q)
    }
}

/// A lazy, composable database query.
///
/// Filtering methods consume `self` and return the modified queryset.
#[derive(Debug)]
pub struct QuerySet<M: Model> {
    model: PhantomData<M>,
    query: Query,
    using: Option<String>,
}

impl<M: Model> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            model: PhantomData,
            query: self.query.clone(),
            using: self.using.clone(),
        }
    }
}

impl<M: Model> QuerySet<M> {
    fn new(using: Option<String>) -> Self {
        Self {
            model: PhantomData,
            query: Query::new(M::table_name()),
            using,
        }
    }

    /// Returns a reference to the underlying query AST.
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Returns the database alias in use.
    pub fn using_db(&self) -> Option<&str> {
        self.using.as_deref()
    }

    /// Forces this queryset to use a specific database alias.
    #[must_use]
    pub fn using(mut self, db: impl Into<String>) -> Self {
        self.using = Some(db.into());
        self
    }

    // ── Filtering methods (lazy) ─────────────────────────────────────

    /// Adds a filter condition.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        let node = WhereNode::from_q(&q, M::meta());
        self.push_where(node);
        self
    }

    /// Adds an exclusion condition (NOT).
    #[must_use]
    pub fn exclude(mut self, q: Q) -> Self {
        let node = WhereNode::Not(Box::new(WhereNode::from_q(&q, M::meta())));
        self.push_where(node);
        self
    }

    fn push_where(&mut self, node: WhereNode) {
        self.query.where_clause = Some(match self.query.where_clause.take() {
            Some(existing) => WhereNode::And(vec![existing, node]),
            None => node,
        });
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order_by(mut self, fields: Vec<OrderBy>) -> Self {
        self.query.order_by = fields;
        self
    }

    /// Selects distinct rows.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.query.limit = Some(n);
        self
    }

    /// Skips the first `n` rows.
    #[must_use]
    pub const fn offset(mut self, n: usize) -> Self {
        self.query.offset = Some(n);
        self
    }

    // ── SQL generation ───────────────────────────────────────────────

    /// Compiles the SELECT for this queryset.
    pub fn to_sql(&self, backend: DatabaseBackendType) -> HStoreResult<(String, Vec<Value>)> {
        SqlCompiler::new(backend).compile_select(&self.query)
    }

    /// Compiles a `COUNT(*)` over this queryset.
    pub fn count_sql(&self, backend: DatabaseBackendType) -> HStoreResult<(String, Vec<Value>)> {
        let mut query = self.unordered();
        query.select = vec![fragment("COUNT(*)", vec![], "count")];
        SqlCompiler::new(backend).compile_select(&query)
    }

    /// Compiles the distinct key listing of hstore attribute `attr`.
    pub fn hkeys_sql(
        &self,
        attr: &str,
        backend: DatabaseBackendType,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let column = hstore_column::<M>(attr)?;
        let mut query = self.unordered();
        query.select = vec![fragment(&format!("skeys(\"{column}\")"), vec![], "key")];
        query.distinct = true;
        SqlCompiler::new(backend).compile_select(&query)
    }

    /// Compiles the lookup of `key` in the first matching row.
    pub fn hpeek_sql(
        &self,
        attr: &str,
        key: &str,
        backend: DatabaseBackendType,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let column = hstore_column::<M>(attr)?;
        let mut query = self.query.clone();
        query.select = vec![fragment(
            &format!("\"{column}\" -> %s"),
            vec![Value::from(key)],
            "value",
        )];
        query.limit = Some(1);
        SqlCompiler::new(backend).compile_select(&query)
    }

    /// Compiles the sub-dictionary of `keys` in the first matching row.
    pub fn hslice_sql(
        &self,
        attr: &str,
        keys: &[&str],
        backend: DatabaseBackendType,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let column = hstore_column::<M>(attr)?;
        let mut query = self.query.clone();
        query.select = vec![fragment(
            &format!("slice(\"{column}\", %s)"),
            vec![key_list(keys)],
            "slice",
        )];
        query.limit = Some(1);
        SqlCompiler::new(backend).compile_select(&query)
    }

    /// Compiles the removal of `keys` from every matching row.
    pub fn hremove_sql(
        &self,
        attr: &str,
        keys: &[&str],
        backend: DatabaseBackendType,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let column = hstore_column::<M>(attr)?;
        SqlCompiler::new(backend).compile_hremove(
            &self.query.table,
            &column,
            keys,
            self.query.where_clause.as_ref(),
        )
    }

    /// Compiles the merge of `updates` into every matching row. Values are
    /// encoded the same way dictionary writes to the column are.
    pub fn hupdate_sql(
        &self,
        attr: &str,
        updates: impl Into<RawDict>,
        backend: DatabaseBackendType,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let field = hstore_field::<M>(attr)?;
        let flavor = field.field_type.hstore_flavor().unwrap_or(HStoreFlavor::Dictionary);
        let column = field.column.clone();
        let def = Arc::new(HStoreFieldDef::new(field.name, flavor).column(column.clone()));
        let pairs = def.assign(updates)?.to_hstore();
        SqlCompiler::new(backend).compile_hupdate(
            &self.query.table,
            &column,
            &pairs,
            self.query.where_clause.as_ref(),
        )
    }

    fn unordered(&self) -> Query {
        let mut query = self.query.clone();
        query.order_by.clear();
        query.limit = None;
        query.offset = None;
        query
    }

    // ── Async execution methods ──────────────────────────────────────

    /// Executes the query and returns all matching model instances.
    pub async fn execute_query(&self, db: &dyn DbExecutor) -> HStoreResult<Vec<M>> {
        let (sql, params) = self.to_sql(db.backend_type())?;
        let rows = db
            .query(&sql, &params)
            .instrument(query_span(&self.query.table))
            .await?;
        rows.iter().map(M::from_row).collect()
    }

    /// Returns the number of matching rows.
    pub async fn count_exec(&self, db: &dyn DbExecutor) -> HStoreResult<i64> {
        let (sql, params) = self.count_sql(db.backend_type())?;
        let rows = db
            .query(&sql, &params)
            .instrument(query_span(&self.query.table))
            .await?;
        rows.first().map_or(Ok(0), |row| row.get_by_index::<i64>(0))
    }

    /// Returns the keys used in `attr` across all matching rows, sorted.
    pub async fn hkeys_exec(&self, attr: &str, db: &dyn DbExecutor) -> HStoreResult<Vec<String>> {
        let (sql, params) = self.hkeys_sql(attr, db.backend_type())?;
        let rows = db
            .query(&sql, &params)
            .instrument(query_span(&self.query.table))
            .await?;
        let mut keys = rows
            .iter()
            .map(|row| row.get_by_index::<String>(0))
            .collect::<HStoreResult<Vec<_>>>()?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Returns the value of `key` in the first matching row; `None` when no
    /// row matches or the key is absent.
    pub async fn hpeek_exec(
        &self,
        attr: &str,
        key: &str,
        db: &dyn DbExecutor,
    ) -> HStoreResult<Option<String>> {
        let (sql, params) = self.hpeek_sql(attr, key, db.backend_type())?;
        let rows = db
            .query(&sql, &params)
            .instrument(query_span(&self.query.table))
            .await?;
        match rows.first() {
            Some(row) => row.get_by_index::<Option<String>>(0),
            None => Ok(None),
        }
    }

    /// Returns the entries of `keys` present in the first matching row.
    pub async fn hslice_exec(
        &self,
        attr: &str,
        keys: &[&str],
        db: &dyn DbExecutor,
    ) -> HStoreResult<BTreeMap<String, Option<String>>> {
        let (sql, params) = self.hslice_sql(attr, keys, db.backend_type())?;
        let rows = db
            .query(&sql, &params)
            .instrument(query_span(&self.query.table))
            .await?;
        match rows.first() {
            Some(row) => Ok(row
                .get_by_index::<Option<BTreeMap<String, Option<String>>>>(0)?
                .unwrap_or_default()),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Removes `keys` from `attr` in every matching row and returns the
    /// number of rows affected.
    pub async fn hremove_exec(
        &self,
        attr: &str,
        keys: &[&str],
        db: &dyn DbExecutor,
    ) -> HStoreResult<u64> {
        let (sql, params) = self.hremove_sql(attr, keys, db.backend_type())?;
        tracing::debug!(table = %self.query.table, attr, keys = keys.len(), "hremove");
        db.execute_sql(&sql, &params)
            .instrument(query_span(&self.query.table))
            .await
    }

    /// Merges `updates` into `attr` in every matching row and returns the
    /// number of rows affected.
    pub async fn hupdate_exec(
        &self,
        attr: &str,
        updates: impl Into<RawDict> + Send,
        db: &dyn DbExecutor,
    ) -> HStoreResult<u64> {
        let (sql, params) = self.hupdate_sql(attr, updates, db.backend_type())?;
        tracing::debug!(table = %self.query.table, attr, "hupdate");
        db.execute_sql(&sql, &params)
            .instrument(query_span(&self.query.table))
            .await
    }
}

fn fragment(sql: &str, params: Vec<Value>, alias: &str) -> SelectColumn {
    SelectColumn::Fragment(
        SqlFragment {
            sql: sql.to_string(),
            params,
        },
        alias.to_string(),
    )
}

fn key_list(keys: &[&str]) -> Value {
    Value::List(keys.iter().map(|k| Value::from(*k)).collect())
}

/// Resolves hstore attribute `attr` of `M` to its column name.
fn hstore_column<M: Model>(attr: &str) -> HStoreResult<String> {
    hstore_field::<M>(attr).map(|field| field.column.clone())
}

fn hstore_field<M: Model>(attr: &str) -> HStoreResult<&'static FieldDef> {
    let meta = M::meta();
    match meta.get_field(attr) {
        Some(field) if field.is_hstore() => Ok(field),
        Some(_) => Err(HStoreError::ImproperlyConfigured(format!(
            "{}.{attr} is not an hstore field",
            meta.label()
        ))),
        None => Err(HStoreError::ImproperlyConfigured(format!(
            "{} has no field named '{attr}'",
            meta.label()
        ))),
    }
}
