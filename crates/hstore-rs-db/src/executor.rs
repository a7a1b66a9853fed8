//! Database executor trait and model persistence.
//!
//! [`DbExecutor`] is the minimal async interface the query layer needs from a
//! database connection. Querysets, the hstore operations and
//! [`HStoreDict::remove_from_db`](crate::dict::HStoreDict::remove_from_db)
//! all accept an executor; driver crates implement it.

use hstore_rs_core::{HStoreError, HStoreResult};

use crate::model::Model;
use crate::query::compiler::{DatabaseBackendType, Query, Row, SqlCompiler, WhereNode};
use crate::query::lookups::Lookup;
use crate::query::translator::ColumnRef;

use crate::value::Value;

/// Minimal async database executor trait.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the backend type for SQL compilation.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Runs a statement that does not return rows and returns the number of
    /// rows affected.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> HStoreResult<u64>;

    /// Runs a query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> HStoreResult<Vec<Row>>;

    /// Runs a query that must return exactly one row.
    ///
    /// No rows is [`HStoreError::DoesNotExist`]; more than one is
    /// [`HStoreError::MultipleObjectsReturned`].
    async fn query_one(&self, sql: &str, params: &[Value]) -> HStoreResult<Row> {
        let mut rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Err(HStoreError::DoesNotExist(sql.to_string())),
            1 => Ok(rows.remove(0)),
            n => Err(HStoreError::MultipleObjectsReturned(format!(
                "{n} rows for {sql}"
            ))),
        }
    }
}

fn pk_condition<M: Model>(pk: &Value) -> WhereNode {
    WhereNode::Condition {
        column: ColumnRef::other(M::pk_field_name()),
        lookup: Lookup::Exact(pk.clone()),
    }
}

/// Saves an instance: an UPDATE of every field when the primary key is set,
/// an INSERT otherwise. Returns the number of rows affected.
pub async fn save_model<M: Model>(model: &M, db: &dyn DbExecutor) -> HStoreResult<u64> {
    let compiler = SqlCompiler::new(db.backend_type());
    let fields = model.field_values();

    let (sql, params) = match model.pk() {
        Some(pk) => {
            if fields.is_empty() {
                return Ok(0);
            }
            compiler.compile_update(M::table_name(), &fields, &pk_condition::<M>(pk))?
        }
        None => compiler.compile_insert(M::table_name(), &fields),
    };
    tracing::debug!(table = M::table_name(), %sql, "saving model");
    db.execute_sql(&sql, &params).await
}

/// Deletes an instance by primary key.
pub async fn delete_model<M: Model>(model: &M, db: &dyn DbExecutor) -> HStoreResult<u64> {
    let pk = model.pk().ok_or_else(|| {
        HStoreError::DatabaseError("Cannot delete a model without a primary key".to_string())
    })?;
    let compiler = SqlCompiler::new(db.backend_type());
    let (sql, params) = compiler.compile_delete(M::table_name(), &pk_condition::<M>(pk))?;
    db.execute_sql(&sql, &params).await
}

/// Reloads an instance from the database.
pub async fn refresh_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> HStoreResult<()> {
    let pk = model.pk().ok_or_else(|| {
        HStoreError::DatabaseError("Cannot refresh a model without a primary key".to_string())
    })?;
    let mut query = Query::new(M::table_name());
    query.where_clause = Some(pk_condition::<M>(pk));
    query.limit = Some(1);

    let (sql, params) = SqlCompiler::new(db.backend_type()).compile_select(&query)?;
    let row = db.query_one(&sql, &params).await?;
    *model = M::from_row(&row)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldDef, FieldType, HStoreFlavor};
    use crate::model::ModelMeta;
    use std::collections::BTreeMap;
    use std::sync::LazyLock;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockDb {
        executed: Mutex<Vec<(String, Vec<Value>)>>,
        rows: Vec<Row>,
    }

    #[async_trait::async_trait]
    impl DbExecutor for MockDb {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::PostgreSQL
        }

        async fn execute_sql(&self, sql: &str, params: &[Value]) -> HStoreResult<u64> {
            self.executed
                .lock()
                .await
                .push((sql.to_string(), params.to_vec()));
            Ok(1)
        }

        async fn query(&self, sql: &str, params: &[Value]) -> HStoreResult<Vec<Row>> {
            self.executed
                .lock()
                .await
                .push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }
    }

    struct Item {
        id: Option<Value>,
        data: BTreeMap<String, Option<String>>,
    }

    impl Model for Item {
        fn meta() -> &'static ModelMeta {
            static META: LazyLock<ModelMeta> = LazyLock::new(|| {
                ModelMeta::new("shop", "item", "shop_item")
                    .field(FieldDef::new("id", FieldType::BigAutoField).primary_key())
                    .field(FieldDef::hstore("data", HStoreFlavor::Dictionary))
            });
            &META
        }

        fn pk(&self) -> Option<&Value> {
            self.id.as_ref()
        }

        fn field_values(&self) -> Vec<(&'static str, Value)> {
            vec![("data", Value::HStore(self.data.clone()))]
        }

        fn from_row(row: &Row) -> HStoreResult<Self> {
            Ok(Self {
                id: Some(row.get("id")?),
                data: row.get("data")?,
            })
        }
    }

    fn _assert_object_safe(_: &dyn DbExecutor) {}

    #[tokio::test]
    async fn test_save_updates_or_inserts() {
        let db = MockDb::default();
        let mut item = Item {
            id: None,
            data: BTreeMap::new(),
        };
        save_model(&item, &db).await.unwrap();
        item.id = Some(Value::Int(3));
        save_model(&item, &db).await.unwrap();

        let executed = db.executed.lock().await;
        assert_eq!(executed[0].0, "INSERT INTO \"shop_item\" (\"data\") VALUES ($1)");
        assert_eq!(
            executed[1].0,
            "UPDATE \"shop_item\" SET \"data\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(executed[1].1[1], Value::Int(3));
    }

    #[tokio::test]
    async fn test_delete_requires_pk() {
        let db = MockDb::default();
        let item = Item {
            id: None,
            data: BTreeMap::new(),
        };
        assert!(delete_model(&item, &db).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_reads_row() {
        let db = MockDb {
            rows: vec![Row::new(
                vec!["id".to_string(), "data".to_string()],
                vec![Value::Int(3), Value::from(r#""a"=>"1""#)],
            )],
            ..MockDb::default()
        };
        let mut item = Item {
            id: Some(Value::Int(3)),
            data: BTreeMap::new(),
        };
        refresh_model(&mut item, &db).await.unwrap();
        assert_eq!(item.data["a"].as_deref(), Some("1"));
        assert_eq!(
            db.executed.lock().await[0].0,
            "SELECT * FROM \"shop_item\" WHERE \"id\" = $1 LIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_query_one_errors() {
        let db = MockDb::default();
        assert!(matches!(
            db.query_one("SELECT 1", &[]).await,
            Err(HStoreError::DoesNotExist(_))
        ));
        let db = MockDb {
            rows: vec![Row::new(vec![], vec![]), Row::new(vec![], vec![])],
            ..MockDb::default()
        };
        assert!(matches!(
            db.query_one("SELECT 1", &[]).await,
            Err(HStoreError::MultipleObjectsReturned(_))
        ));
    }
}
