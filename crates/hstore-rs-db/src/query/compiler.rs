//! SQL query AST and compiler.
//!
//! This module defines the [`Query`] AST and the [`SqlCompiler`] that turns
//! it into parameterized SQL. Conditions on hstore columns are handed to the
//! [`PredicateTranslator`]; the fragments it returns use `%s` markers, which
//! the compiler renders to the backend's placeholder style (`$1, $2, ...` on
//! PostgreSQL, `?` on SQLite and MySQL).
//!
//! The compiler also builds the statements behind the hstore queryset
//! operations: `delete(col, keys)` for key removal and `col || pairs` for
//! in-place updates.

use std::collections::BTreeMap;

use hstore_rs_core::{HStoreError, HStoreResult};

use super::lookups::{Lookup, Q};
use super::translator::{ColumnRef, PredicateTranslator, SqlFragment, Translation};
use crate::dict::{parse_hstore_literal, value_text};
use crate::model::ModelMeta;
use crate::value::Value;

/// The type of database backend, used by the compiler to generate
/// backend-specific SQL syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackendType {
    /// PostgreSQL (uses `$1, $2, ...` placeholders).
    PostgreSQL,
    /// SQLite (uses `?` placeholders).
    SQLite,
    /// MySQL (uses `?` placeholders).
    MySQL,
}

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parses `"name"` or `"-name"`.
    pub fn parse(ordering: &str) -> Self {
        ordering.strip_prefix('-')
            .map_or_else(|| Self::asc(ordering), Self::desc)
    }
}

/// A column to select in a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// A simple column name.
    Column(String),
    /// A SQL fragment with an alias.
    Fragment(SqlFragment, String),
    /// All columns (`*`).
    Star,
}

/// A WHERE clause node in the query AST.
///
/// Each condition carries a resolved [`ColumnRef`], so whether a column is
/// an hstore column is decided once, when the node is built.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// A single condition.
    Condition {
        /// The column the lookup applies to.
        column: ColumnRef,
        /// The lookup.
        lookup: Lookup,
    },
    /// Logical AND of conditions.
    And(Vec<WhereNode>),
    /// Logical OR of conditions.
    Or(Vec<WhereNode>),
    /// Logical NOT of a condition.
    Not(Box<WhereNode>),
}

impl WhereNode {
    /// Converts a `Q` object into a `WhereNode`, resolving attribute names
    /// against `meta`.
    pub fn from_q(q: &Q, meta: &ModelMeta) -> Self {
        match q {
            Q::Filter { field, lookup } => Self::Condition {
                column: meta.column_ref(field),
                lookup: lookup.clone(),
            },
            Q::And(children) => Self::And(children.iter().map(|c| Self::from_q(c, meta)).collect()),
            Q::Or(children) => Self::Or(children.iter().map(|c| Self::from_q(c, meta)).collect()),
            Q::Not(inner) => Self::Not(Box::new(Self::from_q(inner, meta))),
        }
    }
}

/// The query AST representing a SELECT statement.
#[derive(Debug, Clone)]
pub struct Query {
    /// The main table name.
    pub table: String,
    /// Columns to select.
    pub select: Vec<SelectColumn>,
    /// WHERE clause.
    pub where_clause: Option<WhereNode>,
    /// ORDER BY clauses.
    pub order_by: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<usize>,
    /// OFFSET.
    pub offset: Option<usize>,
    /// DISTINCT flag.
    pub distinct: bool,
}

impl Query {
    /// Creates a new query for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: vec![SelectColumn::Star],
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }
}

/// A generic database row.
///
/// `Row` holds a list of column names and their corresponding values. It
/// provides typed access via the [`get`](Row::get) method.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    pub fn get<T: FromValue>(&self, column: &str) -> HStoreResult<T> {
        let value = self.get_value(column).ok_or_else(|| {
            HStoreError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Gets a typed value by column index.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> HStoreResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            HStoreError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns a reference to the raw value of a column.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }
}

/// Conversion from a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> HStoreResult<Self>;
}

fn unexpected(expected: &str, value: &Value) -> HStoreError {
    HStoreError::DatabaseError(format!("Expected {expected}, got {}", value.kind_name()))
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> HStoreResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(unexpected("Int", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> HStoreResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            _ => Err(unexpected("Float", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> HStoreResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            _ => Err(unexpected("Bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> HStoreResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(unexpected("String", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> HStoreResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for BTreeMap<String, Option<String>> {
    /// Accepts a decoded hstore value or its text literal.
    fn from_value(value: &Value) -> HStoreResult<Self> {
        match value {
            Value::HStore(map) => Ok(map.clone()),
            Value::String(text) => parse_hstore_literal(text),
            _ => Err(unexpected("HStore", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> HStoreResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

/// The SQL compiler translates a [`Query`] AST into parameterized SQL.
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler {
    backend: DatabaseBackendType,
}

impl SqlCompiler {
    /// Creates a new compiler for the given backend type.
    pub const fn new(backend: DatabaseBackendType) -> Self {
        Self { backend }
    }

    /// Returns a parameter placeholder for the given 1-based index.
    fn placeholder(&self, index: usize) -> String {
        match self.backend {
            DatabaseBackendType::PostgreSQL => format!("${index}"),
            DatabaseBackendType::SQLite | DatabaseBackendType::MySQL => "?".to_string(),
        }
    }

    /// Compiles a SELECT query into SQL and parameters.
    pub fn compile_select(&self, query: &Query) -> HStoreResult<(String, Vec<Value>)> {
        let mut params: Vec<Value> = Vec::new();
        let mut sql = String::from("SELECT ");

        if query.distinct {
            sql.push_str("DISTINCT ");
        }

        if query.select.is_empty() {
            sql.push('*');
        }
        for (i, col) in query.select.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match col {
                SelectColumn::Column(name) => sql.push_str(&format!("\"{name}\"")),
                SelectColumn::Fragment(fragment, alias) => {
                    self.render_fragment(fragment, &mut sql, &mut params)?;
                    sql.push_str(&format!(" AS \"{alias}\""));
                }
                SelectColumn::Star => sql.push('*'),
            }
        }

        sql.push_str(&format!(" FROM \"{}\"", query.table));

        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params)?;
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let dir = if o.descending { " DESC" } else { " ASC" };
                    format!("\"{}\"{dir}", o.column)
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok((sql, params))
    }

    /// Compiles an INSERT statement.
    pub fn compile_insert(&self, table: &str, fields: &[(&str, Value)]) -> (String, Vec<Value>) {
        let columns: Vec<String> = fields.iter().map(|(name, _)| format!("\"{name}\"")).collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| self.placeholder(i)).collect();
        let params = fields.iter().map(|(_, v)| v.clone()).collect();
        let sql = format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, params)
    }

    /// Compiles an UPDATE statement.
    pub fn compile_update(
        &self,
        table: &str,
        fields: &[(&str, Value)],
        where_clause: &WhereNode,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let mut params = Vec::with_capacity(fields.len());
        let set_parts: Vec<String> = fields
            .iter()
            .map(|(name, val)| {
                params.push(val.clone());
                format!("\"{name}\" = {}", self.placeholder(params.len()))
            })
            .collect();
        let mut sql = format!("UPDATE \"{table}\" SET {} WHERE ", set_parts.join(", "));
        self.compile_where_node(where_clause, &mut sql, &mut params)?;
        Ok((sql, params))
    }

    /// Compiles a DELETE statement.
    pub fn compile_delete(
        &self,
        table: &str,
        where_clause: &WhereNode,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM \"{table}\" WHERE ");
        self.compile_where_node(where_clause, &mut sql, &mut params)?;
        Ok((sql, params))
    }

    /// Compiles a WHERE tree on its own, without the `WHERE` keyword.
    pub fn compile_where(&self, node: &WhereNode) -> HStoreResult<(String, Vec<Value>)> {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.compile_where_node(node, &mut sql, &mut params)?;
        Ok((sql, params))
    }

    /// Compiles `UPDATE t SET col = delete(col, keys)`.
    pub fn compile_hremove(
        &self,
        table: &str,
        column: &str,
        keys: &[&str],
        where_clause: Option<&WhereNode>,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let mut params = vec![Value::List(
            keys.iter().map(|k| Value::String((*k).to_string())).collect(),
        )];
        let mut sql = format!(
            "UPDATE \"{table}\" SET \"{column}\" = delete(\"{column}\", {})",
            self.placeholder(1)
        );
        self.push_optional_where(where_clause, &mut sql, &mut params)?;
        Ok((sql, params))
    }

    /// Compiles `UPDATE t SET col = col || pairs`.
    pub fn compile_hupdate(
        &self,
        table: &str,
        column: &str,
        pairs: &BTreeMap<String, Option<String>>,
        where_clause: Option<&WhereNode>,
    ) -> HStoreResult<(String, Vec<Value>)> {
        let mut params = vec![Value::HStore(pairs.clone())];
        let mut sql = format!(
            "UPDATE \"{table}\" SET \"{column}\" = \"{column}\" || {}",
            self.placeholder(1)
        );
        self.push_optional_where(where_clause, &mut sql, &mut params)?;
        Ok((sql, params))
    }

    fn push_optional_where(
        &self,
        where_clause: Option<&WhereNode>,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> HStoreResult<()> {
        if let Some(node) = where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(node, sql, params)?;
        }
        Ok(())
    }

    /// Appends a `%s` fragment, rendering its markers as placeholders.
    fn render_fragment(
        &self,
        fragment: &SqlFragment,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> HStoreResult<()> {
        let mut pending = fragment.params.iter();
        let mut chars = fragment.sql.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                sql.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => sql.push('%'),
                Some('s') => {
                    let value = pending.next().ok_or_else(|| {
                        HStoreError::DatabaseError(format!(
                            "fragment '{}' has more placeholders than parameters",
                            fragment.sql
                        ))
                    })?;
                    params.push(value.clone());
                    sql.push_str(&self.placeholder(params.len()));
                }
                other => {
                    return Err(HStoreError::DatabaseError(format!(
                        "invalid escape '%{}' in fragment '{}'",
                        other.map(String::from).unwrap_or_default(),
                        fragment.sql
                    )))
                }
            }
        }
        if pending.next().is_some() {
            return Err(HStoreError::DatabaseError(format!(
                "fragment '{}' has more parameters than placeholders",
                fragment.sql
            )));
        }
        Ok(())
    }

    /// Compiles a `WhereNode` into SQL, appending to the provided string.
    fn compile_where_node(
        &self,
        node: &WhereNode,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> HStoreResult<()> {
        match node {
            WhereNode::Condition { column, lookup } => {
                match PredicateTranslator::translate(column, lookup)? {
                    Translation::Sql(fragment) => self.render_fragment(&fragment, sql, params)?,
                    Translation::Defer => self.compile_lookup(column, lookup, sql, params)?,
                }
            }
            WhereNode::And(children) => {
                self.compile_junction(children, " AND ", "1=1", sql, params)?;
            }
            WhereNode::Or(children) => {
                self.compile_junction(children, " OR ", "1=0", sql, params)?;
            }
            WhereNode::Not(inner) => {
                sql.push_str("NOT (");
                self.compile_where_node(inner, sql, params)?;
                sql.push(')');
            }
        }
        Ok(())
    }

    fn compile_junction(
        &self,
        children: &[WhereNode],
        connector: &str,
        empty: &str,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> HStoreResult<()> {
        if children.is_empty() {
            sql.push_str(empty);
            return Ok(());
        }
        sql.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                sql.push_str(connector);
            }
            self.compile_where_node(child, sql, params)?;
        }
        sql.push(')');
        Ok(())
    }

    /// Compiles a lookup with the generic SQL. Text lookups on hstore
    /// columns compare against the column's text form.
    fn compile_lookup(
        &self,
        column: &ColumnRef,
        lookup: &Lookup,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> HStoreResult<()> {
        let textual = matches!(
            lookup,
            Lookup::IExact(_)
                | Lookup::Contains(_)
                | Lookup::IContains(_)
                | Lookup::StartsWith(_)
                | Lookup::EndsWith(_)
        );
        let col = if textual && column.is_hstore() {
            format!("{}::text", column.sql())
        } else {
            column.sql()
        };

        match lookup {
            Lookup::Exact(Value::Null) => sql.push_str(&format!("{col} IS NULL")),
            Lookup::Exact(val) => self.push_binary(&col, "=", val.clone(), sql, params),
            Lookup::IExact(val) => {
                params.push(val.clone());
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("LOWER({col}) = LOWER({ph})"));
            }
            Lookup::Contains(val) => {
                self.push_like(&col, format!("%{}%", value_text(val)), false, sql, params);
            }
            Lookup::IContains(val) => {
                self.push_like(&col, format!("%{}%", value_text(val)), true, sql, params);
            }
            Lookup::StartsWith(val) => self.push_like(&col, format!("{val}%"), false, sql, params),
            Lookup::EndsWith(val) => self.push_like(&col, format!("%{val}"), false, sql, params),
            Lookup::In(vals) if vals.is_empty() => sql.push_str("1=0"),
            Lookup::In(vals) => {
                let placeholders: Vec<String> = vals
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        self.placeholder(params.len())
                    })
                    .collect();
                sql.push_str(&format!("{col} IN ({})", placeholders.join(", ")));
            }
            Lookup::Gt(val) => self.push_binary(&col, ">", val.clone(), sql, params),
            Lookup::Gte(val) => self.push_binary(&col, ">=", val.clone(), sql, params),
            Lookup::Lt(val) => self.push_binary(&col, "<", val.clone(), sql, params),
            Lookup::Lte(val) => self.push_binary(&col, "<=", val.clone(), sql, params),
            Lookup::IsNull(Value::Bool(true)) => sql.push_str(&format!("{col} IS NULL")),
            Lookup::IsNull(Value::Bool(false)) => sql.push_str(&format!("{col} IS NOT NULL")),
            Lookup::IsNull(other) => {
                return Err(HStoreError::invalid_predicate("isnull", other.kind_name()))
            }
        }
        Ok(())
    }

    fn push_binary(
        &self,
        col: &str,
        operator: &str,
        value: Value,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        params.push(value);
        let ph = self.placeholder(params.len());
        sql.push_str(&format!("{col} {operator} {ph}"));
    }

    fn push_like(
        &self,
        col: &str,
        pattern: String,
        case_insensitive: bool,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        params.push(Value::String(pattern));
        let ph = self.placeholder(params.len());
        match (case_insensitive, self.backend) {
            (false, _) => sql.push_str(&format!("{col} LIKE {ph}")),
            (true, DatabaseBackendType::PostgreSQL) => sql.push_str(&format!("{col} ILIKE {ph}")),
            (true, _) => sql.push_str(&format!("LOWER({col}) LIKE LOWER({ph})")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::HStoreFlavor;

    fn pg() -> SqlCompiler {
        SqlCompiler::new(DatabaseBackendType::PostgreSQL)
    }

    fn sqlite() -> SqlCompiler {
        SqlCompiler::new(DatabaseBackendType::SQLite)
    }

    fn data() -> ColumnRef {
        ColumnRef::hstore("data", HStoreFlavor::Dictionary)
    }

    fn cond(column: ColumnRef, lookup: Lookup) -> WhereNode {
        WhereNode::Condition { column, lookup }
    }

    // ── Row ──────────────────────────────────────────────────────────

    #[test]
    fn test_row_typed_access() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string(), "bio".to_string()],
            vec![Value::Int(42), Value::from("Alice"), Value::Null],
        );
        assert_eq!(row.get::<i64>("id").unwrap(), 42);
        assert_eq!(row.get::<String>("name").unwrap(), "Alice");
        assert_eq!(row.get::<Option<String>>("bio").unwrap(), None);
        assert_eq!(row.get_by_index::<i64>(0).unwrap(), 42);
        assert!(row.get_by_index::<i64>(9).is_err());
        assert!(row.get::<String>("missing").is_err());
        assert!(row.get::<bool>("id").is_err());
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_row_hstore_from_literal() {
        let row = Row::new(
            vec!["data".to_string()],
            vec![Value::from(r#""a"=>"1", "b"=>NULL"#)],
        );
        let map: BTreeMap<String, Option<String>> = row.get("data").unwrap();
        assert_eq!(map["a"].as_deref(), Some("1"));
        assert_eq!(map["b"], None);
    }

    #[test]
    fn test_order_by_parse() {
        assert_eq!(OrderBy::parse("-id"), OrderBy::desc("id"));
        assert_eq!(OrderBy::parse("name"), OrderBy::asc("name"));
    }

    // ── SELECT ───────────────────────────────────────────────────────

    #[test]
    fn test_simple_select() {
        let (sql, params) = pg().compile_select(&Query::new("items")).unwrap();
        assert_eq!(sql, "SELECT * FROM \"items\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_with_hstore_and_plain_conditions() {
        let mut query = Query::new("items");
        query.where_clause = Some(WhereNode::And(vec![
            cond(ColumnRef::other("name"), Lookup::Exact(Value::from("x"))),
            cond(data(), Lookup::Contains(Value::map([("v", 1)]))),
            cond(data(), Lookup::Gt(Value::map([("v2", 3)]))),
        ]));
        query.order_by = vec![OrderBy::desc("id")];
        query.limit = Some(5);
        let (sql, params) = pg().compile_select(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"items\" WHERE (\"name\" = $1 AND (\"data\"->'v')::bigint = $2 \
             AND (\"data\"->'v2')::bigint > $3) ORDER BY \"id\" DESC LIMIT 5"
        );
        assert_eq!(params, vec![Value::from("x"), Value::from("1"), Value::from("3")]);
    }

    #[test]
    fn test_select_sqlite_placeholders() {
        let mut query = Query::new("items");
        query.where_clause = Some(cond(data(), Lookup::Contains(Value::from(vec!["a", "b"]))));
        let (sql, _) = sqlite().compile_select(&query).unwrap();
        assert_eq!(sql, "SELECT * FROM \"items\" WHERE \"data\" ?& ?");
    }

    #[test]
    fn test_percent_in_key_is_unescaped() {
        let mut query = Query::new("items");
        query.where_clause = Some(cond(data(), Lookup::IsNull(Value::map([("100%", true)]))));
        let (sql, params) = pg().compile_select(&query).unwrap();
        assert_eq!(sql, "SELECT * FROM \"items\" WHERE (\"data\"->'100%') IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_deferred_text_lookup_casts_hstore_column() {
        let mut query = Query::new("items");
        query.where_clause = Some(cond(data(), Lookup::IContains(Value::from("abc"))));
        let (sql, params) = pg().compile_select(&query).unwrap();
        assert_eq!(sql, "SELECT * FROM \"items\" WHERE \"data\"::text ILIKE $1");
        assert_eq!(params, vec![Value::from("%abc%")]);
    }

    #[test]
    fn test_deferred_isnull_on_hstore_column() {
        let mut query = Query::new("items");
        query.where_clause = Some(cond(data(), Lookup::IsNull(Value::Bool(false))));
        let (sql, _) = pg().compile_select(&query).unwrap();
        assert_eq!(sql, "SELECT * FROM \"items\" WHERE \"data\" IS NOT NULL");
    }

    #[test]
    fn test_not_and_or() {
        let node = WhereNode::Not(Box::new(WhereNode::Or(vec![
            cond(data(), Lookup::Contains(Value::from(vec!["a"]))),
            cond(ColumnRef::other("id"), Lookup::In(vec![Value::Int(1), Value::Int(2)])),
        ])));
        let (sql, params) = pg().compile_where(&node).unwrap();
        assert_eq!(sql, "NOT ((\"data\" ? $1 OR \"id\" IN ($2, $3)))");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_translation_errors_propagate() {
        let mut query = Query::new("items");
        query.where_clause = Some(cond(data(), Lookup::StartsWith("a".into())));
        assert!(matches!(
            pg().compile_select(&query),
            Err(HStoreError::UnsupportedLookup(_))
        ));
    }

    #[test]
    fn test_select_fragment_column() {
        let mut query = Query::new("items");
        query.select = vec![SelectColumn::Fragment(
            SqlFragment {
                sql: "\"data\" -> %s".to_string(),
                params: vec![Value::from("k")],
            },
            "value".to_string(),
        )];
        query.where_clause = Some(cond(ColumnRef::other("id"), Lookup::Exact(Value::Int(1))));
        let (sql, params) = pg().compile_select(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT \"data\" -> $1 AS \"value\" FROM \"items\" WHERE \"id\" = $2"
        );
        assert_eq!(params, vec![Value::from("k"), Value::Int(1)]);
    }

    // ── DML ──────────────────────────────────────────────────────────

    #[test]
    fn test_compile_insert_update_delete() {
        let (sql, params) = pg().compile_insert("items", &[("name", Value::from("x"))]);
        assert_eq!(sql, "INSERT INTO \"items\" (\"name\") VALUES ($1)");
        assert_eq!(params.len(), 1);

        let pk = cond(ColumnRef::other("id"), Lookup::Exact(Value::Int(7)));
        let (sql, params) = pg()
            .compile_update("items", &[("name", Value::from("y"))], &pk)
            .unwrap();
        assert_eq!(sql, "UPDATE \"items\" SET \"name\" = $1 WHERE \"id\" = $2");
        assert_eq!(params, vec![Value::from("y"), Value::Int(7)]);

        let (sql, _) = pg().compile_delete("items", &pk).unwrap();
        assert_eq!(sql, "DELETE FROM \"items\" WHERE \"id\" = $1");
    }

    #[test]
    fn test_compile_hremove() {
        let pk = cond(ColumnRef::other("id"), Lookup::Exact(Value::Int(7)));
        let (sql, params) = pg()
            .compile_hremove("items", "data", &["a", "b"], Some(&pk))
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"items\" SET \"data\" = delete(\"data\", $1) WHERE \"id\" = $2"
        );
        assert_eq!(
            params,
            vec![Value::List(vec![Value::from("a"), Value::from("b")]), Value::Int(7)]
        );
    }

    #[test]
    fn test_compile_hupdate_without_where() {
        let mut pairs = BTreeMap::new();
        pairs.insert("a".to_string(), Some("1".to_string()));
        let (sql, params) = pg().compile_hupdate("items", "data", &pairs, None).unwrap();
        assert_eq!(sql, "UPDATE \"items\" SET \"data\" = \"data\" || $1");
        assert_eq!(params, vec![Value::HStore(pairs)]);
    }

    #[test]
    fn test_fragment_param_mismatch() {
        let fragment = SqlFragment {
            sql: "a = %s AND b = %s".to_string(),
            params: vec![Value::Int(1)],
        };
        let mut sql = String::new();
        let mut params = Vec::new();
        assert!(pg().render_fragment(&fragment, &mut sql, &mut params).is_err());
    }
}
