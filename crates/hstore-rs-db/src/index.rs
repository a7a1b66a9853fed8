//! GiST index DDL for hstore columns.
//!
//! Every hstore column of a managed, non-proxy model gets one statement:
//!
//! ```text
//! CREATE INDEX "<table>_<column>_gist" ON "<table>" USING GIST ("<column>") ;
//! ```
//!
//! with ` TABLESPACE "<ts>"` before the `;` when the field or the model names
//! a tablespace. Index names longer than the backend allows are shortened by
//! [`truncate_name`].

use sha2::{Digest, Sha256};

use crate::fields::FieldDef;
use crate::model::ModelMeta;
use crate::query::compiler::DatabaseBackendType;

const HASH_LEN: usize = 4;

/// The longest identifier the backend accepts.
pub const fn max_name_length(backend: DatabaseBackendType) -> usize {
    match backend {
        DatabaseBackendType::PostgreSQL => 63,
        DatabaseBackendType::MySQL => 64,
        DatabaseBackendType::SQLite => usize::MAX,
    }
}

/// Shortens `name` to `length` characters, replacing the tail with a short
/// hash of the full name so distinct long names stay distinct.
///
/// ```
/// use hstore_rs_db::index::truncate_name;
///
/// assert_eq!(truncate_name("short", 63), "short");
/// let long = "a".repeat(80);
/// let truncated = truncate_name(&long, 63);
/// assert_eq!(truncated.chars().count(), 63);
/// assert!(truncated.starts_with(&"a".repeat(59)));
/// ```
pub fn truncate_name(name: &str, length: usize) -> String {
    if name.chars().count() <= length {
        return name.to_string();
    }
    let digest = Sha256::digest(name.as_bytes());
    let hash: String = digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(HASH_LEN)
        .collect();
    let head: String = name.chars().take(length.saturating_sub(HASH_LEN)).collect();
    format!("{head}{hash}")
}

/// The CREATE INDEX statement for one hstore field of `meta`.
pub fn hstore_index_sql(meta: &ModelMeta, field: &FieldDef, max_name_length: usize) -> String {
    let table = &meta.db_table;
    let index_name = truncate_name(&format!("{table}_{}_gist", field.column), max_name_length);
    let mut clauses = vec![
        "CREATE INDEX".to_string(),
        format!("\"{index_name}\""),
        "ON".to_string(),
        format!("\"{table}\""),
        "USING GIST".to_string(),
        format!("(\"{}\")", field.column),
    ];
    if let Some(tablespace) = field.db_tablespace.as_ref().or(meta.db_tablespace.as_ref()) {
        clauses.push(format!("TABLESPACE \"{tablespace}\""));
    }
    clauses.push(";".to_string());
    clauses.join(" ")
}

/// The index statements for every hstore field of `meta`. Unmanaged and
/// proxy models produce none.
pub fn model_index_sql(meta: &ModelMeta, max_name_length: usize) -> Vec<String> {
    if !meta.managed || meta.proxy {
        tracing::debug!(model = %meta.label(), "skipping unmanaged or proxy model");
        return Vec::new();
    }
    meta.hstore_fields()
        .map(|field| hstore_index_sql(meta, field, max_name_length))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldType, HStoreFlavor};

    fn meta() -> ModelMeta {
        ModelMeta::new("app", "databag", "app_databag")
            .field(FieldDef::new("id", FieldType::BigAutoField).primary_key())
            .field(FieldDef::new("name", FieldType::CharField))
            .field(FieldDef::hstore("data", HStoreFlavor::Dictionary))
            .field(FieldDef::hstore("refs", HStoreFlavor::References).db_tablespace("fast"))
    }

    #[test]
    fn test_index_statements() {
        let statements = model_index_sql(&meta(), 63);
        assert_eq!(
            statements,
            vec![
                "CREATE INDEX \"app_databag_data_gist\" ON \"app_databag\" USING GIST (\"data\") ;",
                "CREATE INDEX \"app_databag_refs_gist\" ON \"app_databag\" USING GIST (\"refs\") \
                 TABLESPACE \"fast\" ;",
            ]
        );
    }

    #[test]
    fn test_model_tablespace_fallback() {
        let meta = meta().db_tablespace("slow");
        let statements = model_index_sql(&meta, 63);
        assert!(statements[0].ends_with("TABLESPACE \"slow\" ;"));
        assert!(statements[1].ends_with("TABLESPACE \"fast\" ;"));
    }

    #[test]
    fn test_unmanaged_and_proxy_skipped() {
        assert!(model_index_sql(&meta().unmanaged(), 63).is_empty());
        assert!(model_index_sql(&meta().proxy(), 63).is_empty());
    }

    #[test]
    fn test_long_names_truncated() {
        let table = "t".repeat(70);
        let meta = ModelMeta::new("app", "wide", table.clone())
            .field(FieldDef::hstore("data", HStoreFlavor::Dictionary));
        let sql = &model_index_sql(&meta, 63)[0];
        let name = sql.split('"').nth(1).unwrap();
        assert_eq!(name.len(), 63);
        assert_eq!(name, truncate_name(&format!("{table}_data_gist"), 63));
        assert_ne!(
            truncate_name(&format!("{}a", "x".repeat(70)), 63),
            truncate_name(&format!("{}b", "x".repeat(70)), 63)
        );
    }

    #[test]
    fn test_backend_limits() {
        assert_eq!(max_name_length(DatabaseBackendType::PostgreSQL), 63);
        assert_eq!(truncate_name("abc", max_name_length(DatabaseBackendType::SQLite)), "abc");
    }
}
