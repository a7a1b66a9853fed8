//! The `sqlhstoreindexes` management command.
//!
//! Prints the `CREATE INDEX ... USING GIST` statements for the hstore
//! columns of the registered models, wrapped in a transaction.

use async_trait::async_trait;
use hstore_rs_core::{DatabaseSettings, HStoreError, Settings};
use hstore_rs_db::index::{max_name_length, model_index_sql};
use hstore_rs_db::model::ModelRegistry;
use hstore_rs_db::query::compiler::DatabaseBackendType;

use crate::command::ManagementCommand;

/// Prints GiST index DDL for hstore columns.
#[derive(Debug, Clone, Default)]
pub struct SqlHstoreIndexesCommand {
    models: ModelRegistry,
}

impl SqlHstoreIndexesCommand {
    /// Creates the command over the given models.
    pub const fn new(models: ModelRegistry) -> Self {
        Self { models }
    }
}

fn backend_for(db: &DatabaseSettings) -> DatabaseBackendType {
    if db.is_postgresql() {
        DatabaseBackendType::PostgreSQL
    } else if db.engine.contains("mysql") {
        DatabaseBackendType::MySQL
    } else {
        DatabaseBackendType::SQLite
    }
}

/// Generates the index statements for `models`, restricted to `app_labels`
/// when any are given, wrapped in `BEGIN;`/`COMMIT;`.
///
/// A model without its own tablespace uses the database's default index
/// tablespace.
pub fn generate_sqlhstoreindexes(
    models: &ModelRegistry,
    app_labels: &[&str],
    db: &DatabaseSettings,
) -> Vec<String> {
    let limit = max_name_length(backend_for(db));
    let mut output = vec!["BEGIN;".to_string()];
    for meta in models.models() {
        if !app_labels.is_empty() && !app_labels.contains(&meta.app_label) {
            continue;
        }
        let statements = match (&meta.db_tablespace, &db.tablespace) {
            (None, Some(default)) => {
                model_index_sql(&(*meta).clone().db_tablespace(default.clone()), limit)
            }
            _ => model_index_sql(meta, limit),
        };
        output.extend(statements);
    }
    output.push("COMMIT;".to_string());
    output
}

#[async_trait]
impl ManagementCommand for SqlHstoreIndexesCommand {
    fn name(&self) -> &'static str {
        "sqlhstoreindexes"
    }

    fn help(&self) -> &'static str {
        "Prints the CREATE INDEX SQL statements for hstore fields in the given app(s)"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("app_label")
                .num_args(0..)
                .help("Restrict output to these app labels"),
        )
        .arg(
            clap::Arg::new("database")
                .long("database")
                .default_value("default")
                .help("Nominates a database to print the SQL for"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), HStoreError> {
        let database = matches
            .get_one::<String>("database")
            .map_or("default", String::as_str);
        let db = settings.database(database).ok_or_else(|| {
            HStoreError::ConfigurationError(format!("Database '{database}' not configured"))
        })?;
        let app_labels: Vec<&str> = matches
            .get_many::<String>("app_label")
            .map(|labels| labels.map(String::as_str).collect())
            .unwrap_or_default();

        let output = generate_sqlhstoreindexes(&self.models, &app_labels, db);
        tracing::debug!(database, statements = output.len() - 2, "generated hstore indexes");
        for line in &output {
            println!("{line}");
        }
        Ok(())
    }
}
