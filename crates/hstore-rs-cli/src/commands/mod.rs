//! Built-in management commands.
//!
//! Each command implements the
//! [`ManagementCommand`](crate::command::ManagementCommand) trait.

pub mod sqlhstoreindexes;

pub use sqlhstoreindexes::{generate_sqlhstoreindexes, SqlHstoreIndexesCommand};

use hstore_rs_db::model::ModelRegistry;

use crate::command::CommandRegistry;

/// Registers all built-in management commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry, models: &ModelRegistry) {
    registry.register(Box::new(SqlHstoreIndexesCommand::new(models.clone())));
}
