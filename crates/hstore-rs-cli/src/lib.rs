//! # hstore-rs-cli
//!
//! Management commands for hstore-rs.
//!
//! - **Command framework** - [`ManagementCommand`] and [`CommandRegistry`],
//!   built on `clap`
//! - **`sqlhstoreindexes`** - prints GiST index DDL for the hstore columns of
//!   the registered models
//! - **Binary entry point** - [`app::run`] drives the CLI for an
//!   application's own [`ModelRegistry`](hstore_rs_db::model::ModelRegistry)
//!
//! ## Quick Start
//!
//! ```rust
//! use hstore_rs_cli::command::CommandRegistry;
//! use hstore_rs_cli::commands::register_builtin_commands;
//! use hstore_rs_db::model::ModelRegistry;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry, &ModelRegistry::new());
//!
//! assert_eq!(registry.list_commands(), vec!["sqlhstoreindexes"]);
//! ```

// These clippy lints are intentionally allowed:
// - result_large_err: HStoreError is the workspace-wide error type
// - doc_markdown: backtick requirements for documentation items are too strict
// - unused_async: command handlers keep consistent async signatures
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]

pub mod app;
pub mod command;
pub mod commands;

pub use command::{CommandRegistry, ManagementCommand};
pub use commands::{register_builtin_commands, SqlHstoreIndexesCommand};
