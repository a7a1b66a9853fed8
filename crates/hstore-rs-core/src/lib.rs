//! # hstore-rs-core
//!
//! Core types for the hstore-rs workspace: the framework error enum, the
//! settings system, and logging setup. This crate has no dependency on the
//! ORM layer and provides the foundation for the other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{HStoreError, HStoreResult, ValidationError};
pub use settings::{AdapterRegistration, DatabaseSettings, Settings, SETTINGS};
