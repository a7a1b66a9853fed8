//! # hstore-rs
//!
//! PostgreSQL hstore support for Rust ORMs.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `hstore-rs` for everything, or on the individual crates for finer-grained
//! control.
//!
//! ```rust
//! use hstore_rs::db::HStoreDict;
//!
//! let dict = HStoreDict::new(serde_json::json!({"a": 1, "b": true}), None, None).unwrap();
//! assert_eq!(dict.to_hstore().get("a").unwrap().as_deref(), Some("1"));
//! assert_eq!(dict.to_hstore().get("b").unwrap().as_deref(), Some("true"));
//! ```

/// Error types, settings and logging.
pub use hstore_rs_core as core;

/// The hstore dictionary codec, schema mode, references and query compilation.
#[cfg(feature = "db")]
pub use hstore_rs_db as db;

/// Management commands (CLI).
#[cfg(feature = "cli")]
pub use hstore_rs_cli as cli;

/// Commonly used items in one import.
pub mod prelude {
    pub use hstore_rs_core::{HStoreError, HStoreResult, Settings};

    #[cfg(feature = "db")]
    pub use hstore_rs_db::{
        DbExecutor, HStoreDict, HStoreFieldDef, HStoreFlavor, HStoreSchema, Manager, Model,
        ModelMeta, QuerySet, Value, Q,
    };
}
