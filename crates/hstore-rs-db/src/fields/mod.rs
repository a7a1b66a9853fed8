//! Field definitions and types.
//!
//! [`FieldDef`] and [`FieldType`] describe model columns; [`HStoreFieldDef`]
//! carries the runtime configuration of an hstore-backed attribute.

pub mod hstore;
pub mod types;

pub use hstore::HStoreFieldDef;
pub use types::{ColumnKind, FieldDef, FieldType, HStoreFlavor};
