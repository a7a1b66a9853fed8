//! Query building, translation, compilation, and execution.
//!
//! - [`lookups`] - Q objects and lookup types for filtering
//! - [`annotations`] - value-type annotations that pick SQL casts
//! - [`translator`] - hstore predicate translation into SQL fragments
//! - [`compiler`] - Query AST and SQL compilation
//! - [`queryset`] - QuerySet and Manager, including the hstore operations

pub mod annotations;
pub mod compiler;
pub mod lookups;
pub mod queryset;
pub mod translator;

pub use annotations::{annotate, ValueAnnotation, ValueAnnotations};
pub use compiler::{DatabaseBackendType, OrderBy, Query, Row, SelectColumn, SqlCompiler, WhereNode};
pub use lookups::{Lookup, Q};
pub use queryset::{Manager, QuerySet};
pub use translator::{ColumnRef, PredicateTranslator, SqlFragment, Translation};
