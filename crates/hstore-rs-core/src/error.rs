//! Core error types for hstore-rs.
//!
//! This module provides the error enum [`HStoreError`] shared by every crate
//! in the workspace. It covers dictionary construction, key access, predicate
//! translation, reference resolution, schema configuration, validation and
//! the database boundary.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing per-field error lists). Schema-mode cleaning produces the
/// compound form, one entry per virtual field that failed.
///
/// # Examples
///
/// ```
/// use hstore_rs_core::error::ValidationError;
///
/// // Simple validation error
/// let err = ValidationError::new("Enter a whole number.", "invalid");
///
/// // Field-level validation errors
/// let mut field_errors = std::collections::HashMap::new();
/// field_errors.insert(
///     "number".to_string(),
///     vec![ValidationError::new("Enter a whole number.", "invalid")],
/// );
/// let err = ValidationError::with_field_errors(field_errors);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of validation failure (e.g. "required", "invalid").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-field validation errors, keyed by field name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns the errors recorded for a single field.
    pub fn errors_for(&self, field: &str) -> &[Self] {
        self.field_errors.get(field).map_or(&[], Vec::as_slice)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut fields: Vec<_> = self.field_errors.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let mut first = true;
            for (field, errors) in fields {
                for error in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for hstore-rs.
///
/// None of these are caught or retried inside the workspace: every variant
/// propagates synchronously to the immediate caller (model validation,
/// query construction, or the command runner).
#[derive(Error, Debug)]
pub enum HStoreError {
    // ── Dictionary codec ─────────────────────────────────────────────

    /// The input to a dictionary constructor was not `null`, a mapping, or a
    /// JSON object string.
    #[error("Invalid dictionary value: {message}")]
    ValueFormat {
        /// Describes the unacceptable input.
        message: String,
        /// The JSON parser's message, when the input was an unparsable string.
        json_error: Option<String>,
    },

    /// A single-argument `get` was called for a key that is not present.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    // ── Predicate translation ────────────────────────────────────────

    /// A lookup received a right-hand side shape it cannot interpret.
    #[error("Invalid value for '{lookup}' lookup: {shape}")]
    InvalidPredicate {
        /// The lookup name (e.g. "contains").
        lookup: String,
        /// A description of the received shape.
        shape: String,
    },

    /// A lookup that has no hstore translation.
    #[error("Unsupported lookup for hstore column: {0}")]
    UnsupportedLookup(String),

    // ── References ───────────────────────────────────────────────────

    /// A reference string was malformed or its type tag is not registered.
    #[error("Reference resolution failed: {0}")]
    ReferenceResolution(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A schema declaration or field definition is invalid.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more virtual fields failed validation.
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    // ── Database boundary ────────────────────────────────────────────

    /// A query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A query expected exactly one result but found multiple.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // ── Serialization / IO ───────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl HStoreError {
    /// Builds an [`HStoreError::InvalidPredicate`].
    pub fn invalid_predicate(lookup: impl Into<String>, shape: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            lookup: lookup.into(),
            shape: shape.into(),
        }
    }

    /// Builds an [`HStoreError::ValueFormat`] without a JSON parser message.
    pub fn value_format(message: impl Into<String>) -> Self {
        Self::ValueFormat {
            message: message.into(),
            json_error: None,
        }
    }

    /// Returns `true` for the "row not found" condition.
    pub const fn is_does_not_exist(&self) -> bool {
        matches!(self, Self::DoesNotExist(_))
    }
}

impl From<ValidationError> for HStoreError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<serde_json::Error> for HStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, HStoreError>`.
pub type HStoreResult<T> = Result<T, HStoreError>;
