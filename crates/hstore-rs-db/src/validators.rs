//! Validators for schema-mode virtual fields.
//!
//! Each validator checks one constraint on an already-decoded value and
//! returns a [`ValidationError`] describing the failure.

use std::fmt;
use std::net::IpAddr;
use std::sync::OnceLock;

use hstore_rs_core::ValidationError;
use regex::Regex;

use crate::value::Value;

/// A trait for validating decoded field values.
///
/// # Examples
///
/// ```
/// use hstore_rs_db::validators::{Validator, MaxLengthValidator};
/// use hstore_rs_db::value::Value;
///
/// let v = MaxLengthValidator::new(5);
/// assert!(v.validate(&Value::String("hi".into())).is_ok());
/// assert!(v.validate(&Value::String("toolong".into())).is_err());
/// ```
pub trait Validator: Send + Sync + fmt::Debug {
    /// Validates the given value.
    fn validate(&self, value: &Value) -> Result<(), ValidationError>;

    /// Returns a human-readable name for this validator.
    fn name(&self) -> &str;
}

/// Validates that a string value does not exceed a maximum length.
#[derive(Debug, Clone)]
pub struct MaxLengthValidator {
    /// The maximum allowed length in characters.
    pub max_length: usize,
}

impl MaxLengthValidator {
    /// Creates a new `MaxLengthValidator`.
    pub const fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Validator for MaxLengthValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if let Value::String(s) = value {
            let len = s.chars().count();
            if len > self.max_length {
                return Err(ValidationError::new(
                    format!(
                        "Ensure this value has at most {} characters (it has {len}).",
                        self.max_length
                    ),
                    "max_length",
                )
                .with_param("limit_value", self.max_length.to_string()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "MaxLengthValidator"
    }
}

/// Validates that a numeric value meets a minimum.
#[derive(Debug, Clone)]
pub struct MinValueValidator {
    /// The minimum allowed value.
    pub min_value: f64,
}

impl MinValueValidator {
    /// Creates a new `MinValueValidator`.
    pub const fn new(min_value: f64) -> Self {
        Self { min_value }
    }
}

impl Validator for MinValueValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let numeric = match value {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        };
        match numeric {
            Some(n) if n < self.min_value => Err(ValidationError::new(
                format!(
                    "Ensure this value is greater than or equal to {}.",
                    self.min_value
                ),
                "min_value",
            )),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "MinValueValidator"
    }
}

/// Validates that a value is one of the declared choices.
#[derive(Debug, Clone)]
pub struct ChoicesValidator {
    /// Allowed `(value, label)` pairs.
    pub choices: Vec<(Value, String)>,
}

impl ChoicesValidator {
    /// Creates a new `ChoicesValidator`.
    pub const fn new(choices: Vec<(Value, String)>) -> Self {
        Self { choices }
    }
}

impl Validator for ChoicesValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() || self.choices.iter().any(|(choice, _)| choice == value) {
            return Ok(());
        }
        Err(
            ValidationError::new(format!("Value '{value}' is not a valid choice."), "invalid_choice")
                .with_param("value", value.to_string()),
        )
    }

    fn name(&self) -> &str {
        "ChoicesValidator"
    }
}

/// The text formats checked by [`FormatValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// An email address.
    Email,
    /// An http(s) URL.
    Url,
    /// Letters, digits, underscores and hyphens.
    Slug,
    /// An IPv4 or IPv6 address.
    IpAddress,
}

/// Validates that a string matches a well-known text format.
#[derive(Debug, Clone, Copy)]
pub struct FormatValidator {
    /// The expected format.
    pub format: TextFormat,
}

impl FormatValidator {
    /// Creates a new `FormatValidator`.
    pub const fn new(format: TextFormat) -> Self {
        Self { format }
    }

    fn matches(self, s: &str) -> bool {
        static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
        static URL_RE: OnceLock<Regex> = OnceLock::new();
        static SLUG_RE: OnceLock<Regex> = OnceLock::new();

        match self.format {
            TextFormat::Email => EMAIL_RE
                .get_or_init(|| {
                    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap()
                })
                .is_match(s),
            TextFormat::Url => URL_RE
                .get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap())
                .is_match(s),
            TextFormat::Slug => SLUG_RE
                .get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap())
                .is_match(s),
            TextFormat::IpAddress => s.parse::<IpAddr>().is_ok(),
        }
    }
}

impl Validator for FormatValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let Value::String(s) = value else {
            return Ok(());
        };
        if self.matches(s) {
            return Ok(());
        }
        let (message, code) = match self.format {
            TextFormat::Email => ("Enter a valid email address.", "invalid"),
            TextFormat::Url => ("Enter a valid URL.", "invalid"),
            TextFormat::Slug => (
                "Enter a valid 'slug' consisting of letters, numbers, underscores or hyphens.",
                "invalid",
            ),
            TextFormat::IpAddress => ("Enter a valid IPv4 or IPv6 address.", "invalid"),
        };
        Err(ValidationError::new(message, code))
    }

    fn name(&self) -> &str {
        "FormatValidator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_length_counts_chars() {
        let v = MaxLengthValidator::new(3);
        assert!(v.validate(&Value::from("äöü")).is_ok());
        let err = v.validate(&Value::from("toolong")).unwrap_err();
        assert_eq!(err.code, "max_length");
        assert_eq!(err.params["limit_value"], "3");
    }

    #[test]
    fn test_max_length_ignores_non_strings() {
        assert!(MaxLengthValidator::new(1).validate(&Value::Int(12345)).is_ok());
    }

    #[test]
    fn test_min_value() {
        let v = MinValueValidator::new(0.0);
        assert!(v.validate(&Value::Int(0)).is_ok());
        assert!(v.validate(&Value::Int(-1)).is_err());
        assert!(v.validate(&Value::Float(-0.5)).is_err());
    }

    #[test]
    fn test_choices() {
        let v = ChoicesValidator::new(vec![
            (Value::from("a"), "A".to_string()),
            (Value::from("b"), "B".to_string()),
        ]);
        assert!(v.validate(&Value::from("a")).is_ok());
        assert!(v.validate(&Value::Null).is_ok());
        assert_eq!(v.validate(&Value::from("c")).unwrap_err().code, "invalid_choice");
    }

    #[test]
    fn test_formats() {
        let email = FormatValidator::new(TextFormat::Email);
        assert!(email.validate(&Value::from("a@example.com")).is_ok());
        assert!(email.validate(&Value::from("not-an-email")).is_err());

        let url = FormatValidator::new(TextFormat::Url);
        assert!(url.validate(&Value::from("https://example.com/x")).is_ok());
        assert!(url.validate(&Value::from("ftp:/nope")).is_err());

        let slug = FormatValidator::new(TextFormat::Slug);
        assert!(slug.validate(&Value::from("my-slug_1")).is_ok());
        assert!(slug.validate(&Value::from("no spaces")).is_err());

        let ip = FormatValidator::new(TextFormat::IpAddress);
        assert!(ip.validate(&Value::from("10.0.0.1")).is_ok());
        assert!(ip.validate(&Value::from("::1")).is_ok());
        assert!(ip.validate(&Value::from("999.1.1.1")).is_err());
    }
}
