//! Settings for hstore-rs.
//!
//! This module provides the [`Settings`] struct, which holds the workspace
//! configuration, and [`LazySettings`], a globally-accessible,
//! lazily-initialized settings instance.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Scope in which the hstore type adapter is registered on new connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterRegistration {
    /// Register once for every connection in the process.
    #[default]
    Global,
    /// Register individually on each connection.
    Connection,
}

impl AdapterRegistration {
    /// Parses the textual form used in settings files and environment variables.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "global" => Some(Self::Global),
            "connection" => Some(Self::Connection),
            _ => None,
        }
    }

    /// Returns `true` for [`AdapterRegistration::Global`].
    pub const fn is_global(self) -> bool {
        matches!(self, Self::Global)
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// The database engine (e.g. `hstore_rs.db.backends.postgresql`).
    pub engine: String,
    /// The database name. `None` until the connection target is known.
    pub name: Option<String>,
    /// The database user.
    pub user: String,
    /// The database password.
    pub password: String,
    /// The database host.
    pub host: String,
    /// The database port.
    pub port: u16,
    /// Whether the hstore extension is installed on this database.
    pub has_hstore: bool,
    /// Default tablespace for indexes created on this database.
    pub tablespace: Option<String>,
    /// Additional engine-specific options.
    pub options: HashMap<String, String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "hstore_rs.db.backends.postgresql".to_string(),
            name: None,
            user: String::new(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            has_hstore: true,
            tablespace: None,
            options: HashMap::new(),
        }
    }
}

impl DatabaseSettings {
    /// Returns `true` when the engine targets PostgreSQL.
    pub fn is_postgresql(&self) -> bool {
        self.engine.contains("postgres")
    }
}

/// The complete set of settings.
///
/// Use [`SETTINGS`] to access the global instance.
///
/// # Examples
///
/// ```
/// use hstore_rs_core::settings::{AdapterRegistration, Settings};
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.adapter_registration, AdapterRegistration::Global);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The tracing filter directive (e.g. "info", "hstore_rs_db=debug").
    pub log_level: String,
    /// How the hstore adapter is registered on new connections.
    pub adapter_registration: AdapterRegistration,
    /// Database configurations, keyed by alias (e.g. "default").
    pub databases: HashMap<String, DatabaseSettings>,
    /// Arbitrary extra settings, accessible by key.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert("default".to_string(), DatabaseSettings::default());

        Self {
            debug: true,
            log_level: "info".to_string(),
            adapter_registration: AdapterRegistration::Global,
            databases,
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns the settings for a database alias.
    pub fn database(&self, alias: &str) -> Option<&DatabaseSettings> {
        self.databases.get(alias)
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns the configured settings, if any.
    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();
