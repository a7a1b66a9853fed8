//! Entry points for management binaries.
//!
//! The stock `hstore-rs` binary knows no models, so `sqlhstoreindexes`
//! prints an empty transaction there. An application builds its own
//! binary around its [`ModelRegistry`]:
//!
//! ```rust,no_run
//! use hstore_rs_db::model::ModelRegistry;
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let models = ModelRegistry::new();
//!     // models.register(&MY_MODEL_META);
//!     hstore_rs_cli::app::run(&models).await
//! }
//! ```

use std::ffi::OsString;
use std::process::ExitCode;

use hstore_rs_core::logging::setup_logging;
use hstore_rs_core::settings_loader;
use hstore_rs_core::{HStoreError, Settings};
use hstore_rs_db::model::ModelRegistry;

use crate::command::CommandRegistry;
use crate::commands::register_builtin_commands;

/// Builds the command registry for `models`.
pub fn command_registry(models: &ModelRegistry) -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry, models);
    registry
}

/// Runs the management CLI for `models` on the process arguments.
///
/// Settings come from the TOML (or `.json`) file named by
/// `HSTORE_SETTINGS` when set, otherwise from defaults. `HSTORE_*`
/// environment variables override either.
pub async fn run(models: &ModelRegistry) -> ExitCode {
    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&settings);

    let registry = command_registry(models);
    let matches = registry.build_cli().get_matches();
    match registry.execute(&matches, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Parses `args` and runs the selected command against `models`.
///
/// # Errors
///
/// Returns [`HStoreError::ConfigurationError`] when the arguments do not
/// parse, or the command's own error.
pub async fn run_from<I, T>(
    models: &ModelRegistry,
    settings: &Settings,
    args: I,
) -> Result<(), HStoreError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let registry = command_registry(models);
    let matches = registry
        .build_cli()
        .try_get_matches_from(args)
        .map_err(|e| HStoreError::ConfigurationError(e.to_string()))?;
    registry.execute(&matches, settings).await
}

/// Loads settings from `HSTORE_SETTINGS` and the environment.
///
/// # Errors
///
/// Returns an error when the settings file cannot be read or parsed.
pub fn load_settings() -> Result<Settings, HStoreError> {
    let Ok(path) = std::env::var("HSTORE_SETTINGS") else {
        return Ok(settings_loader::from_env());
    };
    if path.ends_with(".json") {
        let mut settings = settings_loader::from_json_file(&path)?;
        settings_loader::apply_env_overrides(&mut settings);
        Ok(settings)
    } else {
        settings_loader::from_toml_file_with_env(&path)
    }
}
