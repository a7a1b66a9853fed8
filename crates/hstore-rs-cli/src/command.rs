//! Management command framework for hstore-rs.
//!
//! [`ManagementCommand`] defines a CLI command; [`CommandRegistry`] collects
//! commands, builds the clap interface and dispatches parsed arguments.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use hstore_rs_cli::command::ManagementCommand;
//! use hstore_rs_core::{HStoreError, Settings};
//!
//! struct GreetCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for GreetCommand {
//!     fn name(&self) -> &str { "greet" }
//!     fn help(&self) -> &str { "Say hello" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         _settings: &Settings,
//!     ) -> Result<(), HStoreError> {
//!         println!("Hello from hstore-rs!");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use hstore_rs_core::{HStoreError, Settings};

/// A management command that can be registered and invoked through the CLI.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command. The default adds none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), HStoreError>;
}

/// A registry of management commands, keyed by name.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Box<dyn ManagementCommand>>,
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns the registered command names in order.
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds a top-level clap `Command` with one subcommand per registered
    /// command.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("hstore-rs")
            .about("hstore-rs management utility")
            .subcommand_required(true);

        for (name, cmd) in &self.commands {
            // clap wants `&'static str` names; commands are registered once
            // at startup so the leak is bounded.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Dispatches parsed arguments to the selected command.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), HStoreError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            HStoreError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self.get(name).ok_or_else(|| {
            HStoreError::ConfigurationError(format!("Unknown command: {name}"))
        })?;

        tracing::debug!(command = name, "running management command");
        cmd.handle(sub_matches, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoCommand;

    #[async_trait]
    impl ManagementCommand for EchoCommand {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn help(&self) -> &'static str {
            "Echo a word"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(clap::Arg::new("word").required(true))
        }

        async fn handle(
            &self,
            matches: &clap::ArgMatches,
            _settings: &Settings,
        ) -> Result<(), HStoreError> {
            match matches.get_one::<String>("word").map(String::as_str) {
                Some("fail") => Err(HStoreError::ConfigurationError("deliberate".to_string())),
                _ => Ok(()),
            }
        }
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(EchoCommand));
        registry
    }

    #[test]
    fn test_register_and_list() {
        let registry = registry();
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.list_commands(), vec!["echo"]);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = registry();
        registry.register(Box::new(EchoCommand));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_build_cli_requires_subcommand() {
        let cli = registry().build_cli();
        assert!(cli.clone().try_get_matches_from(["hstore-rs"]).is_err());
        assert!(cli.try_get_matches_from(["hstore-rs", "echo", "hi"]).is_ok());
    }

    #[tokio::test]
    async fn test_execute_dispatches() {
        let registry = registry();
        let settings = Settings::default();

        let matches = registry
            .build_cli()
            .try_get_matches_from(["hstore-rs", "echo", "hi"])
            .unwrap();
        assert!(registry.execute(&matches, &settings).await.is_ok());

        let matches = registry
            .build_cli()
            .try_get_matches_from(["hstore-rs", "echo", "fail"])
            .unwrap();
        assert!(registry.execute(&matches, &settings).await.is_err());
    }
}
