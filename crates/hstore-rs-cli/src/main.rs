//! The stock `hstore-rs` management binary.
//!
//! It registers no models, so `sqlhstoreindexes` emits an empty
//! transaction. Applications build their own binary and pass their
//! models to [`hstore_rs_cli::app::run`].

use std::process::ExitCode;

use hstore_rs_db::model::ModelRegistry;

#[tokio::main]
async fn main() -> ExitCode {
    hstore_rs_cli::app::run(&ModelRegistry::new()).await
}
