//! CLI command dispatch and handlers.
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod chart;
pub mod completions;
pub mod run;
pub mod validate;
pub mod version;

use std::path::Path;
use std::sync::Arc;

use biocalm_core::config::SessionConfig;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::config::ConfigLoader;
use crate::error::BiocalmError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), BiocalmError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Chart(args) => chart::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads `path`, or the defaults when no file is given. Warnings are logged.
fn load_config(path: Option<&Path>) -> Result<Arc<SessionConfig>, BiocalmError> {
    let Some(path) = path else {
        tracing::debug!("no configuration file, using defaults");
        return Ok(Arc::new(SessionConfig::default()));
    };
    tracing::info!(config = %path.display(), "loading configuration");
    let loaded = ConfigLoader::with_defaults().load(path)?;
    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(loaded.config)
}
