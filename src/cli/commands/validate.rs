//! `validate`: check configuration files without running a session.

use std::path::Path;

use biocalm_core::error::ConfigError;
use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::BiocalmError;

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    let file = path.display().to_string();
    match loader.load(path) {
        Ok(loaded) => {
            let warnings: Vec<String> = loaded
                .warnings
                .iter()
                .map(|w| match &w.location {
                    Some(loc) => format!("{} at {loc}", w.message),
                    None => w.message.clone(),
                })
                .collect();
            FileReport {
                file,
                valid: !(strict && !warnings.is_empty()),
                errors: Vec::new(),
                warnings,
            }
        }
        Err(ConfigError::ValidationError { errors, .. }) => FileReport {
            file,
            valid: false,
            errors: errors.iter().map(ToString::to_string).collect(),
            warnings: Vec::new(),
        },
        Err(e) => FileReport {
            file,
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    }
}

/// Validates every file and reports each one.
///
/// # Errors
///
/// Returns `ConfigError::ValidationFailed` with the number of files that
/// did not pass. With `--strict`, warnings fail a file too.
pub fn run(args: &ValidateArgs) -> Result<(), BiocalmError> {
    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| {
            tracing::info!(file = %path.display(), "validating configuration");
            check(&loader, path, args.strict)
        })
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                let verdict = if report.valid { "ok" } else { "FAILED" };
                println!("{}: {verdict}", report.file);
                for e in &report.errors {
                    println!("  {e}");
                }
                for w in &report.warnings {
                    println!("  warning: {w}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        return Err(ConfigError::ValidationFailed { count: failed }.into());
    }
    Ok(())
}
