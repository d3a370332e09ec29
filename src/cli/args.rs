//! CLI argument definitions.
//!
//! All Clap derive structs for `biocalm` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::link::LinkSpec;

// ============================================================================
// Root CLI
// ============================================================================

/// Guided biofeedback session orchestrator.
#[derive(Parser, Debug)]
#[command(name = "biocalm", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "BIOCALM_COLOR")]
    pub color: ColorChoice,

    /// Log line format.
    #[arg(long, default_value = "human", global = true, env = "BIOCALM_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a session, reading operator commands from stdin.
    Run(RunArgs),

    /// Chart a saved sample series.
    Chart(ChartArgs),

    /// Validate session configuration files.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Session configuration file (defaults apply when omitted).
    #[arg(short, long, env = "BIOCALM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Acquisition service: `demo` or `tcp://HOST:PORT`.
    #[arg(long, default_value = "demo", env = "BIOCALM_LINK")]
    pub link: LinkSpec,

    /// Where view events go as JSON lines (`-` for stdout).
    #[arg(long, default_value = "-", env = "BIOCALM_EVENTS")]
    pub events: PathBuf,

    /// Write rendered charts to this JSON file.
    #[arg(long, env = "BIOCALM_CHARTS")]
    pub charts: Option<PathBuf>,

    /// Serve `GET /api/status` on `[host:]port`.
    #[arg(long, env = "BIOCALM_STATUS")]
    pub status: Option<String>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "BIOCALM_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Seed for games and the demo service.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for `chart`.
#[derive(Args, Debug)]
pub struct ChartArgs {
    /// JSON file holding a sample array or a `session_stopped` payload.
    pub samples: PathBuf,

    /// Session configuration file (chart settings).
    #[arg(short, long, env = "BIOCALM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write the chart descriptors to this file.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
