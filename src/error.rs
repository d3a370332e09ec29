//! Error types for `biocalm`
//!
//! Session-level failures follow three recoverable classes: validation,
//! protocol and data-unavailable. None of them ends the session; the
//! orchestrator stays in its current phase and reports. Process-level
//! failures map to exit codes through [`BiocalmError::exit_code`].

use thiserror::Error;

pub use biocalm_core::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `biocalm` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Service link error (connection failed, framing error)
    pub const LINK_ERROR: i32 = 4;

    /// Session error surfaced outside the interactive loop
    pub const SESSION_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `biocalm` operations.
#[derive(Debug, Error)]
pub enum BiocalmError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Service link error
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Session orchestration error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Bad command-line usage not caught by the argument parser
    #[error("usage error: {0}")]
    Usage(String),
}

impl BiocalmError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Link(_) => ExitCode::LINK_ERROR,
            Self::Session(_) => ExitCode::SESSION_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
        }
    }
}

// ============================================================================
// Session Errors
// ============================================================================

/// Error class, used for reporting and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Missing or invalid operator input
    Validation,
    /// The service declined or never answered
    Protocol,
    /// Charts requested without samples
    DataUnavailable,
}

impl ErrorClass {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Protocol => "protocol",
            Self::DataUnavailable => "data_unavailable",
        }
    }
}

/// Recoverable session failure. The phase is never changed by an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Operator input was missing or invalid
    #[error("{message}")]
    Validation {
        /// What to fix
        message: String,
    },

    /// The service reported a failure or replied unexpectedly
    #[error("service error: {message}")]
    Protocol {
        /// Service-provided or synthesised reason
        message: String,
    },

    /// Chart rendering had no samples to work with
    #[error("no data to chart: {reason}")]
    DataUnavailable {
        /// Why the series is missing
        reason: String,
    },

    /// Operation not allowed in the current phase
    #[error("cannot {operation} during {phase}")]
    OutOfPhase {
        /// The rejected operation
        operation: &'static str,
        /// Phase at the time of the call
        phase: String,
    },
}

impl SessionError {
    /// Validation error with `message`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Protocol error with `message`.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Data-unavailable error with `reason`.
    pub fn data_unavailable(reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            reason: reason.into(),
        }
    }

    /// The reporting class. Out-of-phase calls count as validation errors.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation { .. } | Self::OutOfPhase { .. } => ErrorClass::Validation,
            Self::Protocol { .. } => ErrorClass::Protocol,
            Self::DataUnavailable { .. } => ErrorClass::DataUnavailable,
        }
    }
}

// ============================================================================
// Link Errors
// ============================================================================

/// Errors talking to the acquisition service.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error on the underlying stream
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Could not connect
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The service closed the link
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Line exceeds the size limit
    #[error("message too large: {size} bytes (limit: {limit})")]
    MessageTooLarge {
        /// Actual message size in bytes
        size: usize,
        /// Configured size limit in bytes
        limit: usize,
    },

    /// Unsupported `--link` value
    #[error("invalid link spec '{0}': expected 'demo' or 'tcp://HOST:PORT'")]
    InvalidSpec(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `biocalm` operations.
pub type Result<T> = std::result::Result<T, BiocalmError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::LINK_ERROR, 4);
        assert_eq!(ExitCode::SESSION_ERROR, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_error_exit_code_mapping() {
        let err: BiocalmError = ConfigError::MissingFile {
            path: "session.yaml".into(),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);

        let err: BiocalmError = LinkError::ConnectionFailed("refused".into()).into();
        assert_eq!(err.exit_code(), ExitCode::LINK_ERROR);

        let err: BiocalmError = SessionError::protocol("declined").into();
        assert_eq!(err.exit_code(), ExitCode::SESSION_ERROR);

        let err: BiocalmError = std::io::Error::other("boom").into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_session_error_classes() {
        assert_eq!(
            SessionError::validation("pick a sex").class(),
            ErrorClass::Validation
        );
        assert_eq!(
            SessionError::OutOfPhase {
                operation: "stop",
                phase: "idle".into()
            }
            .class(),
            ErrorClass::Validation
        );
        assert_eq!(
            SessionError::protocol("x").class(),
            ErrorClass::Protocol
        );
        assert_eq!(
            SessionError::data_unavailable("empty").class(),
            ErrorClass::DataUnavailable
        );
    }

    #[test]
    fn test_out_of_phase_display() {
        let err = SessionError::OutOfPhase {
            operation: "select a game",
            phase: "baseline".into(),
        };
        assert_eq!(err.to_string(), "cannot select a game during baseline");
    }

    #[test]
    fn test_link_error_display() {
        let err = LinkError::MessageTooLarge {
            size: 2_000_000,
            limit: 1_000_000,
        };
        assert!(err.to_string().contains("2000000"));
        assert!(err.to_string().contains("1000000"));
    }
}
