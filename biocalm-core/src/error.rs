//! Core error types for `biocalm`
//!
//! Configuration and validation error types shared across the workspace.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exceeds the loader's size limit
    #[error("{path} is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Path to the configuration file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Maximum accepted size in bytes
        limit: u64,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },

    /// One or more configuration files failed validation.
    #[error("{count} file(s) failed validation")]
    ValidationFailed {
        /// Number of files that failed validation.
        count: usize,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "games.sequence.highlight")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "games.sequence.highlight".to_string(),
            message: "highlight must be shorter than step".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: highlight must be shorter than step at games.sequence.highlight"
        );
    }

    #[test]
    fn test_validation_issue_warning_display() {
        let issue = ValidationIssue {
            path: "stop.max_retries".to_string(),
            message: "no retries configured".to_string(),
            severity: Severity::Warning,
        };
        assert_eq!(
            issue.to_string(),
            "warning: no retries configured at stop.max_retries"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("session.yaml"),
            line: Some(12),
            message: "unexpected token".to_string(),
        };
        assert!(err.to_string().contains("session.yaml"));
        assert!(err.to_string().contains("line 12"));
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_config_error_env_var_display() {
        let err = ConfigError::EnvVarNotSet {
            var: "BIOCALM_BASELINE".to_string(),
            location: "line 3".to_string(),
        };
        assert!(err.to_string().contains("BIOCALM_BASELINE"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_too_large_display() {
        let err = ConfigError::TooLarge {
            path: PathBuf::from("big.yaml"),
            size: 2_000_000,
            limit: 1_048_576,
        };
        assert_eq!(err.to_string(), "big.yaml is 2000000 bytes, limit is 1048576");
    }
}
