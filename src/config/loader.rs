//! Configuration loader.
//!
//! Pipeline:
//! 1. Size limit
//! 2. Environment variable expansion on the raw text
//! 3. YAML parsing
//! 4. Deserialization to [`SessionConfig`]
//! 5. Validation
//! 6. Freeze with `Arc`

use std::path::Path;
use std::sync::Arc;

use biocalm_core::config::SessionConfig;
use biocalm_core::error::ConfigError;

use crate::config::validation::Validator;

// ============================================================================
// Public API
// ============================================================================

/// Limits applied before a file is parsed.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: u64,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("BIOCALM_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// A loaded configuration and what the loader noticed along the way.
#[derive(Debug)]
pub struct LoadResult {
    /// Validated, frozen configuration.
    pub config: Arc<SessionConfig>,
    /// Non-fatal findings.
    pub warnings: Vec<LoadWarning>,
}

/// Non-fatal finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// What was found.
    pub message: String,
    /// Where, when known.
    pub location: Option<String>,
}

/// Reads session configuration files.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Loader with explicit limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Loader with the default limits.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads, validates and freezes the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or too large, a required
    /// environment variable is unset, the YAML does not match the schema, or
    /// validation reports errors.
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        if metadata.len() > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: self.limits.max_config_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_str(&raw, path)
    }

    /// Runs the pipeline on already-read text. `origin` is used in messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file checks.
    pub fn load_str(&self, raw: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        if raw.len() as u64 > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                path: origin.to_path_buf(),
                size: raw.len() as u64,
                limit: self.limits.max_config_size,
            });
        }

        let mut env_sub = EnvSubstitution::new();
        let substituted = env_sub.substitute(raw, origin)?;
        let mut warnings = env_sub.warnings;

        // An empty file (or one holding only comments) means "all defaults".
        let root: serde_yaml::Value =
            serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;
        let config: SessionConfig = if root.is_null() {
            SessionConfig::default()
        } else {
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

// ============================================================================
// Environment substitution
// ============================================================================

/// `${VAR}`, `${VAR:-default}`, `${VAR:?message}` and `$$`.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

enum Fallback {
    None,
    Default(String),
    Required(String),
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    fn substitute(&mut self, raw: &str, origin: &Path) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    out.push('$');
                }
                Some('{') => {
                    chars.next();
                    let (name, fallback) = Self::parse_reference(&mut chars, origin)?;
                    match (std::env::var(&name), fallback) {
                        (Ok(value), _) => out.push_str(&value),
                        (Err(_), Fallback::Default(default)) => out.push_str(&default),
                        (Err(_), Fallback::Required(message)) => {
                            return Err(ConfigError::EnvVarNotSet {
                                var: name,
                                location: if message.is_empty() {
                                    origin.display().to_string()
                                } else {
                                    message
                                },
                            });
                        }
                        (Err(_), Fallback::None) => self.warnings.push(LoadWarning {
                            message: format!(
                                "environment variable '{name}' is not set, using empty string"
                            ),
                            location: Some(origin.display().to_string()),
                        }),
                    }
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    fn parse_reference(
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        origin: &Path,
    ) -> Result<(String, Fallback), ConfigError> {
        let mut name = String::new();
        while let Some(c) = chars.next() {
            match c {
                '}' => return Ok((name, Fallback::None)),
                ':' if chars.peek() == Some(&'-') => {
                    chars.next();
                    let rest = Self::read_until_close(chars, origin, &name)?;
                    return Ok((name, Fallback::Default(rest)));
                }
                ':' if chars.peek() == Some(&'?') => {
                    chars.next();
                    let rest = Self::read_until_close(chars, origin, &name)?;
                    return Ok((name, Fallback::Required(rest)));
                }
                _ => name.push(c),
            }
        }
        Err(unclosed(origin, &name))
    }

    fn read_until_close(
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        origin: &Path,
        name: &str,
    ) -> Result<String, ConfigError> {
        let mut value = String::new();
        let mut depth = 1;
        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(value);
                    }
                }
                _ => {}
            }
            value.push(c);
        }
        Err(unclosed(origin, name))
    }
}

fn unclosed(origin: &Path, name: &str) -> ConfigError {
    ConfigError::ParseError {
        path: origin.to_path_buf(),
        line: None,
        message: format!("unclosed environment variable reference: ${{{name}"),
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================
