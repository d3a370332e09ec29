//! Configuration validation.
//!
//! Runs on the deserialized [`SessionConfig`] and collects every problem
//! instead of stopping at the first one.

use std::time::Duration;

use biocalm_core::config::SessionConfig;
use biocalm_core::error::{Severity, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Outcome of a validation run.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that prevent loading.
    pub errors: Vec<ValidationIssue>,
    /// Suspicious but usable settings.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Whether any error was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the configuration can be used.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Semantic checks over a session configuration.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config`.
    pub fn validate(&mut self, config: &SessionConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_timings(config);
        self.validate_sequence(config);
        self.validate_prompts(config);
        self.validate_stop(config);
        self.validate_chart(config);

        if config.questionnaire.max_item_score == 0 {
            self.add_error(
                "questionnaire.max_item_score",
                "max_item_score must be positive",
            );
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_timings(&mut self, config: &SessionConfig) {
        if config.baseline.default_duration_secs == 0 {
            self.add_error(
                "baseline.default_duration_secs",
                "baseline duration must be positive",
            );
        }
        if config.games.duration_secs == 0 {
            self.add_error("games.duration_secs", "game duration must be positive");
        }
        if config.regulation.auto_stop_secs == 0 {
            self.add_error(
                "regulation.auto_stop_secs",
                "auto-stop countdown must be positive",
            );
        }
        if config.games.arithmetic.max_operand == 0 {
            self.add_error("games.arithmetic.max_operand", "max_operand must be positive");
        }
        if config.games.arithmetic.max_factor == 0 {
            self.add_error("games.arithmetic.max_factor", "max_factor must be positive");
        }
    }

    fn validate_sequence(&mut self, config: &SessionConfig) {
        let seq = &config.games.sequence;
        self.require_positive("games.sequence.step", seq.step);
        self.require_positive("games.sequence.highlight", seq.highlight);
        if seq.highlight >= seq.step && !seq.step.is_zero() {
            self.add_error(
                "games.sequence.highlight",
                "highlight must be shorter than step",
            );
        }
        if seq.failure_delay.is_zero() {
            self.add_warning(
                "games.sequence.failure_delay",
                "a zero failure delay restarts the round before the mistake is visible",
            );
        }
    }

    fn validate_prompts(&mut self, config: &SessionConfig) {
        let prompts = &config.regulation.prompts;
        if prompts.is_empty() {
            self.add_error("regulation.prompts", "at least one breathing prompt is required");
            return;
        }
        for (i, prompt) in prompts.iter().enumerate() {
            let path = format!("regulation.prompts[{i}]");
            self.require_positive(&format!("{path}.duration"), prompt.duration);
            if prompt.text.trim().is_empty() {
                self.add_warning(&format!("{path}.text"), "prompt text is empty");
            }
            if !(prompt.scale.is_finite() && prompt.scale > 0.0) {
                self.add_error(&format!("{path}.scale"), "scale must be a positive number");
            }
        }
    }

    fn validate_stop(&mut self, config: &SessionConfig) {
        self.require_positive("stop.confirm_timeout", config.stop.confirm_timeout);
        if config.stop.max_retries == 0 {
            self.add_warning(
                "stop.max_retries",
                "without retries the session stops locally after the first timeout",
            );
        }
    }

    fn validate_chart(&mut self, config: &SessionConfig) {
        let chart = &config.chart;
        if !(chart.sample_interval_secs.is_finite() && chart.sample_interval_secs > 0.0) {
            self.add_error(
                "chart.sample_interval_secs",
                "sample interval must be a positive number",
            );
        }
        for (path, value) in [
            ("chart.ecg_band", chart.ecg_band),
            ("chart.ecg_axis_margin", chart.ecg_axis_margin),
            ("chart.temperature_band", chart.temperature_band),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                self.add_error(path, "must be a non-negative number");
            }
        }
        if chart.bpm_axis.min >= chart.bpm_axis.max {
            self.add_error("chart.bpm_axis", "min must be below max");
        }

        for (i, zone) in chart.bpm_zones.iter().enumerate() {
            if zone.lower >= zone.upper {
                self.add_error(
                    &format!("chart.bpm_zones[{i}]"),
                    "lower bound must be below upper bound",
                );
            }
        }
        for (i, pair) in chart.bpm_zones.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.lower < prev.upper {
                self.add_error(
                    &format!("chart.bpm_zones[{}]", i + 1),
                    "zones must be ordered and must not overlap",
                );
            } else if next.lower > prev.upper {
                self.add_warning(
                    &format!("chart.bpm_zones[{}]", i + 1),
                    "gap between consecutive zones",
                );
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require_positive(&mut self, path: &str, value: Duration) {
        if value.is_zero() {
            self.add_error(path, "duration must be positive");
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
