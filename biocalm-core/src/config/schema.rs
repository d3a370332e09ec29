//! Session configuration schema
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Durations are written as human-readable strings (`"800ms"`, `"2s"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a guided session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Baseline capture
    pub baseline: BaselineConfig,
    /// Stressor games
    pub games: GamesConfig,
    /// Breathing block
    pub regulation: RegulationConfig,
    /// Stop confirmation watchdog
    pub stop: StopConfig,
    /// Questionnaire scale
    pub questionnaire: QuestionnaireConfig,
    /// Chart rendering
    pub chart: ChartConfig,
}

// ============================================================================
// Baseline
// ============================================================================

/// Baseline capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineConfig {
    /// Capture window used when the operator does not give one.
    pub default_duration_secs: u32,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: 10,
        }
    }
}

// ============================================================================
// Games
// ============================================================================

/// Settings shared by all stressor games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GamesConfig {
    /// Length of every game countdown.
    pub duration_secs: u32,
    /// Pause between "time's up" and the switch to regulation.
    #[serde(with = "duration")]
    pub time_up_delay: Duration,
    /// Arithmetic operand ranges
    pub arithmetic: ArithmeticConfig,
    /// Sequence playback timing
    pub sequence: SequenceConfig,
}

impl Default for GamesConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            time_up_delay: Duration::from_secs(2),
            arithmetic: ArithmeticConfig::default(),
            sequence: SequenceConfig::default(),
        }
    }
}

/// Operand ranges for arithmetic challenges (lower bound is always 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArithmeticConfig {
    /// Largest operand for addition and subtraction.
    pub max_operand: u32,
    /// Largest factor for multiplication.
    pub max_factor: u32,
}

impl Default for ArithmeticConfig {
    fn default() -> Self {
        Self {
            max_operand: 20,
            max_factor: 12,
        }
    }
}

/// Playback timing for the sequence-recall game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SequenceConfig {
    /// Interval between highlighted colours.
    #[serde(with = "duration")]
    pub step: Duration,
    /// How long each colour stays lit.
    #[serde(with = "duration")]
    pub highlight: Duration,
    /// Pause before the next round after a full correct replay.
    #[serde(with = "duration")]
    pub success_delay: Duration,
    /// Pause before the restart round after a wrong press.
    #[serde(with = "duration")]
    pub failure_delay: Duration,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(800),
            highlight: Duration::from_millis(400),
            success_delay: Duration::from_secs(1),
            failure_delay: Duration::from_millis(1500),
        }
    }
}

// ============================================================================
// Regulation
// ============================================================================

/// Breathing block settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegulationConfig {
    /// Auto-stop countdown armed when regulation begins.
    pub auto_stop_secs: u32,
    /// Prompt cycle, repeated until the phase ends.
    pub prompts: Vec<BreathingPromptConfig>,
}

impl Default for RegulationConfig {
    fn default() -> Self {
        Self {
            auto_stop_secs: 60,
            prompts: vec![
                BreathingPromptConfig {
                    stage: BreathingStage::Inhale,
                    text: "Inhala profundamente...".to_string(),
                    duration: Duration::from_secs(4),
                    scale: 1.5,
                },
                BreathingPromptConfig {
                    stage: BreathingStage::Hold,
                    text: "Mantén el aire...".to_string(),
                    duration: Duration::from_secs(7),
                    scale: 1.5,
                },
                BreathingPromptConfig {
                    stage: BreathingStage::Exhale,
                    text: "Exhala lentamente...".to_string(),
                    duration: Duration::from_secs(8),
                    scale: 1.0,
                },
            ],
        }
    }
}

/// Part of the breathing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathingStage {
    /// Breathe in
    Inhale,
    /// Hold
    Hold,
    /// Breathe out
    Exhale,
}

/// One timed breathing prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreathingPromptConfig {
    /// Cycle stage.
    pub stage: BreathingStage,
    /// Text shown to the participant.
    pub text: String,
    /// How long the prompt stays up.
    #[serde(with = "duration")]
    pub duration: Duration,
    /// Target scale of the breathing circle.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

const fn default_scale() -> f64 {
    1.0
}

// ============================================================================
// Stop Watchdog
// ============================================================================

/// How long to wait for `session_stopped`, and how often to ask again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StopConfig {
    /// Wait per attempt.
    #[serde(with = "duration")]
    pub confirm_timeout: Duration,
    /// Re-sends before giving up and stopping locally.
    pub max_retries: u32,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

// ============================================================================
// Questionnaire
// ============================================================================

/// Questionnaire answer scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuestionnaireConfig {
    /// Largest score a single item accepts (smallest is 0).
    pub max_item_score: u8,
}

impl Default for QuestionnaireConfig {
    fn default() -> Self {
        Self { max_item_score: 4 }
    }
}

// ============================================================================
// Charts
// ============================================================================

/// Chart pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    /// Seconds between consecutive samples, used for x-axis labels.
    pub sample_interval_secs: f64,
    /// Half-width of the ECG normal band around baseline.
    pub ecg_band: f64,
    /// Half-height of the ECG y-axis around baseline.
    pub ecg_axis_margin: f64,
    /// Half-width of the temperature normal band around baseline.
    pub temperature_band: f64,
    /// Temperature y-axis extent around baseline.
    pub temperature_axis: AxisOffsets,
    /// Absolute heart-rate zones, lowest first.
    pub bpm_zones: Vec<ZoneConfig>,
    /// Heart-rate y-axis.
    pub bpm_axis: AxisRange,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 0.1,
            ecg_band: 0.05,
            ecg_axis_margin: 0.15,
            temperature_band: 0.3,
            temperature_axis: AxisOffsets {
                below: 1.0,
                above: 1.5,
            },
            bpm_zones: vec![
                ZoneConfig {
                    label: "Zona Normal (60-80)".to_string(),
                    lower: 60.0,
                    upper: 80.0,
                    level: ZoneLevel::Normal,
                },
                ZoneConfig {
                    label: "Zona Moderada (80-100)".to_string(),
                    lower: 80.0,
                    upper: 100.0,
                    level: ZoneLevel::Moderate,
                },
                ZoneConfig {
                    label: "Zona Alta (100+)".to_string(),
                    lower: 100.0,
                    upper: 120.0,
                    level: ZoneLevel::High,
                },
            ],
            bpm_axis: AxisRange {
                min: 50.0,
                max: 120.0,
            },
        }
    }
}

/// Axis extent relative to a baseline value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisOffsets {
    /// Distance below baseline.
    pub below: f64,
    /// Distance above baseline.
    pub above: f64,
}

/// Absolute axis extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

/// A shaded band on a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneConfig {
    /// Legend text.
    pub label: String,
    /// Lower edge.
    pub lower: f64,
    /// Upper edge.
    pub upper: f64,
    /// Severity used to pick the fill.
    pub level: ZoneLevel,
}

/// Zone severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneLevel {
    /// Expected range.
    Normal,
    /// Raised.
    Moderate,
    /// Well above normal.
    High,
}

impl ZoneLevel {
    /// RGBA fill colour for the band.
    #[must_use]
    pub const fn fill(self) -> &'static str {
        match self {
            Self::Normal => "rgba(76, 175, 80, 0.2)",
            Self::Moderate => "rgba(255, 193, 7, 0.15)",
            Self::High => "rgba(244, 67, 54, 0.1)",
        }
    }
}

// ============================================================================
// Duration (de)serialisation
// ============================================================================

/// Serde adapter for `humantime` duration strings.
pub mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Writes a duration as e.g. `"1s 500ms"`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    /// Reads a duration such as `"800ms"` or `"2s"`.
    ///
    /// # Errors
    ///
    /// Returns an error when the string is not a valid duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
    }
}
