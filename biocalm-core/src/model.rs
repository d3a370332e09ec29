//! Session data model
//!
//! Plain value types shared by the orchestrator, the results renderer and
//! the wire protocol. Nothing in here performs I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ============================================================================
// Session Phase
// ============================================================================

/// Mini-game variants hosted by the activation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Mental arithmetic under time pressure.
    #[serde(alias = "math")]
    #[cfg_attr(feature = "clap", value(alias = "math"))]
    Arithmetic,
    /// Colour-word interference task.
    Stroop,
    /// Simon-style colour sequence memory.
    #[serde(alias = "memory")]
    #[cfg_attr(feature = "clap", value(alias = "memory"))]
    SequenceRecall,
}

impl GameKind {
    /// All variants, in menu order.
    pub const ALL: [Self; 3] = [Self::Arithmetic, Self::Stroop, Self::SequenceRecall];

    /// Stable snake-case name used in logs, metrics and the wire protocol.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arithmetic => "arithmetic",
            Self::Stroop => "stroop",
            Self::SequenceRecall => "sequence_recall",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameKind {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arithmetic" | "math" => Ok(Self::Arithmetic),
            "stroop" => Ok(Self::Stroop),
            "sequence_recall" | "sequence-recall" | "sequence" | "memory" => {
                Ok(Self::SequenceRecall)
            }
            other => Err(ParseValueError::new("game", other)),
        }
    }
}

/// The stage of the guided session.
///
/// Exactly one phase is current at any time. The orchestrator is the only
/// component that changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(tag = "phase", content = "game", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Nothing armed yet.
    #[default]
    Idle,
    /// Acquisition armed; waiting for age and sex.
    AwaitingDemographics,
    /// Waiting for the pre-session questionnaire.
    AwaitingQuestionnaire,
    /// Resting baseline capture in progress (or finished, awaiting operator).
    Baseline,
    /// Baseline done; choosing the first stressor game.
    PhaseSelection,
    /// A stressor game is running.
    Activation {
        /// The game currently hosted.
        game: GameKind,
    },
    /// Paced breathing block.
    Regulation,
    /// Session ended; results available.
    Stopped,
    /// Post-session questionnaire submitted, awaiting acknowledgement.
    PostQuestionnaire,
    /// Final results view.
    Analysis,
}

impl SessionPhase {
    /// Short label without game detail, used for metrics and status output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingDemographics => "awaiting_demographics",
            Self::AwaitingQuestionnaire => "awaiting_questionnaire",
            Self::Baseline => "baseline",
            Self::PhaseSelection => "phase_selection",
            Self::Activation { .. } => "activation",
            Self::Regulation => "regulation",
            Self::Stopped => "stopped",
            Self::PostQuestionnaire => "post_questionnaire",
            Self::Analysis => "analysis",
        }
    }

    /// The hosted game, when in activation.
    #[must_use]
    pub const fn game(self) -> Option<GameKind> {
        match self {
            Self::Activation { game } => Some(game),
            _ => None,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activation { game } => write!(f, "activation({game})"),
            other => f.write_str(other.name()),
        }
    }
}

// ============================================================================
// Participant
// ============================================================================

/// Self-reported sex of the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Male.
    #[serde(alias = "masculino")]
    Male,
    /// Female.
    #[serde(alias = "femenino")]
    Female,
    /// Other, or prefers not to say.
    #[serde(alias = "otro", alias = "no_especifica")]
    Other,
}

impl FromStr for Sex {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "masculino" => Ok(Self::Male),
            "female" | "f" | "femenino" => Ok(Self::Female),
            "other" | "otro" | "no_especifica" | "unspecified" => Ok(Self::Other),
            other => Err(ParseValueError::new("sex", other)),
        }
    }
}

/// Participant demographics, captured once before the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    /// Age in years (positive).
    #[serde(alias = "edad")]
    pub age: u16,
    /// Self-reported sex.
    #[serde(alias = "sexo")]
    pub sex: Sex,
}

// ============================================================================
// Questionnaire
// ============================================================================

/// Number of items in the anxiety questionnaire.
pub const QUESTIONNAIRE_ITEMS: u8 = 7;

/// Items summed into the psychic subscore.
pub const PSYCHIC_ITEMS: [u8; 4] = [1, 3, 4, 7];

/// Items summed into the somatic subscore.
pub const SOMATIC_ITEMS: [u8; 3] = [2, 5, 6];

/// Reasons a set of questionnaire responses cannot be scored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionnaireError {
    /// An item has no answer.
    #[error("please answer question {0}")]
    MissingItem(u8),

    /// An answer lies outside the scale.
    #[error("answer {score} to question {item} is outside 0..={max}")]
    OutOfRange {
        /// Item id (1-based).
        item: u8,
        /// The score given.
        score: u8,
        /// Largest allowed score.
        max: u8,
    },

    /// An item id that is not part of the questionnaire.
    #[error("question {0} does not exist")]
    UnknownItem(u8),
}

/// Raw answers keyed by item id (1..=7).
///
/// Serialized as `{"q1": 2, "q2": 1, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionnaireResponses(BTreeMap<u8, u8>);

impl QuestionnaireResponses {
    /// Creates an empty response set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a complete response set from seven scores in item order.
    #[must_use]
    pub fn from_scores(scores: [u8; QUESTIONNAIRE_ITEMS as usize]) -> Self {
        Self((1..=QUESTIONNAIRE_ITEMS).zip(scores).collect())
    }

    /// Records an answer, replacing any previous one for the same item.
    pub fn set(&mut self, item: u8, score: u8) {
        self.0.insert(item, score);
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, item: u8, score: u8) -> Self {
        self.set(item, score);
        self
    }

    /// Returns the answer to `item`, if given.
    #[must_use]
    pub fn get(&self, item: u8) -> Option<u8> {
        self.0.get(&item).copied()
    }

    /// Returns the lowest-numbered item that has no answer.
    #[must_use]
    pub fn first_missing(&self) -> Option<u8> {
        (1..=QUESTIONNAIRE_ITEMS).find(|item| !self.0.contains_key(item))
    }

    /// Iterates `(item, score)` pairs in item order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    fn sum(&self, items: &[u8]) -> u32 {
        items
            .iter()
            .filter_map(|item| self.get(*item))
            .map(u32::from)
            .sum()
    }
}

impl Serialize for QuestionnaireResponses {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keyed: BTreeMap<String, u8> = self.0.iter().map(|(k, v)| (format!("q{k}"), *v)).collect();
        keyed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QuestionnaireResponses {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let keyed = BTreeMap::<String, u8>::deserialize(deserializer)?;
        let mut out = BTreeMap::new();
        for (key, score) in keyed {
            let item = key
                .strip_prefix('q')
                .unwrap_or(&key)
                .parse::<u8>()
                .map_err(|_| serde::de::Error::custom(format!("invalid item key '{key}'")))?;
            out.insert(item, score);
        }
        Ok(Self(out))
    }
}

/// Scored questionnaire.
///
/// Subscores and total are derived from the responses at construction and
/// cannot be changed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionnaireResult {
    responses: QuestionnaireResponses,
    psychic: u32,
    somatic: u32,
    total: u32,
}

impl QuestionnaireResult {
    /// Scores a complete response set.
    ///
    /// # Errors
    ///
    /// Returns the first missing item (in item order), the first answer
    /// above `max_item_score`, or an item id outside 1..=7.
    pub fn score(
        responses: QuestionnaireResponses,
        max_item_score: u8,
    ) -> Result<Self, QuestionnaireError> {
        if let Some(item) = responses.first_missing() {
            return Err(QuestionnaireError::MissingItem(item));
        }
        for (item, score) in responses.iter() {
            if !(1..=QUESTIONNAIRE_ITEMS).contains(&item) {
                return Err(QuestionnaireError::UnknownItem(item));
            }
            if score > max_item_score {
                return Err(QuestionnaireError::OutOfRange {
                    item,
                    score,
                    max: max_item_score,
                });
            }
        }

        let psychic = responses.sum(&PSYCHIC_ITEMS);
        let somatic = responses.sum(&SOMATIC_ITEMS);
        Ok(Self {
            responses,
            psychic,
            somatic,
            total: psychic + somatic,
        })
    }

    /// The raw answers.
    #[must_use]
    pub const fn responses(&self) -> &QuestionnaireResponses {
        &self.responses
    }

    /// Sum of items 1, 3, 4 and 7.
    #[must_use]
    pub const fn psychic(&self) -> u32 {
        self.psychic
    }

    /// Sum of items 2, 5 and 6.
    #[must_use]
    pub const fn somatic(&self) -> u32 {
        self.somatic
    }

    /// Psychic plus somatic.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }

    /// Severity band of the total score.
    #[must_use]
    pub const fn anxiety_level(&self) -> AnxietyLevel {
        AnxietyLevel::from_total(self.total)
    }
}

/// Severity band for a questionnaire total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnxietyLevel {
    /// Total 0..=7.
    Minimal,
    /// Total 8..=14.
    MildModerate,
    /// Total 15..=21.
    ModerateHigh,
    /// Total above 21.
    Severe,
}

impl AnxietyLevel {
    /// Classifies a total score.
    #[must_use]
    pub const fn from_total(total: u32) -> Self {
        match total {
            0..=7 => Self::Minimal,
            8..=14 => Self::MildModerate,
            15..=21 => Self::ModerateHigh,
            _ => Self::Severe,
        }
    }

    /// Display label shown to participants.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Minimal => "Mínima",
            Self::MildModerate => "Leve-Moderada",
            Self::ModerateHigh => "Moderada-Alta",
            Self::Severe => "Severa",
        }
    }
}

// ============================================================================
// Physiology
// ============================================================================

/// Resting reference values delivered by the acquisition service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    /// Mean ECG voltage (V).
    pub ecg_voltage: f64,
    /// Mean heart rate (beats per minute).
    pub bpm: f64,
    /// Mean skin temperature (°C).
    pub temperature_c: f64,
}

const fn default_bpm() -> f64 {
    70.0
}

/// One physiological reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// ECG voltage (V).
    pub ecg_voltage: f64,
    /// Heart rate; the service omits it until enough signal is buffered.
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    /// Skin temperature (°C).
    pub temperature: f64,
    /// Unix timestamp (seconds), when the service provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// ECG change relative to baseline, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecg_change_percent: Option<f64>,
    /// Temperature change relative to baseline, in °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_change_celsius: Option<f64>,
}

impl Sample {
    /// A reading with only the three charted metrics set.
    #[must_use]
    pub const fn new(ecg_voltage: f64, bpm: f64, temperature: f64) -> Self {
        Self {
            ecg_voltage,
            bpm,
            temperature,
            timestamp: None,
            ecg_change_percent: None,
            temp_change_celsius: None,
        }
    }
}

/// The three charted metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// ECG voltage.
    EcgVoltage,
    /// Heart rate.
    Bpm,
    /// Skin temperature.
    Temperature,
}

impl Metric {
    /// All metrics, in chart order.
    pub const ALL: [Self; 3] = [Self::EcgVoltage, Self::Bpm, Self::Temperature];

    /// Reads this metric from a sample.
    #[must_use]
    pub const fn of(self, sample: &Sample) -> f64 {
        match self {
            Self::EcgVoltage => sample.ecg_voltage,
            Self::Bpm => sample.bpm,
            Self::Temperature => sample.temperature,
        }
    }
}

/// A completed session's readings, in acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleSeries(Vec<Sample>);

impl SampleSeries {
    /// Wraps an ordered list of samples.
    #[must_use]
    pub const fn new(samples: Vec<Sample>) -> Self {
        Self(samples)
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the series has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The samples as a slice.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.0
    }

    /// Index of the first regulation sample: `floor(len / 2)`.
    #[must_use]
    pub fn split_index(&self) -> usize {
        self.0.len() / 2
    }

    /// Extracts one metric as a column.
    #[must_use]
    pub fn column(&self, metric: Metric) -> Vec<f64> {
        self.0.iter().map(|s| metric.of(s)).collect()
    }
}

impl From<Vec<Sample>> for SampleSeries {
    fn from(samples: Vec<Sample>) -> Self {
        Self(samples)
    }
}

// ============================================================================
// Colours
// ============================================================================

/// The four-colour palette shared by the Stroop and sequence games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Red.
    #[serde(alias = "rojo")]
    Red,
    /// Blue.
    #[serde(alias = "azul")]
    Blue,
    /// Green.
    #[serde(alias = "verde")]
    Green,
    /// Yellow.
    #[serde(alias = "amarillo")]
    Yellow,
}

impl Color {
    /// Palette in display order.
    pub const ALL: [Self; 4] = [Self::Red, Self::Blue, Self::Green, Self::Yellow];

    /// The colour word shown to participants.
    #[must_use]
    pub const fn word(self) -> &'static str {
        match self {
            Self::Red => "ROJO",
            Self::Blue => "AZUL",
            Self::Green => "VERDE",
            Self::Yellow => "AMARILLO",
        }
    }

    /// CSS colour used to paint the ink.
    #[must_use]
    pub const fn css(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "#f5c842",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
        })
    }
}

impl FromStr for Color {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" | "rojo" => Ok(Self::Red),
            "blue" | "azul" => Ok(Self::Blue),
            "green" | "verde" => Ok(Self::Green),
            "yellow" | "amarillo" => Ok(Self::Yellow),
            other => Err(ParseValueError::new("color", other)),
        }
    }
}

/// A string that does not name a known value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseValueError {
    /// What was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseValueError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reference_questionnaire_scores() {
        let responses = QuestionnaireResponses::from_scores([2, 1, 3, 1, 0, 1, 2]);
        let result = QuestionnaireResult::score(responses, 4).unwrap();
        assert_eq!(result.psychic(), 8);
        assert_eq!(result.somatic(), 2);
        assert_eq!(result.total(), 10);
        assert_eq!(result.anxiety_level(), AnxietyLevel::MildModerate);
        assert_eq!(result.anxiety_level().label(), "Leve-Moderada");
    }

    #[test]
    fn first_missing_item_is_reported() {
        let responses = QuestionnaireResponses::new()
            .with(1, 2)
            .with(2, 2)
            .with(4, 0)
            .with(6, 1);
        assert_eq!(
            QuestionnaireResult::score(responses, 4),
            Err(QuestionnaireError::MissingItem(3))
        );
    }

    #[test]
    fn out_of_range_answer_rejected() {
        let responses = QuestionnaireResponses::from_scores([0, 0, 5, 0, 0, 0, 0]);
        assert_eq!(
            QuestionnaireResult::score(responses, 4),
            Err(QuestionnaireError::OutOfRange {
                item: 3,
                score: 5,
                max: 4
            })
        );
    }

    #[test]
    fn unknown_item_rejected() {
        let responses = QuestionnaireResponses::from_scores([0; 7]).with(9, 1);
        assert_eq!(
            QuestionnaireResult::score(responses, 4),
            Err(QuestionnaireError::UnknownItem(9))
        );
    }

    #[test]
    fn anxiety_band_edges() {
        assert_eq!(AnxietyLevel::from_total(7), AnxietyLevel::Minimal);
        assert_eq!(AnxietyLevel::from_total(8), AnxietyLevel::MildModerate);
        assert_eq!(AnxietyLevel::from_total(14), AnxietyLevel::MildModerate);
        assert_eq!(AnxietyLevel::from_total(15), AnxietyLevel::ModerateHigh);
        assert_eq!(AnxietyLevel::from_total(21), AnxietyLevel::ModerateHigh);
        assert_eq!(AnxietyLevel::from_total(22), AnxietyLevel::Severe);
    }

    #[test]
    fn responses_use_q_prefixed_keys() {
        let responses = QuestionnaireResponses::new().with(1, 3).with(7, 0);
        let json = serde_json::to_value(&responses).unwrap();
        assert_eq!(json, serde_json::json!({"q1": 3, "q7": 0}));

        let back: QuestionnaireResponses = serde_json::from_value(json).unwrap();
        assert_eq!(back, responses);
    }

    #[test]
    fn demographics_accepts_spanish_field_names() {
        let d: Demographics =
            serde_json::from_str(r#"{"edad": 34, "sexo": "femenino"}"#).unwrap();
        assert_eq!(d.age, 34);
        assert_eq!(d.sex, Sex::Female);
    }

    #[test]
    fn sample_defaults_missing_bpm() {
        let s: Sample =
            serde_json::from_str(r#"{"ecg_voltage": 1.6, "temperature": 36.5}"#).unwrap();
        assert!((s.bpm - 70.0).abs() < f64::EPSILON);
        assert!(s.timestamp.is_none());
    }

    #[test]
    fn split_index_is_floor_half() {
        let series = SampleSeries::new(vec![Sample::new(1.0, 70.0, 36.5); 11]);
        assert_eq!(series.split_index(), 5);
        assert_eq!(SampleSeries::default().split_index(), 0);
    }

    #[test]
    fn phase_display_and_name() {
        let phase = SessionPhase::Activation {
            game: GameKind::Stroop,
        };
        assert_eq!(phase.to_string(), "activation(stroop)");
        assert_eq!(phase.name(), "activation");
        assert_eq!(phase.game(), Some(GameKind::Stroop));
        assert_eq!(SessionPhase::default(), SessionPhase::Idle);
    }

    #[test]
    fn colors_parse_in_both_languages() {
        assert_eq!("rojo".parse::<Color>(), Ok(Color::Red));
        assert_eq!("Yellow".parse::<Color>(), Ok(Color::Yellow));
        assert!("purple".parse::<Color>().is_err());
    }

    #[test]
    fn game_kind_aliases() {
        assert_eq!("math".parse::<GameKind>(), Ok(GameKind::Arithmetic));
        assert_eq!("memory".parse::<GameKind>(), Ok(GameKind::SequenceRecall));
        let kind: GameKind = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(kind, GameKind::SequenceRecall);
    }

    proptest! {
        #[test]
        fn total_is_sum_of_subscores(scores in proptest::array::uniform7(0u8..=4)) {
            let result = QuestionnaireResult::score(
                QuestionnaireResponses::from_scores(scores), 4
            ).unwrap();
            let psychic: u32 = [0usize, 2, 3, 6].iter().map(|i| u32::from(scores[*i])).sum();
            let somatic: u32 = [1usize, 4, 5].iter().map(|i| u32::from(scores[*i])).sum();
            prop_assert_eq!(result.psychic(), psychic);
            prop_assert_eq!(result.somatic(), somatic);
            prop_assert_eq!(result.total(), result.psychic() + result.somatic());
        }
    }
}
