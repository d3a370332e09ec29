//! Session results.
//!
//! Collects what the orchestrator captured (demographics, questionnaire
//! scores, baseline) with summary statistics over the returned sample
//! series, and compares the activation half with the regulation half.

use std::fmt;

use biocalm_core::{
    AnxietyLevel, BaselineSnapshot, Demographics, Metric, QuestionnaireResult, SampleSeries,
};
use serde::Serialize;

// ============================================================================
// Statistics
// ============================================================================

/// Mean, extremes and population standard deviation of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

impl MetricSummary {
    /// Summarises `values`; `None` when empty.
    #[must_use]
    pub fn of(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            min,
            max,
            std_dev: std_dev(values, mean, 0),
        })
    }
}

/// Mean and sample standard deviation of one half of the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentStats {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (0 with fewer than two values)
    pub std_dev: f64,
}

impl SegmentStats {
    fn of(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        Some(Self {
            mean,
            std_dev: std_dev(values, mean, 1),
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[allow(clippy::cast_precision_loss)]
fn std_dev(values: &[f64], mean: f64, ddof: usize) -> f64 {
    if values.len() <= ddof {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - ddof) as f64).sqrt()
}

/// Whole-series summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    /// Sample count
    pub samples: usize,
    /// `samples × interval`
    pub duration_secs: f64,
    /// ECG voltage
    pub ecg: MetricSummary,
    /// Heart rate
    pub bpm: MetricSummary,
    /// Temperature
    pub temperature: MetricSummary,
}

impl SeriesSummary {
    /// Summarises a series; `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn of(series: &SampleSeries, interval_secs: f64) -> Option<Self> {
        Some(Self {
            samples: series.len(),
            duration_secs: series.len() as f64 * interval_secs,
            ecg: MetricSummary::of(&series.column(Metric::EcgVoltage))?,
            bpm: MetricSummary::of(&series.column(Metric::Bpm))?,
            temperature: MetricSummary::of(&series.column(Metric::Temperature))?,
        })
    }
}

/// Activation against regulation for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricComparison {
    /// First half
    pub activation: SegmentStats,
    /// Second half
    pub regulation: SegmentStats,
    /// `activation.mean - regulation.mean`; positive means it went down
    pub delta: f64,
    /// `delta` relative to the activation mean, in percent
    pub delta_percent: Option<f64>,
}

impl MetricComparison {
    fn of(activation: &[f64], regulation: &[f64]) -> Option<Self> {
        let activation = SegmentStats::of(activation)?;
        let regulation = SegmentStats::of(regulation)?;
        let delta = activation.mean - regulation.mean;
        let delta_percent = (activation.mean != 0.0).then(|| delta / activation.mean * 100.0);
        Some(Self {
            activation,
            regulation,
            delta,
            delta_percent,
        })
    }
}

/// Heart rate and temperature, split at `floor(len / 2)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseComparison {
    /// Samples before the split
    pub activation_samples: usize,
    /// Samples from the split on
    pub regulation_samples: usize,
    /// Heart rate
    pub bpm: MetricComparison,
    /// Temperature
    pub temperature: MetricComparison,
}

impl PhaseComparison {
    /// Compares the halves; `None` unless both halves have samples.
    #[must_use]
    pub fn of(series: &SampleSeries) -> Option<Self> {
        let split = series.split_index();
        let compare = |metric| {
            let column = series.column(metric);
            let (activation, regulation) = column.split_at(split);
            MetricComparison::of(activation, regulation)
        };
        Some(Self {
            activation_samples: split,
            regulation_samples: series.len() - split,
            bpm: compare(Metric::Bpm)?,
            temperature: compare(Metric::Temperature)?,
        })
    }
}

// ============================================================================
// Results
// ============================================================================

/// Questionnaire scores with their band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    /// Psychic subscore
    pub psychic: u32,
    /// Somatic subscore
    pub somatic: u32,
    /// Total
    pub total: u32,
    /// Band
    pub level: AnxietyLevel,
    /// Band label
    pub label: &'static str,
}

impl From<&QuestionnaireResult> for ScoreSummary {
    fn from(result: &QuestionnaireResult) -> Self {
        let level = result.anxiety_level();
        Self {
            psychic: result.psychic(),
            somatic: result.somatic(),
            total: result.total(),
            level,
            label: level.label(),
        }
    }
}

/// Everything shown on the results view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResults {
    /// Participant
    pub demographics: Option<Demographics>,
    /// Pre-session questionnaire
    pub pre: Option<ScoreSummary>,
    /// Post-session questionnaire, once submitted
    pub post: Option<ScoreSummary>,
    /// Resting baseline from the service
    pub baseline: Option<BaselineSnapshot>,
    /// Whole-series statistics
    pub series: Option<SeriesSummary>,
    /// Activation against regulation
    pub comparison: Option<PhaseComparison>,
}

/// Inputs to [`SessionResults::compute`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultInputs<'a> {
    /// Participant
    pub demographics: Option<Demographics>,
    /// Pre-session questionnaire
    pub pre: Option<&'a QuestionnaireResult>,
    /// Post-session questionnaire
    pub post: Option<&'a QuestionnaireResult>,
    /// Baseline snapshot
    pub baseline: Option<BaselineSnapshot>,
}

impl SessionResults {
    /// Derives the results view.
    #[must_use]
    pub fn compute(inputs: ResultInputs<'_>, series: &SampleSeries, interval_secs: f64) -> Self {
        Self {
            demographics: inputs.demographics,
            pre: inputs.pre.map(ScoreSummary::from),
            post: inputs.post.map(ScoreSummary::from),
            baseline: inputs.baseline,
            series: SeriesSummary::of(series, interval_secs),
            comparison: PhaseComparison::of(series),
        }
    }
}

impl fmt::Display for SessionResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.demographics {
            Some(d) => writeln!(f, "participant: age {}, sex {:?}", d.age, d.sex)?,
            None => writeln!(f, "participant: not recorded")?,
        }
        for (name, score) in [("pre", &self.pre), ("post", &self.post)] {
            if let Some(s) = score {
                writeln!(
                    f,
                    "questionnaire ({name}): psychic {} somatic {} total {} ({})",
                    s.psychic, s.somatic, s.total, s.label
                )?;
            }
        }
        match &self.baseline {
            Some(b) => writeln!(
                f,
                "baseline: ECG {:.4} V, {:.0} bpm, {:.2} °C",
                b.ecg_voltage, b.bpm, b.temperature_c
            )?,
            None => writeln!(f, "baseline: not available")?,
        }
        match &self.series {
            Some(s) => {
                writeln!(f, "samples: {} ({:.1} s)", s.samples, s.duration_secs)?;
                for (name, m) in [("ecg", &s.ecg), ("bpm", &s.bpm), ("temperature", &s.temperature)] {
                    writeln!(
                        f,
                        "  {name}: mean {:.2} min {:.2} max {:.2} sd {:.2}",
                        m.mean, m.min, m.max, m.std_dev
                    )?;
                }
            }
            None => writeln!(f, "samples: none")?,
        }
        if let Some(c) = &self.comparison {
            writeln!(
                f,
                "bpm: activation {:.2} ± {:.2}, regulation {:.2} ± {:.2}, change {:.2}{}",
                c.bpm.activation.mean,
                c.bpm.activation.std_dev,
                c.bpm.regulation.mean,
                c.bpm.regulation.std_dev,
                c.bpm.delta,
                c.bpm
                    .delta_percent
                    .map_or_else(String::new, |p| format!(" ({p:.1}%)"))
            )?;
            writeln!(
                f,
                "temperature: activation {:.2} ± {:.2}, regulation {:.2} ± {:.2}, change {:.2} °C",
                c.temperature.activation.mean,
                c.temperature.activation.std_dev,
                c.temperature.regulation.mean,
                c.temperature.regulation.std_dev,
                c.temperature.delta
            )?;
        }
        Ok(())
    }
}
