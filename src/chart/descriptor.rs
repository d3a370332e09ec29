//! Renderer-agnostic chart descriptions.

use biocalm_core::Metric;
use biocalm_core::config::{AxisRange, ZoneLevel};
use serde::Serialize;

/// Label drawn left of the phase separator.
pub const ACTIVATION_LABEL: &str = "ACTIVACIÓN";

/// Label drawn right of the phase separator.
pub const REGULATION_LABEL: &str = "REGULACIÓN";

/// Horizontal shaded band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneBand {
    /// Legend text
    pub label: String,
    /// Lower edge
    pub lower: f64,
    /// Upper edge
    pub upper: f64,
    /// Severity
    pub level: ZoneLevel,
    /// RGBA fill
    pub fill: &'static str,
}

/// Vertical line between the activation and regulation halves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseSeparator {
    /// First regulation sample
    pub index: usize,
    /// Text on the left
    pub before: &'static str,
    /// Text on the right
    pub after: &'static str,
}

impl PhaseSeparator {
    /// Separator at `index` with the standard labels.
    #[must_use]
    pub const fn at(index: usize) -> Self {
        Self {
            index,
            before: ACTIVATION_LABEL,
            after: REGULATION_LABEL,
        }
    }
}

/// Everything a sink needs to draw one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDescriptor {
    /// Plotted metric
    pub metric: Metric,
    /// Chart title
    pub title: &'static str,
    /// Legend text for the raw series
    pub series_label: &'static str,
    /// X-axis title
    pub x_label: &'static str,
    /// Y-axis title
    pub y_label: &'static str,
    /// X-axis labels, seconds with one decimal
    pub labels: Vec<String>,
    /// Raw values, one per label
    pub values: Vec<f64>,
    /// Constant reference line
    pub baseline: f64,
    /// Shaded bands
    pub zones: Vec<ZoneBand>,
    /// Phase split marker
    pub separator: PhaseSeparator,
    /// Y-axis extent
    pub y_range: AxisRange,
}

/// The three charts of a session, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSet {
    /// ECG voltage
    pub ecg: ChartDescriptor,
    /// Heart rate
    pub bpm: ChartDescriptor,
    /// Skin temperature
    pub temperature: ChartDescriptor,
}

impl ChartSet {
    /// Iterates the charts in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ChartDescriptor> {
        [&self.ecg, &self.bpm, &self.temperature].into_iter()
    }

    /// Number of samples plotted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ecg.values.len()
    }

    /// Always false; a chart set is never built from an empty series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ecg.values.is_empty()
    }
}
