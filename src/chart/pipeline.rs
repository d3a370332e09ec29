//! Sample series to chart descriptors.
//!
//! Pure functions of the input series and the chart configuration.

use biocalm_core::config::{AxisRange, ChartConfig, ZoneLevel};
use biocalm_core::{Metric, SampleSeries};

use super::descriptor::{ChartDescriptor, ChartSet, PhaseSeparator, ZoneBand};
use crate::error::SessionError;

const X_LABEL: &str = "Tiempo (segundos)";

/// Per-metric reference values taken from the first sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesBaseline {
    /// ECG voltage at index 0
    pub ecg_voltage: f64,
    /// Heart rate at index 0
    pub bpm: f64,
    /// Temperature at index 0
    pub temperature: f64,
}

impl SeriesBaseline {
    /// Reads the first sample, if any.
    #[must_use]
    pub fn of(series: &SampleSeries) -> Option<Self> {
        series.samples().first().map(|s| Self {
            ecg_voltage: s.ecg_voltage,
            bpm: s.bpm,
            temperature: s.temperature,
        })
    }
}

/// X-axis labels: index × interval, one decimal.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn time_labels(len: usize, interval_secs: f64) -> Vec<String> {
    (0..len)
        .map(|i| format!("{:.1}", i as f64 * interval_secs))
        .collect()
}

fn band_around(label: &str, center: f64, half_width: f64) -> ZoneBand {
    ZoneBand {
        label: label.to_string(),
        lower: center - half_width,
        upper: center + half_width,
        level: ZoneLevel::Normal,
        fill: ZoneLevel::Normal.fill(),
    }
}

/// Builds the ECG, heart-rate and temperature charts for `series`.
///
/// # Errors
///
/// Returns [`SessionError::DataUnavailable`] when the series is empty.
pub fn build(series: &SampleSeries, config: &ChartConfig) -> Result<ChartSet, SessionError> {
    let baseline = SeriesBaseline::of(series)
        .ok_or_else(|| SessionError::data_unavailable("session produced no samples"))?;
    let labels = time_labels(series.len(), config.sample_interval_secs);
    let separator = PhaseSeparator::at(series.split_index());

    let ecg = ChartDescriptor {
        metric: Metric::EcgVoltage,
        title: "Señal ECG (Voltaje)",
        series_label: "ECG (Voltaje)",
        x_label: X_LABEL,
        y_label: "Voltaje (V)",
        labels: labels.clone(),
        values: series.column(Metric::EcgVoltage),
        baseline: baseline.ecg_voltage,
        zones: vec![band_around(
            "Zona Normal",
            baseline.ecg_voltage,
            config.ecg_band,
        )],
        separator: separator.clone(),
        y_range: AxisRange {
            min: baseline.ecg_voltage - config.ecg_axis_margin,
            max: baseline.ecg_voltage + config.ecg_axis_margin,
        },
    };

    let bpm = ChartDescriptor {
        metric: Metric::Bpm,
        title: "Frecuencia Cardíaca (BPM)",
        series_label: "Frecuencia Cardíaca (BPM)",
        x_label: X_LABEL,
        y_label: "Latidos por Minuto",
        labels: labels.clone(),
        values: series.column(Metric::Bpm),
        baseline: baseline.bpm,
        zones: config
            .bpm_zones
            .iter()
            .map(|z| ZoneBand {
                label: z.label.clone(),
                lower: z.lower,
                upper: z.upper,
                level: z.level,
                fill: z.level.fill(),
            })
            .collect(),
        separator: separator.clone(),
        y_range: config.bpm_axis,
    };

    let temperature = ChartDescriptor {
        metric: Metric::Temperature,
        title: "Temperatura Corporal",
        series_label: "Temperatura (°C)",
        x_label: X_LABEL,
        y_label: "Temperatura (°C)",
        labels,
        values: series.column(Metric::Temperature),
        baseline: baseline.temperature,
        zones: vec![band_around(
            "Zona Normal",
            baseline.temperature,
            config.temperature_band,
        )],
        separator,
        y_range: AxisRange {
            min: baseline.temperature - config.temperature_axis.below,
            max: baseline.temperature + config.temperature_axis.above,
        },
    };

    Ok(ChartSet {
        ecg,
        bpm,
        temperature,
    })
}
