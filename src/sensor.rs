//! Live sensor indicators.
//!
//! Each `sensor_data` reading is reduced to two fill gauges: ECG voltage
//! change and temperature change relative to the baseline, both clamped to
//! `0..=100`.

use biocalm_core::Sample;
use serde::Serialize;

const ECG_GAIN: f64 = 5.0;
const TEMPERATURE_GAIN: f64 = 20.0;

/// Coarse reading of a gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorLevel {
    /// Below 30 %
    Low,
    /// Below 70 %
    Elevated,
    /// 70 % and above
    High,
}

impl IndicatorLevel {
    /// Level for a fill percentage.
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if percent < 30.0 {
            Self::Low
        } else if percent < 70.0 {
            Self::Elevated
        } else {
            Self::High
        }
    }
}

/// One gauge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Indicator {
    /// Raw reading shown next to the gauge
    pub value: f64,
    /// Fill, `0..=100`
    pub percent: f64,
    /// Band of `percent`
    pub level: IndicatorLevel,
}

impl Indicator {
    fn new(value: f64, change: Option<f64>, gain: f64) -> Self {
        let percent = change.map_or(0.0, |c| (c.abs() * gain).min(100.0));
        Self {
            value,
            percent,
            level: IndicatorLevel::from_percent(percent),
        }
    }
}

/// Both gauges for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorIndicators {
    /// ECG voltage and its relative change
    pub ecg: Indicator,
    /// Temperature and its absolute change
    pub temperature: Indicator,
}

impl SensorIndicators {
    /// Projects a reading. Missing change fields read as no change.
    #[must_use]
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            ecg: Indicator::new(sample.ecg_voltage, sample.ecg_change_percent, ECG_GAIN),
            temperature: Indicator::new(
                sample.temperature,
                sample.temp_change_celsius,
                TEMPERATURE_GAIN,
            ),
        }
    }
}
