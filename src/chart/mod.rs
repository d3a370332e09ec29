//! Chart pipeline and rendering sinks.
//!
//! [`build`] turns a completed session's samples into three annotated chart
//! descriptors. [`render`] hands them to a [`ChartSink`], always releasing
//! whatever the sink drew before so repeated renders replace rather than
//! accumulate.

pub mod descriptor;
pub mod pipeline;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use biocalm_core::SampleSeries;
use biocalm_core::config::ChartConfig;
use tracing::{debug, warn};

use crate::error::SessionError;

pub use descriptor::{ChartDescriptor, ChartSet, PhaseSeparator, ZoneBand};
pub use pipeline::{SeriesBaseline, build, time_labels};

/// Destination for rendered charts.
pub trait ChartSink: Send {
    /// Discards anything previously drawn. Must be safe when nothing was.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the previous output cannot be removed.
    fn release(&mut self) -> std::io::Result<()>;

    /// Draws a chart set.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the charts cannot be written.
    fn draw(&mut self, charts: &ChartSet) -> std::io::Result<()>;
}

/// Releases the sink, then builds and draws charts for `series`.
///
/// # Errors
///
/// Returns [`SessionError::DataUnavailable`] when the series is empty or
/// the sink fails. The sink is left released in both cases.
pub fn render(
    sink: &mut dyn ChartSink,
    series: &SampleSeries,
    config: &ChartConfig,
) -> Result<ChartSet, SessionError> {
    sink.release()
        .map_err(|e| SessionError::data_unavailable(format!("chart sink release failed: {e}")))?;

    let charts = build(series, config).inspect_err(|e| warn!(error = %e, "charts not rendered"))?;
    sink.draw(&charts)
        .map_err(|e| SessionError::data_unavailable(format!("chart sink draw failed: {e}")))?;
    debug!(samples = charts.len(), "charts rendered");
    Ok(charts)
}

// ============================================================================
// Sinks
// ============================================================================

/// Writes the chart set as a pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonChartSink {
    path: PathBuf,
}

impl JsonChartSink {
    /// Sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChartSink for JsonChartSink {
    fn release(&mut self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn draw(&mut self, charts: &ChartSet) -> std::io::Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut file, charts)?;
        writeln!(file)?;
        file.flush()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    current: Option<ChartSet>,
    draws: usize,
    releases: usize,
}

/// Keeps the last drawn chart set in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryChartSink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryChartSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The chart set currently drawn, if any.
    #[must_use]
    pub fn current(&self) -> Option<ChartSet> {
        self.state.lock().ok().and_then(|s| s.current.clone())
    }

    /// Number of successful draws.
    #[must_use]
    pub fn draws(&self) -> usize {
        self.state.lock().map_or(0, |s| s.draws)
    }

    /// Number of releases.
    #[must_use]
    pub fn releases(&self) -> usize {
        self.state.lock().map_or(0, |s| s.releases)
    }
}

impl ChartSink for MemoryChartSink {
    fn release(&mut self) -> std::io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| std::io::Error::other("chart state poisoned"))?;
        state.current = None;
        state.releases += 1;
        Ok(())
    }

    fn draw(&mut self, charts: &ChartSet) -> std::io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| std::io::Error::other("chart state poisoned"))?;
        state.current = Some(charts.clone());
        state.draws += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biocalm_core::Sample;

    fn series(n: usize) -> SampleSeries {
        (0..n)
            .map(|i| Sample::new(1.0, 70.0 + f64::from(u32::try_from(i).unwrap()), 36.5))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn rerender_replaces_previous_charts() {
        let mut sink = MemoryChartSink::new();
        let config = ChartConfig::default();

        render(&mut sink, &series(4), &config).unwrap();
        render(&mut sink, &series(8), &config).unwrap();

        assert_eq!(sink.draws(), 2);
        assert_eq!(sink.releases(), 2);
        assert_eq!(sink.current().map(|c| c.len()), Some(8));
    }

    #[test]
    fn empty_series_releases_and_draws_nothing() {
        let mut sink = MemoryChartSink::new();
        let config = ChartConfig::default();
        render(&mut sink, &series(4), &config).unwrap();

        let err = render(&mut sink, &SampleSeries::default(), &config).unwrap_err();
        assert!(matches!(err, SessionError::DataUnavailable { .. }));
        assert!(sink.current().is_none());
        assert_eq!(sink.draws(), 1);
    }

    #[test]
    fn json_sink_writes_and_releases_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.json");
        let mut sink = JsonChartSink::new(&path);

        // Releasing before anything was drawn is fine.
        sink.release().unwrap();

        render(&mut sink, &series(3), &ChartConfig::default()).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["ecg"]["labels"], serde_json::json!(["0.0", "0.1", "0.2"]));
        assert_eq!(doc["bpm"]["metric"], "bpm");
        assert_eq!(doc["temperature"]["separator"]["index"], 1);

        sink.release().unwrap();
        assert!(!path.exists());
    }
}
