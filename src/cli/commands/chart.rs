//! `chart`: run the chart pipeline over a saved sample series.

use biocalm_core::SampleSeries;
use serde::Deserialize;

use crate::chart::{self, ChartSet, ChartSink, JsonChartSink, MemoryChartSink};
use crate::cli::args::{ChartArgs, OutputFormat};
use crate::error::BiocalmError;
use crate::results::{ResultInputs, SessionResults};

/// Accepted input shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum SeriesFile {
    Plain(SampleSeries),
    Stopped { chart_data: SampleSeries },
}

/// Parses a bare sample array or an object carrying `chart_data`.
///
/// # Errors
///
/// Returns a JSON error if the text is neither shape.
pub fn parse_series(raw: &str) -> Result<SampleSeries, serde_json::Error> {
    Ok(match serde_json::from_str(raw)? {
        SeriesFile::Plain(series) | SeriesFile::Stopped { chart_data: series } => series,
    })
}

/// Charts a saved series and prints a summary.
///
/// # Errors
///
/// Returns an I/O or JSON error if the samples cannot be read, a config
/// error for a bad `--config`, or a session error when there is nothing
/// to chart.
pub fn run(args: &ChartArgs) -> Result<(), BiocalmError> {
    let config = super::load_config(args.config.as_deref())?;
    let raw = std::fs::read_to_string(&args.samples)?;
    let series = parse_series(&raw)?;
    tracing::info!(
        samples = series.len(),
        file = %args.samples.display(),
        "charting saved series"
    );

    let mut sink: Box<dyn ChartSink> = match &args.out {
        Some(path) => Box::new(JsonChartSink::new(path)),
        None => Box::new(MemoryChartSink::new()),
    };
    let charts = chart::render(sink.as_mut(), &series, &config.chart)?;
    let results = SessionResults::compute(
        ResultInputs::default(),
        &series,
        config.chart.sample_interval_secs,
    );

    match args.format {
        OutputFormat::Human => {
            print_charts(&charts);
            print!("{results}");
        }
        OutputFormat::Json => {
            let doc = serde_json::json!({ "charts": charts, "results": results });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

fn print_charts(charts: &ChartSet) {
    for c in charts.iter() {
        println!(
            "{}: {} points, baseline {:.2}, axis {:.2}..{:.2}, split at {} ({} | {})",
            c.title,
            c.values.len(),
            c.baseline,
            c.y_range.min,
            c.y_range.max,
            c.separator.index,
            c.separator.before,
            c.separator.after
        );
        for zone in &c.zones {
            println!("  {}: {:.2}..{:.2}", zone.label, zone.lower, zone.upper);
        }
    }
}
