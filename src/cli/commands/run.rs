//! `run`: drive a session from the operator console.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::chart::{ChartSink, JsonChartSink, MemoryChartSink};
use crate::cli::args::RunArgs;
use crate::error::BiocalmError;
use crate::link::{self, ServiceLink};
use crate::observability::{EventEmitter, ViewSink, init_metrics};
use crate::session::{Orchestrator, run_session};
use crate::status;

/// Runs one interactive session.
///
/// # Errors
///
/// Returns a config, I/O or link error if setup fails or the link breaks
/// mid-session.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), BiocalmError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = super::load_config(args.config.as_deref())?;

    let emitter = Arc::new(if args.events == Path::new("-") {
        EventEmitter::stdout()
    } else {
        EventEmitter::from_file(&args.events)?
    });
    let charts: Box<dyn ChartSink> = match &args.charts {
        Some(path) => Box::new(JsonChartSink::new(path)),
        None => Box::new(MemoryChartSink::new()),
    };
    let rng = args
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

    let (mut orchestrator, channels) = Orchestrator::new(
        config,
        Arc::clone(&emitter) as Arc<dyn ViewSink>,
        charts,
        rng,
    );

    let status_cancel = cancel.child_token();
    if let Some(ref bind) = args.status {
        let addr = status::parse_bind_addr(bind)?;
        status::spawn(addr, orchestrator.subscribe(), status_cancel.clone()).await?;
    }

    tracing::info!(link = %args.link, "connecting to acquisition service");
    let link: Arc<dyn ServiceLink> = Arc::from(link::connect(&args.link, args.seed).await?);

    let commands = FramedRead::new(tokio::io::stdin(), LinesCodec::new())
        .filter_map(|line| std::future::ready(line.ok()));

    let started = Instant::now();
    let outcome = run_session(&mut orchestrator, channels, link, commands, cancel.clone()).await;
    emitter.flush();
    status_cancel.cancel();

    let outcome = outcome?;
    tracing::info!(
        ?outcome,
        events = emitter.event_count(),
        elapsed = %humantime::format_duration(Duration::from_secs(started.elapsed().as_secs())),
        "session finished"
    );
    Ok(())
}
