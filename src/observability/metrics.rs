//! Prometheus metrics.
//!
//! Label values that originate outside the process (inbound event names)
//! are checked against the known protocol vocabulary before use.

use std::sync::atomic::{AtomicBool, Ordering};

use biocalm_core::protocol::KNOWN_INBOUND_EVENTS;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::BiocalmError;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

const UNKNOWN_LABEL: &str = "__unknown__";

/// Returns `event` when it is a known inbound event name, else `"__unknown__"`.
#[must_use]
pub fn sanitize_event_label(event: &str) -> &str {
    if KNOWN_INBOUND_EVENTS.contains(&event) {
        event
    } else {
        UNKNOWN_LABEL
    }
}

/// Installs the global Prometheus recorder.
///
/// With `Some(port)` an HTTP listener is bound on `127.0.0.1:<port>`.
/// A second call is a no-op.
///
/// # Errors
///
/// Returns `BiocalmError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), BiocalmError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| BiocalmError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "biocalm_phase_transitions_total",
        "Total number of session phase transitions"
    );
    describe_gauge!(
        "biocalm_current_phase",
        "Currently active session phase (1 = active)"
    );
    describe_counter!(
        "biocalm_inbound_events_total",
        "Events received from the acquisition service"
    );
    describe_counter!(
        "biocalm_outbound_messages_total",
        "Control messages sent to the acquisition service"
    );
    describe_counter!("biocalm_answers_total", "Game answers by outcome");
    describe_counter!("biocalm_errors_total", "Session errors by class");
    describe_counter!(
        "biocalm_stop_retries_total",
        "stop_session re-sends after a missed confirmation"
    );
}

/// Records a phase change. Phase names are a closed set.
pub fn record_phase_transition(from: &'static str, to: &'static str) {
    counter!("biocalm_phase_transitions_total", "to" => to).increment(1);
    gauge!("biocalm_current_phase", "phase" => from).set(0.0);
    gauge!("biocalm_current_phase", "phase" => to).set(1.0);
}

/// Records an inbound event by (sanitised) name.
pub fn record_inbound(event: &str) {
    let label = sanitize_event_label(event).to_owned();
    counter!("biocalm_inbound_events_total", "event" => label).increment(1);
}

/// Records an outbound control message.
pub fn record_outbound(event: &'static str) {
    counter!("biocalm_outbound_messages_total", "event" => event).increment(1);
}

/// Records a judged answer.
pub fn record_answer(game: &'static str, outcome: &'static str) {
    counter!("biocalm_answers_total", "game" => game, "outcome" => outcome).increment(1);
}

/// Records a session error by class.
pub fn record_error(class: &'static str) {
    counter!("biocalm_errors_total", "class" => class).increment(1);
}

/// Records a `stop_session` re-send.
pub fn record_stop_retry() {
    counter!("biocalm_stop_retries_total").increment(1);
}
