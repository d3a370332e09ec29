//! In-process simulated acquisition service.
//!
//! Answers every control message the way the real service does, with
//! synthetic readings instead of sensor hardware. The signal is a fixture
//! for demos and tests, not a physiological model.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use biocalm_core::protocol::SessionStopped;
use biocalm_core::{BaselineSnapshot, InboundEvent, OutboundMessage, Sample, SampleSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{LinkKind, Result, ServiceLink};

/// Time between simulated readings.
pub const READING_INTERVAL: Duration = Duration::from_millis(100);

/// Most samples returned in `session_stopped`.
pub const MAX_CHART_POINTS: usize = 120;

const RESTING_ECG: f64 = 1.6;
const RESTING_TEMP: f64 = 36.5;
const RESTING_BPM: f64 = 72.0;
const ADC_SCALE: f64 = 204.8;

// ============================================================================
// Signal
// ============================================================================

struct SignalGenerator {
    rng: StdRng,
    count: u64,
    baseline: Option<BaselineSnapshot>,
}

impl SignalGenerator {
    fn new(rng: StdRng) -> Self {
        Self {
            rng,
            count: 0,
            baseline: None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn next_sample(&mut self) -> Sample {
        let stress = (self.count as f64 / 1000.0).min(0.08);
        let spike = match self.count % 10 {
            2 | 3 => self.rng.random_range(0.3..0.5),
            4 => self.rng.random_range(-0.1..0.0),
            _ => self.rng.random_range(-0.05..0.05),
        };
        self.count += 1;

        let ecg = ((RESTING_ECG + spike + stress * 0.2) * ADC_SCALE).floor() / ADC_SCALE;
        let temperature = RESTING_TEMP + self.rng.random_range(-0.1..0.3) + stress * 2.0;
        let bpm = RESTING_BPM + stress * 150.0 + self.rng.random_range(-2.0..2.0);

        let mut sample = Sample::new(ecg, bpm, temperature);
        sample.timestamp = Some(chrono::Utc::now().timestamp_millis() as f64 / 1000.0);
        if let Some(baseline) = self.baseline {
            sample.ecg_change_percent =
                Some((ecg - baseline.ecg_voltage) / baseline.ecg_voltage * 100.0);
            sample.temp_change_celsius = Some(temperature - baseline.temperature_c);
        }
        sample
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_snapshot(samples: &[Sample]) -> BaselineSnapshot {
    let n = samples.len().max(1) as f64;
    let mean = |f: fn(&Sample) -> f64| samples.iter().map(f).sum::<f64>() / n;
    BaselineSnapshot {
        ecg_voltage: mean(|s| s.ecg_voltage),
        bpm: mean(|s| s.bpm),
        temperature_c: mean(|s| s.temperature),
    }
}

/// Keeps every `ceil(len / 120)`-th sample, starting with the first.
#[must_use]
pub fn downsample(samples: &[Sample]) -> Vec<Sample> {
    let step = samples.len().div_ceil(MAX_CHART_POINTS).max(1);
    samples.iter().step_by(step).copied().collect()
}

// ============================================================================
// Link
// ============================================================================

struct Recording {
    samples: Vec<Sample>,
    token: CancellationToken,
}

struct Shared {
    generator: SignalGenerator,
    recording: Option<Recording>,
    baseline_task: Option<CancellationToken>,
}

/// Simulated acquisition service.
///
/// - Acknowledges `initialize_system` and both questionnaire saves.
/// - `start_baseline` answers after `duration` seconds with the mean of
///   the readings taken meanwhile.
/// - `start_session` streams `sensor_data` every 100 ms until stopped.
/// - `stop_session` returns the recorded series, down-sampled to at most
///   120 points.
pub struct DemoLink {
    tx: mpsc::UnboundedSender<InboundEvent>,
    rx: Mutex<mpsc::UnboundedReceiver<InboundEvent>>,
    shared: Arc<StdMutex<Shared>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for DemoLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = lock(&self.shared);
        f.debug_struct("DemoLink")
            .field("recording", &shared.recording.is_some())
            .field("readings", &shared.generator.count)
            .finish_non_exhaustive()
    }
}

impl DemoLink {
    /// Demo link with an OS-seeded generator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Demo link with a reproducible generator.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            shared: Arc::new(StdMutex::new(Shared {
                generator: SignalGenerator::new(rng),
                recording: None,
                baseline_task: None,
            })),
            shutdown: CancellationToken::new(),
        }
    }

    fn reply(&self, event: InboundEvent) {
        trace!(event = event.event_name(), "demo reply");
        // The receiving half lives in `self`.
        let _ = self.tx.send(event);
    }

    fn start_baseline(&self, duration: u32) {
        let token = self.shutdown.child_token();
        if let Some(previous) = lock(&self.shared).baseline_task.replace(token.clone()) {
            previous.cancel();
        }
        let shared = Arc::clone(&self.shared);
        let tx = self.tx.clone();
        let readings = u64::from(duration) * 10;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + READING_INTERVAL, READING_INTERVAL);
            let mut samples = Vec::new();
            for _ in 0..readings {
                tokio::select! {
                    () = token.cancelled() => return,
                    _ = ticker.tick() => {
                        let sample = lock(&shared).generator.next_sample();
                        samples.push(sample);
                    }
                }
            }
            let snapshot = mean_snapshot(&samples);
            {
                let mut state = lock(&shared);
                state.generator.baseline = Some(snapshot);
                state.baseline_task = None;
            }
            debug!(readings = samples.len(), "demo baseline complete");
            let _ = tx.send(InboundEvent::BaselineComplete(snapshot));
        });
    }

    fn start_session(&self, phase: String) {
        let token = {
            let mut state = lock(&self.shared);
            if state.recording.is_some() {
                debug!("demo session already recording");
                None
            } else {
                let token = self.shutdown.child_token();
                state.recording = Some(Recording {
                    samples: Vec::new(),
                    token: token.clone(),
                });
                Some(token)
            }
        };
        self.reply(InboundEvent::SessionStarted {
            phase,
            session_name: Some(format!("demo-{}", Uuid::new_v4())),
        });
        let Some(token) = token else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + READING_INTERVAL, READING_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let sample = {
                            let mut state = lock(&shared);
                            let sample = state.generator.next_sample();
                            match state.recording.as_mut() {
                                Some(rec) => rec.samples.push(sample),
                                None => break,
                            }
                            sample
                        };
                        if tx.send(InboundEvent::SensorData(sample)).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn stop_session(&self) {
        let recording = lock(&self.shared).recording.take();
        let stopped = match recording {
            Some(rec) => {
                rec.token.cancel();
                let series = SampleSeries::new(downsample(&rec.samples));
                debug!(
                    recorded = rec.samples.len(),
                    sent = series.len(),
                    "demo session stopped"
                );
                SessionStopped::with_samples(series)
            }
            None => SessionStopped {
                success: false,
                chart_data: SampleSeries::default(),
                summary: None,
                error: Some("no active session".to_string()),
            },
        };
        self.reply(InboundEvent::SessionStopped(stopped));
    }

    fn reset(&self) {
        {
            let mut state = lock(&self.shared);
            if let Some(rec) = state.recording.take() {
                rec.token.cancel();
            }
            if let Some(task) = state.baseline_task.take() {
                task.cancel();
            }
            state.generator.baseline = None;
            state.generator.count = 0;
        }
        self.reply(InboundEvent::SystemReset);
    }
}

impl Default for DemoLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DemoLink {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait::async_trait]
impl ServiceLink for DemoLink {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        debug!(event = message.event_name(), "demo service received");
        match message {
            OutboundMessage::InitializeSystem {} => self.reply(InboundEvent::SystemInitialized {
                success: true,
                message: "demo mode: simulated readings".to_string(),
            }),
            OutboundMessage::SaveHamiltonPre { .. } => {
                self.reply(InboundEvent::HamiltonPreSaved { success: true });
            }
            OutboundMessage::StartBaseline { duration } => self.start_baseline(*duration),
            OutboundMessage::StartSession { phase } => self.start_session(phase.clone()),
            OutboundMessage::StopSession {} => self.stop_session(),
            OutboundMessage::SaveHamiltonPost { .. } => {
                self.reply(InboundEvent::HamiltonPostSaved { success: true });
            }
            OutboundMessage::ResetSystem {} => self.reset(),
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Option<InboundEvent>> {
        Ok(self.rx.lock().await.recv().await)
    }

    fn kind(&self) -> LinkKind {
        LinkKind::Demo
    }
}

fn lock(shared: &StdMutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    async fn next(link: &DemoLink) -> InboundEvent {
        timeout(Duration::from_secs(60), link.receive())
            .await
            .expect("demo link went quiet")
            .unwrap()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledges_setup_messages() {
        let link = DemoLink::seeded(1);
        link.send(&OutboundMessage::InitializeSystem {}).await.unwrap();
        assert!(matches!(
            next(&link).await,
            InboundEvent::SystemInitialized { success: true, .. }
        ));
        link.send(&OutboundMessage::SaveHamiltonPost {
            responses: biocalm_core::QuestionnaireResponses::new(),
            psychic: 0,
            somatic: 0,
            total: 0,
        })
        .await
        .unwrap();
        assert_eq!(
            next(&link).await,
            InboundEvent::HamiltonPostSaved { success: true }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn baseline_arrives_after_the_window() {
        let link = DemoLink::seeded(2);
        link.send(&OutboundMessage::StartBaseline { duration: 2 })
            .await
            .unwrap();
        assert!(
            timeout(Duration::from_millis(1900), link.receive())
                .await
                .is_err()
        );
        let InboundEvent::BaselineComplete(b) = next(&link).await else {
            panic!("expected baseline_complete");
        };
        assert!((1.5..2.2).contains(&b.ecg_voltage), "{b:?}");
        assert!((36.3..36.9).contains(&b.temperature_c), "{b:?}");
        assert!((69.0..76.0).contains(&b.bpm), "{b:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn session_streams_and_returns_series() {
        let link = DemoLink::seeded(3);
        link.send(&OutboundMessage::start_session()).await.unwrap();
        let InboundEvent::SessionStarted {
            phase,
            session_name,
        } = next(&link).await
        else {
            panic!("expected session_started");
        };
        assert_eq!(phase, "activation");
        assert!(session_name.unwrap().starts_with("demo-"));

        sleep(Duration::from_millis(1050)).await;
        link.send(&OutboundMessage::StopSession {}).await.unwrap();

        let mut streamed = 0;
        let stopped = loop {
            match next(&link).await {
                InboundEvent::SensorData(_) => streamed += 1,
                InboundEvent::SessionStopped(s) => break s,
                other => panic!("unexpected {other:?}"),
            }
        };
        assert_eq!(streamed, 10);
        assert!(stopped.success);
        assert_eq!(stopped.chart_data.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_session_fails() {
        let link = DemoLink::seeded(4);
        link.send(&OutboundMessage::StopSession {}).await.unwrap();
        let InboundEvent::SessionStopped(s) = next(&link).await else {
            panic!("expected session_stopped");
        };
        assert!(!s.success);
        assert_eq!(s.error.as_deref(), Some("no active session"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_baseline() {
        let link = DemoLink::seeded(5);
        link.send(&OutboundMessage::StartBaseline { duration: 1 })
            .await
            .unwrap();
        link.send(&OutboundMessage::ResetSystem {}).await.unwrap();
        assert_eq!(next(&link).await, InboundEvent::SystemReset);
        assert!(
            timeout(Duration::from_secs(5), link.receive())
                .await
                .is_err()
        );
    }

    #[test]
    fn downsample_caps_at_max_points() {
        let samples: Vec<Sample> = (0..300)
            .map(|i| Sample::new(f64::from(i), 70.0, 36.5))
            .collect();
        let out = downsample(&samples);
        assert_eq!(out.len(), 100);
        assert_eq!(out[1].ecg_voltage, 3.0);

        assert_eq!(downsample(&samples[..240]).len(), 120);
        assert_eq!(downsample(&samples[..241]).len(), 81);
        assert_eq!(downsample(&samples[..50]).len(), 50);
        assert!(downsample(&[]).is_empty());
    }
}
