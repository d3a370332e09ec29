//! View projection.
//!
//! The orchestrator never draws anything. It emits typed [`ViewEvent`]s to
//! a [`ViewSink`], and whatever presents the session subscribes there. The
//! JSONL [`EventEmitter`] stamps every event with a monotonically increasing
//! sequence number and a UTC timestamp.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use biocalm_core::{BaselineSnapshot, Color, GameKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::breathing::BreathingPrompt;
use crate::chart::ChartSet;
use crate::game::{AnswerOutcome, ChallengePrompt};
use crate::results::SessionResults;
use crate::sensor::SensorIndicators;
use crate::session::CountdownPurpose;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Neutral information
    Info,
    /// Something completed
    Success,
    /// Recoverable problem
    Warning,
    /// The service reported a failure
    Error,
}

/// A state change the presentation layer should reflect.
///
/// Tagged with `"type"` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ViewEvent {
    /// The session moved to a new phase.
    PhaseEntered {
        /// Phase name
        phase: &'static str,
        /// Game, when the phase is activation
        #[serde(skip_serializing_if = "Option::is_none")]
        game: Option<GameKind>,
    },

    /// Toast-style message.
    Notification {
        /// Severity
        level: NotificationLevel,
        /// Text
        message: String,
    },

    /// Operator input was rejected; the phase did not change.
    ValidationFailed {
        /// What was wrong
        message: String,
    },

    /// A countdown ticked.
    CountdownTick {
        /// What the countdown is for
        purpose: CountdownPurpose,
        /// Whole seconds left
        remaining: u32,
    },

    /// A countdown reached zero.
    CountdownFinished {
        /// What the countdown was for
        purpose: CountdownPurpose,
    },

    /// The service delivered the resting baseline.
    BaselineReady {
        /// The snapshot
        baseline: BaselineSnapshot,
    },

    /// A new game challenge is up.
    ChallengePresented {
        /// Running game
        game: GameKind,
        /// What to show
        prompt: ChallengePrompt,
    },

    /// An answer was judged.
    AnswerJudged {
        /// Running game
        game: GameKind,
        /// Verdict
        outcome: AnswerOutcome,
        /// Score, or level for sequence recall
        score: u32,
    },

    /// Light one sequence button.
    SequenceHighlight {
        /// Button colour
        color: Color,
        /// How long to keep it lit
        hold_ms: u64,
    },

    /// Game input was locked or unlocked.
    InputLock {
        /// Whether input is locked
        locked: bool,
    },

    /// Next breathing instruction.
    BreathingPrompt {
        /// The prompt
        #[serde(flatten)]
        prompt: BreathingPrompt,
    },

    /// Live sensor gauges.
    SensorUpdate {
        /// Both gauges
        #[serde(flatten)]
        indicators: SensorIndicators,
    },

    /// The results view changed.
    ResultsReady {
        /// Derived results
        results: Box<SessionResults>,
    },

    /// Charts were drawn to the chart sink.
    ChartsRendered {
        /// What was drawn
        charts: Box<ChartSet>,
    },

    /// The service reset; everything starts over.
    Reinitialized,
}

impl ViewEvent {
    /// Info-level notification.
    pub fn info(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    /// Success notification.
    pub fn success(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// Warning notification.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    /// Error notification.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Notification {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of view events. Emitting never fails from the caller's side.
pub trait ViewSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: ViewEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ViewSink for NoopSink {
    fn emit(&self, _event: ViewEvent) {}
}

/// Forwards events to a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ViewEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ViewSink for ChannelSink {
    fn emit(&self, event: ViewEvent) {
        // A dropped receiver means nobody is watching.
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: ViewEvent,
}

/// Buffered JSONL writer.
///
/// Each [`emit`](ViewSink::emit) takes the next sequence number, writes one
/// line and flushes. Serialization and I/O failures are dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Emitter writing to `writer`.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Emitter writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Emitter appending to `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Flushes the underlying writer.
    pub fn flush(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }
}

impl ViewSink for EventEmitter {
    fn emit(&self, event: ViewEvent) {
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            event,
        };
        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use biocalm_core::Sample;
    use biocalm_core::config::RegulationConfig;

    use super::*;
    use crate::breathing::BreathingGuide;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn lines(&self) -> Vec<serde_json::Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn emitter_writes_sequenced_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(ViewEvent::PhaseEntered {
            phase: "baseline",
            game: None,
        });
        emitter.emit(ViewEvent::CountdownTick {
            purpose: CountdownPurpose::Baseline,
            remaining: 9,
        });

        let lines = tw.lines();
        assert_eq!(emitter.event_count(), 2);
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "PhaseEntered");
        assert_eq!(lines[0]["phase"], "baseline");
        assert!(lines[0].get("game").is_none());
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["purpose"], "baseline");
        assert_eq!(lines[1]["remaining"], 9);
    }

    #[test]
    fn flattened_payloads() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        let prompt = BreathingGuide::new(RegulationConfig::default().prompts)
            .next()
            .unwrap();
        emitter.emit(ViewEvent::BreathingPrompt { prompt });
        let reading = Sample {
            ecg_change_percent: Some(12.0),
            ..Sample::new(1.0, 70.0, 36.5)
        };
        emitter.emit(ViewEvent::SensorUpdate {
            indicators: SensorIndicators::from_sample(&reading),
        });

        let lines = tw.lines();
        assert_eq!(lines[0]["stage"], "inhale");
        assert_eq!(lines[0]["duration_ms"], 4000);
        assert_eq!(lines[0]["text"], "Inhala profundamente...");
        assert_eq!(lines[1]["ecg"]["percent"], 60.0);
        assert_eq!(lines[1]["ecg"]["level"], "elevated");
    }

    #[test]
    fn from_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.jsonl");
        let emitter = EventEmitter::from_file(&path).unwrap();
        emitter.emit(ViewEvent::info("ready"));
        emitter.emit(ViewEvent::Reinitialized);

        let content = std::fs::read_to_string(&path).unwrap();
        let types: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["type"].to_string())
            .collect();
        assert_eq!(types, ["\"Notification\"", "\"Reinitialized\""]);
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(ViewEvent::InputLock { locked: true });
        assert_eq!(rx.try_recv().unwrap(), ViewEvent::InputLock { locked: true });
        drop(rx);
        sink.emit(ViewEvent::InputLock { locked: false });
    }
}
