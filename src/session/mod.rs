//! Guided session.
//!
//! [`Orchestrator`] owns the phase state machine and everything that lives
//! inside a phase. [`runtime::run_session`] drives it from the service
//! link, the timer service and the operator console.

pub mod command;
pub mod orchestrator;
pub mod runtime;

use biocalm_core::GameKind;
use serde::Serialize;

use crate::game::GameStep;

pub use command::{CommandError, OperatorCommand};
pub use orchestrator::{Orchestrator, SessionChannels};
pub use runtime::{RunOutcome, run_session};

/// What a countdown is measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPurpose {
    /// Baseline capture progress
    Baseline,
    /// Game time limit
    Game,
    /// Regulation auto-stop
    Regulation,
}

/// Delayed work the orchestrator schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTask {
    /// Game-internal step
    Game(GameStep),
    /// Game time is up; move on to regulation
    TimeUp,
    /// Show the next breathing prompt
    Breathe,
    /// `session_stopped` is overdue
    StopWatchdog,
}

/// Diagnostic snapshot served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Current phase name
    pub phase: &'static str,
    /// Whether the service link is up
    pub connected: bool,
    /// Whether the service confirmed the recording started
    pub session_started: bool,
    /// Running game, if any
    pub game: Option<GameKind>,
    /// Whether a baseline snapshot was received
    pub baseline_ready: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            phase: "idle",
            connected: false,
            session_started: false,
            game: None,
            baseline_ready: false,
        }
    }
}
