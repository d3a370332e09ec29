//! Session orchestrator.
//!
//! Owns the phase, the single live countdown, the running game and the
//! breathing guide. Every state change goes through a method here, and
//! every method leaves the phase untouched when it fails.
//!
//! Entering a phase always tears down the previous phase's countdown, its
//! game and its breathing guide. The stop watchdog is the exception: it
//! spans from `stop()` until the service confirms or the watchdog gives up.

use std::sync::Arc;

use biocalm_core::config::SessionConfig;
use biocalm_core::protocol::SessionStopped;
use biocalm_core::{
    BaselineSnapshot, Demographics, GameKind, InboundEvent, OutboundMessage,
    QuestionnaireResponses, QuestionnaireResult, SampleSeries, SessionPhase, Sex,
};
use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::{CountdownPurpose, SessionTask, StatusSnapshot};
use crate::breathing::BreathingGuide;
use crate::chart::{self, ChartSink};
use crate::error::SessionError;
use crate::game::{AnswerOutcome, GameCue, GameEngine, GameInput, GameState};
use crate::observability::metrics;
use crate::observability::{ViewEvent, ViewSink};
use crate::results::{ResultInputs, SessionResults};
use crate::sensor::SensorIndicators;
use crate::timer::{TaskGroup, TimerEvent, TimerService};

/// Receivers the owner of an [`Orchestrator`] must drain.
#[derive(Debug)]
pub struct SessionChannels {
    /// Control messages for the service link
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    /// Timer output, fed back through [`Orchestrator::handle_timer`]
    pub timer: mpsc::UnboundedReceiver<TimerEvent<SessionTask>>,
}

/// What was captured during the session.
#[derive(Debug, Default)]
struct SessionRecord {
    demographics: Option<Demographics>,
    pre: Option<QuestionnaireResult>,
    post: Option<QuestionnaireResult>,
    baseline: Option<BaselineSnapshot>,
    series: Option<SampleSeries>,
    /// `start_session` was sent
    start_sent: bool,
    /// The service confirmed the recording
    recording: bool,
}

/// Requests awaiting a service reply.
#[derive(Debug, Default)]
struct Pending {
    initialize: bool,
    baseline: bool,
    /// Re-sends used so far, while a stop is unconfirmed
    stop: Option<u32>,
    reset: bool,
    /// The game clock ran out; answers are locked until regulation starts
    time_up: bool,
}

/// The session state machine.
pub struct Orchestrator {
    config: Arc<SessionConfig>,
    phase: SessionPhase,
    timer: TimerService<SessionTask>,
    countdown: Option<CountdownPurpose>,
    game: Option<GameEngine>,
    guide: BreathingGuide,
    view: Arc<dyn ViewSink>,
    charts: Box<dyn ChartSink>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    status: watch::Sender<StatusSnapshot>,
    connected: bool,
    rng: StdRng,
    record: SessionRecord,
    pending: Pending,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &self.phase)
            .field("countdown", &self.countdown)
            .field("game", &self.game.as_ref().map(GameEngine::kind))
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an idle orchestrator. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(
        config: Arc<SessionConfig>,
        view: Arc<dyn ViewSink>,
        charts: Box<dyn ChartSink>,
        rng: StdRng,
    ) -> (Self, SessionChannels) {
        let (timer, timer_rx) = TimerService::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(StatusSnapshot::default());
        let guide = BreathingGuide::new(config.regulation.prompts.clone());
        let orchestrator = Self {
            config,
            phase: SessionPhase::Idle,
            timer,
            countdown: None,
            game: None,
            guide,
            view,
            charts,
            outbound,
            status,
            connected: false,
            rng,
            record: SessionRecord::default(),
            pending: Pending::default(),
        };
        (
            orchestrator,
            SessionChannels {
                outbound: outbound_rx,
                timer: timer_rx,
            },
        )
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Running game state, if a game is up.
    #[must_use]
    pub fn game_state(&self) -> Option<GameState> {
        self.game.as_ref().map(GameEngine::state)
    }

    /// Baseline snapshot, once delivered.
    #[must_use]
    pub const fn baseline(&self) -> Option<BaselineSnapshot> {
        self.record.baseline
    }

    /// Whether a stop is awaiting confirmation.
    #[must_use]
    pub const fn is_stopping(&self) -> bool {
        self.pending.stop.is_some()
    }

    /// Results derived from everything captured so far.
    #[must_use]
    pub fn results(&self) -> SessionResults {
        let empty = SampleSeries::default();
        SessionResults::compute(
            ResultInputs {
                demographics: self.record.demographics,
                pre: self.record.pre.as_ref(),
                post: self.record.post.as_ref(),
                baseline: self.record.baseline,
            },
            self.record.series.as_ref().unwrap_or(&empty),
            self.config.chart.sample_interval_secs,
        )
    }

    /// Status updates for diagnostics.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Forwards an event that did not come from the state machine.
    pub fn notify(&self, event: ViewEvent) {
        self.view.emit(event);
    }

    /// Records whether the service link is up.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        self.publish_status();
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Asks the service to arm acquisition. The phase advances when it
    /// acknowledges.
    ///
    /// # Errors
    ///
    /// Out of phase unless idle; protocol error if the link is closed.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        self.reported(|this| {
            this.require("initialize", this.phase == SessionPhase::Idle)?;
            if this.pending.initialize {
                debug!("initialization already requested");
                return Ok(());
            }
            this.send(OutboundMessage::InitializeSystem {})?;
            this.pending.initialize = true;
            Ok(())
        })
    }

    /// Stores demographics and moves on to the questionnaire.
    ///
    /// # Errors
    ///
    /// Validation error when no sex is selected or the age is zero.
    pub fn submit_demographics(&mut self, age: u16, sex: Option<Sex>) -> Result<(), SessionError> {
        self.reported(|this| {
            this.require(
                "submit demographics",
                this.phase == SessionPhase::AwaitingDemographics,
            )?;
            let sex = sex.ok_or_else(|| SessionError::validation("please select a sex"))?;
            if age == 0 {
                return Err(SessionError::validation("age must be a positive integer"));
            }
            this.record.demographics = Some(Demographics { age, sex });
            this.enter(SessionPhase::AwaitingQuestionnaire);
            Ok(())
        })
    }

    /// Scores the questionnaire, sends it for persistence with the
    /// demographics, and moves on to the baseline.
    ///
    /// # Errors
    ///
    /// Validation error naming the first unanswered or out-of-range item.
    pub fn submit_questionnaire(
        &mut self,
        responses: QuestionnaireResponses,
    ) -> Result<QuestionnaireResult, SessionError> {
        self.reported(|this| {
            this.require(
                "submit the questionnaire",
                this.phase == SessionPhase::AwaitingQuestionnaire,
            )?;
            let result =
                QuestionnaireResult::score(responses, this.config.questionnaire.max_item_score)
                    .map_err(|e| SessionError::validation(e.to_string()))?;
            let demographics = this
                .record
                .demographics
                .ok_or_else(|| SessionError::validation("demographics were not recorded"))?;
            this.send(OutboundMessage::save_hamilton_pre(&result, demographics))?;
            info!(
                psychic = result.psychic(),
                somatic = result.somatic(),
                total = result.total(),
                "questionnaire scored"
            );
            this.record.pre = Some(result.clone());
            this.enter(SessionPhase::Baseline);
            Ok(result)
        })
    }

    /// Starts the baseline progress countdown and asks the service for a
    /// snapshot. The two finish independently, in either order.
    ///
    /// # Errors
    ///
    /// Validation error for a zero duration.
    pub fn begin_baseline(&mut self, duration_secs: Option<u32>) -> Result<(), SessionError> {
        self.reported(|this| {
            this.require("begin the baseline", this.phase == SessionPhase::Baseline)?;
            let secs = duration_secs.unwrap_or(this.config.baseline.default_duration_secs);
            if secs == 0 {
                return Err(SessionError::validation(
                    "baseline duration must be a positive number of seconds",
                ));
            }
            this.send(OutboundMessage::StartBaseline { duration: secs })?;
            this.pending.baseline = true;
            this.start_countdown(CountdownPurpose::Baseline, secs);
            Ok(())
        })
    }

    /// Leaves the baseline for game selection.
    ///
    /// # Errors
    ///
    /// Out of phase unless in the baseline.
    pub fn proceed_to_activation(&mut self) -> Result<(), SessionError> {
        self.reported(|this| {
            this.require("proceed to activation", this.phase == SessionPhase::Baseline)?;
            if this.record.baseline.is_none() {
                debug!("proceeding without a baseline snapshot");
            }
            this.enter(SessionPhase::PhaseSelection);
            Ok(())
        })
    }

    /// Starts (or switches to) a game. The first selection in a session
    /// tells the service the recording starts.
    ///
    /// # Errors
    ///
    /// Out of phase unless selecting or already in activation.
    pub fn select_game(&mut self, kind: GameKind) -> Result<(), SessionError> {
        self.reported(|this| {
            this.require(
                "select a game",
                matches!(
                    this.phase,
                    SessionPhase::PhaseSelection | SessionPhase::Activation { .. }
                ),
            )?;
            if !this.record.start_sent {
                this.send(OutboundMessage::start_session())?;
                this.record.start_sent = true;
            }

            this.enter(SessionPhase::Activation { game: kind });
            let mut engine = GameEngine::new(kind, &this.config.games);
            let cues = engine.start(&mut this.rng);
            this.game = Some(engine);
            this.apply_cues(kind, cues);
            this.start_countdown(CountdownPurpose::Game, this.config.games.duration_secs);
            Ok(())
        })
    }

    /// Submits an answer to the running game.
    ///
    /// # Errors
    ///
    /// Out of phase without a running game; validation error when the input
    /// does not fit the game or the game clock has run out.
    pub fn submit_answer(&mut self, input: GameInput) -> Result<AnswerOutcome, SessionError> {
        self.reported(|this| {
            let phase = this.phase;
            let Some(game) = this.game.as_mut() else {
                return Err(SessionError::OutOfPhase {
                    operation: "answer",
                    phase: phase.to_string(),
                });
            };
            if this.pending.time_up {
                return Err(SessionError::validation("time is up"));
            }
            let judgement = game.submit(input, &mut this.rng)?;
            let (kind, score) = (game.kind(), game.score());

            metrics::record_answer(kind.as_str(), judgement.outcome.as_str());
            debug!(game = %kind, outcome = judgement.outcome.as_str(), score, "answer judged");
            this.view.emit(ViewEvent::AnswerJudged {
                game: kind,
                outcome: judgement.outcome,
                score,
            });
            this.apply_cues(kind, judgement.cues);
            Ok(judgement.outcome)
        })
    }

    /// Ends any game and starts the breathing block with its auto-stop
    /// countdown.
    ///
    /// # Errors
    ///
    /// Out of phase unless a game is running.
    pub fn begin_regulation(&mut self) -> Result<(), SessionError> {
        self.reported(|this| {
            this.require(
                "begin regulation",
                matches!(this.phase, SessionPhase::Activation { .. }),
            )?;
            this.enter(SessionPhase::Regulation);
            this.guide.restart();
            this.next_breath();
            this.start_countdown(
                CountdownPurpose::Regulation,
                this.config.regulation.auto_stop_secs,
            );
            Ok(())
        })
    }

    /// Tears down the running phase and asks the service to end the
    /// recording. The phase changes once the service confirms, or once the
    /// watchdog runs out of retries.
    ///
    /// # Errors
    ///
    /// Out of phase unless the recording was started and not yet stopped.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.reported(|this| {
            if this.pending.stop.is_some() {
                debug!("stop already requested");
                return Ok(());
            }
            this.require(
                "stop",
                this.record.start_sent
                    && matches!(
                        this.phase,
                        SessionPhase::PhaseSelection
                            | SessionPhase::Activation { .. }
                            | SessionPhase::Regulation
                    ),
            )?;
            this.teardown_phase();
            this.send(OutboundMessage::StopSession {})?;
            this.pending.stop = Some(0);
            this.arm_stop_watchdog();
            this.view.emit(ViewEvent::info("stopping session"));
            Ok(())
        })
    }

    /// Scores the post-session questionnaire and sends it for persistence.
    ///
    /// # Errors
    ///
    /// Out of phase before the session stopped; validation error for
    /// incomplete responses.
    pub fn submit_post_questionnaire(
        &mut self,
        responses: QuestionnaireResponses,
    ) -> Result<QuestionnaireResult, SessionError> {
        self.reported(|this| {
            this.require(
                "submit the post questionnaire",
                matches!(
                    this.phase,
                    SessionPhase::Stopped | SessionPhase::PostQuestionnaire
                ),
            )?;
            let result =
                QuestionnaireResult::score(responses, this.config.questionnaire.max_item_score)
                    .map_err(|e| SessionError::validation(e.to_string()))?;
            this.send(OutboundMessage::save_hamilton_post(&result))?;
            this.record.post = Some(result.clone());
            if this.phase == SessionPhase::Stopped {
                this.enter(SessionPhase::PostQuestionnaire);
            }
            Ok(result)
        })
    }

    /// Asks the service to clear everything. The client starts over when
    /// the service confirms.
    ///
    /// # Errors
    ///
    /// Protocol error if the link is closed.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.reported(|this| {
            this.timer.cancel_all();
            this.countdown = None;
            this.game = None;
            this.pending.stop = None;
            this.pending.time_up = false;
            this.send(OutboundMessage::ResetSystem {})?;
            this.pending.reset = true;
            this.view.emit(ViewEvent::info("resetting system"));
            Ok(())
        })
    }

    // ========================================================================
    // Inbound events
    // ========================================================================

    /// Routes one event from the service.
    pub fn handle_inbound(&mut self, event: InboundEvent) {
        let name = event.event_name();
        metrics::record_inbound(name);
        debug!(event = %name, phase = %self.phase, "inbound event");

        match event {
            InboundEvent::SystemInitialized { success, message } => {
                self.on_initialized(success, message);
            }
            InboundEvent::HamiltonPreSaved { success } => {
                if !success {
                    self.report(&SessionError::protocol(
                        "the service could not store the questionnaire",
                    ));
                }
            }
            InboundEvent::BaselineComplete(snapshot) => self.on_baseline(snapshot),
            InboundEvent::SessionStarted {
                phase,
                session_name,
            } => {
                info!(phase = %phase, session = ?session_name, "recording started");
                self.record.recording = true;
                self.publish_status();
                self.view.emit(ViewEvent::success(match session_name {
                    Some(name) => format!("recording started ({name})"),
                    None => "recording started".to_string(),
                }));
            }
            InboundEvent::SensorData(sample) => {
                if self.record.recording {
                    self.view.emit(ViewEvent::SensorUpdate {
                        indicators: SensorIndicators::from_sample(&sample),
                    });
                } else {
                    trace!("sensor reading before recording started, ignored");
                }
            }
            InboundEvent::SessionStopped(payload) => self.on_session_stopped(payload),
            InboundEvent::HamiltonPostSaved { success } => self.on_post_saved(success),
            InboundEvent::SystemReset => self.reinitialize(),
            InboundEvent::PhaseChanged { phase } => {
                debug!(service_phase = %phase, "service phase changed");
            }
            InboundEvent::Error { message } => self.report(&SessionError::protocol(message)),
            InboundEvent::Unknown { event } => {
                warn!(event = %event, "unknown inbound event ignored");
            }
        }
    }

    fn on_initialized(&mut self, success: bool, message: String) {
        if self.phase != SessionPhase::Idle {
            debug!("late system_initialized ignored");
            return;
        }
        self.pending.initialize = false;
        if success {
            self.enter(SessionPhase::AwaitingDemographics);
            self.view.emit(ViewEvent::success(if message.is_empty() {
                "system ready".to_string()
            } else {
                message
            }));
        } else {
            self.report(&SessionError::protocol(if message.is_empty() {
                "the service declined to initialize".to_string()
            } else {
                message
            }));
        }
    }

    fn on_baseline(&mut self, snapshot: BaselineSnapshot) {
        if !self.pending.baseline {
            warn!("baseline snapshot arrived without a request, ignored");
            return;
        }
        self.pending.baseline = false;
        info!(
            ecg = snapshot.ecg_voltage,
            bpm = snapshot.bpm,
            temperature = snapshot.temperature_c,
            "baseline received"
        );
        self.record.baseline = Some(snapshot);
        self.publish_status();
        self.view.emit(ViewEvent::BaselineReady { baseline: snapshot });
    }

    fn on_session_stopped(&mut self, payload: SessionStopped) {
        if self.pending.stop.is_none() {
            warn!("session_stopped without a pending stop, ignored");
            return;
        }
        if payload.success {
            self.finish_stop(payload.chart_data);
        } else {
            self.pending.stop = None;
            self.timer.cancel_group(TaskGroup::Watchdog);
            self.report(&SessionError::protocol(payload.error.unwrap_or_else(|| {
                "the service could not stop the session".to_string()
            })));
        }
    }

    fn on_post_saved(&mut self, success: bool) {
        if self.phase != SessionPhase::PostQuestionnaire {
            debug!("hamilton_post_saved outside the post questionnaire, ignored");
            return;
        }
        if success {
            self.enter(SessionPhase::Analysis);
            self.view.emit(ViewEvent::ResultsReady {
                results: Box::new(self.results()),
            });
        } else {
            self.report(&SessionError::protocol(
                "the service could not store the post questionnaire",
            ));
        }
    }

    // ========================================================================
    // Timer events
    // ========================================================================

    /// Handles one timer event. Stale events are dropped.
    pub fn handle_timer(&mut self, event: TimerEvent<SessionTask>) {
        if !self.timer.accept(&event) {
            trace!(?event, "stale timer event dropped");
            return;
        }
        match event {
            TimerEvent::Tick { remaining, .. } => {
                if let Some(purpose) = self.countdown {
                    self.view.emit(ViewEvent::CountdownTick { purpose, remaining });
                }
            }
            TimerEvent::Expired { .. } => {
                if let Some(purpose) = self.countdown.take() {
                    self.on_countdown_finished(purpose);
                }
            }
            TimerEvent::Task { task, .. } => self.on_task(task),
        }
    }

    fn on_countdown_finished(&mut self, purpose: CountdownPurpose) {
        debug!(?purpose, "countdown finished");
        self.view.emit(ViewEvent::CountdownFinished { purpose });
        match purpose {
            CountdownPurpose::Baseline => {}
            CountdownPurpose::Game => {
                self.view.emit(ViewEvent::warning("time's up"));
                self.view.emit(ViewEvent::InputLock { locked: true });
                self.pending.time_up = true;
                self.timer.schedule(
                    TaskGroup::Game,
                    self.config.games.time_up_delay,
                    SessionTask::TimeUp,
                );
            }
            CountdownPurpose::Regulation => {
                let _ = self.stop();
            }
        }
    }

    fn on_task(&mut self, task: SessionTask) {
        match task {
            SessionTask::Game(step) => {
                if let Some(game) = self.game.as_mut() {
                    let kind = game.kind();
                    let cues = game.on_step(step, &mut self.rng);
                    self.apply_cues(kind, cues);
                }
            }
            SessionTask::TimeUp => {
                let _ = self.begin_regulation();
            }
            SessionTask::Breathe => {
                if self.phase == SessionPhase::Regulation {
                    self.next_breath();
                }
            }
            SessionTask::StopWatchdog => self.on_stop_overdue(),
        }
    }

    fn on_stop_overdue(&mut self) {
        let Some(retries) = self.pending.stop else {
            return;
        };
        if retries < self.config.stop.max_retries {
            warn!(attempt = retries + 1, "session_stopped overdue, asking again");
            metrics::record_stop_retry();
            self.pending.stop = Some(retries + 1);
            if self.send(OutboundMessage::StopSession {}).is_ok() {
                self.arm_stop_watchdog();
                return;
            }
        }
        warn!("no session_stopped from the service, stopping locally");
        self.view
            .emit(ViewEvent::warning("the service did not confirm; stopped locally"));
        self.finish_stop(SampleSeries::default());
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn reported<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let result = op(self);
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    fn report(&self, error: &SessionError) {
        metrics::record_error(error.class().as_str());
        match error {
            SessionError::Validation { .. } | SessionError::OutOfPhase { .. } => {
                info!(error = %error, phase = %self.phase, "validation failed");
                self.view.emit(ViewEvent::ValidationFailed {
                    message: error.to_string(),
                });
            }
            SessionError::Protocol { .. } => {
                warn!(error = %error, phase = %self.phase, "protocol error");
                self.view.emit(ViewEvent::error(error.to_string()));
            }
            SessionError::DataUnavailable { .. } => {
                warn!(error = %error, "data unavailable");
                self.view.emit(ViewEvent::warning(error.to_string()));
            }
        }
    }

    fn require(&self, operation: &'static str, allowed: bool) -> Result<(), SessionError> {
        let phase = if self.pending.stop.is_some() {
            "stopping".to_string()
        } else if allowed {
            return Ok(());
        } else {
            self.phase.to_string()
        };
        Err(SessionError::OutOfPhase { operation, phase })
    }

    fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        let name = message.event_name();
        debug!(event = name, "outbound message");
        self.outbound
            .send(message)
            .map_err(|_| SessionError::protocol("the service link is closed"))?;
        metrics::record_outbound(name);
        Ok(())
    }

    fn enter(&mut self, phase: SessionPhase) {
        self.teardown_phase();
        let from = std::mem::replace(&mut self.phase, phase);
        metrics::record_phase_transition(from.name(), phase.name());
        info!(from = %from, to = %phase, "phase transition");
        self.view.emit(ViewEvent::PhaseEntered {
            phase: phase.name(),
            game: phase.game(),
        });
        self.publish_status();
    }

    fn teardown_phase(&mut self) {
        self.timer.cancel_countdown();
        self.countdown = None;
        self.timer.cancel_group(TaskGroup::Game);
        self.timer.cancel_group(TaskGroup::Guide);
        self.game = None;
        self.pending.time_up = false;
    }

    fn start_countdown(&mut self, purpose: CountdownPurpose, seconds: u32) {
        self.timer.start_countdown(seconds);
        self.countdown = Some(purpose);
    }

    fn arm_stop_watchdog(&mut self) {
        self.timer.schedule(
            TaskGroup::Watchdog,
            self.config.stop.confirm_timeout,
            SessionTask::StopWatchdog,
        );
    }

    fn next_breath(&mut self) {
        if let Some(prompt) = self.guide.next() {
            self.timer
                .schedule(TaskGroup::Guide, prompt.duration, SessionTask::Breathe);
            self.view.emit(ViewEvent::BreathingPrompt { prompt });
        }
    }

    fn apply_cues(&mut self, game: GameKind, cues: Vec<GameCue>) {
        for cue in cues {
            match cue {
                GameCue::Present(prompt) => {
                    self.view.emit(ViewEvent::ChallengePresented { game, prompt });
                }
                GameCue::Schedule { after, step } => {
                    self.timer
                        .schedule(TaskGroup::Game, after, SessionTask::Game(step));
                }
                GameCue::Highlight { color, hold } => {
                    self.view.emit(ViewEvent::SequenceHighlight {
                        color,
                        hold_ms: u64::try_from(hold.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                GameCue::InputLocked(locked) => {
                    self.view.emit(ViewEvent::InputLock { locked });
                }
            }
        }
    }

    fn finish_stop(&mut self, series: SampleSeries) {
        self.pending.stop = None;
        self.timer.cancel_group(TaskGroup::Watchdog);
        self.record.recording = false;
        info!(samples = series.len(), "session stopped");
        self.enter(SessionPhase::Stopped);

        let rendered = chart::render(self.charts.as_mut(), &series, &self.config.chart);
        self.record.series = Some(series);
        self.view.emit(ViewEvent::ResultsReady {
            results: Box::new(self.results()),
        });
        match rendered {
            Ok(charts) => self.view.emit(ViewEvent::ChartsRendered {
                charts: Box::new(charts),
            }),
            Err(e) => self.report(&e),
        }
    }

    fn reinitialize(&mut self) {
        if !self.pending.reset {
            info!("service reset without a request");
        }
        self.timer.cancel_all();
        self.countdown = None;
        self.game = None;
        self.guide.restart();
        self.record = SessionRecord::default();
        self.pending = Pending::default();
        if let Err(e) = self.charts.release() {
            warn!(error = %e, "could not release charts");
        }
        self.enter(SessionPhase::Idle);
        self.view.emit(ViewEvent::Reinitialized);
    }

    fn publish_status(&self) {
        self.status.send_replace(StatusSnapshot {
            phase: self.phase.name(),
            connected: self.connected,
            session_started: self.record.recording,
            game: self.phase.game(),
            baseline_ready: self.record.baseline.is_some(),
        });
    }
}
