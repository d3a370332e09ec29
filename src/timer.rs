//! Countdowns and delayed tasks.
//!
//! The service owns at most one live countdown. Starting a countdown cancels
//! whichever one was running. Delayed tasks are grouped so a whole group can
//! be torn down on a phase change without tracking individual handles.
//!
//! Nothing here calls back into the owner. Timer output is delivered as
//! [`TimerEvent`]s on an unbounded channel that the owner drains from its
//! own event loop, and [`TimerService::accept`] filters out anything that
//! was queued before a cancellation took effect.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const TICK: Duration = Duration::from_secs(1);

/// Identifies one started countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CountdownId(u64);

/// Independent sets of delayed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskGroup {
    /// Game-internal steps and the time-up transition
    Game,
    /// Breathing prompt advances
    Guide,
    /// Stop confirmation watchdog
    Watchdog,
}

/// Output of the timer service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent<T> {
    /// One second elapsed on a countdown.
    Tick {
        /// Countdown that ticked
        id: CountdownId,
        /// Whole seconds left
        remaining: u32,
    },
    /// A countdown reached zero.
    Expired {
        /// Countdown that expired
        id: CountdownId,
    },
    /// A delayed task fell due.
    Task {
        /// Group the task was scheduled in
        group: TaskGroup,
        /// Group generation at scheduling time
        epoch: u64,
        /// The payload
        task: T,
    },
}

#[derive(Debug)]
struct GroupState {
    epoch: u64,
    token: CancellationToken,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            epoch: 0,
            token: CancellationToken::new(),
        }
    }
}

/// Countdown and delayed-task scheduler driven by `tokio::time`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TimerService<T> {
    tx: mpsc::UnboundedSender<TimerEvent<T>>,
    next_id: u64,
    countdown: Option<(CountdownId, CancellationToken)>,
    groups: HashMap<TaskGroup, GroupState>,
}

impl<T: Send + 'static> TimerService<T> {
    /// Creates a service and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerEvent<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_id: 0,
                countdown: None,
                groups: HashMap::new(),
            },
            rx,
        )
    }

    /// Starts a countdown of `total_seconds`, cancelling any live one.
    ///
    /// Emits exactly `total_seconds` ticks, one per elapsed second, with
    /// `remaining` counting down to zero, then one `Expired`. A zero-length
    /// countdown expires without ticking.
    pub fn start_countdown(&mut self, total_seconds: u32) -> CountdownId {
        self.cancel_countdown();

        self.next_id += 1;
        let id = CountdownId(self.next_id);
        let token = CancellationToken::new();
        let cancel = token.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            for remaining in (0..total_seconds).rev() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
                if tx.send(TimerEvent::Tick { id, remaining }).is_err() {
                    return;
                }
            }
            if !cancel.is_cancelled() {
                let _ = tx.send(TimerEvent::Expired { id });
            }
        });

        debug!(countdown = id.0, total_seconds, "countdown started");
        self.countdown = Some((id, token));
        id
    }

    /// Cancels the countdown `id`. No-op if it already expired, was
    /// cancelled, or was replaced.
    pub fn cancel(&mut self, id: CountdownId) {
        if self.countdown.as_ref().is_some_and(|(live, _)| *live == id) {
            self.cancel_countdown();
        }
    }

    /// Cancels whichever countdown is live.
    pub fn cancel_countdown(&mut self) {
        if let Some((id, token)) = self.countdown.take() {
            token.cancel();
            trace!(countdown = id.0, "countdown cancelled");
        }
    }

    /// The live countdown, if any.
    #[must_use]
    pub fn active_countdown(&self) -> Option<CountdownId> {
        self.countdown.as_ref().map(|(id, _)| *id)
    }

    /// Delivers `task` after `delay` unless `group` is cancelled first.
    pub fn schedule(&mut self, group: TaskGroup, delay: Duration, task: T) {
        let state = self.groups.entry(group).or_default();
        let epoch = state.epoch;
        let cancel = state.token.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(TimerEvent::Task { group, epoch, task });
                }
            }
        });
        trace!(?group, ?delay, "task scheduled");
    }

    /// Drops every pending task in `group`.
    pub fn cancel_group(&mut self, group: TaskGroup) {
        let state = self.groups.entry(group).or_default();
        state.token.cancel();
        state.token = CancellationToken::new();
        state.epoch += 1;
        trace!(?group, epoch = state.epoch, "task group cancelled");
    }

    /// Cancels the countdown and every task group.
    pub fn cancel_all(&mut self) {
        self.cancel_countdown();
        for group in [TaskGroup::Game, TaskGroup::Guide, TaskGroup::Watchdog] {
            self.cancel_group(group);
        }
    }

    /// Whether `event` is still current.
    ///
    /// Events queued before a cancellation are rejected. An accepted
    /// `Expired` retires the countdown.
    pub fn accept(&mut self, event: &TimerEvent<T>) -> bool {
        match event {
            TimerEvent::Tick { id, .. } => self.active_countdown() == Some(*id),
            TimerEvent::Expired { id } => {
                if self.active_countdown() == Some(*id) {
                    self.countdown = None;
                    true
                } else {
                    false
                }
            }
            TimerEvent::Task { group, epoch, .. } => self
                .groups
                .get(group)
                .map_or(*epoch == 0, |state| state.epoch == *epoch),
        }
    }
}
