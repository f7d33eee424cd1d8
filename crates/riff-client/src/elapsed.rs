//! Elapsed time of a processing episode.
//!
//! [`ElapsedClock`] holds the arithmetic and is driven with explicit instants.
//! [`ElapsedTracker`] wraps it with a periodic ticker task that only runs while
//! the status is `Processing`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use riff_protocol::AgentStatus;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Snapshot for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Elapsed {
    pub elapsed_seconds: u64,
    pub start_time: Option<DateTime<Utc>>,
}

/// Episode clock.
///
/// Time spent awaiting approval is excluded, so a paused episode resumes from
/// the value it showed when it paused.
#[derive(Debug, Clone, Default)]
pub struct ElapsedClock {
    start_time: Option<DateTime<Utc>>,
    started_at: Option<Instant>,
    paused_since: Option<Instant>,
    paused_total: Duration,
    elapsed_seconds: u64,
    running: bool,
}

impl ElapsedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Apply a register transition observed at `now` (`wall` for display).
    pub fn on_transition(
        &mut self,
        previous: AgentStatus,
        current: AgentStatus,
        now: Instant,
        wall: DateTime<Utc>,
    ) {
        match current {
            AgentStatus::Processing => {
                if previous == AgentStatus::Processing && self.running {
                    return;
                }
                if self.started_at.is_none() {
                    self.started_at = Some(now);
                    self.start_time = Some(wall);
                    self.paused_total = Duration::ZERO;
                    self.elapsed_seconds = 0;
                } else if let Some(paused) = self.paused_since.take() {
                    self.paused_total += now.saturating_duration_since(paused);
                }
                self.running = true;
            }
            AgentStatus::AwaitingApproval => {
                if self.running {
                    self.tick(now);
                    self.running = false;
                    self.paused_since = Some(now);
                }
            }
            AgentStatus::Idle | AgentStatus::Error => self.reset(),
        }
    }

    /// Recompute the displayed seconds. No-op unless running.
    pub fn tick(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        if let Some(started) = self.started_at {
            let active = now
                .saturating_duration_since(started)
                .saturating_sub(self.paused_total);
            self.elapsed_seconds = active.as_secs();
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn elapsed(&self) -> Elapsed {
        Elapsed {
            elapsed_seconds: self.elapsed_seconds,
            start_time: self.start_time,
        }
    }
}

struct Ticker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Ticker {
    fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

struct TrackerState {
    clock: ElapsedClock,
    generation: u64,
    ticker: Option<Ticker>,
}

/// Clock plus the ticker that refreshes it while processing.
pub struct ElapsedTracker {
    state: Arc<Mutex<TrackerState>>,
    interval: Duration,
}

fn lock(state: &Mutex<TrackerState>) -> MutexGuard<'_, TrackerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ElapsedTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                clock: ElapsedClock::new(),
                generation: 0,
                ticker: None,
            })),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn on_transition(&self, previous: AgentStatus, current: AgentStatus) {
        let mut state = lock(&self.state);
        state.clock
            .on_transition(previous, current, Instant::now(), Utc::now());

        if state.clock.is_running() {
            let live = state.ticker.as_ref().is_some_and(|t| !t.task.is_finished());
            if !live {
                let generation = state.generation;
                state.ticker = self.spawn_ticker(generation);
            }
        } else if let Some(ticker) = state.ticker.take() {
            ticker.stop();
        }
    }

    /// Clear the episode and adopt `generation`; ticks from older generations
    /// are ignored.
    pub fn reset(&self, generation: u64) {
        let mut state = lock(&self.state);
        state.generation = generation;
        state.clock.reset();
        if let Some(ticker) = state.ticker.take() {
            ticker.stop();
        }
    }

    /// Stop ticking without clearing the displayed value.
    pub fn halt(&self) {
        let mut state = lock(&self.state);
        if let Some(ticker) = state.ticker.take() {
            ticker.stop();
        }
        state.clock.running = false;
    }

    pub fn elapsed(&self) -> Elapsed {
        lock(&self.state).clock.elapsed()
    }

    pub fn is_ticking(&self) -> bool {
        lock(&self.state)
            .ticker
            .as_ref()
            .is_some_and(|t| !t.task.is_finished())
    }

    fn spawn_ticker(&self, generation: u64) -> Option<Ticker> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; elapsed time will not refresh");
            return None;
        };

        let cancel = CancellationToken::new();
        let weak = Arc::downgrade(&self.state);
        let task = handle.spawn(run_ticker(weak, generation, self.interval, cancel.clone()));
        Some(Ticker { cancel, task })
    }
}

async fn run_ticker(
    state: Weak<Mutex<TrackerState>>,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(state) = state.upgrade() else { break };
                let mut state = lock(&state);
                if state.generation != generation || !state.clock.is_running() {
                    debug!("Stale elapsed ticker (generation {}) exiting", generation);
                    break;
                }
                state.clock.tick(Instant::now());
            }
        }
    }
}

impl Drop for ElapsedTracker {
    fn drop(&mut self) {
        if let Some(ticker) = lock(&self.state).ticker.take() {
            ticker.stop();
        }
    }
}
