//! Timer engine implementation.
//!
//! The engine is a state machine over caller-supplied time. It holds no
//! thread or timer and never reads the clock: the host calls `tick()` with
//! the wall-clock delta since the previous tick, and after a suspension
//! replays the unobserved time through `exit_background()`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |  ^
//!            v  |
//!   WaitingConfirmation
//!            |
//!            v
//!        Completed -> (stop) Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(RecordingSink::new());
//! engine.start(session)?;
//! // On the host's cadence, while engine.is_ticking():
//! engine.tick(0.1)?;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::progress;
use super::session::{Interval, Session};
use crate::effects::{EffectSink, NullSink};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Paused,
    /// Entered a manual interval; the run holds until confirmed.
    WaitingConfirmation,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::WaitingConfirmation => "waiting for confirmation",
            Phase::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// The mutable state of one run. Serializable so a host can persist it
/// across process restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Snapshot taken at `start`, intervals in run order.
    session: Option<Session>,
    current_index: usize,
    /// Remaining time in milliseconds for the current interval.
    remaining_ms: u64,
    phase: Phase,
    /// Phase at the moment the host was suspended, while suspended.
    #[serde(default)]
    suspended_in: Option<Phase>,
}

impl RunState {
    pub fn idle() -> Self {
        Self {
            session: None,
            current_index: 0,
            remaining_ms: 0,
            phase: Phase::Idle,
            suspended_in: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn suspended_in(&self) -> Option<Phase> {
        self.suspended_in
    }

    pub fn current_interval(&self) -> Option<&Interval> {
        self.session.as_ref()?.intervals.get(self.current_index)
    }

    fn interval_count(&self) -> usize {
        self.session.as_ref().map(|s| s.intervals.len()).unwrap_or(0)
    }

    /// Verify the run invariants, e.g. after loading a persisted run.
    pub fn check(&self) -> Result<(), EngineError> {
        let broken = |msg: String| Err(EngineError::InvalidSession(msg));
        match (&self.session, self.phase) {
            (None, Phase::Idle) => {
                if self.current_index != 0 || self.remaining_ms != 0 {
                    return broken("idle run has non-zero counters".into());
                }
                Ok(())
            }
            (None, phase) => broken(format!("{phase} run has no session attached")),
            (Some(_), Phase::Idle) => broken("idle run has a session attached".into()),
            (Some(session), phase) => {
                session.validate()?;
                let len = session.intervals.len();
                if (phase == Phase::Completed) != (self.current_index == len) {
                    return broken(format!(
                        "{phase} run at index {} of {len}",
                        self.current_index
                    ));
                }
                if self.current_index > len {
                    return broken(format!("index {} past end of {len}", self.current_index));
                }
                if let Some(current) = session.intervals.get(self.current_index) {
                    if self.remaining_ms > current.duration_ms() {
                        return broken(format!(
                            "remaining {}ms exceeds interval duration {}ms",
                            self.remaining_ms,
                            current.duration_ms()
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Read-only view of a run for presentation and live status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub session_id: Option<Uuid>,
    pub session_name: Option<String>,
    pub phase: Phase,
    pub current_index: usize,
    pub total_intervals: usize,
    pub current_interval: Option<Interval>,
    pub next_interval: Option<Interval>,
    pub time_remaining_ms: u64,
    /// 0.0 .. 1.0 progress within the current interval.
    pub interval_progress: f64,
    /// 0.0 .. 1.0 progress across the session.
    pub overall_progress: f64,
}

/// Core timer engine.
///
/// Owns the [`RunState`] and reports every transition to its sink.
#[derive(Debug)]
pub struct TimerEngine<S: EffectSink = NullSink> {
    pub(super) run: RunState,
    pub(super) sink: S,
}

impl Default for TimerEngine<NullSink> {
    fn default() -> Self {
        Self::new(NullSink)
    }
}

impl<S: EffectSink> TimerEngine<S> {
    /// Create an idle engine reporting to `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            run: RunState::idle(),
            sink,
        }
    }

    /// Rebuild an engine around a persisted run.
    pub fn from_run_state(run: RunState, sink: S) -> Result<Self, EngineError> {
        run.check()?;
        Ok(Self { run, sink })
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.run.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.run.session()
    }

    pub fn current_index(&self) -> usize {
        self.run.current_index
    }

    pub fn current_interval(&self) -> Option<&Interval> {
        self.run.current_interval()
    }

    pub fn next_interval(&self) -> Option<&Interval> {
        self.upcoming(1).first().copied()
    }

    /// Up to `n` intervals after the current one.
    pub fn upcoming(&self, n: usize) -> Vec<&Interval> {
        match self.run.session.as_ref() {
            Some(session) => session
                .intervals
                .iter()
                .skip(self.run.current_index + 1)
                .take(n)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn time_remaining_ms(&self) -> u64 {
        self.run.remaining_ms
    }

    pub fn time_remaining_secs(&self) -> f64 {
        self.run.remaining_ms as f64 / 1000.0
    }

    /// 0.0 .. 1.0 progress within the current interval.
    pub fn progress(&self) -> f64 {
        self.current_interval()
            .map(|i| progress::interval_progress(i, self.run.remaining_ms))
            .unwrap_or(0.0)
    }

    /// 0.0 .. 1.0 progress across the session.
    pub fn overall_progress(&self) -> f64 {
        progress::overall_progress(
            self.run.session.as_ref(),
            self.run.current_index,
            self.run.remaining_ms,
        )
    }

    /// Whether the host should be driving `tick()`.
    pub fn is_ticking(&self) -> bool {
        self.run.phase == Phase::Running
    }

    pub fn is_backgrounded(&self) -> bool {
        self.run.suspended_in.is_some()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let session = self.run.session.as_ref();
        RunSnapshot {
            session_id: session.map(|s| s.id),
            session_name: session.map(|s| s.name.clone()),
            phase: self.run.phase,
            current_index: self.run.current_index,
            total_intervals: self.run.interval_count(),
            current_interval: self.current_interval().cloned(),
            next_interval: self.next_interval().cloned(),
            time_remaining_ms: self.run.remaining_ms,
            interval_progress: self.progress(),
            overall_progress: self.overall_progress(),
        }
    }

    /// Push the current snapshot to the sink's progress hook.
    pub fn publish_progress(&mut self) {
        if self.run.phase == Phase::Idle {
            return;
        }
        let snapshot = self.snapshot();
        self.sink.on_progress_changed(&snapshot);
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a run of `session` from its first interval.
    ///
    /// Allowed from `Idle`, and from `Completed` as a fresh run (the
    /// finished run is torn down first).
    pub fn start(&mut self, session: Session) -> Result<(), EngineError> {
        match self.run.phase {
            Phase::Idle | Phase::Completed => {}
            _ => return Err(self.reject("start")),
        }
        if let Err(e) = session.validate() {
            warn!(session = %session.name, error = %e, "rejected session");
            return Err(e);
        }

        if self.run.phase == Phase::Completed {
            self.sink.on_run_stopped();
        }

        let session = session.run_snapshot();
        let first_ms = session.intervals[0].duration_ms();
        info!(session = %session.name, intervals = session.intervals.len(), "run started");
        self.run = RunState {
            session: Some(session),
            current_index: 0,
            remaining_ms: first_ms,
            phase: Phase::Running,
            suspended_in: None,
        };

        let Self { run, sink } = self;
        if let Some(first) = run.current_interval() {
            sink.on_interval_started(0, first);
        }
        self.publish_progress();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        if self.run.phase != Phase::Running {
            return Err(self.reject("pause"));
        }
        self.run.phase = Phase::Paused;
        debug!(remaining_ms = self.run.remaining_ms, "paused");
        self.publish_progress();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        if self.run.phase != Phase::Paused {
            return Err(self.reject("resume"));
        }
        self.run.phase = Phase::Running;
        debug!(remaining_ms = self.run.remaining_ms, "resumed");
        self.publish_progress();
        Ok(())
    }

    /// Count down `delta_secs` of wall-clock time.
    ///
    /// Returns the new phase if the interval ran out and the run advanced.
    pub fn tick(&mut self, delta_secs: f64) -> Result<Option<Phase>, EngineError> {
        let delta_ms = secs_to_ms(delta_secs)?;
        self.tick_ms(delta_ms)
    }

    /// [`tick`](Self::tick) with a delta already in milliseconds.
    ///
    /// A zero delta on an exhausted interval still advances, so a
    /// zero-length interval never stalls the run.
    pub fn tick_ms(&mut self, delta_ms: u64) -> Result<Option<Phase>, EngineError> {
        if self.run.phase != Phase::Running {
            return Err(self.reject("tick"));
        }
        self.run.remaining_ms = self.run.remaining_ms.saturating_sub(delta_ms);
        if self.run.remaining_ms == 0 {
            self.advance_interval();
            return Ok(Some(self.run.phase));
        }
        Ok(None)
    }

    /// Force the run on to the next interval.
    pub fn advance(&mut self) -> Result<Phase, EngineError> {
        match self.run.phase {
            Phase::Running | Phase::Paused | Phase::WaitingConfirmation => {}
            Phase::Idle | Phase::Completed => return Err(self.reject("advance")),
        }
        self.advance_interval();
        self.publish_progress();
        Ok(self.run.phase)
    }

    /// Release a manual gate and start the interval's countdown.
    pub fn confirm_and_continue(&mut self) -> Result<(), EngineError> {
        if self.run.phase != Phase::WaitingConfirmation {
            return Err(self.reject("confirm"));
        }
        self.run.phase = Phase::Running;
        let Self { run, sink } = self;
        if let Some(interval) = run.current_interval() {
            debug!(index = run.current_index, label = %interval.label, "confirmed");
            sink.on_interval_started(run.current_index, interval);
        }
        self.publish_progress();
        Ok(())
    }

    /// Abandon the run. Valid from any phase; the engine is idle on return.
    pub fn stop(&mut self) {
        let attached = self.run.session.is_some();
        self.run = RunState::idle();
        if attached {
            info!("run stopped");
            self.sink.on_run_stopped();
        }
    }

    /// The host is about to be suspended.
    ///
    /// Repeated calls while already suspended are ignored.
    pub fn enter_background(&mut self) -> Result<(), EngineError> {
        if self.run.phase == Phase::Idle {
            return Err(self.reject("enter background"));
        }
        if self.run.suspended_in.is_some() {
            return Ok(());
        }
        self.run.suspended_in = Some(self.run.phase);
        debug!(phase = %self.run.phase, "entered background");
        let snapshot = self.snapshot();
        self.sink.on_enter_background(&snapshot);
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Leave the current interval and enter the next one.
    pub(super) fn advance_interval(&mut self) {
        let Self { run, sink } = self;
        let Some(session) = run.session.as_ref() else {
            return;
        };

        let leaving = run.current_index;
        if let Some(interval) = session.intervals.get(leaving) {
            sink.on_interval_completed(leaving, interval);
        }

        run.current_index = leaving + 1;
        match session.intervals.get(run.current_index) {
            None => {
                run.current_index = session.intervals.len();
                run.remaining_ms = 0;
                run.phase = Phase::Completed;
                info!(session = %session.name, "session completed");
                sink.on_session_completed(session);
            }
            Some(next) => {
                run.remaining_ms = next.duration_ms();
                if next.is_manual() {
                    run.phase = Phase::WaitingConfirmation;
                    debug!(index = run.current_index, label = %next.label, "waiting for confirmation");
                    sink.on_confirmation_needed(run.current_index, next);
                } else {
                    run.phase = Phase::Running;
                    debug!(index = run.current_index, label = %next.label, "interval started");
                    sink.on_interval_started(run.current_index, next);
                }
            }
        }
    }

    pub(super) fn set_remaining(&mut self, remaining_ms: u64) {
        self.run.remaining_ms = remaining_ms;
    }

    pub(super) fn clear_suspension(&mut self) {
        self.run.suspended_in = None;
    }

    pub(super) fn reject(&self, command: &'static str) -> EngineError {
        warn!(command, phase = %self.run.phase, "rejected command");
        EngineError::InvalidTransition {
            command,
            phase: self.run.phase,
        }
    }
}

/// Convert a caller-supplied delta in seconds to whole milliseconds.
pub(super) fn secs_to_ms(secs: f64) -> Result<u64, EngineError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(EngineError::InvalidArgument(format!(
            "time delta must be a non-negative number of seconds, got {secs}"
        )));
    }
    Ok((secs * 1000.0).round() as u64)
}
