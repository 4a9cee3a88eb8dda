//! Effect sink: where the engine reports its transitions.
//!
//! The engine calls the sink synchronously at the point of each transition.
//! Haptics, local notifications and the live-status surface are bound by
//! the host through this trait; a sink must never block or fail the engine,
//! so every method returns `()` and implementations swallow their own errors.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::timer::{Interval, RunSnapshot, Session};

/// Receiver of engine transitions. Every method defaults to a no-op.
pub trait EffectSink {
    fn on_interval_started(&mut self, _index: usize, _interval: &Interval) {}

    fn on_interval_completed(&mut self, _index: usize, _interval: &Interval) {}

    fn on_confirmation_needed(&mut self, _index: usize, _interval: &Interval) {}

    fn on_session_completed(&mut self, _session: &Session) {}

    /// Advisory. May be called at any cadence.
    fn on_progress_changed(&mut self, _snapshot: &RunSnapshot) {}

    fn on_enter_background(&mut self, _snapshot: &RunSnapshot) {}

    fn on_exit_background(&mut self, _snapshot: &RunSnapshot) {}

    /// The run was stopped: cancel pending notifications, end live status.
    fn on_run_stopped(&mut self) {}
}

impl<S: EffectSink + ?Sized> EffectSink for Box<S> {
    fn on_interval_started(&mut self, index: usize, interval: &Interval) {
        (**self).on_interval_started(index, interval)
    }
    fn on_interval_completed(&mut self, index: usize, interval: &Interval) {
        (**self).on_interval_completed(index, interval)
    }
    fn on_confirmation_needed(&mut self, index: usize, interval: &Interval) {
        (**self).on_confirmation_needed(index, interval)
    }
    fn on_session_completed(&mut self, session: &Session) {
        (**self).on_session_completed(session)
    }
    fn on_progress_changed(&mut self, snapshot: &RunSnapshot) {
        (**self).on_progress_changed(snapshot)
    }
    fn on_enter_background(&mut self, snapshot: &RunSnapshot) {
        (**self).on_enter_background(snapshot)
    }
    fn on_exit_background(&mut self, snapshot: &RunSnapshot) {
        (**self).on_exit_background(snapshot)
    }
    fn on_run_stopped(&mut self) {
        (**self).on_run_stopped()
    }
}

/// Fan out to two sinks, first `A` then `B`.
impl<A: EffectSink, B: EffectSink> EffectSink for (A, B) {
    fn on_interval_started(&mut self, index: usize, interval: &Interval) {
        self.0.on_interval_started(index, interval);
        self.1.on_interval_started(index, interval);
    }
    fn on_interval_completed(&mut self, index: usize, interval: &Interval) {
        self.0.on_interval_completed(index, interval);
        self.1.on_interval_completed(index, interval);
    }
    fn on_confirmation_needed(&mut self, index: usize, interval: &Interval) {
        self.0.on_confirmation_needed(index, interval);
        self.1.on_confirmation_needed(index, interval);
    }
    fn on_session_completed(&mut self, session: &Session) {
        self.0.on_session_completed(session);
        self.1.on_session_completed(session);
    }
    fn on_progress_changed(&mut self, snapshot: &RunSnapshot) {
        self.0.on_progress_changed(snapshot);
        self.1.on_progress_changed(snapshot);
    }
    fn on_enter_background(&mut self, snapshot: &RunSnapshot) {
        self.0.on_enter_background(snapshot);
        self.1.on_enter_background(snapshot);
    }
    fn on_exit_background(&mut self, snapshot: &RunSnapshot) {
        self.0.on_exit_background(snapshot);
        self.1.on_exit_background(snapshot);
    }
    fn on_run_stopped(&mut self) {
        self.0.on_run_stopped();
        self.1.on_run_stopped();
    }
}

/// Sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EffectSink for NullSink {}

/// A recorded sink call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    IntervalStarted {
        index: usize,
        label: String,
        duration_secs: u64,
    },
    IntervalCompleted {
        index: usize,
        label: String,
    },
    ConfirmationNeeded {
        index: usize,
        label: String,
    },
    SessionCompleted {
        session_id: Uuid,
        session_name: String,
    },
    ProgressChanged {
        snapshot: RunSnapshot,
    },
    EnteredBackground,
    ExitedBackground,
    RunStopped,
}

impl Effect {
    /// True for effects emitted when an interval boundary is crossed.
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            Effect::IntervalStarted { .. }
                | Effect::IntervalCompleted { .. }
                | Effect::ConfirmationNeeded { .. }
                | Effect::SessionCompleted { .. }
        )
    }
}

/// Sink that keeps every call as an [`Effect`], in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    effects: Vec<Effect>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Boundary effects only, progress and background hooks filtered out.
    pub fn boundaries(&self) -> Vec<Effect> {
        self.effects.iter().filter(|e| e.is_boundary()).cloned().collect()
    }

    pub fn take(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

impl EffectSink for RecordingSink {
    fn on_interval_started(&mut self, index: usize, interval: &Interval) {
        self.effects.push(Effect::IntervalStarted {
            index,
            label: interval.label.clone(),
            duration_secs: interval.duration_secs,
        });
    }

    fn on_interval_completed(&mut self, index: usize, interval: &Interval) {
        self.effects.push(Effect::IntervalCompleted {
            index,
            label: interval.label.clone(),
        });
    }

    fn on_confirmation_needed(&mut self, index: usize, interval: &Interval) {
        self.effects.push(Effect::ConfirmationNeeded {
            index,
            label: interval.label.clone(),
        });
    }

    fn on_session_completed(&mut self, session: &Session) {
        self.effects.push(Effect::SessionCompleted {
            session_id: session.id,
            session_name: session.name.clone(),
        });
    }

    fn on_progress_changed(&mut self, snapshot: &RunSnapshot) {
        self.effects.push(Effect::ProgressChanged {
            snapshot: snapshot.clone(),
        });
    }

    fn on_enter_background(&mut self, _snapshot: &RunSnapshot) {
        self.effects.push(Effect::EnteredBackground);
    }

    fn on_exit_background(&mut self, _snapshot: &RunSnapshot) {
        self.effects.push(Effect::ExitedBackground);
    }

    fn on_run_stopped(&mut self) {
        self.effects.push(Effect::RunStopped);
    }
}

/// Sink that logs every transition through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EffectSink for TracingSink {
    fn on_interval_started(&mut self, index: usize, interval: &Interval) {
        info!(index, label = %interval.label, duration_secs = interval.duration_secs, "interval started");
    }

    fn on_interval_completed(&mut self, index: usize, interval: &Interval) {
        info!(index, label = %interval.label, "interval completed");
    }

    fn on_confirmation_needed(&mut self, index: usize, interval: &Interval) {
        info!(index, label = %interval.label, "confirmation needed");
    }

    fn on_session_completed(&mut self, session: &Session) {
        info!(session = %session.name, "session completed");
    }

    fn on_enter_background(&mut self, snapshot: &RunSnapshot) {
        info!(phase = %snapshot.phase, remaining_ms = snapshot.time_remaining_ms, "entered background");
    }

    fn on_exit_background(&mut self, snapshot: &RunSnapshot) {
        info!(phase = %snapshot.phase, remaining_ms = snapshot.time_remaining_ms, "exited background");
    }

    fn on_run_stopped(&mut self) {
        info!("run stopped");
    }
}
