//! Content for an ambient live-status surface (lock screen, menu bar,
//! widget). Built from a [`RunSnapshot`] so renderers never touch the engine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::{Phase, RunSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveState {
    Running,
    Paused,
    Waiting,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub session_id: Uuid,
    pub session_name: String,
    pub current_interval_label: String,
    pub current_interval_index: usize,
    pub total_intervals: usize,
    /// When the current interval runs out. Only set while counting down,
    /// so a renderer can show a self-updating countdown.
    pub interval_ends_at: Option<DateTime<Utc>>,
    pub time_remaining_ms: u64,
    pub overall_progress: f64,
    pub state: LiveState,
    pub next_interval_label: Option<String>,
}

impl LiveStatus {
    /// `None` when no run is attached.
    pub fn from_snapshot(snapshot: &RunSnapshot, now: DateTime<Utc>) -> Option<Self> {
        let state = match snapshot.phase {
            Phase::Idle => return None,
            Phase::Running => LiveState::Running,
            Phase::Paused => LiveState::Paused,
            Phase::WaitingConfirmation => LiveState::Waiting,
            Phase::Completed => LiveState::Completed,
        };
        let interval_ends_at = (state == LiveState::Running)
            .then(|| now + Duration::milliseconds(snapshot.time_remaining_ms as i64));

        Some(Self {
            session_id: snapshot.session_id?,
            session_name: snapshot.session_name.clone()?,
            current_interval_label: snapshot
                .current_interval
                .as_ref()
                .map(|i| i.label.clone())
                .unwrap_or_default(),
            current_interval_index: snapshot.current_index,
            total_intervals: snapshot.total_intervals,
            interval_ends_at,
            time_remaining_ms: snapshot.time_remaining_ms,
            overall_progress: snapshot.overall_progress,
            state,
            next_interval_label: snapshot.next_interval.as_ref().map(|i| i.label.clone()),
        })
    }

    /// "Interval 2 of 5"
    pub fn position_text(&self) -> String {
        let shown = (self.current_interval_index + 1).min(self.total_intervals);
        format!("Interval {} of {}", shown, self.total_intervals)
    }
}
