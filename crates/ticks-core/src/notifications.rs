//! Local notification planning.
//!
//! When the host is suspended it cannot fire effects itself, so it hands
//! the platform a list of "interval complete" notifications to deliver on
//! its behalf and cancels them on return.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, RunState};

pub const DEFAULT_TITLE: &str = "Interval Complete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedNotification {
    /// Stable per interval so a reschedule replaces rather than duplicates.
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

/// Completions reachable from `run` without the user acting.
///
/// Starts with the current interval and follows automatic intervals,
/// stopping before the first manual gate, since nothing after it will run
/// until the user confirms. Empty unless the run is counting down.
pub fn plan_notifications(run: &RunState, now: DateTime<Utc>, title: &str) -> Vec<PlannedNotification> {
    if run.phase() != Phase::Running {
        return Vec::new();
    }
    let Some(session) = run.session() else {
        return Vec::new();
    };

    let mut plan = Vec::new();
    let mut offset_ms = run.remaining_ms();
    for (index, interval) in session.intervals.iter().enumerate().skip(run.current_index()) {
        if index > run.current_index() {
            if interval.is_manual() {
                break;
            }
            offset_ms = offset_ms.saturating_add(interval.duration_ms());
        }
        plan.push(PlannedNotification {
            id: notification_id(index),
            title: title.to_string(),
            body: interval.label.clone(),
            fire_at: now + Duration::milliseconds(offset_ms.min(i64::MAX as u64) as i64),
        });
    }
    plan
}

pub fn notification_id(index: usize) -> String {
    format!("interval-{index}")
}
