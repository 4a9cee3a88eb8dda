use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// How the engine continues once the previous interval runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    /// Start counting down as soon as the interval is entered.
    #[default]
    Automatic,
    /// Hold the run until the user confirms.
    Manual,
}

impl Confirmation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confirmation::Automatic => "automatic",
            Confirmation::Manual => "manual",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Confirmation::Automatic => "Automatic",
            Confirmation::Manual => "Manual Confirmation",
        }
    }

    /// Parse a stored value. Anything unrecognised reads back as `Automatic`.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "manual" => Confirmation::Manual,
            _ => Confirmation::Automatic,
        }
    }
}

impl<'de> Deserialize<'de> for Confirmation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Confirmation::from_stored(&raw))
    }
}

/// Longest interval a session may run: one week.
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub id: Uuid,
    pub label: String,
    /// Duration in seconds.
    pub duration_secs: u64,
    #[serde(default)]
    pub confirmation: Confirmation,
    pub order_index: u32,
}

impl Interval {
    pub fn new(label: impl Into<String>, duration_secs: u64, confirmation: Confirmation) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            duration_secs,
            confirmation,
            order_index: 0,
        }
    }

    /// Get interval duration in milliseconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_ms(&self) -> u64 {
        self.duration_secs.saturating_mul(1000)
    }

    pub fn is_manual(&self) -> bool {
        self.confirmation == Confirmation::Manual
    }
}

/// A named, ordered list of intervals run as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub intervals: Vec<Interval>,
}

fn default_icon() -> String {
    "timer".into()
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            icon: default_icon(),
            created_at: Utc::now(),
            intervals: Vec::new(),
        }
    }

    /// Builder-style helper, mostly for tests and fixtures.
    pub fn with_interval(
        mut self,
        label: impl Into<String>,
        duration_secs: u64,
        confirmation: Confirmation,
    ) -> Self {
        self.add_interval(label, duration_secs, confirmation);
        self
    }

    /// Intervals ordered by `order_index`.
    pub fn sorted_intervals(&self) -> Vec<Interval> {
        let mut intervals = self.intervals.clone();
        intervals.sort_by_key(|i| i.order_index);
        intervals
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.intervals
            .iter()
            .fold(0, |total, i| total.saturating_add(i.duration_secs))
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.intervals
            .iter()
            .fold(0, |total, i| total.saturating_add(i.duration_ms()))
    }

    /// Milliseconds completed up to (but not including) `index`, in run order.
    pub fn cumulative_ms(&self, index: usize) -> u64 {
        self.intervals
            .iter()
            .take(index)
            .fold(0, |total, i| total.saturating_add(i.duration_ms()))
    }

    // ── Editing ──────────────────────────────────────────────────────

    /// Append an interval at the end of the run order.
    pub fn add_interval(
        &mut self,
        label: impl Into<String>,
        duration_secs: u64,
        confirmation: Confirmation,
    ) -> &Interval {
        let mut interval = Interval::new(label, duration_secs, confirmation);
        interval.order_index = self.intervals.len() as u32;
        self.intervals.push(interval);
        &self.intervals[self.intervals.len() - 1]
    }

    /// Remove an interval and close the gap in `order_index`.
    pub fn remove_interval(&mut self, id: Uuid) -> Option<Interval> {
        self.renumber();
        let pos = self.intervals.iter().position(|i| i.id == id)?;
        let removed = self.intervals.remove(pos);
        self.reindex();
        Some(removed)
    }

    /// Move the interval at run position `from` to position `to`.
    pub fn move_interval(&mut self, from: usize, to: usize) -> Result<(), EngineError> {
        self.renumber();
        let len = self.intervals.len();
        if from >= len || to >= len {
            return Err(EngineError::InvalidArgument(format!(
                "cannot move interval {from} to {to} in a session of {len}"
            )));
        }
        let interval = self.intervals.remove(from);
        self.intervals.insert(to, interval);
        self.reindex();
        Ok(())
    }

    /// Sort by `order_index` and reassign it densely from zero.
    pub fn renumber(&mut self) {
        self.intervals.sort_by_key(|i| i.order_index);
        self.reindex();
    }

    /// Set `order_index` from each interval's position in the vector.
    fn reindex(&mut self) {
        for (idx, interval) in self.intervals.iter_mut().enumerate() {
            interval.order_index = idx as u32;
        }
    }

    /// Check the session can be run.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.intervals.is_empty() {
            return Err(EngineError::InvalidSession(format!(
                "session '{}' has no intervals",
                self.name
            )));
        }
        let mut seen: Vec<u32> = self.intervals.iter().map(|i| i.order_index).collect();
        seen.sort_unstable();
        if let Some(dup) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(EngineError::InvalidSession(format!(
                "session '{}' has duplicate order index {}",
                self.name, dup[0]
            )));
        }
        if let Some(long) = self.intervals.iter().find(|i| i.duration_secs > MAX_DURATION_SECS) {
            return Err(EngineError::InvalidSession(format!(
                "interval '{}' in session '{}' is longer than {MAX_DURATION_SECS}s",
                long.label, self.name
            )));
        }
        Ok(())
    }

    /// A copy with intervals stored in run order, as the engine consumes it.
    pub fn run_snapshot(&self) -> Self {
        let mut snapshot = self.clone();
        snapshot.intervals = self.sorted_intervals();
        snapshot
    }
}
