//! Background catch-up.
//!
//! When the host comes back after being suspended, the time it missed is
//! replayed through the engine in one pass. Each interval boundary crossed
//! emits the same completed/started effects a live run would have, in
//! order. A manual gate or the end of the session absorbs whatever elapsed
//! time is left.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::engine::{secs_to_ms, Phase, TimerEngine};
use crate::effects::EffectSink;
use crate::error::EngineError;

/// What a catch-up pass did with the elapsed time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchUpReport {
    /// Milliseconds applied to the run.
    pub consumed_ms: u64,
    /// Milliseconds dropped at a manual gate, at completion, or because
    /// the run was not counting down.
    pub discarded_ms: u64,
    /// Interval boundaries crossed.
    pub boundaries_crossed: usize,
}

impl<S: EffectSink> TimerEngine<S> {
    /// Replay `elapsed_secs` of unobserved time.
    pub fn catch_up(&mut self, elapsed_secs: f64) -> Result<CatchUpReport, EngineError> {
        let elapsed_ms = secs_to_ms(elapsed_secs)?;
        Ok(self.catch_up_ms(elapsed_ms))
    }

    /// [`catch_up`](Self::catch_up) with the elapsed time in milliseconds.
    pub fn catch_up_ms(&mut self, elapsed_ms: u64) -> CatchUpReport {
        let mut elapsed = elapsed_ms;
        let mut report = CatchUpReport::default();

        while elapsed > 0 && self.run.phase() == Phase::Running {
            let remaining = self.run.remaining_ms();
            if elapsed >= remaining {
                elapsed -= remaining;
                report.consumed_ms = report.consumed_ms.saturating_add(remaining);
                self.set_remaining(0);
                self.advance_interval();
                report.boundaries_crossed += 1;
            } else {
                self.set_remaining(remaining - elapsed);
                report.consumed_ms = report.consumed_ms.saturating_add(elapsed);
                elapsed = 0;
            }
        }
        report.discarded_ms = elapsed;

        debug!(
            consumed_ms = report.consumed_ms,
            discarded_ms = report.discarded_ms,
            boundaries = report.boundaries_crossed,
            phase = %self.run.phase(),
            "caught up"
        );
        if report.consumed_ms > 0 || report.boundaries_crossed > 0 {
            self.publish_progress();
        }
        report
    }

    /// The host is back after `elapsed_secs` suspended.
    ///
    /// Catches up only if the run was counting down when it was suspended
    /// and still is. A bad `elapsed_secs` is rejected and the engine stays
    /// suspended.
    pub fn exit_background(&mut self, elapsed_secs: f64) -> Result<CatchUpReport, EngineError> {
        let elapsed_ms = secs_to_ms(elapsed_secs)?;
        let Some(suspended_in) = self.run.suspended_in() else {
            return Err(self.reject("exit background"));
        };
        self.clear_suspension();

        let report = if suspended_in == Phase::Running {
            self.catch_up_ms(elapsed_ms)
        } else {
            CatchUpReport {
                discarded_ms: elapsed_ms,
                ..CatchUpReport::default()
            }
        };
        if report.discarded_ms > 0 && report.consumed_ms > 0 {
            warn!(
                discarded_ms = report.discarded_ms,
                phase = %self.run.phase(),
                "suspended time absorbed by gate"
            );
        }

        let snapshot = self.snapshot();
        self.sink.on_exit_background(&snapshot);
        Ok(report)
    }
}
