mod catch_up;
mod engine;
mod progress;
mod session;

pub use catch_up::CatchUpReport;
pub use engine::{Phase, RunSnapshot, RunState, TimerEngine};
pub use progress::{interval_progress, overall_progress};
pub use session::{Confirmation, Interval, Session, MAX_DURATION_SECS};
