//! # Ticks Core Library
//!
//! Core logic for running a session: an ordered list of timed intervals,
//! each of which either rolls straight into the next one or waits for the
//! user to confirm before continuing.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A state machine over milliseconds remaining. The host
//!   calls `tick()` with elapsed time; the engine never reads a clock
//! - **Effects**: Side effects (alerts, feedback, live status) are reported
//!   through an injected [`EffectSink`]
//! - **Runner**: A tokio loop that ticks the engine and applies commands
//! - **Storage**: SQLite-based session storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core run state machine
//! - [`Session`]: Ordered intervals with per-interval confirmation
//! - [`Database`]: Session persistence
//! - [`Config`]: Application configuration management

pub mod effects;
pub mod error;
pub mod format;
pub mod live_status;
pub mod notifications;
pub mod runner;
pub mod storage;
pub mod timer;

pub use effects::{Effect, EffectSink, NullSink, RecordingSink, TracingSink};
pub use error::{ConfigError, CoreError, DatabaseError, EngineError, Result};
pub use live_status::{LiveState, LiveStatus};
pub use notifications::{plan_notifications, PlannedNotification};
pub use runner::{RunEnd, Runner, RunnerCommand};
pub use storage::{Config, Database, SessionStore};
pub use timer::{
    CatchUpReport, Confirmation, Interval, Phase, RunSnapshot, RunState, Session, TimerEngine,
};
