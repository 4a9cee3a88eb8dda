//! One-shot timer commands over a run persisted between invocations.
//!
//! Each invocation loads the saved run, replays the wall-clock time since
//! it was saved, applies one command and saves it again. Effects raised
//! along the way are printed with the resulting snapshot.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ticks_core::notifications::plan_notifications;
use ticks_core::storage::{Config, Database};
use ticks_core::{LiveStatus, RecordingSink, RunState, TimerEngine};

const RUN_KEY: &str = "timer_run";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session from its first interval
    Start {
        /// Session name, id or id prefix
        session: String,
    },
    /// Print current run state as JSON
    Status,
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Skip to the next interval
    Next,
    /// Continue past a manual interval
    Confirm,
    /// Abandon the run
    Stop,
    /// Mark the run as suspended; time passes without ticking
    Background,
    /// Return from suspension and replay the time missed
    Foreground,
    /// Print the live-status content for the run
    Live,
    /// Print the completion notifications that would be scheduled now
    Notifications,
}

/// A run as stored between invocations.
#[derive(Serialize, Deserialize)]
struct SavedRun {
    run: RunState,
    saved_at: DateTime<Utc>,
    /// When the run was sent to the background, while it is there.
    #[serde(default)]
    suspended_at: Option<DateTime<Utc>>,
}

fn load_run(db: &Database) -> Result<Option<SavedRun>, Box<dyn std::error::Error>> {
    match db.kv_get(RUN_KEY)? {
        Some(json) => match serde_json::from_str::<SavedRun>(&json) {
            Ok(saved) => Ok(Some(saved)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable saved run");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

fn save_run(
    db: &Database,
    engine: &TimerEngine<RecordingSink>,
    now: DateTime<Utc>,
    suspended_at: Option<DateTime<Utc>>,
) -> Result<(), Box<dyn std::error::Error>> {
    if engine.session().is_none() {
        db.kv_delete(RUN_KEY)?;
        return Ok(());
    }
    let saved = SavedRun {
        run: engine.run_state().clone(),
        saved_at: now,
        suspended_at: engine.is_backgrounded().then(|| suspended_at.unwrap_or(now)),
    };
    db.kv_set(RUN_KEY, &serde_json::to_string(&saved)?)?;
    Ok(())
}

/// Milliseconds from `since` to `now`; a clock that went backwards counts
/// as no time passing.
fn elapsed_ms(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (now - since).num_milliseconds();
    if ms < 0 {
        warn!(skew_ms = ms, "clock moved backwards since last save");
        return 0;
    }
    ms as u64
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();
    let now = Utc::now();

    let saved = load_run(&db)?;
    let (run, saved_at, suspended_at) = match saved {
        Some(s) => (s.run, Some(s.saved_at), s.suspended_at),
        None => (RunState::idle(), None, None),
    };
    let mut engine = TimerEngine::from_run_state(run, RecordingSink::new())?;

    if let Some(at) = saved_at {
        if engine.is_ticking() && !engine.is_backgrounded() {
            let report = engine.catch_up_ms(elapsed_ms(at, now));
            debug!(?report, "replayed time since last command");
        }
    }

    match action {
        TimerAction::Start { session } => {
            let session = db.resolve_session(&session)?;
            engine.start(session)?;
        }
        TimerAction::Status => {}
        TimerAction::Pause => engine.pause()?,
        TimerAction::Resume => engine.resume()?,
        TimerAction::Next => {
            engine.advance()?;
        }
        TimerAction::Confirm => engine.confirm_and_continue()?,
        TimerAction::Stop => engine.stop(),
        TimerAction::Background => engine.enter_background()?,
        TimerAction::Foreground => {
            let away_ms = suspended_at.or(saved_at).map(|at| elapsed_ms(at, now)).unwrap_or(0);
            engine.exit_background(away_ms as f64 / 1000.0)?;
        }
        TimerAction::Live => {
            if !config.live_status.enabled {
                return Err("live status is disabled (live_status.enabled = false)".into());
            }
            let status = LiveStatus::from_snapshot(&engine.snapshot(), now);
            println!("{}", serde_json::to_string_pretty(&status)?);
            save_run(&db, &engine, now, suspended_at)?;
            return Ok(());
        }
        TimerAction::Notifications => {
            let plan = if config.notifications.enabled {
                plan_notifications(engine.run_state(), now, &config.notifications.title)
            } else {
                Vec::new()
            };
            println!("{}", serde_json::to_string_pretty(&plan)?);
            save_run(&db, &engine, now, suspended_at)?;
            return Ok(());
        }
    }

    save_run(&db, &engine, now, suspended_at)?;
    let output = serde_json::json!({
        "effects": engine.sink().effects(),
        "snapshot": engine.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn elapsed_clamps_backwards_clock() {
        let now = Utc::now();
        assert_eq!(elapsed_ms(now - Duration::milliseconds(1500), now), 1500);
        assert_eq!(elapsed_ms(now + Duration::seconds(5), now), 0);
    }

    #[test]
    fn saved_run_roundtrip() {
        let saved = SavedRun {
            run: RunState::idle(),
            saved_at: Utc::now(),
            suspended_at: None,
        };
        let json = serde_json::to_string(&saved).unwrap();
        let back: SavedRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run, saved.run);
        assert_eq!(back.saved_at, saved.saved_at);
    }
}
