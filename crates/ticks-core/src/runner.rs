//! Async host loop for a [`TimerEngine`].
//!
//! The runner owns the engine for the duration of a run. It measures real
//! time between ticks with a tokio interval and applies commands from an
//! mpsc channel one at a time, so the engine is never touched concurrently.
//! The interval only exists while the engine is counting down and the host
//! is in the foreground; it is rebuilt each time the run re-enters
//! `Running`, and dropped before the runner returns.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::effects::EffectSink;
use crate::error::EngineError;
use crate::storage::RunnerConfig;
use crate::timer::{CatchUpReport, Phase, TimerEngine};

/// Commands a presentation layer can send to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerCommand {
    Pause,
    Resume,
    Advance,
    Confirm,
    Stop,
    /// The host is being suspended; stop ticking and remember when.
    EnterBackground,
    /// The host is back; replay the time spent suspended.
    ExitBackground,
}

/// Why [`Runner::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Completed,
    Stopped,
    /// Every command sender was dropped.
    Disconnected,
}

pub struct Runner<S: EffectSink> {
    engine: TimerEngine<S>,
    cadence: Duration,
    progress_every: u32,
}

impl<S: EffectSink> Runner<S> {
    /// Wrap an engine that has already been started.
    pub fn new(engine: TimerEngine<S>, config: &RunnerConfig) -> Self {
        Self {
            engine,
            cadence: Duration::from_millis(config.tick_interval_ms.max(1)),
            progress_every: config.progress_every_ticks,
        }
    }

    pub fn engine(&self) -> &TimerEngine<S> {
        &self.engine
    }

    /// Drive the run until it completes, is stopped, or the command
    /// channel closes. Returns the engine so the host can inspect it.
    ///
    /// On `Stop` or disconnect the engine is stopped (idle) on return; on
    /// completion it is left `Completed`.
    pub async fn run(mut self, mut commands: mpsc::Receiver<RunnerCommand>) -> (TimerEngine<S>, RunEnd) {
        let mut ticker: Option<Ticker> = None;
        let mut suspended_at: Option<Instant> = None;
        let mut ticks_since_progress: u32 = 0;

        let end = loop {
            if self.engine.phase() == Phase::Completed {
                break RunEnd::Completed;
            }
            if self.engine.phase() == Phase::Idle {
                break RunEnd::Stopped;
            }

            let should_tick = self.engine.is_ticking() && !self.engine.is_backgrounded();
            match (should_tick, ticker.is_some()) {
                (true, false) => ticker = Some(Ticker::start(self.cadence)),
                (false, true) => ticker = None,
                _ => {}
            }

            tokio::select! {
                biased;

                cmd = commands.recv() => {
                    let Some(cmd) = cmd else {
                        self.engine.stop();
                        break RunEnd::Disconnected;
                    };
                    if cmd == RunnerCommand::Stop {
                        self.engine.stop();
                        break RunEnd::Stopped;
                    }
                    // Count the partial tick before the command lands, then
                    // restart the cadence from here.
                    if let Some(mut t) = ticker.take() {
                        let delta_ms = t.take_delta(Instant::now());
                        if let Err(e) = self.engine.tick_ms(delta_ms) {
                            warn!(error = %e, "tick rejected");
                        }
                    }
                    if self.engine.phase() == Phase::Completed {
                        break RunEnd::Completed;
                    }
                    if let Err(e) = self.apply(cmd, &mut suspended_at) {
                        warn!(command = ?cmd, error = %e, "command rejected");
                    }
                }

                now = next_tick(&mut ticker) => {
                    let Some(t) = ticker.as_mut() else { continue };
                    let delta_ms = t.take_delta(now);
                    if let Err(e) = self.engine.tick_ms(delta_ms) {
                        warn!(error = %e, "tick rejected");
                    }
                    ticks_since_progress += 1;
                    if self.progress_every > 0 && ticks_since_progress >= self.progress_every {
                        ticks_since_progress = 0;
                        self.engine.publish_progress();
                    }
                }
            }
        };

        debug!(?end, "runner finished");
        (self.engine, end)
    }

    fn apply(
        &mut self,
        cmd: RunnerCommand,
        suspended_at: &mut Option<Instant>,
    ) -> Result<Option<CatchUpReport>, EngineError> {
        match cmd {
            RunnerCommand::Pause => self.engine.pause()?,
            RunnerCommand::Resume => self.engine.resume()?,
            RunnerCommand::Advance => {
                self.engine.advance()?;
            }
            RunnerCommand::Confirm => self.engine.confirm_and_continue()?,
            RunnerCommand::Stop => self.engine.stop(),
            RunnerCommand::EnterBackground => {
                self.engine.enter_background()?;
                suspended_at.get_or_insert_with(Instant::now);
            }
            RunnerCommand::ExitBackground => {
                let elapsed = suspended_at
                    .take()
                    .map(|at| Instant::now().duration_since(at))
                    .unwrap_or_default();
                let report = self.engine.exit_background(elapsed.as_secs_f64())?;
                debug!(?report, "resumed from background");
                return Ok(Some(report));
            }
        }
        Ok(None)
    }
}

/// A tokio interval plus the anchor real deltas are measured from.
struct Ticker {
    interval: Interval,
    last: Instant,
}

impl Ticker {
    fn start(cadence: Duration) -> Self {
        let now = Instant::now();
        let mut interval = time::interval_at(now + cadence, cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, last: now }
    }

    /// Whole milliseconds since the previous tick. The sub-millisecond
    /// remainder is kept for the next tick.
    fn take_delta(&mut self, now: Instant) -> u64 {
        let delta_ms = now.saturating_duration_since(self.last).as_millis() as u64;
        self.last += Duration::from_millis(delta_ms);
        delta_ms
    }
}

async fn next_tick(ticker: &mut Option<Ticker>) -> Instant {
    match ticker {
        Some(t) => t.interval.tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Effect, RecordingSink};
    use crate::timer::{Confirmation, Session};

    fn config() -> RunnerConfig {
        RunnerConfig {
            tick_interval_ms: 100,
            progress_every_ticks: 0,
        }
    }

    fn started(session: Session) -> TimerEngine<RecordingSink> {
        let mut engine = TimerEngine::new(RecordingSink::new());
        engine.start(session).unwrap();
        engine
    }

    fn labels(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::IntervalStarted { label, .. } => Some(format!("start {label}")),
                Effect::IntervalCompleted { label, .. } => Some(format!("done {label}")),
                Effect::ConfirmationNeeded { label, .. } => Some(format!("wait {label}")),
                Effect::SessionCompleted { .. } => Some("complete".into()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn runs_automatic_session_to_completion() {
        let session = Session::new("Auto")
            .with_interval("A", 1, Confirmation::Automatic)
            .with_interval("B", 2, Confirmation::Automatic);
        let (_tx, rx) = mpsc::channel(8);
        let begin = Instant::now();

        let (engine, end) = Runner::new(started(session), &config()).run(rx).await;

        assert_eq!(end, RunEnd::Completed);
        assert_eq!(engine.phase(), Phase::Completed);
        assert_eq!(Instant::now() - begin, Duration::from_secs(3));
        assert_eq!(
            labels(engine.sink().effects()),
            vec!["start A", "done A", "start B", "done B", "complete"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn manual_gate_waits_for_confirm() {
        let session = Session::new("Gate")
            .with_interval("A", 1, Confirmation::Automatic)
            .with_interval("B", 1, Confirmation::Manual);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(Runner::new(started(session), &config()).run(rx));

        time::sleep(Duration::from_secs(30)).await;
        assert!(!handle.is_finished());
        tx.send(RunnerCommand::Confirm).await.unwrap();

        let (engine, end) = handle.await.unwrap();
        assert_eq!(end, RunEnd::Completed);
        assert_eq!(
            labels(engine.sink().effects()),
            vec!["start A", "done A", "wait B", "start B", "done B", "complete"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_remaining_time() {
        let session = Session::new("Pause").with_interval("A", 2, Confirmation::Automatic);
        let (tx, rx) = mpsc::channel(8);
        let begin = Instant::now();
        let handle = tokio::spawn(Runner::new(started(session), &config()).run(rx));

        time::sleep(Duration::from_millis(550)).await;
        tx.send(RunnerCommand::Pause).await.unwrap();
        time::sleep(Duration::from_secs(60)).await;
        tx.send(RunnerCommand::Resume).await.unwrap();

        let (engine, end) = handle.await.unwrap();
        assert_eq!(end, RunEnd::Completed);
        let paused = engine
            .sink()
            .effects()
            .iter()
            .find_map(|e| match e {
                Effect::ProgressChanged { snapshot } if snapshot.phase == Phase::Paused => {
                    Some(snapshot.time_remaining_ms)
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(paused, 1_450);
        // 0.55s counted before the pause, 60s paused, then 15 ticks to
        // finish the remaining 1.45s.
        assert_eq!(Instant::now() - begin, Duration::from_millis(62_050));
    }

    #[tokio::test(start_paused = true)]
    async fn background_time_is_replayed() {
        let session = Session::new("Bg")
            .with_interval("A", 2, Confirmation::Automatic)
            .with_interval("B", 1, Confirmation::Manual)
            .with_interval("C", 1, Confirmation::Automatic);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(Runner::new(started(session), &config()).run(rx));

        time::sleep(Duration::from_millis(500)).await;
        tx.send(RunnerCommand::EnterBackground).await.unwrap();
        time::sleep(Duration::from_secs(10)).await;
        tx.send(RunnerCommand::ExitBackground).await.unwrap();
        time::sleep(Duration::from_millis(50)).await;
        tx.send(RunnerCommand::Confirm).await.unwrap();

        let (engine, end) = handle.await.unwrap();
        assert_eq!(end, RunEnd::Completed);
        assert_eq!(
            labels(engine.sink().effects()),
            vec![
                "start A", "done A", "wait B", "start B", "done B", "start C", "done C",
                "complete"
            ]
        );
        assert!(engine
            .sink()
            .effects()
            .iter()
            .any(|e| *e == Effect::EnteredBackground));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_and_idles() {
        let session = Session::new("Stop").with_interval("A", 100, Confirmation::Automatic);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(Runner::new(started(session), &config()).run(rx));

        time::sleep(Duration::from_secs(1)).await;
        tx.send(RunnerCommand::Stop).await.unwrap();

        let (engine, end) = handle.await.unwrap();
        assert_eq!(end, RunEnd::Stopped);
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.sink().effects().last(), Some(&Effect::RunStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_run() {
        let session = Session::new("Drop").with_interval("A", 100, Confirmation::Automatic);
        let (tx, rx) = mpsc::channel(8);
        drop(tx);
        let (engine, end) = Runner::new(started(session), &config()).run(rx).await;
        assert_eq!(end, RunEnd::Disconnected);
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_published_on_cadence() {
        let session = Session::new("Progress").with_interval("A", 1, Confirmation::Automatic);
        let (_tx, rx) = mpsc::channel(8);
        let cfg = RunnerConfig {
            tick_interval_ms: 100,
            progress_every_ticks: 5,
        };
        let mut engine = started(session);
        engine.sink_mut().clear();

        let (engine, _) = Runner::new(engine, &cfg).run(rx).await;
        let progress = engine
            .sink()
            .effects()
            .iter()
            .filter(|e| matches!(e, Effect::ProgressChanged { .. }))
            .count();
        // Ticks 5 and 10; the run completes on tick 10.
        assert_eq!(progress, 2);
    }
}
