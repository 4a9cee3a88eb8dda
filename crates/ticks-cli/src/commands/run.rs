//! Interactive foreground run driven by the async runner.

use std::io::{BufRead, Write};

use clap::Args;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use ticks_core::format::{format_clock, format_clock_tenths, format_short};
use ticks_core::storage::{Config, Database};
use ticks_core::{
    EffectSink, Interval, RunSnapshot, Runner, RunnerCommand, Session, TimerEngine,
    TracingSink,
};

#[derive(Args)]
pub struct RunArgs {
    /// Session name, id or id prefix
    pub session: String,
}

/// Renders engine effects to the terminal.
struct TerminalSink {
    notifications: bool,
    notification_title: String,
    haptics: bool,
    live_status: bool,
}

impl TerminalSink {
    fn new(config: &Config) -> Self {
        Self {
            notifications: config.notifications.enabled,
            notification_title: config.notifications.title.clone(),
            haptics: config.haptics.enabled,
            live_status: config.live_status.enabled,
        }
    }

    fn line(&self, text: &str) {
        // Clear any progress line first.
        println!("\r\x1b[2K{text}");
    }

    fn bell(&self) {
        if self.haptics {
            print!("\x07");
            let _ = std::io::stdout().flush();
        }
    }
}

impl EffectSink for TerminalSink {
    fn on_interval_started(&mut self, index: usize, interval: &Interval) {
        self.line(&format!(
            "> {}. {} ({})",
            index + 1,
            interval.label,
            format_short(interval.duration_secs)
        ));
    }

    fn on_interval_completed(&mut self, _index: usize, interval: &Interval) {
        self.bell();
        if self.notifications {
            self.line(&format!("{}: {}", self.notification_title, interval.label));
        }
    }

    fn on_confirmation_needed(&mut self, index: usize, interval: &Interval) {
        self.bell();
        self.line(&format!(
            "Up next: {}. {} ({}). Press c to continue.",
            index + 1,
            interval.label,
            format_short(interval.duration_secs)
        ));
    }

    fn on_session_completed(&mut self, session: &Session) {
        self.bell();
        self.line(&format!("Session complete: {}", session.name));
    }

    fn on_progress_changed(&mut self, snapshot: &RunSnapshot) {
        if !self.live_status {
            return;
        }
        let Some(interval) = snapshot.current_interval.as_ref() else {
            return;
        };
        print!(
            "\r\x1b[2K  {} {}  [{:>3.0}%] {}",
            interval.label,
            format_clock_tenths(snapshot.time_remaining_ms),
            snapshot.overall_progress * 100.0,
            snapshot.phase,
        );
        let _ = std::io::stdout().flush();
    }

    fn on_run_stopped(&mut self) {
        self.line("Stopped.");
    }
}

fn parse_key(line: &str) -> Option<RunnerCommand> {
    match line.trim() {
        "p" => Some(RunnerCommand::Pause),
        "r" => Some(RunnerCommand::Resume),
        "n" => Some(RunnerCommand::Advance),
        "c" | "" => Some(RunnerCommand::Confirm),
        "b" => Some(RunnerCommand::EnterBackground),
        "f" => Some(RunnerCommand::ExitBackground),
        "q" => Some(RunnerCommand::Stop),
        _ => None,
    }
}

/// Forward stdin lines as runner commands on a plain thread; stdin reads
/// block and would stall a runtime worker.
fn spawn_stdin_reader(tx: mpsc::Sender<RunnerCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_key(&line) {
                Some(cmd) => {
                    if tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                None => eprintln!("keys: p pause, r resume, n next, c continue, b/f background, q quit"),
            }
        }
    });
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();
    let session = db.resolve_session(&args.session)?;

    let sink = (TerminalSink::new(&config), TracingSink);
    let mut engine = TimerEngine::new(sink);
    println!(
        "{} - {} intervals, {}",
        session.name,
        session.intervals.len(),
        format_clock(session.total_duration_secs())
    );
    engine.start(session)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let (tx, rx) = mpsc::channel(16);
        spawn_stdin_reader(tx.clone());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(RunnerCommand::Stop).await;
            } else {
                warn!("could not listen for ctrl-c");
            }
        });

        let (_engine, end) = Runner::new(engine, &config.runner).run(rx).await;
        debug!(?end, "run finished");
    });

    // The stdin thread may still be blocked on a read; don't wait for it.
    runtime.shutdown_background();
    Ok(())
}
