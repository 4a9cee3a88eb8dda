use clap::{Subcommand, ValueEnum};
use ticks_core::format::{format_short, parse_duration};
use ticks_core::storage::{Config, Database, SessionStore};
use ticks_core::Confirmation;

use super::print_intervals;

#[derive(Clone, Copy, ValueEnum)]
pub enum ConfirmationArg {
    Automatic,
    Manual,
}

impl From<ConfirmationArg> for Confirmation {
    fn from(arg: ConfirmationArg) -> Self {
        match arg {
            ConfirmationArg::Automatic => Confirmation::Automatic,
            ConfirmationArg::Manual => Confirmation::Manual,
        }
    }
}

#[derive(Subcommand)]
pub enum IntervalAction {
    /// Append an interval to a session
    Add {
        /// Session name, id or id prefix
        session: String,
        /// Interval label
        label: String,
        /// Duration (e.g. "90", "5m", "1h30m", "1:30"); defaults to config
        duration: Option<String>,
        /// How the run continues into this interval
        #[arg(long, value_enum)]
        confirmation: Option<ConfirmationArg>,
    },
    /// Remove the interval at a position (1-based)
    Remove {
        /// Session name, id or id prefix
        session: String,
        position: usize,
    },
    /// Move an interval to another position (both 1-based)
    Move {
        /// Session name, id or id prefix
        session: String,
        from: usize,
        to: usize,
    },
}

fn to_index(position: usize) -> Result<usize, Box<dyn std::error::Error>> {
    position
        .checked_sub(1)
        .ok_or_else(|| "positions start at 1".into())
}

pub fn run(action: IntervalAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        IntervalAction::Add {
            session,
            label,
            duration,
            confirmation,
        } => {
            let config = Config::load_or_default();
            let mut session = db.resolve_session(&session)?;
            let secs = match duration {
                Some(raw) => parse_duration(&raw)?,
                None => config.defaults.interval_duration_secs,
            };
            let confirmation = confirmation
                .map(Confirmation::from)
                .unwrap_or(config.defaults.confirmation);
            session.renumber();
            let added = session.add_interval(label, secs, confirmation);
            println!(
                "Interval added: {} ({}, {})",
                added.label,
                format_short(added.duration_secs),
                added.confirmation.display_name()
            );
            db.save_session(&session)?;
        }
        IntervalAction::Remove { session, position } => {
            let mut session = db.resolve_session(&session)?;
            let index = to_index(position)?;
            let id = session
                .sorted_intervals()
                .get(index)
                .map(|i| i.id)
                .ok_or_else(|| format!("no interval at position {position}"))?;
            if let Some(removed) = session.remove_interval(id) {
                db.save_session(&session)?;
                println!("Interval removed: {}", removed.label);
            }
        }
        IntervalAction::Move { session, from, to } => {
            let mut session = db.resolve_session(&session)?;
            session.move_interval(to_index(from)?, to_index(to)?)?;
            db.save_session(&session)?;
            println!("{}", session.name);
            print_intervals(&session);
        }
    }
    Ok(())
}
