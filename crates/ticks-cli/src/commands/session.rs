use clap::Subcommand;
use ticks_core::format::{format_short, parse_duration};
use ticks_core::storage::{Config, Database, SessionStore};
use ticks_core::{Confirmation, Session};

use super::{print_intervals, short_id};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List saved sessions
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one session and its intervals
    Show {
        /// Session name, id or id prefix
        session: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a session
    Create {
        /// Session name
        name: String,
        /// Icon name shown by front ends
        #[arg(long)]
        icon: Option<String>,
        /// Interval as LABEL:DURATION[:manual|automatic], repeatable
        /// (e.g. "Warm Up:5m", "Sprint:30s:manual")
        #[arg(long = "interval", short = 'i')]
        intervals: Vec<String>,
    },
    /// Rename a session
    Rename {
        /// Session name, id or id prefix
        session: String,
        /// New name
        name: String,
    },
    /// Delete a session
    Delete {
        /// Session name, id or id prefix
        session: String,
    },
}

/// Parse `LABEL:DURATION[:CONFIRMATION]`. The duration may itself contain
/// colons (`Warm Up:1:30`), so the confirmation is only split off when the
/// last field names one.
pub fn parse_interval_arg(
    raw: &str,
    default_confirmation: Confirmation,
) -> Result<(String, u64, Confirmation), Box<dyn std::error::Error>> {
    let (label, rest) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected LABEL:DURATION, got '{raw}'"))?;
    let (duration, confirmation) = match rest.rsplit_once(':') {
        Some((duration, "manual")) => (duration, Confirmation::Manual),
        Some((duration, "automatic")) => (duration, Confirmation::Automatic),
        _ => (rest, default_confirmation),
    };
    let label = label.trim();
    if label.is_empty() {
        return Err(format!("interval label is empty in '{raw}'").into());
    }
    Ok((label.to_string(), parse_duration(duration)?, confirmation))
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SessionAction::List { json } => {
            let sessions = db.list_sessions()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
                return Ok(());
            }
            if sessions.is_empty() {
                println!("No sessions. Create one with `ticks session create`.");
                return Ok(());
            }
            for session in &sessions {
                println!(
                    "{}  {:<24} {:>2} intervals  {}",
                    short_id(session),
                    session.name,
                    session.intervals.len(),
                    format_short(session.total_duration_secs()),
                );
            }
        }
        SessionAction::Show { session, json } => {
            let session = db.resolve_session(&session)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
                return Ok(());
            }
            println!("{} ({})", session.name, short_id(&session));
            println!(
                "Icon: {}  Created: {}",
                session.icon,
                session.created_at.format("%Y-%m-%d %H:%M")
            );
            println!("Total: {}", format_short(session.total_duration_secs()));
            print_intervals(&session);
        }
        SessionAction::Create {
            name,
            icon,
            intervals,
        } => {
            let config = Config::load_or_default();
            let mut session = Session::new(name);
            session.icon = icon.unwrap_or(config.defaults.icon);
            for raw in &intervals {
                let (label, secs, confirmation) =
                    parse_interval_arg(raw, config.defaults.confirmation)?;
                session.add_interval(label, secs, confirmation);
            }
            db.save_session(&session)?;
            println!("Session created: {} ({})", session.name, short_id(&session));
        }
        SessionAction::Rename { session, name } => {
            let mut session = db.resolve_session(&session)?;
            let old = std::mem::replace(&mut session.name, name);
            db.save_session(&session)?;
            println!("Session renamed: {old} -> {}", session.name);
        }
        SessionAction::Delete { session } => {
            let session = db.resolve_session(&session)?;
            db.delete_session(session.id)?;
            println!("Session deleted: {}", session.name);
        }
    }
    Ok(())
}
