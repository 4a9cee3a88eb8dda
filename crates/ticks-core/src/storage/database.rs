//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Sessions and their intervals
//! - Key-value store for host state (the CLI's persisted run)
//!
//! The engine never writes here; it takes a snapshot of a [`Session`] at
//! start and runs from that.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use super::data_dir;
use crate::error::{CoreError, DatabaseError, EngineError, Result};
use crate::timer::{Confirmation, Interval, Session};

/// Load/save interface for sessions.
pub trait SessionStore {
    /// All sessions, oldest first.
    fn list_sessions(&self) -> Result<Vec<Session>>;

    fn load_session(&self, id: Uuid) -> Result<Session>;

    /// Insert or replace a session together with its intervals.
    fn save_session(&self, session: &Session) -> Result<()>;

    /// Returns `false` if there was nothing to delete.
    fn delete_session(&self, id: Uuid) -> Result<bool>;
}

/// SQLite database for sessions.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/ticks/ticks.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("ticks.db");
        Self::open_at(path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                icon        TEXT NOT NULL DEFAULT 'timer',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS intervals (
                id            TEXT PRIMARY KEY,
                session_id    TEXT NOT NULL,
                label         TEXT NOT NULL DEFAULT '',
                duration_secs INTEGER NOT NULL,
                confirmation  TEXT NOT NULL DEFAULT 'automatic',
                order_index   INTEGER NOT NULL,
                UNIQUE (session_id, order_index)
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_intervals_session ON intervals(session_id, order_index);",
        )
    }

    /// Find a session by full id, unique id prefix, or case-insensitive name.
    pub fn resolve_session(&self, key: &str) -> Result<Session> {
        if let Ok(id) = Uuid::parse_str(key) {
            return self.load_session(id);
        }
        let sessions = self.list_sessions()?;
        let by_name: Vec<&Session> = sessions
            .iter()
            .filter(|s| s.name.eq_ignore_ascii_case(key))
            .collect();
        if let [only] = by_name.as_slice() {
            return Ok((*only).clone());
        }
        let by_prefix: Vec<&Session> = sessions
            .iter()
            .filter(|s| !key.is_empty() && s.id.to_string().starts_with(key))
            .collect();
        match by_prefix.as_slice() {
            [only] => Ok((*only).clone()),
            _ => Err(CoreError::NotFound {
                kind: "session",
                id: key.to_string(),
            }),
        }
    }

    fn load_intervals(&self, session_id: Uuid) -> Result<Vec<Interval>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, duration_secs, confirmation, order_index
             FROM intervals WHERE session_id = ?1 ORDER BY order_index",
        )?;
        let rows = stmt
            .query_map(params![session_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, label, duration_secs, confirmation, order_index)| -> Result<Interval> {
                Ok(Interval {
                    id: parse_uuid("intervals", &id)?,
                    label,
                    duration_secs: u64::try_from(duration_secs)
                        .map_err(|_| corrupt("intervals", format!("negative duration {duration_secs}")))?,
                    confirmation: Confirmation::from_stored(&confirmation),
                    order_index: u32::try_from(order_index)
                        .map_err(|_| corrupt("intervals", format!("bad order index {order_index}")))?,
                })
            })
            .collect()
    }

    // ── Key-value ────────────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, icon, created_at FROM sessions ORDER BY created_at, name")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, icon, created_at)| -> Result<Session> {
                let id = parse_uuid("sessions", &id)?;
                Ok(Session {
                    id,
                    name,
                    icon,
                    created_at: parse_time(&created_at)?,
                    intervals: self.load_intervals(id)?,
                })
            })
            .collect()
    }

    fn load_session(&self, id: Uuid) -> Result<Session> {
        let row = self
            .conn
            .query_row(
                "SELECT name, icon, created_at FROM sessions WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((name, icon, created_at)) = row else {
            return Err(CoreError::NotFound {
                kind: "session",
                id: id.to_string(),
            });
        };
        Ok(Session {
            id,
            name,
            icon,
            created_at: parse_time(&created_at)?,
            intervals: self.load_intervals(id)?,
        })
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        let mut session = session.clone();
        session.renumber();
        // SQLite integers are signed; refuse what would not read back.
        let durations = session
            .intervals
            .iter()
            .map(|i| {
                i64::try_from(i.duration_secs).map_err(|_| {
                    EngineError::InvalidArgument(format!(
                        "interval '{}' is too long to store: {}s",
                        i.label, i.duration_secs
                    ))
                })
            })
            .collect::<Result<Vec<i64>, EngineError>>()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, name, icon, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, icon = excluded.icon",
            params![
                session.id.to_string(),
                session.name,
                session.icon,
                session.created_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "DELETE FROM intervals WHERE session_id = ?1",
            params![session.id.to_string()],
        )?;
        for (interval, duration_secs) in session.intervals.iter().zip(durations) {
            tx.execute(
                "INSERT INTO intervals (id, session_id, label, duration_secs, confirmation, order_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    interval.id.to_string(),
                    session.id.to_string(),
                    interval.label,
                    duration_secs,
                    interval.confirmation.as_str(),
                    interval.order_index,
                ],
            )?;
        }
        tx.commit()?;
        debug!(session = %session.name, intervals = session.intervals.len(), "saved session");
        Ok(())
    }

    fn delete_session(&self, id: Uuid) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM intervals WHERE session_id = ?1",
            params![id.to_string()],
        )?;
        let deleted = tx.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(deleted > 0)
    }
}

fn corrupt(table: &'static str, message: String) -> CoreError {
    CoreError::Database(DatabaseError::CorruptRow { table, message })
}

fn parse_uuid(table: &'static str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| corrupt(table, format!("bad id '{raw}': {e}")))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt("sessions", format!("bad timestamp '{raw}': {e}")))
}
