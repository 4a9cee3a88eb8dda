mod config;
pub mod database;

pub use config::{
    Config, DefaultsConfig, HapticsConfig, LiveStatusConfig, NotificationsConfig, RunnerConfig,
};
pub use database::{Database, SessionStore};

use std::path::PathBuf;

/// Returns `~/.config/ticks[-dev]/` based on TICKS_ENV.
///
/// Set TICKS_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TICKS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("ticks-dev")
    } else {
        base_dir.join("ticks")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
