//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Runner cadence (tick interval, progress publishing)
//! - Notification, haptic and live-status toggles
//! - Defaults for new sessions and intervals
//!
//! Configuration is stored at `~/.config/ticks/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::notifications::DEFAULT_TITLE;
use crate::timer::Confirmation;

/// How the host drives the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Publish a progress snapshot every N ticks.
    #[serde(default = "default_progress_every_ticks")]
    pub progress_every_ticks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_notification_title")]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HapticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStatusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Values used when creating sessions and intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_interval_duration_secs")]
    pub interval_duration_secs: u64,
    #[serde(default)]
    pub confirmation: Confirmation,
    #[serde(default = "default_icon")]
    pub icon: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/ticks/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub haptics: HapticsConfig,
    #[serde(default)]
    pub live_status: LiveStatusConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

fn default_tick_interval_ms() -> u64 {
    100
}
fn default_progress_every_ticks() -> u32 {
    10
}
fn default_true() -> bool {
    true
}
fn default_notification_title() -> String {
    DEFAULT_TITLE.into()
}
fn default_interval_duration_secs() -> u64 {
    60
}
fn default_icon() -> String {
    "timer".into()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            progress_every_ticks: default_progress_every_ticks(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_notification_title(),
        }
    }
}

impl Default for HapticsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LiveStatusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            interval_duration_secs: default_interval_duration_secs(),
            confirmation: Confirmation::Automatic,
            icon: default_icon(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            notifications: NotificationsConfig::default(),
            haptics: HapticsConfig::default(),
            live_status: LiveStatusConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot replace a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/ticks"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit
    /// the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if key == "defaults.confirmation" && !matches!(value, "automatic" | "manual") {
            return Err(invalid("expected 'automatic' or 'manual'".into()));
        }
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "runner.tick_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.runner.tick_interval_ms, 100);
        assert_eq!(parsed.defaults.interval_duration_secs, 60);
        assert_eq!(parsed.notifications.title, "Interval Complete");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[runner]\ntick_interval_ms = 250\n").unwrap();
        assert_eq!(parsed.runner.tick_interval_ms, 250);
        assert_eq!(parsed.runner.progress_every_ticks, 10);
        assert!(parsed.haptics.enabled);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("runner.tick_interval_ms").as_deref(), Some("100"));
        assert_eq!(cfg.get("haptics.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("defaults.confirmation").as_deref(), Some("automatic"));
        assert!(cfg.get("runner.missing_key").is_none());
    }

    #[test]
    fn set_updates_values() {
        let mut cfg = Config::default();
        cfg.set("live_status.enabled", "false").unwrap();
        cfg.set("runner.progress_every_ticks", "5").unwrap();
        cfg.set("defaults.confirmation", "manual").unwrap();
        assert!(!cfg.live_status.enabled);
        assert_eq!(cfg.runner.progress_every_ticks, 5);
        assert_eq!(cfg.defaults.confirmation, Confirmation::Manual);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("runner.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("haptics.enabled", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("runner.tick_interval_ms", "0").is_err());
        assert!(cfg.set("runner", "{}").is_err());
        assert!(cfg.set("defaults.confirmation", "sometimes").is_err());
        assert_eq!(cfg.runner.tick_interval_ms, 100);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.runner.tick_interval_ms, 100);
        assert!(path.exists());

        let mut cfg = cfg;
        cfg.set("notifications.title", "Done").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().notifications.title, "Done");
    }

    #[test]
    fn load_from_rejects_broken_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "runner = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
