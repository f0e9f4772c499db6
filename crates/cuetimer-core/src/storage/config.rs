//! TOML-based application configuration.
//!
//! Stores the tick cadence, transition duration and notification
//! preferences at `~/.config/cuetimer/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Timing knobs for the drive loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Poll cadence while running, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Interstitial duration between segments, in milliseconds.
    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_volume")]
    pub volume: u32,
    #[serde(default = "default_true")]
    pub vibration: bool,
    /// Path to a custom completion sound file. If it fails to play,
    /// the synthesized finish cue is used instead.
    #[serde(default)]
    pub custom_sound: Option<String>,
}

/// UI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default = "default_accent_color")]
    pub highlight_color: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/cuetimer/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

fn default_tick_interval_ms() -> u64 {
    100
}
fn default_transition_ms() -> u64 {
    2_500
}
fn default_true() -> bool {
    true
}
fn default_volume() -> u32 {
    50
}
fn default_accent_color() -> String {
    "#3b82f6".into()
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            transition_ms: default_transition_ms(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: default_volume(),
            vibration: true,
            custom_sound: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            dark_mode: true,
            highlight_color: default_accent_color(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing defaults on first run.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, coercing the string to
    /// the existing value's type. Does not save; the caller persists.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value cannot be
    /// parsed as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|_| ConfigError::UnknownKey(key.into()))?;

        {
            let mut current = &mut json;
            let mut parts = key.split('.').peekable();
            loop {
                let Some(part) = parts.next() else {
                    return Err(ConfigError::UnknownKey(key.into()));
                };
                if parts.peek().is_none() {
                    let obj = current
                        .as_object_mut()
                        .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;
                    let existing = obj
                        .get(part)
                        .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;
                    let parsed = coerce(existing, value).ok_or_else(|| {
                        ConfigError::ParseFailed {
                            key: key.into(),
                            value: value.into(),
                        }
                    })?;
                    obj.insert(part.to_string(), parsed);
                    break;
                }
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;
            }
        }

        *self = serde_json::from_value(json).map_err(|_| ConfigError::ParseFailed {
            key: key.into(),
            value: value.into(),
        })?;
        Ok(())
    }
}

fn coerce(existing: &serde_json::Value, value: &str) -> Option<serde_json::Value> {
    match existing {
        serde_json::Value::Bool(_) => value.parse::<bool>().ok().map(serde_json::Value::Bool),
        serde_json::Value::Number(_) => value
            .parse::<u64>()
            .ok()
            .map(|n| serde_json::Value::Number(n.into())),
        // Nullable string fields (e.g. custom_sound) accept any string.
        _ => Some(serde_json::Value::String(value.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_targets() {
        let cfg = Config::default();
        assert_eq!(cfg.timer.tick_interval_ms, 100);
        assert_eq!(cfg.timer.transition_ms, 2_500);
        assert!(cfg.notifications.enabled);
        assert!(cfg.notifications.custom_sound.is_none());
    }

    #[test]
    fn empty_toml_fills_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.timer.tick_interval_ms, 100);
        assert_eq!(cfg.ui.highlight_color, "#3b82f6");
    }

    #[test]
    fn get_and_set_dot_paths() {
        let mut cfg = Config::default();
        assert_eq!(cfg.get("timer.tick_interval_ms").as_deref(), Some("100"));
        cfg.set("timer.tick_interval_ms", "250").unwrap();
        assert_eq!(cfg.timer.tick_interval_ms, 250);
        cfg.set("notifications.vibration", "false").unwrap();
        assert!(!cfg.notifications.vibration);
        cfg.set("notifications.custom_sound", "gong.ogg").unwrap();
        assert_eq!(cfg.notifications.custom_sound.as_deref(), Some("gong.ogg"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.bogus", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.get("nope.nothing").is_none());
    }

    #[test]
    fn bad_value_is_rejected() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.tick_interval_ms", "fast"),
            Err(ConfigError::ParseFailed { .. })
        ));
        assert_eq!(cfg.timer.tick_interval_ms, 100);
    }
}
