//! Configuration file parser for ~/.config/babelfeed/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields`
//! off), though we log a warning when the file contains potential typos.
//!
//! Config values only seed the settings row on first run; after that the
//! database copy is authoritative and is edited with the `settings` command.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::storage::{SettingsUpdate, DEFAULT_RETENTION_DAYS};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `api_key` so the provider credential cannot leak
/// through logs, error messages, or debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Theme variant name ("light", "dark").
    pub theme: String,

    /// Reader font size in points.
    pub font_size: i64,

    /// Translation backend selected by name ("openai", "deepl", "google").
    pub provider: String,

    /// Credential for the selected translation backend.
    pub api_key: Option<String>,

    /// Whether opening an article marks it read.
    pub auto_mark_read: bool,

    /// Feed refresh interval in minutes.
    pub refresh_interval: i64,

    /// Default target language for translations.
    pub target_language: String,

    /// Articles older than this many days are removed by the prune
    /// command, unless starred.
    pub retention_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            font_size: 16,
            provider: "openai".to_string(),
            api_key: None,
            auto_mark_read: false,
            refresh_interval: 30,
            target_language: "zh-CN".to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("theme", &self.theme)
            .field("font_size", &self.font_size)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("auto_mark_read", &self.auto_mark_read)
            .field("refresh_interval", &self.refresh_interval)
            .field("target_language", &self.target_language)
            .field("retention_days", &self.retention_days)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to bound memory use on a corrupted
        // or hostile config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race: file deleted between metadata check and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to flag likely typos
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "theme",
                "font_size",
                "provider",
                "api_key",
                "auto_mark_read",
                "refresh_interval",
                "target_language",
                "retention_days",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), provider = %config.provider, "Loaded configuration");
        Ok(config)
    }

    /// Settings-row seed derived from this configuration.
    ///
    /// Applied through `Database::seed_settings`, which only takes effect on
    /// a database that has no settings row yet.
    pub fn as_settings_seed(&self) -> SettingsUpdate {
        SettingsUpdate {
            theme: Some(self.theme.clone()),
            font_size: Some(self.font_size),
            provider: Some(self.provider.clone()),
            api_key: self.api_key.clone(),
            auto_mark_read: Some(self.auto_mark_read),
            refresh_interval: Some(self.refresh_interval),
            target_language: Some(self.target_language.clone()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
