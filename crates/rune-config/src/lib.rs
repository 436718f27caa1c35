//! Rune flip configuration
//!
//! Loads process-wide animation settings from `rune.toml`, with environment
//! variables taking precedence over file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RuneConfig {
    /// Layout animation settings
    pub flip: FlipSettings,
    /// Log output settings
    pub logging: LoggingConfig,
}

/// Global layout animation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlipSettings {
    /// Master switch; when false animations complete instantly
    pub enabled: bool,
    /// Total duration the per-phase defaults are derived from
    pub duration_ms: f64,
    /// Speed multiplier handed to the native timeline
    pub playback_rate: f64,
}

impl FlipSettings {
    pub const DEFAULT_DURATION_MS: f64 = 300.0;
}

impl Default for FlipSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: Self::DEFAULT_DURATION_MS,
            playback_rate: 1.0,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, e.g. `rune_flip=debug`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

fn env_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl RuneConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from the default location (rune.toml in the current directory)
    /// or return default configuration if the file is missing or invalid
    pub fn load_or_default() -> Self {
        match Self::load_from_file("rune.toml") {
            Ok(config) => config,
            Err(ConfigError::Io { .. }) => Self::default(),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring rune.toml");
                Self::default()
            }
        }
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    /// Values that fail to parse are ignored.
    pub fn merge_with_env(&mut self) {
        if let Ok(val) = std::env::var("RUNE_FLIP_DISABLED") {
            self.flip.enabled = !env_flag(&val);
        }
        if let Ok(val) = std::env::var("RUNE_FLIP_DURATION_MS") {
            match val.parse::<f64>() {
                Ok(ms) if ms.is_finite() && ms >= 0.0 => self.flip.duration_ms = ms,
                _ => tracing::debug!(value = %val, "invalid RUNE_FLIP_DURATION_MS"),
            }
        }
        if let Ok(val) = std::env::var("RUNE_FLIP_PLAYBACK_RATE") {
            match val.parse::<f64>() {
                Ok(rate) if rate.is_finite() && rate > 0.0 => self.flip.playback_rate = rate,
                _ => tracing::debug!(value = %val, "invalid RUNE_FLIP_PLAYBACK_RATE"),
            }
        }
        if let Ok(filter) = std::env::var("RUNE_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from rune.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}
