//! Static settings, read once at start-up and immutable for the lifetime of the store.

use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Settings validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreConfig,
    pub logger: LoggerSettings,
    pub camera: LookSettings,
    pub room: RoomSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How deeply dispatches may nest before further ones are rejected.
    pub max_dispatch_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    pub level: LevelFilter,
    /// Also log the full committed state, not just its version.
    pub log_state: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Debug,
            log_state: false,
        }
    }
}

/// Camera look tuning, angles in degrees.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LookSettings {
    pub sensitivity: f32,
    pub min_pitch: f32,
    pub max_pitch: f32,
}

impl Default for LookSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            min_pitch: -80.0,
            max_pitch: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    pub max_players_per_room: u8,
    /// Join any open room when no room name is given.
    pub should_join_random_room: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players_per_room: 4,
            should_join_random_room: true,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| ConfigError::ParseError { source: e })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from `path`.
    ///
    /// A missing file yields `Settings::default()`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_dispatch_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "store.max_dispatch_depth must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("camera.sensitivity", self.camera.sensitivity),
            ("camera.min_pitch", self.camera.min_pitch),
            ("camera.max_pitch", self.camera.max_pitch),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::ValidationError {
                    message: format!("{} must be a finite number, got {}", name, value),
                });
            }
        }
        if self.camera.min_pitch > self.camera.max_pitch {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "camera.min_pitch ({}) is greater than camera.max_pitch ({})",
                    self.camera.min_pitch, self.camera.max_pitch
                ),
            });
        }
        if self.room.max_players_per_room == 0 {
            return Err(ConfigError::ValidationError {
                message: "room.max_players_per_room must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
