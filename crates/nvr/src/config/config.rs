//! Configuration management for nvr.
//!
//! Handles loading and saving the TOML configuration file with atomic
//! write operations. Missing sections and fields take their defaults.

use crate::{
    AppError, AppResult,
    config::{LoggingConfig, ServerConfig, StorageConfig},
};

use std::{fs, io::Write, panic::Location, path::Path};

use error_location::ErrorLocation;
use nvr_core::{RecordingSettings, SourceDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Settings snapshotted into every session.
    #[serde(default)]
    pub recording: RecordingSettings,
    /// Storage root and sweep schedule.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Control server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Rolling log file configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Cameras to record.
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl Config {
    /// Load configuration from `path`, writing defaults if it does not exist.
    #[track_caller]
    #[instrument]
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            info!(config_path = ?path, "No config found, creating default");
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to read config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(
            config_path = ?path,
            sources = config.sources.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Save configuration to `path` using atomic write pattern.
    ///
    /// Writes to a temporary file first, then renames to prevent corruption
    /// if the process crashes during the write.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
            && !dir.exists()
        {
            fs::create_dir_all(dir)?;
            debug!(config_dir = ?dir, "Created config directory");
        }

        let contents = toml::to_string_pretty(self).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        // Atomic write: write to temp file then rename
        let temp_path = path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to create temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to write temp config file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::ConfigError {
            reason: format!("Failed to sync temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to rename temp config to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(config_path = ?path, "Configuration saved (atomic write)");

        Ok(())
    }

    /// Reject settings no session could run with.
    #[track_caller]
    pub fn validate(&self) -> AppResult<()> {
        self.recording.validate()?;
        Ok(())
    }
}
