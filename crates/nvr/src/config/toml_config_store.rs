use crate::{
    AppError, AppResult,
    config::{CONFIG_PATH_ENV, Config},
};

use std::{
    panic::Location,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use error_location::ErrorLocation;
use nvr_core::{ConfigStore, CoreResult, RecorderError, RecordingSettings, SourceDescriptor};

/// [`ConfigStore`] backed by the TOML configuration file.
///
/// Only the `[recording]` and `[[sources]]` sections pass through the
/// store; `save` keeps every other section of the file as it is.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    /// Store over an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$NVR_CONFIG`, or `config.toml` in the platform config
    /// directory.
    #[track_caller]
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.trim().is_empty()
        {
            return Ok(Self::new(path));
        }

        let proj_dirs = ProjectDirs::from("com", "nvr", "NVR").ok_or_else(|| {
            AppError::ConfigError {
                reason: "Failed to get config directory".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        Ok(Self::new(proj_dirs.config_dir().join("config.toml")))
    }

    /// The config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole file, writing defaults if it is missing.
    pub fn load_config(&self) -> AppResult<Config> {
        Config::load(&self.path)
    }

    /// Saves the whole file atomically.
    pub fn save_config(&self, config: &Config) -> AppResult<()> {
        config.save(&self.path)
    }
}

impl ConfigStore for TomlConfigStore {
    #[track_caller]
    fn load(&self) -> CoreResult<(Vec<SourceDescriptor>, RecordingSettings)> {
        let config = self.load_config().map_err(into_recorder_error)?;
        Ok((config.sources, config.recording))
    }

    #[track_caller]
    fn save(&self, sources: &[SourceDescriptor], settings: &RecordingSettings) -> CoreResult<()> {
        let mut config = self.load_config().map_err(into_recorder_error)?;
        config.sources = sources.to_vec();
        config.recording = settings.clone();
        self.save_config(&config).map_err(into_recorder_error)
    }
}

#[track_caller]
fn into_recorder_error(error: AppError) -> RecorderError {
    RecorderError::Config {
        reason: error.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
