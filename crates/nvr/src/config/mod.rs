#[allow(clippy::module_inception)]
mod config;
mod logging_config;
mod server_config;
mod storage_config;
mod toml_config_store;

pub(crate) use {
    config::Config, logging_config::LoggingConfig, server_config::ServerConfig,
    storage_config::StorageConfig, toml_config_store::TomlConfigStore,
};

/// Environment variable overriding the config file location.
pub(crate) const CONFIG_PATH_ENV: &str = "NVR_CONFIG";

pub(crate) const DEFAULT_STORAGE_ROOT: &str = "storage";
pub(crate) const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 8554;
pub(crate) const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub(crate) const DEFAULT_LOG_FILE_PREFIX: &str = "nvr.log";

pub(crate) fn default_storage_root() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_STORAGE_ROOT)
}

pub(crate) fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

pub(crate) fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_log_directory() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_LOG_DIRECTORY)
}

pub(crate) fn default_log_file_prefix() -> String {
    DEFAULT_LOG_FILE_PREFIX.to_string()
}
