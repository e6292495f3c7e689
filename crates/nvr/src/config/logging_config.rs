use crate::config::{default_log_directory, default_log_file_prefix};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Rolling log file location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory holding the daily log files.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// Log filename prefix; the date is appended.
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
        }
    }
}
