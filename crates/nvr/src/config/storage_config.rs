use crate::config::{default_storage_root, default_sweep_interval_secs};

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Where segments go and how often retention runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root holding one directory per day.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Seconds between scheduled retention sweeps. Zero disables them.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl StorageConfig {
    /// Interval between scheduled sweeps, `None` when disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}
