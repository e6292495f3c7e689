use crate::{CoreResult, RecorderError};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_SEGMENT_DURATION_SECS: u64 = 300;
pub(crate) const DEFAULT_TOTAL_DURATION_SECS: u64 = 3600;
pub(crate) const DEFAULT_RETENTION_DAYS: u32 = 7;
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;
pub(crate) const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub(crate) const DEFAULT_TARGET_FPS: u32 = 15;
pub(crate) const DEFAULT_RESOLUTION_HINT: &str = "720p";

fn default_segment_duration_secs() -> u64 {
    DEFAULT_SEGMENT_DURATION_SECS
}

fn default_total_duration_secs() -> u64 {
    DEFAULT_TOTAL_DURATION_SECS
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_target_fps() -> u32 {
    DEFAULT_TARGET_FPS
}

fn default_resolution_hint() -> String {
    DEFAULT_RESOLUTION_HINT.to_string()
}

/// Recording settings, snapshotted into each session when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// Length of one segment file.
    #[serde(default = "default_segment_duration_secs")]
    pub segment_duration_secs: u64,

    /// Legacy overall recording length. Sessions record until stopped and
    /// ignore this; it is kept so existing configuration files round-trip.
    #[serde(default = "default_total_duration_secs")]
    pub total_duration_secs: u64,

    /// Date partitions older than this many days are swept.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Connection attempts before a source is declared unreachable.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between connection attempts.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Maximum frame rate delivered by the stream and written to segments.
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Advisory resolution label, reported but never used to resize.
    #[serde(default = "default_resolution_hint")]
    pub resolution_hint: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            segment_duration_secs: DEFAULT_SEGMENT_DURATION_SECS,
            total_duration_secs: DEFAULT_TOTAL_DURATION_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            target_fps: DEFAULT_TARGET_FPS,
            resolution_hint: default_resolution_hint(),
        }
    }
}

impl RecordingSettings {
    /// Segment rotation boundary.
    pub fn segment_duration(&self) -> Duration {
        Duration::from_secs(self.segment_duration_secs)
    }

    /// Pause between connection attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Rejects settings no session could run with.
    ///
    /// # Errors
    ///
    /// Returns a config error for a zero segment duration or frame rate.
    #[track_caller]
    pub fn validate(&self) -> CoreResult<()> {
        if self.segment_duration_secs == 0 {
            return Err(RecorderError::Config {
                reason: "segment_duration_secs must be greater than zero".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if self.target_fps == 0 {
            return Err(RecorderError::Config {
                reason: "target_fps must be greater than zero".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }
}
