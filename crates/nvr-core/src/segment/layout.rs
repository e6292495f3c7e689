use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Directory name format of a date partition.
pub const PARTITION_FORMAT: &str = "%Y-%m-%d";

/// Timestamp prefix of a segment filename; sorts chronologically.
const SEGMENT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// On-disk layout: `root/<YYYY-MM-DD>/<segment file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Partition directory name for a point in time.
    pub fn partition_name(now: &DateTime<Local>) -> String {
        now.format(PARTITION_FORMAT).to_string()
    }

    /// Partition directory for a point in time.
    pub fn partition_for(&self, now: &DateTime<Local>) -> PathBuf {
        self.root.join(Self::partition_name(now))
    }

    /// Path of a new segment. The sequence number keeps names distinct
    /// within one session even when two rotations share a millisecond.
    pub fn segment_path(
        &self,
        now: &DateTime<Local>,
        stem: &str,
        sequence: u64,
        extension: &str,
    ) -> PathBuf {
        self.partition_for(now).join(format!(
            "{}_{}_{:05}.{}",
            now.format(SEGMENT_TIMESTAMP_FORMAT),
            stem,
            sequence,
            extension
        ))
    }
}
