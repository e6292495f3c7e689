use crate::{Clock, RetentionError, StorageLayout};

use std::{
    collections::HashSet,
    ffi::OsString,
    fs,
    io::ErrorKind,
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use error_location::ErrorLocation;
use tracing::{debug, info, instrument, warn};

const SECS_PER_DAY: u64 = 86_400;

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Partitions removed.
    pub deleted: Vec<PathBuf>,
    /// Partitions that could not be inspected or removed.
    pub failures: Vec<RetentionError>,
}

/// Deletes date partitions older than the retention horizon.
///
/// Only immediate child directories of the root are considered; files and
/// symlinks are left alone. The current date's partition and any protected
/// partition are never deleted, whatever the cutoff says.
pub struct RetentionSweeper {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    protected: HashSet<OsString>,
}

impl RetentionSweeper {
    /// Sweeper over `root` using `clock` for "now" and "today".
    pub fn new(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
            protected: HashSet::new(),
        }
    }

    /// Adds partitions that must survive this sweep, such as those active
    /// sessions are writing into.
    pub fn protect<I, P>(mut self, partitions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.protected.extend(
            partitions
                .into_iter()
                .filter_map(|p| p.as_ref().file_name().map(|n| n.to_os_string())),
        );
        self
    }

    /// Removes every partition whose modification time is older than
    /// `retention_days` days. A failure on one partition is recorded and
    /// the sweep moves on.
    #[instrument(skip(self), fields(root = ?self.root))]
    pub fn sweep(&self, retention_days: u32) -> SweepReport {
        let mut report = SweepReport::default();

        let now = self.clock.now();
        let today = StorageLayout::partition_name(&now);
        let cutoff = SystemTime::from(now)
            .checked_sub(Duration::from_secs(u64::from(retention_days) * SECS_PER_DAY))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Storage root does not exist, nothing to sweep");
                return report;
            }
            Err(source) => {
                warn!(error = %source, "Failed to read storage root");
                report.failures.push(RetentionError::RootUnreadable {
                    path: self.root.clone(),
                    source,
                    location: ErrorLocation::from(Location::caller()),
                });
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    report.failures.push(RetentionError::Partial {
                        path: self.root.clone(),
                        source,
                        location: ErrorLocation::from(Location::caller()),
                    });
                    continue;
                }
            };

            let path = entry.path();

            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => {}
                Ok(_) => continue,
                Err(source) => {
                    report.failures.push(self.partial(path, source));
                    continue;
                }
            }

            let name = entry.file_name();
            if name.to_string_lossy() == today {
                debug!(path = ?path, "Skipping current date partition");
                continue;
            }
            if self.protected.contains(&name) {
                debug!(path = ?path, "Skipping partition in use");
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(source) => {
                    report.failures.push(self.partial(path, source));
                    continue;
                }
            };

            if modified >= cutoff {
                continue;
            }

            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    info!(path = ?path, "Deleted old partition");
                    report.deleted.push(path);
                }
                Err(source) => {
                    warn!(path = ?path, error = %source, "Failed to delete partition");
                    report.failures.push(self.partial(path, source));
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            failures = report.failures.len(),
            retention_days = retention_days,
            "Retention sweep finished"
        );

        report
    }

    #[track_caller]
    fn partial(&self, path: PathBuf, source: std::io::Error) -> RetentionError {
        RetentionError::Partial {
            path,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
