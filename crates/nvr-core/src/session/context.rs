use crate::{Clock, MediaBackend, StorageLayout, SystemClock};

use std::{sync::Arc, time::Duration};

/// Pause after a missed frame read before polling again.
pub const DEFAULT_READ_MISS_BACKOFF: Duration = Duration::from_millis(200);

/// How long `stop()` waits for one session to wind down.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators shared read-only by every session.
#[derive(Clone)]
pub struct RecorderContext {
    /// Decode/encode capability.
    pub backend: Arc<dyn MediaBackend>,
    /// Time source for segment ages, names and partitions.
    pub clock: Arc<dyn Clock>,
    /// Where segments are written.
    pub layout: StorageLayout,
    /// Pause after a missed frame read.
    pub read_miss_backoff: Duration,
    /// Per-session join timeout on stop.
    pub join_timeout: Duration,
}

impl RecorderContext {
    /// Context using the system clock and default timings.
    pub fn new(backend: Arc<dyn MediaBackend>, layout: StorageLayout) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            layout,
            read_miss_backoff: DEFAULT_READ_MISS_BACKOFF,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the missed-read backoff.
    pub fn with_read_miss_backoff(mut self, backoff: Duration) -> Self {
        self.read_miss_backoff = backoff;
        self
    }

    /// Replaces the per-session join timeout.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }
}
