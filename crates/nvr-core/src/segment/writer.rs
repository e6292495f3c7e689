use crate::{Dimensions, Frame, FrameSink, MediaBackend, MediaError, WriteError};

use std::{
    fs,
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Local};
use error_location::ErrorLocation;
use tracing::{debug, info, instrument, warn};

/// The single open segment of a writer.
pub struct SegmentState {
    path: PathBuf,
    sink: Box<dyn FrameSink>,
    started_at: DateTime<Local>,
    dims: Dimensions,
    frames: u64,
}

/// A finalized segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    /// File path.
    pub path: PathBuf,
    /// Frames written.
    pub frames: u64,
    /// Geometry of every frame in the file.
    pub dims: Dimensions,
    /// When the segment was opened.
    pub started_at: DateTime<Local>,
}

/// Owns at most one open output sink and tracks its age.
pub struct SegmentWriter {
    backend: Arc<dyn MediaBackend>,
    state: Option<SegmentState>,
}

impl SegmentWriter {
    /// Creates a writer with nothing open.
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            state: None,
        }
    }

    /// Whether a segment is open.
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Age of the open segment at `now`.
    pub fn elapsed(&self, now: &DateTime<Local>) -> Option<Duration> {
        let state = self.state.as_ref()?;
        Some((*now - state.started_at).to_std().unwrap_or(Duration::ZERO))
    }

    /// Whether the open segment has reached `segment_duration`.
    pub fn should_rotate(&self, now: &DateTime<Local>, segment_duration: Duration) -> bool {
        self.elapsed(now).is_some_and(|age| age >= segment_duration)
    }

    /// Opens a segment at `path` with geometry fixed to `dims`.
    ///
    /// Finalizes any segment still open so at most one sink exists. The
    /// partition directory is created if missing, and recreated once if it
    /// disappears between creation and the sink claiming its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the sink
    /// cannot be opened.
    #[track_caller]
    #[instrument(skip(self, started_at))]
    pub fn open(
        &mut self,
        path: &Path,
        dims: Dimensions,
        fps: f64,
        started_at: DateTime<Local>,
    ) -> Result<(), WriteError> {
        if self.state.is_some() {
            warn!("Opening a segment while another is open, finalizing the previous one");
            self.close()?;
        }

        let sink = match self.open_sink(path, dims, fps) {
            Err(WriteError::SinkFailure { source, .. }) if source.is_not_found() => {
                debug!(path = ?path, "Partition vanished before open, recreating");
                self.open_sink(path, dims, fps)?
            }
            other => other?,
        };

        self.state = Some(SegmentState {
            path: path.to_path_buf(),
            sink,
            started_at,
            dims,
            frames: 0,
        });

        info!(path = ?path, dims = %dims, fps = fps, "Segment opened");

        Ok(())
    }

    /// Appends a frame to the open segment.
    ///
    /// # Errors
    ///
    /// - [`WriteError::NotOpen`] if no segment is open.
    /// - [`WriteError::GeometryMismatch`] if the frame's geometry differs
    ///   from the segment's; nothing is written.
    /// - [`WriteError::SinkFailure`] if the sink rejects the frame.
    #[track_caller]
    pub fn write(&mut self, frame: &Frame) -> Result<(), WriteError> {
        let state = self.state.as_mut().ok_or_else(|| WriteError::NotOpen {
            location: ErrorLocation::from(Location::caller()),
        })?;

        if frame.dims != state.dims {
            return Err(WriteError::GeometryMismatch {
                path: state.path.clone(),
                expected: state.dims,
                actual: frame.dims,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        state
            .sink
            .write(frame)
            .map_err(|source| WriteError::SinkFailure {
                path: state.path.clone(),
                source,
                location: ErrorLocation::from(Location::caller()),
            })?;
        state.frames += 1;

        Ok(())
    }

    /// Finalizes the open segment so the file is independently playable.
    ///
    /// Returns `None` when nothing was open. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::SinkFailure`] if finalization fails. The
    /// segment is considered closed either way.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn close(&mut self) -> Result<Option<SegmentSummary>, WriteError> {
        let Some(state) = self.state.take() else {
            return Ok(None);
        };

        let SegmentState {
            path,
            sink,
            started_at,
            dims,
            frames,
        } = state;

        sink.finalize().map_err(|source| WriteError::SinkFailure {
            path: path.clone(),
            source,
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(path = ?path, frames = frames, "Segment finalized");

        Ok(Some(SegmentSummary {
            path,
            frames,
            dims,
            started_at,
        }))
    }

    #[track_caller]
    fn open_sink(
        &self,
        path: &Path,
        dims: Dimensions,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>, WriteError> {
        if let Some(parent) = path.parent() {
            // create_dir_all already tolerates a concurrent creator.
            fs::create_dir_all(parent).map_err(|source| WriteError::Partition {
                path: parent.to_path_buf(),
                source,
                location: ErrorLocation::from(Location::caller()),
            })?;
        }

        self.backend
            .open_sink(path, dims, fps)
            .map_err(|source: MediaError| WriteError::SinkFailure {
                path: path.to_path_buf(),
                source,
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to finalize segment on drop");
        }
    }
}
