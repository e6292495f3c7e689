use std::{panic::Location, path::PathBuf};

use error_location::ErrorLocation;
use thiserror::Error;

/// Failures reported by a [`MediaBackend`](crate::MediaBackend) while opening,
/// reading from, or writing to the external decode/encode capability.
#[derive(Error, Debug)]
pub enum MediaError {
    /// A helper process (ffmpeg, ffprobe) could not be spawned or exited badly.
    #[error("Media process failed: {reason} {location}")]
    ProcessFailed {
        /// Description of the process failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The stream could not be probed or opened.
    #[error("Stream open failed for {address}: {reason} {location}")]
    OpenFailed {
        /// Redacted stream address.
        address: String,
        /// Description of the open failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A pipe to or from a helper process failed.
    #[error("Media pipe error: {source} {location}")]
    Pipe {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl MediaError {
    /// Whether the failure means the target directory vanished underneath us.
    pub fn is_not_found(&self) -> bool {
        match self {
            MediaError::Pipe { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors from [`StreamConnection::connect`](crate::StreamConnection::connect).
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Every attempt failed to open the stream.
    #[error("Stream unreachable after {attempts} attempt(s): {address} {location}")]
    Unreachable {
        /// Redacted stream address.
        address: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last backend failure, if any.
        #[source]
        last_error: Option<MediaError>,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The stream opened but reported a zero width, height or frame rate.
    #[error("Degenerate stream {address}: {width}x{height}@{fps}fps {location}")]
    DegenerateStream {
        /// Redacted stream address.
        address: String,
        /// Reported width.
        width: u32,
        /// Reported height.
        height: u32,
        /// Reported frame rate.
        fps: f64,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Cancellation was signalled between attempts.
    #[error("Connect cancelled for {address} {location}")]
    Cancelled {
        /// Redacted stream address.
        address: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

/// Errors from [`SegmentWriter`](crate::SegmentWriter).
#[derive(Error, Debug)]
pub enum WriteError {
    /// The sink rejected a frame or could not be opened/finalized
    /// (disk full, permission denied, encoder exit).
    #[error("Sink failure for {path:?}: {source} {location}")]
    SinkFailure {
        /// Segment file path.
        path: PathBuf,
        /// Underlying backend error.
        #[source]
        source: MediaError,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A frame's geometry differs from the segment's fixed geometry.
    #[error("Frame is {actual} but segment {path:?} is {expected} {location}")]
    GeometryMismatch {
        /// Segment file path.
        path: PathBuf,
        /// Dimensions fixed when the segment was opened.
        expected: crate::Dimensions,
        /// Dimensions of the rejected frame.
        actual: crate::Dimensions,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A frame was written while no segment was open.
    #[error("No segment open {location}")]
    NotOpen {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The segment's partition directory could not be created.
    #[error("Failed to create partition {path:?}: {source} {location}")]
    Partition {
        /// Directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

/// Errors collected by [`RetentionSweeper`](crate::RetentionSweeper).
#[derive(Error, Debug)]
pub enum RetentionError {
    /// One partition could not be inspected or deleted; the sweep continued.
    #[error("Failed to remove {path:?}: {source} {location}")]
    Partial {
        /// Partition path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The storage root exists but could not be listed.
    #[error("Failed to read storage root {path:?}: {source} {location}")]
    RootUnreadable {
        /// Storage root path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

/// Recorder errors with source location tracking.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Connection error.
    #[error("Connect error: {source} {location}")]
    Connect {
        /// The underlying connect error.
        #[source]
        source: ConnectError,
        /// Location where this error was converted.
        location: ErrorLocation,
    },

    /// Segment write error.
    #[error("Write error: {source} {location}")]
    Write {
        /// The underlying write error.
        #[source]
        source: WriteError,
        /// Location where this error was converted.
        location: ErrorLocation,
    },

    /// Media backend error.
    #[error("Media error: {source} {location}")]
    Media {
        /// The underlying backend error.
        #[source]
        source: MediaError,
        /// Location where this error was converted.
        location: ErrorLocation,
    },

    /// Invalid or unloadable configuration.
    #[error("Configuration error: {reason} {location}")]
    Config {
        /// Description of the problem.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from filesystem operations.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Location where this error was converted.
        location: ErrorLocation,
    },
}

// Manual From impls with location tracking.
// Cannot use #[from] because it does not support extra fields.
impl From<ConnectError> for RecorderError {
    #[track_caller]
    fn from(source: ConnectError) -> Self {
        RecorderError::Connect {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<WriteError> for RecorderError {
    #[track_caller]
    fn from(source: WriteError) -> Self {
        RecorderError::Write {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<MediaError> for RecorderError {
    #[track_caller]
    fn from(source: MediaError) -> Self {
        RecorderError::Media {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for RecorderError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        RecorderError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`RecorderError`].
pub type Result<T> = std::result::Result<T, RecorderError>;
