use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

/// Session lifecycle.
///
/// ```text
/// Idle → Starting → Running → Stopping → Stopped
///            ↓          ↓
///          Error ←──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet started.
    Idle,
    /// Connecting to the stream.
    Starting,
    /// Capturing frames.
    Running,
    /// Releasing the writer and connection after cancellation.
    Stopping,
    /// All resources released.
    Stopped,
    /// Failed to start or failed while running.
    Error,
}

impl SessionState {
    /// No further transitions will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }

    /// The session has left `Idle`/`Starting`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Idle | Self::Starting)
    }
}

/// Why a session ended in [`SessionState::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionFailure {
    /// The stream could not be opened within the retry budget.
    Unreachable {
        /// Error description.
        reason: String,
    },
    /// The stream opened with zero width, height or frame rate.
    DegenerateStream {
        /// Error description.
        reason: String,
    },
    /// A segment could not be opened, written or finalized.
    SinkFailure {
        /// Error description.
        reason: String,
    },
    /// The connection dropped mid-recording and could not be re-established.
    Disconnected {
        /// Error description.
        reason: String,
    },
}

/// Snapshot of one session, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Source this session records.
    pub source_id: String,
    /// Lifecycle state.
    pub state: SessionState,
    /// Set when `state` is `Error`.
    pub failure: Option<SessionFailure>,
    /// When the session first reached `Running`.
    pub running_since: Option<DateTime<Local>>,
    /// Frames written across all segments.
    pub frames_written: u64,
    /// Segments finalized so far.
    pub segments_completed: u64,
    /// Successful reconnects after a mid-recording disconnect.
    pub reconnects: u64,
    /// Segment currently being written.
    pub current_segment: Option<PathBuf>,
}

impl SessionStatus {
    /// Initial status for a source.
    pub fn idle(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            state: SessionState::Idle,
            failure: None,
            running_since: None,
            frames_written: 0,
            segments_completed: 0,
            reconnects: 0,
            current_segment: None,
        }
    }

    /// Whether the session ever reached `Running`.
    pub fn reached_running(&self) -> bool {
        self.running_since.is_some()
    }
}
