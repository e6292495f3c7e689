use crate::{
    CancelSignal, ConnectError, Frame, FrameSource, MediaBackend, MediaError, RecordingSettings,
    StreamInfo, StreamRequest,
};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of a [`StreamConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No handle held.
    Disconnected,
    /// An attempt is in flight.
    Connecting,
    /// A valid handle is held.
    Connected,
    /// The last connect exhausted its attempts.
    Failed,
}

/// Count-bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts; zero is treated as one.
    pub max_retries: u32,
    /// Pause between failed attempts.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Policy taken from recording settings.
    pub fn from_settings(settings: &RecordingSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
        }
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Owns one handle to a live decoded frame source.
pub struct StreamConnection {
    request: StreamRequest,
    policy: RetryPolicy,
    backend: Arc<dyn MediaBackend>,
    source: Option<Box<dyn FrameSource>>,
    state: ConnectionState,
}

impl StreamConnection {
    /// Creates a disconnected connection.
    pub fn new(request: StreamRequest, policy: RetryPolicy, backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            request,
            policy,
            backend,
            source: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Properties of the held handle, if connected.
    pub fn info(&self) -> Option<StreamInfo> {
        self.source.as_ref().map(|s| s.info())
    }

    /// Opens the stream, retrying up to `max_retries` times.
    ///
    /// Any previously held handle is released first. A handle that opens
    /// but reports zero width, height or frame rate is closed and counted
    /// as a failed attempt.
    ///
    /// # Errors
    ///
    /// - [`ConnectError::DegenerateStream`] if the final attempt opened a
    ///   stream with invalid geometry.
    /// - [`ConnectError::Unreachable`] if every attempt failed otherwise.
    /// - [`ConnectError::Cancelled`] if cancellation arrived between attempts.
    #[track_caller]
    #[instrument(skip(self, cancel), fields(address = %self.request.address))]
    pub fn connect(&mut self, cancel: &CancelSignal) -> Result<StreamInfo, ConnectError> {
        self.release();

        let attempts = self.policy.attempts();
        let mut last_error: Option<MediaError> = None;
        let mut degenerate: Option<StreamInfo> = None;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            self.state = ConnectionState::Connecting;

            match self.backend.open_stream(&self.request) {
                Ok(mut source) => {
                    let info = source.info();
                    if info.is_valid() {
                        info!(
                            attempt = attempt,
                            dims = %info.dims,
                            fps = info.fps,
                            "Stream connected"
                        );
                        self.source = Some(source);
                        self.state = ConnectionState::Connected;
                        return Ok(info);
                    }

                    warn!(
                        attempt = attempt,
                        dims = %info.dims,
                        fps = info.fps,
                        "Stream reported invalid properties"
                    );
                    source.close();
                    degenerate = Some(info);
                    last_error = None;
                }
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Connection attempt failed");
                    degenerate = None;
                    last_error = Some(e);
                }
            }

            if attempt < attempts && !cancel.sleep(self.policy.retry_delay) {
                return Err(self.cancelled());
            }
        }

        self.state = ConnectionState::Failed;

        match degenerate {
            Some(info) => Err(ConnectError::DegenerateStream {
                address: self.request.address.to_string(),
                width: info.dims.width,
                height: info.dims.height,
                fps: info.fps,
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Err(ConnectError::Unreachable {
                address: self.request.address.to_string(),
                attempts,
                last_error,
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Reads one frame. `None` on a missed read or when not connected.
    pub fn read_frame(&mut self) -> Option<Frame> {
        self.source.as_mut()?.read()
    }

    /// Whether a handle is held and the source still reports itself up.
    pub fn is_alive(&mut self) -> bool {
        self.source.as_mut().is_some_and(|s| s.is_alive())
    }

    /// Releases the handle. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            debug!(address = %self.request.address, "Stream released");
        }
        if self.state != ConnectionState::Failed {
            self.state = ConnectionState::Disconnected;
        }
    }

    #[track_caller]
    fn cancelled(&mut self) -> ConnectError {
        self.state = ConnectionState::Disconnected;
        ConnectError::Cancelled {
            address: self.request.address.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.release();
    }
}
