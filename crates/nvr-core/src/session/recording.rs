//! Capture-to-disk state machine for one source.

use crate::{
    CancelSignal, ConnectError, Frame, RecorderContext, RecordingSettings, RetryPolicy,
    SegmentWriter, SessionFailure, SessionState, SessionStatus, SourceDescriptor,
    StreamConnection, StreamRequest, WriteError,
};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Binds one stream to the storage root and records it until cancelled.
///
/// Owns its [`StreamConnection`] and [`SegmentWriter`] exclusively. Frames
/// are written in read order; exactly one segment is open between the
/// first frame and stop, except for the instant between finalizing one
/// segment and the next frame opening its successor.
pub struct RecordingSession {
    session_id: Uuid,
    source: SourceDescriptor,
    stem: String,
    settings: RecordingSettings,
    context: RecorderContext,
    cancel: CancelSignal,
    status: watch::Sender<SessionStatus>,
    sequence: u64,
}

impl RecordingSession {
    /// Creates an idle session. `settings` is a snapshot; later changes to
    /// the caller's copy never reach a running session.
    pub fn new(
        source: SourceDescriptor,
        settings: RecordingSettings,
        context: RecorderContext,
        cancel: CancelSignal,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::idle(source.id.clone()));
        let stem = source.file_stem();

        Self {
            session_id: Uuid::new_v4(),
            source,
            stem,
            settings,
            context,
            cancel,
            status,
            sequence: 0,
        }
    }

    /// Receiver observing every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Runs the session to completion on the calling thread.
    ///
    /// Blocks on network and disk IO; run it on a dedicated thread or
    /// blocking task. Returns the final status, which is either `Stopped`
    /// or `Error`.
    #[instrument(skip(self), fields(source_id = %self.source.id, session_id = %self.session_id))]
    pub fn run(mut self) -> SessionStatus {
        self.transition(SessionState::Starting);

        let address = match self.source.resolve() {
            Ok(address) => address,
            Err(e) => {
                self.fail(SessionFailure::Unreachable {
                    reason: e.to_string(),
                });
                return self.snapshot();
            }
        };

        let request = StreamRequest {
            address,
            target_fps: Some(self.settings.target_fps),
        };
        let mut connection = StreamConnection::new(
            request,
            RetryPolicy::from_settings(&self.settings),
            self.context.backend.clone(),
        );

        let fps = match connection.connect(&self.cancel) {
            Ok(info) => info.fps,
            Err(ConnectError::Cancelled { .. }) => {
                info!("Cancelled before the stream connected");
                self.transition(SessionState::Stopped);
                return self.snapshot();
            }
            Err(e) => {
                self.fail(connect_failure(&e));
                return self.snapshot();
            }
        };

        let since = self.context.clock.now();
        self.status.send_modify(|s| {
            s.state = SessionState::Running;
            s.running_since = Some(since);
        });
        info!("Recording started");

        let mut writer = SegmentWriter::new(self.context.backend.clone());
        let outcome = self.capture(&mut connection, &mut writer, fps);

        match outcome {
            Ok(()) => {
                self.transition(SessionState::Stopping);
                let finished = self.finish_segment(&mut writer);
                connection.release();
                match finished {
                    Ok(()) => {
                        self.transition(SessionState::Stopped);
                        info!("Recording stopped and resources released");
                    }
                    Err(failure) => self.fail(failure),
                }
            }
            Err(failure) => {
                if let Err(e) = self.finish_segment(&mut writer) {
                    warn!(error = ?e, "Failed to finalize segment after failure");
                }
                connection.release();
                self.fail(failure);
            }
        }

        self.snapshot()
    }

    /// The Running loop. Returns `Ok` on cancellation.
    fn capture(
        &mut self,
        connection: &mut StreamConnection,
        writer: &mut SegmentWriter,
        mut fps: f64,
    ) -> Result<(), SessionFailure> {
        let segment_duration = self.settings.segment_duration();
        let mut consecutive_misses: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let Some(frame) = connection.read_frame() else {
                if !connection.is_alive() {
                    warn!("Stream lost, reconnecting");
                    self.finish_segment(writer)?;
                    match connection.connect(&self.cancel) {
                        Ok(info) => {
                            fps = info.fps;
                            consecutive_misses = 0;
                            self.status.send_modify(|s| s.reconnects += 1);
                            info!("Stream reconnected");
                            continue;
                        }
                        Err(ConnectError::Cancelled { .. }) => return Ok(()),
                        Err(e) => {
                            return Err(SessionFailure::Disconnected {
                                reason: e.to_string(),
                            });
                        }
                    }
                }

                consecutive_misses += 1;
                if writer.is_open() {
                    debug!(misses = consecutive_misses, "Missed frame read");
                } else {
                    debug!(misses = consecutive_misses, "Rotation deferred until next frame");
                }
                self.cancel.sleep(self.context.read_miss_backoff);
                continue;
            };
            consecutive_misses = 0;

            self.write_frame(writer, &frame, fps)?;

            if writer.should_rotate(&self.context.clock.now(), segment_duration) {
                self.finish_segment(writer)?;
                debug!("Segment rotated");
            }
        }
    }

    fn write_frame(
        &mut self,
        writer: &mut SegmentWriter,
        frame: &Frame,
        fps: f64,
    ) -> Result<(), SessionFailure> {
        if !writer.is_open() {
            self.open_segment(writer, frame, fps)?;
        }

        match writer.write(frame) {
            Ok(()) => {}
            Err(WriteError::GeometryMismatch {
                expected, actual, ..
            }) => {
                warn!(
                    expected = %expected,
                    actual = %actual,
                    "Stream geometry changed, starting a new segment"
                );
                self.finish_segment(writer)?;
                self.open_segment(writer, frame, fps)?;
                writer.write(frame).map_err(sink_failure)?;
            }
            Err(e) => return Err(sink_failure(e)),
        }

        self.status.send_modify(|s| s.frames_written += 1);
        Ok(())
    }

    fn open_segment(
        &mut self,
        writer: &mut SegmentWriter,
        frame: &Frame,
        fps: f64,
    ) -> Result<(), SessionFailure> {
        // Re-evaluated per segment so recordings spanning midnight move
        // into the new day's partition.
        let now = self.context.clock.now();
        self.sequence += 1;
        let path = self.context.layout.segment_path(
            &now,
            &self.stem,
            self.sequence,
            self.context.backend.segment_extension(),
        );

        writer
            .open(&path, frame.dims, fps, now)
            .map_err(sink_failure)?;

        self.status
            .send_modify(|s| s.current_segment = Some(path.clone()));
        Ok(())
    }

    fn finish_segment(&mut self, writer: &mut SegmentWriter) -> Result<(), SessionFailure> {
        let closed = writer.close();
        self.status.send_modify(|s| {
            s.current_segment = None;
            if matches!(closed, Ok(Some(_))) {
                s.segments_completed += 1;
            }
        });
        closed.map(|_| ()).map_err(sink_failure)
    }

    fn transition(&self, state: SessionState) {
        self.status.send_modify(|s| s.state = state);
        debug!(state = ?state, "Session state changed");
    }

    fn fail(&self, failure: SessionFailure) {
        error!(failure = ?failure, "Session failed");
        self.status.send_modify(|s| {
            s.state = SessionState::Error;
            s.failure = Some(failure);
            s.current_segment = None;
        });
    }

    fn snapshot(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}

fn connect_failure(error: &ConnectError) -> SessionFailure {
    match error {
        ConnectError::DegenerateStream { .. } => SessionFailure::DegenerateStream {
            reason: error.to_string(),
        },
        _ => SessionFailure::Unreachable {
            reason: error.to_string(),
        },
    }
}

fn sink_failure(error: WriteError) -> SessionFailure {
    SessionFailure::SinkFailure {
        reason: error.to_string(),
    }
}
