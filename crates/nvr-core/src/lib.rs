//! NVR Core Library
//!
//! Records live network camera streams into fixed-length, date-partitioned
//! segment files and sweeps partitions past their retention horizon.
//! Decoding and encoding are delegated to a [`MediaBackend`]; the bundled
//! [`FfmpegBackend`] drives ffmpeg and ffprobe subprocesses.
//!
//! # Example
//!
//! ```no_run
//! use nvr_core::{
//!     FfmpegBackend, RecorderContext, RecordingSettings, SessionSupervisor, SourceDescriptor,
//!     StorageLayout,
//! };
//! # use nvr_core::{ConfigStore, CoreResult};
//!
//! use std::{sync::Arc, time::Duration};
//!
//! # struct Defaults;
//! # impl ConfigStore for Defaults {
//! #     fn load(&self) -> CoreResult<(Vec<SourceDescriptor>, RecordingSettings)> {
//! #         Ok((Vec::new(), RecordingSettings::default()))
//! #     }
//! #     fn save(&self, _: &[SourceDescriptor], _: &RecordingSettings) -> CoreResult<()> {
//! #         Ok(())
//! #     }
//! # }
//! #[tokio::main]
//! async fn main() {
//!     let context = RecorderContext::new(
//!         Arc::new(FfmpegBackend::default()),
//!         StorageLayout::new("storage"),
//!     );
//!     let supervisor = SessionSupervisor::new(Arc::new(Defaults), context);
//!
//!     let sources = vec![SourceDescriptor::new("gate", "192.168.1.64", "admin", "secret")];
//!     let started = supervisor.start(&sources, &RecordingSettings::default()).await;
//!     println!("{started} session(s) recording");
//!
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!     supervisor.stop().await;
//! }
//! ```

mod clock;
mod error;
mod media;
mod retention;
mod segment;
mod session;
mod settings;
mod stream;
mod supervisor;

pub use {
    clock::{Clock, SystemClock},
    error::{
        ConnectError, MediaError, RecorderError, Result as CoreResult, RetentionError, WriteError,
    },
    media::{
        Dimensions, FfmpegBackend, Frame, FrameSink, FrameSource, MediaBackend, StreamInfo,
        StreamRequest,
    },
    retention::{RetentionSweeper, SweepReport},
    segment::{PARTITION_FORMAT, SegmentState, SegmentSummary, SegmentWriter, StorageLayout},
    session::{
        CancelSignal, DEFAULT_JOIN_TIMEOUT, DEFAULT_READ_MISS_BACKOFF, RecorderContext,
        RecordingSession, SessionFailure, SessionState, SessionStatus,
    },
    settings::{ConfigStore, RecordingSettings},
    stream::{
        ConnectionState, DEFAULT_ADDRESS_TEMPLATE, RetryPolicy, SourceDescriptor, StreamAddress,
        StreamConnection,
    },
    supervisor::{SessionSupervisor, StartReport},
};
