//! Seam to the external decode/encode capability.
//!
//! The recorder never decodes or encodes video itself. A [`MediaBackend`]
//! connects to a stream address and yields decoded [`Frame`]s, and opens
//! sinks that turn frames into playable container files.

pub(crate) mod ffmpeg;

pub use ffmpeg::FfmpegBackend;

use crate::{MediaError, StreamAddress};

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

/// Frame geometry in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Creates a new geometry.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both sides are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One decoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Geometry of this frame.
    pub dims: Dimensions,
    /// Raw pixel data in the backend's pixel format.
    pub data: Vec<u8>,
}

impl Frame {
    /// Creates a frame from raw pixel data.
    pub fn new(dims: Dimensions, data: Vec<u8>) -> Self {
        Self { dims, data }
    }
}

/// Properties a stream reports once opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    /// Frame geometry.
    pub dims: Dimensions,
    /// Frame rate delivered to the reader.
    pub fps: f64,
}

impl StreamInfo {
    /// Positive width, height and frame rate.
    pub fn is_valid(&self) -> bool {
        self.dims.is_valid() && self.fps.is_finite() && self.fps > 0.0
    }
}

/// What to open: the resolved address plus the delivery rate cap.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Resolved stream address with embedded credentials.
    pub address: StreamAddress,
    /// Maximum frame rate to deliver, `None` for the native rate.
    pub target_fps: Option<u32>,
}

/// A live decoded frame source.
pub trait FrameSource: Send {
    /// Geometry and rate reported when the stream was opened.
    fn info(&self) -> StreamInfo;

    /// Reads the next frame. `None` is a missed read, not an error.
    fn read(&mut self) -> Option<Frame>;

    /// Whether the underlying connection is still up. A source that is not
    /// alive will never yield another frame.
    fn is_alive(&mut self) -> bool;

    /// Releases the connection. Must be safe to call more than once.
    fn close(&mut self);
}

/// An output that accepts frames and produces a playable container file.
pub trait FrameSink: Send {
    /// Appends one frame.
    fn write(&mut self, frame: &Frame) -> Result<(), MediaError>;

    /// Flushes and finalizes the container so the file is independently
    /// playable.
    fn finalize(self: Box<Self>) -> Result<(), MediaError>;
}

/// Factory for frame sources and sinks.
pub trait MediaBackend: Send + Sync {
    /// Connects to a stream.
    fn open_stream(&self, request: &StreamRequest) -> Result<Box<dyn FrameSource>, MediaError>;

    /// Opens a sink writing to `path` with fixed geometry and rate.
    fn open_sink(
        &self,
        path: &Path,
        dims: Dimensions,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>, MediaError>;

    /// File extension of produced segments, without the dot.
    fn segment_extension(&self) -> &str;
}
