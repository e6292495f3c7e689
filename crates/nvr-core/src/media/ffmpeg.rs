use crate::{
    Dimensions, Frame, FrameSink, FrameSource, MediaBackend, MediaError, StreamAddress,
    StreamInfo, StreamRequest,
};

use std::{
    fs::{self, File},
    io::{BufReader, ErrorKind, Read, Write},
    panic::Location,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use error_location::ErrorLocation;
use tracing::{debug, info, instrument, warn};

/// Raw pixel layout exchanged with ffmpeg over pipes.
const PIXEL_FORMAT: &str = "bgr24";
const BYTES_PER_PIXEL: usize = 3;

/// Socket timeout for rtsp inputs, in microseconds.
const RTSP_TIMEOUT_MICROS: &str = "5000000";

/// [`MediaBackend`] driving the `ffmpeg` and `ffprobe` binaries.
///
/// Streams are probed with ffprobe, then decoded to raw `bgr24` frames on
/// ffmpeg's stdout. Sinks pipe raw frames into ffmpeg's stdin and encode
/// H.264 into fragmented MP4, which stays readable even when the encoder
/// is killed before it can finalize.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    /// Uses `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::with_binaries("ffmpeg", "ffprobe")
    }

    /// Uses explicit binary paths.
    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    #[track_caller]
    #[instrument(skip(self))]
    fn probe(&self, address: &StreamAddress) -> Result<StreamInfo, MediaError> {
        let mut args = input_args(address);
        args.extend(
            [
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate",
                "-of",
                "csv=p=0",
            ]
            .map(String::from),
        );
        args.push(address.expose().to_string());

        let output = Command::new(&self.ffprobe)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| MediaError::ProcessFailed {
                reason: format!("Failed to run ffprobe: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if !output.status.success() {
            return Err(MediaError::OpenFailed {
                address: address.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&stdout).ok_or_else(|| MediaError::OpenFailed {
            address: address.to_string(),
            reason: format!("Unexpected ffprobe output: {}", stdout.trim()),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl MediaBackend for FfmpegBackend {
    #[track_caller]
    #[instrument(skip(self, request), fields(address = %request.address))]
    fn open_stream(&self, request: &StreamRequest) -> Result<Box<dyn FrameSource>, MediaError> {
        let probed = self.probe(&request.address)?;

        let info = StreamInfo {
            dims: probed.dims,
            fps: delivered_fps(probed.fps, request.target_fps),
        };

        // Nothing to decode; the connection layer rejects this geometry.
        if !info.is_valid() {
            return Ok(Box::new(FfmpegSource {
                info,
                child: None,
                stdout: None,
                frame_len: 0,
                alive: false,
            }));
        }

        let mut child = Command::new(&self.ffmpeg)
            .args(decoder_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::ProcessFailed {
                reason: format!("Failed to start ffmpeg decoder: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| MediaError::ProcessFailed {
            reason: "Failed to capture ffmpeg stdout".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let frame_len = frame_len(info.dims);

        info!(
            dims = %info.dims,
            fps = info.fps,
            "ffmpeg decoder started"
        );

        Ok(Box::new(FfmpegSource {
            info,
            child: Some(child),
            stdout: Some(BufReader::with_capacity(frame_len * 2, stdout)),
            frame_len,
            alive: true,
        }))
    }

    #[track_caller]
    #[instrument(skip(self))]
    fn open_sink(
        &self,
        path: &Path,
        dims: Dimensions,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>, MediaError> {
        // Claim the filename first; fails with NotFound if the partition
        // directory was removed underneath us.
        File::create(path).map_err(|source| MediaError::Pipe {
            source,
            location: ErrorLocation::from(Location::caller()),
        })?;

        let args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            PIXEL_FORMAT.to_string(),
            "-s".to_string(),
            dims.to_string(),
            "-r".to_string(),
            format!("{:.3}", fps),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+frag_keyframe+empty_moov+default_base_moof".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                discard_claimed(path);
                MediaError::ProcessFailed {
                    reason: format!("Failed to start ffmpeg encoder: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                }
            })?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            discard_claimed(path);
            return Err(MediaError::ProcessFailed {
                reason: "Failed to capture ffmpeg stdin".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        debug!(path = ?path, dims = %dims, fps = fps, "ffmpeg encoder started");

        Ok(Box::new(FfmpegSink {
            path: path.to_path_buf(),
            child: Some(child),
            stdin: Some(stdin),
            frame_len: frame_len(dims),
            frames: 0,
        }))
    }

    fn segment_extension(&self) -> &str {
        "mp4"
    }
}

struct FfmpegSource {
    info: StreamInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    frame_len: usize,
    alive: bool,
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn read(&mut self) -> Option<Frame> {
        let stdout = self.stdout.as_mut()?;
        let mut buffer = vec![0u8; self.frame_len];

        match stdout.read_exact(&mut buffer) {
            Ok(()) => Some(Frame::new(self.info.dims, buffer)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("ffmpeg decoder reached end of stream");
                self.alive = false;
                None
            }
            Err(e) => {
                debug!(error = %e, "Frame read failed");
                None
            }
        }
    }

    fn is_alive(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        if let Some(child) = self.child.as_mut()
            && let Ok(Some(status)) = child.try_wait()
        {
            debug!(status = %status, "ffmpeg decoder exited");
            self.alive = false;
        }
        self.alive
    }

    fn close(&mut self) {
        self.alive = false;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            debug!("ffmpeg decoder released");
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}

struct FfmpegSink {
    path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frame_len: usize,
    frames: u64,
}

impl FfmpegSink {
    #[track_caller]
    fn finish(&mut self) -> Result<(), MediaError> {
        // Closing stdin signals EOF so ffmpeg flushes and exits.
        drop(self.stdin.take());

        let Some(child) = self.child.take() else {
            return Ok(());
        };

        let output = child
            .wait_with_output()
            .map_err(|e| MediaError::ProcessFailed {
                reason: format!("Failed to wait for ffmpeg: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if !output.status.success() {
            return Err(MediaError::ProcessFailed {
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        debug!(path = ?self.path, frames = self.frames, "ffmpeg encoder finished");
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    #[track_caller]
    fn write(&mut self, frame: &Frame) -> Result<(), MediaError> {
        if frame.data.len() != self.frame_len {
            return Err(MediaError::ProcessFailed {
                reason: format!(
                    "Frame has {} bytes, encoder expects {}",
                    frame.data.len(),
                    self.frame_len
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| MediaError::ProcessFailed {
            reason: "Encoder already finished".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        stdin
            .write_all(&frame.data)
            .map_err(|source| MediaError::Pipe {
                source,
                location: ErrorLocation::from(Location::caller()),
            })?;
        self.frames += 1;
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<(), MediaError> {
        self.finish()
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some()
            && let Err(e) = self.finish()
        {
            warn!(path = ?self.path, error = %e, "Best-effort segment finalization failed");
        }
    }
}

/// Removes the empty file claimed for a sink whose encoder never started.
fn discard_claimed(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = ?path, "Removed unused segment file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?path, error = %e, "Failed to remove unused segment file"),
    }
}

fn frame_len(dims: Dimensions) -> usize {
    dims.width as usize * dims.height as usize * BYTES_PER_PIXEL
}

/// Output rate the decoder resamples to, if any.
fn output_fps(target_fps: Option<u32>) -> Option<u32> {
    target_fps.filter(|t| *t > 0)
}

/// Rate frames actually arrive at. With an output rate set, ffmpeg drops or
/// duplicates frames to hit it exactly, whatever the camera sends.
pub(crate) fn delivered_fps(probed_fps: f64, target_fps: Option<u32>) -> f64 {
    match output_fps(target_fps) {
        Some(target) if probed_fps > 0.0 => f64::from(target),
        _ => probed_fps,
    }
}

/// Full argument list of the decoding process.
pub(crate) fn decoder_args(request: &StreamRequest) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
    ];
    args.extend(input_args(&request.address));
    args.extend(["-i".to_string(), request.address.expose().to_string()]);
    args.push("-an".to_string());
    if let Some(target) = output_fps(request.target_fps) {
        args.extend(["-r".to_string(), target.to_string()]);
    }
    args.extend(["-f", "rawvideo", "-pix_fmt", PIXEL_FORMAT, "-"].map(String::from));
    args
}

/// Input options placed before `-i`.
pub(crate) fn input_args(address: &StreamAddress) -> Vec<String> {
    if address.scheme() == "rtsp" {
        vec![
            "-rtsp_transport".to_string(),
            "tcp".to_string(),
            "-timeout".to_string(),
            RTSP_TIMEOUT_MICROS.to_string(),
        ]
    } else {
        Vec::new()
    }
}

/// Parses `width,height,num/den` as printed by ffprobe's csv writer.
pub(crate) fn parse_probe_output(output: &str) -> Option<StreamInfo> {
    let line = output.lines().find(|l| !l.trim().is_empty())?;
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() < 3 {
        return None;
    }

    let width = parts[0].trim().parse().ok()?;
    let height = parts[1].trim().parse().ok()?;
    let fps = parse_frame_rate(parts[2].trim())?;

    Some(StreamInfo {
        dims: Dimensions::new(width, height),
        fps,
    })
}

/// Parses `30`, `25/1` or `30000/1001`. A zero denominator yields 0.
pub(crate) fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 { Some(0.0) } else { Some(num / den) }
        }
        None => rate.parse().ok(),
    }
}
