//! Deterministic collaborators for session, supervisor and retention tests.

#![allow(clippy::unwrap_used)]

use crate::{
    Clock, ConfigStore, CoreResult, Dimensions, Frame, FrameSink, FrameSource, MediaBackend,
    MediaError, RecorderContext, RecordingSettings, SourceDescriptor, StorageLayout, StreamInfo,
    StreamRequest,
};

use std::{
    collections::VecDeque,
    fs,
    panic::Location,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Local, TimeZone};
use error_location::ErrorLocation;

pub(crate) const HD: Dimensions = Dimensions {
    width: 1280,
    height: 720,
};

pub(crate) const SD: Dimensions = Dimensions {
    width: 640,
    height: 480,
};

/// 2026-06-14 10:00:00 local.
pub(crate) fn morning() -> DateTime<Local> {
    at(2026, 6, 14, 10, 0, 0)
}

pub(crate) fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
}

/// Clock that only moves when told to.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub(crate) fn new(start: DateTime<Local>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

/// What the next read of a scripted source does.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    /// Deliver a frame of this geometry.
    Frame(Dimensions),
    /// Return no frame while staying connected.
    Miss,
    /// Drop the connection.
    Lost,
}

/// Outcome of one `open_stream` call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Attempt {
    Ok,
    Fail,
    Degenerate,
}

/// What a sink saw.
#[derive(Debug, Clone)]
pub(crate) struct SinkRecord {
    pub(crate) path: PathBuf,
    pub(crate) dims: Dimensions,
    pub(crate) fps: f64,
    pub(crate) frames: usize,
    pub(crate) finalized: bool,
}

/// In-memory backend driven by a shared script of reads.
///
/// Reads past the end of the script are misses. Each delivered frame moves
/// the attached clock forward by `frame_interval`.
pub(crate) struct ScriptedBackend {
    info: StreamInfo,
    script: Arc<Mutex<VecDeque<Step>>>,
    attempts: Mutex<VecDeque<Attempt>>,
    unreachable_hosts: Vec<String>,
    clock: Option<Arc<ManualClock>>,
    frame_interval: Duration,
    fail_writes: bool,
    open_calls: AtomicU32,
    sinks: Arc<Mutex<Vec<SinkRecord>>>,
}

impl ScriptedBackend {
    pub(crate) fn new(info: StreamInfo) -> Self {
        Self {
            info,
            script: Arc::new(Mutex::new(VecDeque::new())),
            attempts: Mutex::new(VecDeque::new()),
            unreachable_hosts: Vec::new(),
            clock: None,
            frame_interval: Duration::from_millis(100),
            fail_writes: false,
            open_calls: AtomicU32::new(0),
            sinks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn hd() -> Self {
        Self::new(StreamInfo { dims: HD, fps: 15.0 })
    }

    pub(crate) fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script.lock().unwrap().extend(steps);
        self
    }

    pub(crate) fn with_frames(self, dims: Dimensions, count: usize) -> Self {
        self.with_script(std::iter::repeat_n(Step::Frame(dims), count))
    }

    pub(crate) fn with_attempts(self, attempts: impl IntoIterator<Item = Attempt>) -> Self {
        self.attempts.lock().unwrap().extend(attempts);
        self
    }

    pub(crate) fn with_unreachable_host(mut self, host: &str) -> Self {
        self.unreachable_hosts.push(host.to_string());
        self
    }

    pub(crate) fn with_clock(mut self, clock: Arc<ManualClock>, frame_interval: Duration) -> Self {
        self.clock = Some(clock);
        self.frame_interval = frame_interval;
        self
    }

    pub(crate) fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub(crate) fn open_calls(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sinks(&self) -> Vec<SinkRecord> {
        self.sinks.lock().unwrap().clone()
    }
}

impl MediaBackend for ScriptedBackend {
    fn open_stream(&self, request: &StreamRequest) -> Result<Box<dyn FrameSource>, MediaError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let unreachable = self
            .unreachable_hosts
            .iter()
            .any(|host| request.address.expose().contains(host.as_str()));
        let attempt = self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Ok);

        let info = match (unreachable, attempt) {
            (true, _) | (false, Attempt::Fail) => {
                return Err(MediaError::OpenFailed {
                    address: request.address.to_string(),
                    reason: "connection refused".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            (false, Attempt::Degenerate) => StreamInfo {
                dims: Dimensions::new(0, 0),
                fps: 0.0,
            },
            (false, Attempt::Ok) => self.info,
        };

        Ok(Box::new(ScriptedSource {
            info,
            script: self.script.clone(),
            clock: self.clock.clone(),
            frame_interval: self.frame_interval,
            alive: true,
        }))
    }

    fn open_sink(
        &self,
        path: &Path,
        dims: Dimensions,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>, MediaError> {
        fs::File::create(path).map_err(|source| MediaError::Pipe {
            source,
            location: ErrorLocation::from(Location::caller()),
        })?;

        let mut sinks = self.sinks.lock().unwrap();
        sinks.push(SinkRecord {
            path: path.to_path_buf(),
            dims,
            fps,
            frames: 0,
            finalized: false,
        });

        Ok(Box::new(ScriptedSink {
            index: sinks.len() - 1,
            sinks: self.sinks.clone(),
            fail_writes: self.fail_writes,
        }))
    }

    fn segment_extension(&self) -> &str {
        "mp4"
    }
}

struct ScriptedSource {
    info: StreamInfo,
    script: Arc<Mutex<VecDeque<Step>>>,
    clock: Option<Arc<ManualClock>>,
    frame_interval: Duration,
    alive: bool,
}

impl FrameSource for ScriptedSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn read(&mut self) -> Option<Frame> {
        if !self.alive {
            return None;
        }

        match self.script.lock().unwrap().pop_front() {
            Some(Step::Frame(dims)) => {
                if let Some(clock) = &self.clock {
                    clock.advance(self.frame_interval);
                }
                Some(Frame::new(dims, vec![0; 4]))
            }
            Some(Step::Lost) => {
                self.alive = false;
                None
            }
            Some(Step::Miss) | None => None,
        }
    }

    fn is_alive(&mut self) -> bool {
        self.alive
    }

    fn close(&mut self) {
        self.alive = false;
    }
}

struct ScriptedSink {
    index: usize,
    sinks: Arc<Mutex<Vec<SinkRecord>>>,
    fail_writes: bool,
}

impl FrameSink for ScriptedSink {
    fn write(&mut self, _frame: &Frame) -> Result<(), MediaError> {
        if self.fail_writes {
            return Err(MediaError::Pipe {
                source: std::io::Error::other("disk full"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.sinks.lock().unwrap()[self.index].frames += 1;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), MediaError> {
        self.sinks.lock().unwrap()[self.index].finalized = true;
        Ok(())
    }
}

/// Context over `backend` with fast timings and the given clock.
pub(crate) fn context(
    backend: Arc<ScriptedBackend>,
    root: &Path,
    clock: Arc<dyn Clock>,
) -> RecorderContext {
    RecorderContext::new(backend, StorageLayout::new(root))
        .with_clock(clock)
        .with_read_miss_backoff(Duration::from_millis(1))
        .with_join_timeout(Duration::from_secs(5))
}

/// Settings with instant retries.
pub(crate) fn fast_settings() -> RecordingSettings {
    RecordingSettings {
        segment_duration_secs: 5,
        max_retries: 2,
        retry_delay_secs: 0,
        ..RecordingSettings::default()
    }
}

/// A source pointing at `host` with credentials.
pub(crate) fn source(id: &str, host: &str) -> SourceDescriptor {
    SourceDescriptor::new(id, host, "admin", "secret")
}

/// Store holding a fixed configuration.
pub(crate) struct MemoryStore {
    state: Mutex<(Vec<SourceDescriptor>, RecordingSettings)>,
}

impl MemoryStore {
    pub(crate) fn new(sources: Vec<SourceDescriptor>, settings: RecordingSettings) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new((sources, settings)),
        })
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> CoreResult<(Vec<SourceDescriptor>, RecordingSettings)> {
        Ok(self.state.lock().unwrap().clone())
    }

    fn save(&self, sources: &[SourceDescriptor], settings: &RecordingSettings) -> CoreResult<()> {
        *self.state.lock().unwrap() = (sources.to_vec(), settings.clone());
        Ok(())
    }
}

/// Partition directory aged to `days` before `now`.
pub(crate) fn aged_partition(root: &Path, now: DateTime<Local>, days: i64) -> PathBuf {
    let date = now - chrono::Duration::days(days);
    let dir = root.join(StorageLayout::partition_name(&date));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("segment.mp4"), b"x").unwrap();
    let mtime = std::time::SystemTime::from(date);
    fs::File::open(&dir).unwrap().set_modified(mtime).unwrap();
    dir
}
