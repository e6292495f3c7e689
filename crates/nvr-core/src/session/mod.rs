mod cancel;
mod context;
mod recording;
mod state;

pub use {
    cancel::CancelSignal,
    context::{DEFAULT_JOIN_TIMEOUT, DEFAULT_READ_MISS_BACKOFF, RecorderContext},
    recording::RecordingSession,
    state::{SessionFailure, SessionState, SessionStatus},
};
