use crate::{CoreResult, RecordingSettings, SourceDescriptor};

/// Persistence for the source list and recording settings.
///
/// One instance is injected into the
/// [`SessionSupervisor`](crate::SessionSupervisor); nothing reads
/// configuration through globals.
pub trait ConfigStore: Send + Sync {
    /// Loads the configured sources and settings, falling back to defaults.
    fn load(&self) -> CoreResult<(Vec<SourceDescriptor>, RecordingSettings)>;

    /// Persists sources and settings.
    fn save(&self, sources: &[SourceDescriptor], settings: &RecordingSettings) -> CoreResult<()>;
}
