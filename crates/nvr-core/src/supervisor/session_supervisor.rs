use crate::{
    CancelSignal, ConfigStore, CoreResult, RecorderContext, RecordingSession, RecordingSettings,
    RetentionSweeper, SessionStatus, SourceDescriptor,
};

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use serde::Serialize;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tracing::{error, info, instrument, warn};

/// Counts returned by [`SessionSupervisor::start_configured`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartReport {
    /// Sessions that reached `Running`.
    pub started: usize,
    /// Distinct sources a session was created for.
    pub requested: usize,
}

struct SessionEntry {
    status: watch::Receiver<SessionStatus>,
    handle: Option<JoinHandle<SessionStatus>>,
}

#[derive(Default)]
struct ActiveSet {
    cancel: Option<watch::Sender<bool>>,
    sessions: BTreeMap<String, SessionEntry>,
}

/// Owns the set of live recording sessions.
///
/// `start`, `stop`, `status` and `cleanup` may be called concurrently from
/// any task; the bookkeeping is serialized behind one lock. Each session
/// runs on its own blocking task and shares one cancellation signal.
pub struct SessionSupervisor {
    store: Arc<dyn ConfigStore>,
    context: RecorderContext,
    start_lock: Mutex<()>,
    active: Mutex<ActiveSet>,
}

impl SessionSupervisor {
    /// Creates a supervisor with no sessions.
    pub fn new(store: Arc<dyn ConfigStore>, context: RecorderContext) -> Self {
        Self {
            store,
            context,
            start_lock: Mutex::new(()),
            active: Mutex::new(ActiveSet::default()),
        }
    }

    /// Loads sources and settings from the store and starts them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the settings are
    /// invalid. No session is touched in that case.
    #[instrument(skip(self))]
    pub async fn start_configured(&self) -> CoreResult<StartReport> {
        let (sources, settings) = self.store.load()?;
        settings.validate()?;

        Ok(self.launch(&sources, &settings).await)
    }

    /// Starts one session per source, stopping any already running first.
    ///
    /// Waits until every new session has either reached `Running` or
    /// failed, and returns how many reached `Running`. Failed sessions stay
    /// visible through [`status`](Self::status) until the next start.
    ///
    /// The session lock is released while waiting, so [`stop`](Self::stop)
    /// and [`status`](Self::status) stay responsive during slow connects. A
    /// `stop` that lands during the wait ends it early. Overlapping starts
    /// run one after the other.
    pub async fn start(&self, sources: &[SourceDescriptor], settings: &RecordingSettings) -> usize {
        self.launch(sources, settings).await.started
    }

    #[instrument(skip(self, sources, settings), fields(sources = sources.len()))]
    async fn launch(
        &self,
        sources: &[SourceDescriptor],
        settings: &RecordingSettings,
    ) -> StartReport {
        let _starting = self.start_lock.lock().await;

        let (pending, mut cancel_rx) = {
            let mut active = self.active.lock().await;

            if active.cancel.is_some() {
                info!("Stopping existing sessions before starting new ones");
                self.stop_locked(&mut active).await;
            }
            active.sessions.clear();

            let (cancel_tx, cancel_rx) = watch::channel(false);
            let mut pending = Vec::with_capacity(sources.len());
            let mut stems = BTreeMap::new();

            for source in sources {
                if active.sessions.contains_key(&source.id) {
                    warn!(source_id = %source.id, "Duplicate source id, ignoring");
                    continue;
                }
                if let Some(other) = stems.insert(source.file_stem(), source.id.clone()) {
                    warn!(
                        source_id = %source.id,
                        other_source_id = %other,
                        "Source id maps to the same file name as another source, ignoring"
                    );
                    continue;
                }

                let session = RecordingSession::new(
                    source.clone(),
                    settings.clone(),
                    self.context.clone(),
                    CancelSignal::new(cancel_rx.clone()),
                );
                let status = session.subscribe();
                let handle = tokio::task::spawn_blocking(move || session.run());

                active.sessions.insert(
                    source.id.clone(),
                    SessionEntry {
                        status: status.clone(),
                        handle: Some(handle),
                    },
                );
                pending.push((source.id.clone(), status));
            }
            active.cancel = Some(cancel_tx);

            (pending, cancel_rx)
        };

        for (source_id, status) in &pending {
            let mut status = status.clone();
            let settled = tokio::select! {
                settled = async {
                    status.wait_for(|s| s.state.is_settled()).await.map(|s| s.clone())
                } => settled,
                _ = cancel_rx.changed() => {
                    info!("Stop requested while sessions were starting");
                    break;
                }
            };

            match settled {
                Ok(snapshot) if snapshot.reached_running() => {}
                Ok(snapshot) => {
                    warn!(
                        source_id = %source_id,
                        state = ?snapshot.state,
                        failure = ?snapshot.failure,
                        "Session did not start"
                    );
                    if snapshot.state.is_terminal() {
                        self.join_failed(source_id).await;
                    }
                }
                Err(_) => {
                    error!(source_id = %source_id, "Session ended without reporting a state");
                }
            }
        }

        let started = pending
            .iter()
            .filter(|(_, status)| status.borrow().reached_running())
            .count();

        let report = StartReport {
            started,
            requested: pending.len(),
        };
        info!(
            started = report.started,
            requested = report.requested,
            "Sessions started"
        );

        report
    }

    /// Reaps a session that already ended in failure.
    async fn join_failed(&self, source_id: &str) {
        let handle = {
            let mut active = self.active.lock().await;
            active
                .sessions
                .get_mut(source_id)
                .and_then(|entry| entry.handle.take())
        };

        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(source_id = %source_id, error = ?e, "Session task failed");
        }
    }

    /// Signals every session to stop and waits for each to release its
    /// resources, up to the context's join timeout per session. Sessions
    /// that miss the timeout are abandoned and logged. Final states stay
    /// visible through [`status`](Self::status) until the next start.
    /// Idempotent.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        self.stop_locked(&mut active).await;
    }

    async fn stop_locked(&self, active: &mut ActiveSet) {
        let Some(cancel) = active.cancel.take() else {
            return;
        };

        // Err only means every session has already exited.
        let _ = cancel.send(true);

        let timeout = self.context.join_timeout;
        for (source_id, entry) in active.sessions.iter_mut() {
            let Some(handle) = entry.handle.take() else {
                continue;
            };

            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(status)) => {
                    info!(source_id = %source_id, state = ?status.state, "Session stopped");
                }
                Ok(Err(e)) => {
                    error!(source_id = %source_id, error = ?e, "Session task failed");
                }
                Err(_) => {
                    warn!(
                        source_id = %source_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Session did not stop in time, abandoning"
                    );
                }
            }
        }

        info!("All sessions stopped");
    }

    /// Latest status of every session from the most recent start, ordered
    /// by source id.
    pub async fn status(&self) -> Vec<SessionStatus> {
        let active = self.active.lock().await;
        active
            .sessions
            .values()
            .map(|entry| entry.status.borrow().clone())
            .collect()
    }

    /// Whether any session is currently `Running`.
    pub async fn is_recording(&self) -> bool {
        self.status()
            .await
            .iter()
            .any(|s| s.state == crate::SessionState::Running)
    }

    /// Deletes partitions older than `retention_days`, sparing any that an
    /// active session is writing into. Returns the number deleted.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, retention_days: u32) -> usize {
        let in_use: Vec<PathBuf> = {
            let active = self.active.lock().await;
            active
                .sessions
                .values()
                .filter_map(|entry| {
                    entry
                        .status
                        .borrow()
                        .current_segment
                        .as_deref()
                        .and_then(|p| p.parent())
                        .map(|p| p.to_path_buf())
                })
                .collect()
        };

        let sweeper = RetentionSweeper::new(
            self.context.layout.root().to_path_buf(),
            self.context.clock.clone(),
        )
        .protect(in_use);

        match tokio::task::spawn_blocking(move || sweeper.sweep(retention_days)).await {
            Ok(report) => {
                for failure in &report.failures {
                    warn!(error = %failure, "Retention sweep could not remove a partition");
                }
                report.deleted.len()
            }
            Err(e) => {
                error!(error = ?e, "Retention sweep task failed");
                0
            }
        }
    }

    /// Runs [`cleanup`](Self::cleanup) with the stored retention setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn cleanup_configured(&self) -> CoreResult<usize> {
        let (_, settings) = self.store.load()?;
        Ok(self.cleanup(settings.retention_days).await)
    }
}
