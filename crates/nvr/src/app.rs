use crate::{
    AppCommand, AppResult,
    config::Config,
    server::{self, AppState},
};

use std::{sync::Arc, time::Duration};

use nvr_core::SessionSupervisor;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{error, info, instrument, warn};

/// How long shutdown waits for the control server to drain.
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Main application state.
///
/// Owns the supervisor and the command channel. The control server, the
/// sweep scheduler and the Ctrl-C listener all run as separate tasks and
/// talk back through `command_tx` or the shared supervisor.
pub struct App {
    pub(crate) config: Config,
    pub(crate) supervisor: Arc<SessionSupervisor>,
    pub(crate) command_tx: mpsc::Sender<AppCommand>,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl App {
    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("NVR starting");

        let server_handle = tokio::spawn(server::serve(
            self.config.server.address(),
            AppState {
                supervisor: Arc::clone(&self.supervisor),
            },
            self.shutdown_tx.subscribe(),
        ));

        spawn_ctrl_c_listener(self.command_tx.clone());

        if let Some(period) = self.config.storage.sweep_interval() {
            spawn_sweep_scheduler(period, self.command_tx.clone(), self.shutdown_tx.subscribe());
        }

        let initial_start = spawn_initial_start(Arc::clone(&self.supervisor));

        self.sweep().await;

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AppCommand::Sweep => self.sweep().await,
                        AppCommand::Shutdown => {
                            info!("Shutdown requested");
                            break;
                        }
                    }
                }

                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            }
        }

        // Aborting only lands at an await, so sessions are either fully
        // registered or never spawned when stop() runs.
        initial_start.abort();
        let _ = initial_start.await;
        self.supervisor.stop().await;

        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, server_handle).await {
            Ok(Ok(Ok(()))) => info!("Control server stopped cleanly"),
            Ok(Ok(Err(e))) => error!(error = ?e, "Control server failed"),
            Ok(Err(e)) => error!(error = ?e, "Control server task panicked"),
            Err(_) => info!(
                "Control server did not stop within timeout, \
                     will be cleaned up on exit"
            ),
        }

        info!("NVR shut down successfully");

        Ok(())
    }

    /// Sweep with the stored retention setting.
    async fn sweep(&self) {
        match self.supervisor.cleanup_configured().await {
            Ok(deleted) => info!(deleted = deleted, "Scheduled retention sweep finished"),
            Err(e) => warn!(error = ?e, "Scheduled retention sweep skipped"),
        }
    }
}

/// Starts the configured sources without holding up the command loop, so a
/// Ctrl-C during slow connects is handled right away.
fn spawn_initial_start(supervisor: Arc<SessionSupervisor>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match supervisor.start_configured().await {
            Ok(report) => info!(
                started = report.started,
                requested = report.requested,
                "Configured sources started"
            ),
            Err(e) => error!(error = ?e, "Failed to start configured sources"),
        }
    })
}

/// Forwards Ctrl-C as a shutdown command.
fn spawn_ctrl_c_listener(command_tx: mpsc::Sender<AppCommand>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                if let Err(e) = command_tx.send(AppCommand::Shutdown).await {
                    error!(error = ?e, "Failed to send shutdown command");
                }
            }
            Err(e) => error!(error = ?e, "Failed to listen for Ctrl-C"),
        }
    });
}

/// Sends a sweep command every `period` until shutdown.
fn spawn_sweep_scheduler(
    period: Duration,
    command_tx: mpsc::Sender<AppCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if command_tx.send(AppCommand::Sweep).await.is_err() {
                        break;
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    });
}
