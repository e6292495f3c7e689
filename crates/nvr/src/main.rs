//! NVR: records multiple network camera streams into date-partitioned
//! segment files, with an HTTP control surface and scheduled retention.

mod app;
mod app_command;
mod config;
mod error;
mod logging;
mod server;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    error::{AppError, Result as AppResult},
};

use crate::config::TomlConfigStore;

use std::sync::Arc;

use nvr_core::{FfmpegBackend, RecorderContext, SessionSupervisor, StorageLayout};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// Application entry point.
#[tokio::main]
async fn main() {
    let store = match TomlConfigStore::from_env() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to locate config: {}", e);
            std::process::exit(1);
        }
    };

    let config = match store.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Dropping the guard flushes the log file.
    let log_guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        config_path = ?store.path(),
        storage_root = ?config.storage.root,
        sources = config.sources.len(),
        "Configuration loaded"
    );

    if let Err(e) = config.validate() {
        error!(error = ?e, "Invalid configuration");
        drop(log_guard);
        std::process::exit(1);
    }

    let context = RecorderContext::new(
        Arc::new(FfmpegBackend::default()),
        StorageLayout::new(&config.storage.root),
    );
    let supervisor = Arc::new(SessionSupervisor::new(Arc::new(store), context));

    let (command_tx, command_rx) = mpsc::channel(32);
    let (shutdown_tx, _) = watch::channel(false);

    let app = App {
        config,
        supervisor,
        command_tx,
        command_rx,
        shutdown_tx,
    };

    if let Err(e) = app.run().await {
        error!(error = ?e, "App error");
        drop(log_guard);
        std::process::exit(1);
    }
}
