//! HTTP control surface over the session supervisor.

mod api_error;
mod routes;

pub(crate) use api_error::ApiError;

use crate::{AppError, AppResult};

use std::{panic::Location, sync::Arc};

use axum::Router;
use error_location::ErrorLocation;
use nvr_core::SessionSupervisor;
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, instrument};

/// Shared state handed to every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) supervisor: Arc<SessionSupervisor>,
}

/// Builds the control router.
pub(crate) fn router(state: AppState) -> Router {
    routes::router().with_state(state)
}

/// Serves the control API on `address` until `shutdown` turns true.
#[instrument(skip(state, shutdown))]
pub(crate) async fn serve(
    address: String,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> AppResult<()> {
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::ServerError {
            reason: format!("Failed to bind {}: {}", address, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!(address = %address, "Control server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                // Err means the sender is gone, which also means shut down.
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("Control server shutting down");
        })
        .await
        .map_err(|e| AppError::ServerError {
            reason: format!("Server error: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
