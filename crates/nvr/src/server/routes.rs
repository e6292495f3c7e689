use crate::server::{ApiError, AppState};

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use nvr_core::{SessionState, SessionStatus, StartReport};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Body of `GET /status` and `POST /stop`.
#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    /// Whether any session is currently running.
    pub(crate) recording: bool,
    /// Per-source status, ordered by source id.
    pub(crate) sessions: Vec<SessionStatus>,
}

/// Optional body of `POST /cleanup`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CleanupRequest {
    /// Retention override in days; the configured value when absent.
    #[serde(default)]
    pub(crate) days: Option<u32>,
}

/// Body returned by `POST /cleanup`.
#[derive(Debug, Serialize)]
pub(crate) struct CleanupResponse {
    /// Partitions deleted.
    pub(crate) deleted: usize,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/cleanup", post(cleanup))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(snapshot(&state).await)
}

#[instrument(skip(state))]
async fn start(State(state): State<AppState>) -> Result<Json<StartReport>, ApiError> {
    let report = state.supervisor.start_configured().await?;
    info!(
        started = report.started,
        requested = report.requested,
        "Start requested over control API"
    );
    Ok(Json(report))
}

#[instrument(skip(state))]
async fn stop(State(state): State<AppState>) -> Json<StatusResponse> {
    state.supervisor.stop().await;
    info!("Stop requested over control API");
    Json(snapshot(&state).await)
}

#[instrument(skip(state, body))]
async fn cleanup(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let days = body.and_then(|Json(request)| request.days);

    let deleted = match days {
        Some(days) => state.supervisor.cleanup(days).await,
        None => state.supervisor.cleanup_configured().await?,
    };

    info!(deleted = deleted, days = ?days, "Cleanup requested over control API");
    Ok(Json(CleanupResponse { deleted }))
}

async fn snapshot(state: &AppState) -> StatusResponse {
    let sessions = state.supervisor.status().await;
    let recording = sessions.iter().any(|s| s.state == SessionState::Running);
    StatusResponse {
        recording,
        sessions,
    }
}
