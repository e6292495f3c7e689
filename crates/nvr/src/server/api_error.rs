use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nvr_core::RecorderError;
use serde::Serialize;
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
struct ApiErrorResponse {
    code: &'static str,
    message: String,
}

/// Error type handlers return; rendered as JSON.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// 400 with a message.
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    /// 500 with a message.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RecorderError> for ApiError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::Config { reason, .. } => ApiError::bad_request(reason),
            other => {
                error!(error = %other, "Recorder error while handling request");
                ApiError::internal(other.to_string())
            }
        }
    }
}
