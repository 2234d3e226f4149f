use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures inside a call session. None of these end the process: the
/// orchestrator logs them and answers the caller with fallback speech.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("service unavailable: {0}")]
    TransientService(String),

    #[error("could not parse {0}")]
    Parse(String),

    #[error("no free slots available")]
    Capacity,

    #[error("nothing to confirm: {0}")]
    ConfirmationPrecondition(&'static str),

    #[error("session setup failed: {0}")]
    SessionSetup(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
