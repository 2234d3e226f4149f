use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

fn default_final() -> bool {
    true
}

#[derive(Deserialize)]
pub struct DevTranscript {
    pub text: String,
    #[serde(default = "default_final")]
    pub is_final: bool,
}

#[derive(Serialize)]
pub struct DevTranscriptResponse {
    pub delivered: bool,
}

/// Stands in for the speech-to-text service: the text is delivered to the
/// live call as if the caller had said it.
pub async fn send_transcript(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevTranscript>,
) -> Result<Json<DevTranscriptResponse>, AppError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Ok(Json(DevTranscriptResponse { delivered: false }));
    }

    state
        .dev_transcription
        .inject(text, payload.is_final)
        .await
        .map_err(|e| AppError::NotFound(e.to_string()))?;

    tracing::debug!(text, is_final = payload.is_final, "dev transcript injected");
    Ok(Json(DevTranscriptResponse { delivered: true }))
}
