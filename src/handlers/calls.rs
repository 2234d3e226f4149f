use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, CallError};
use crate::models::{CallRecord, Intent};
use crate::services::orchestrator::{CallOrchestrator, CallReport};
use crate::state::{ActiveCall, AppState};

#[derive(Serialize)]
pub struct CallStarted {
    pub call_id: Uuid,
}

#[derive(Serialize)]
pub struct ActiveCallStatus {
    pub active: bool,
    pub call_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("call registry lock poisoned".to_string())
}

/// Answers the line. Only one call runs at a time.
pub async fn start_call(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CallStarted>), AppError> {
    let call_id = Uuid::new_v4();
    let orchestrator =
        CallOrchestrator::new(call_id, state.session.clone(), state.collaborators.clone());
    let started_at = Utc::now();

    {
        let mut active = state.active_call.lock().map_err(poisoned)?;
        if let Some(call) = active.as_ref() {
            return Err(AppError::Conflict(format!(
                "call {} is already in progress",
                call.call_id
            )));
        }
        *active = Some(ActiveCall {
            call_id,
            started_at,
            hangup: orchestrator.hangup_token(),
        });
    }

    tokio::spawn(run_call(state.clone(), orchestrator, call_id, started_at));
    tracing::info!(%call_id, "answering call");

    Ok((StatusCode::ACCEPTED, Json(CallStarted { call_id })))
}

async fn run_call(
    state: Arc<AppState>,
    orchestrator: CallOrchestrator,
    call_id: Uuid,
    started_at: DateTime<Utc>,
) {
    let result = orchestrator.run().await;
    let record = to_record(call_id, started_at, result);

    match state.calls.lock() {
        Ok(mut calls) => calls.push(record),
        Err(_) => tracing::warn!(%call_id, "call history unavailable, record dropped"),
    }
    if let Ok(mut active) = state.active_call.lock() {
        active.take();
    }
}

fn to_record(
    call_id: Uuid,
    started_at: DateTime<Utc>,
    result: Result<CallReport, CallError>,
) -> CallRecord {
    let ended_at = Utc::now();
    match result {
        Ok(report) => CallRecord {
            call_id,
            started_at,
            ended_at,
            intent: report.intent,
            turns: report.transcript.len(),
            summary: Some(report.summary),
            error: None,
        },
        Err(e) => {
            tracing::warn!(%call_id, error = %e, "call failed");
            CallRecord {
                call_id,
                started_at,
                ended_at,
                intent: Intent::Unclear,
                turns: 0,
                summary: None,
                error: Some(e.to_string()),
            }
        }
    }
}

pub async fn active_call(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ActiveCallStatus>, AppError> {
    let active = state.active_call.lock().map_err(poisoned)?;
    Ok(Json(ActiveCallStatus {
        active: active.is_some(),
        call_id: active.as_ref().map(|c| c.call_id),
        started_at: active.as_ref().map(|c| c.started_at),
    }))
}

pub async fn hang_up(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CallStarted>), AppError> {
    let active = state.active_call.lock().map_err(poisoned)?;
    let call = active
        .as_ref()
        .ok_or_else(|| AppError::NotFound("no call in progress".to_string()))?;

    call.hangup.cancel();
    tracing::info!(call_id = %call.call_id, "hangup requested");
    Ok((StatusCode::ACCEPTED, Json(CallStarted { call_id: call.call_id })))
}

/// Finished calls, newest first.
pub async fn list_calls(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CallRecord>>, AppError> {
    let calls = state.calls.lock().map_err(poisoned)?;
    Ok(Json(calls.iter().rev().cloned().collect()))
}
