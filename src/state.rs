use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::CallRecord;
use crate::services::orchestrator::{Collaborators, SessionConfig};
use crate::services::transcription::dev::DevTranscription;

/// The call currently on the line.
pub struct ActiveCall {
    pub call_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub hangup: CancellationToken,
}

pub struct AppState {
    pub session: SessionConfig,
    pub collaborators: Collaborators,
    pub dev_transcription: Arc<DevTranscription>,
    pub active_call: Mutex<Option<ActiveCall>>,
    pub calls: Mutex<Vec<CallRecord>>,
}

impl AppState {
    pub fn new(
        session: SessionConfig,
        collaborators: Collaborators,
        dev_transcription: Arc<DevTranscription>,
    ) -> Self {
        Self {
            session,
            collaborators,
            dev_transcription,
            active_call: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}
