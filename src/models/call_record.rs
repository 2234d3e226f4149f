use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{CallSummary, Intent};

/// A finished call as kept by the server.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub call_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub intent: Intent,
    pub turns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CallSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
