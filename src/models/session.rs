use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::errors::CallError;
use crate::models::{Action, Intent};

/// At most this many offered slots are remembered for confirmation.
pub const MAX_CACHED_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Greeting,
    Listening,
    Processing,
    Scheduling,
    Confirming,
    Declining,
    Ended,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Greeting => "greeting",
            CallState::Listening => "listening",
            CallState::Processing => "processing",
            CallState::Scheduling => "scheduling",
            CallState::Confirming => "confirming",
            CallState::Declining => "declining",
            CallState::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Speaker {
    Caller,
    Agent,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Caller => "Caller",
            Speaker::Agent => "Agent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Everything the orchestrator knows about the call in progress.
#[derive(Debug)]
pub struct CallSession {
    pub call_id: Uuid,
    pub state: CallState,
    pub transcript: Vec<TranscriptEntry>,
    pub is_active: bool,
    pub pending_action: Option<Action>,
    pub caller_purpose: String,
    pub intent: Intent,
    pub confidence: f32,
    pub available_slots: Vec<NaiveDateTime>,
    pub last_speech_time: Option<Instant>,
    scheduled_time: Option<NaiveDateTime>,
    confirmation_received: bool,
}

impl CallSession {
    pub fn new(call_id: Uuid) -> Self {
        Self {
            call_id,
            state: CallState::Idle,
            transcript: Vec::new(),
            is_active: false,
            pending_action: None,
            caller_purpose: String::new(),
            intent: Intent::Unclear,
            confidence: 0.0,
            available_slots: Vec::new(),
            last_speech_time: None,
            scheduled_time: None,
            confirmation_received: false,
        }
    }

    pub fn record(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            speaker,
            text: text.into(),
        });
    }

    pub fn last_caller_utterance(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|e| e.speaker == Speaker::Caller)
            .map(|e| e.text.as_str())
    }

    pub fn transcript_text(&self) -> String {
        self.transcript
            .iter()
            .map(|e| format!("{}: {}", e.speaker.as_str(), e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn offer_slots(&mut self, slots: &[NaiveDateTime]) {
        self.available_slots = slots.iter().take(MAX_CACHED_SLOTS).copied().collect();
    }

    pub fn scheduled_time(&self) -> Option<NaiveDateTime> {
        self.scheduled_time
    }

    pub fn confirmation_received(&self) -> bool {
        self.confirmation_received
    }

    pub fn ensure_confirmable(&self) -> Result<(), CallError> {
        if self.confirmation_received {
            return Err(CallError::ConfirmationPrecondition("already confirmed"));
        }
        if self.available_slots.is_empty() {
            return Err(CallError::ConfirmationPrecondition("no slots offered"));
        }
        Ok(())
    }

    /// Books `slot`. Succeeds once per session; `scheduled_time` never changes afterwards.
    pub fn confirm(&mut self, slot: NaiveDateTime) -> Result<NaiveDateTime, CallError> {
        self.ensure_confirmable()?;
        self.scheduled_time = Some(slot);
        self.confirmation_received = true;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_confirm_requires_offered_slots() {
        let mut session = CallSession::new(Uuid::new_v4());
        let err = session.confirm(dt("2025-06-16 10:00")).unwrap_err();
        assert!(matches!(err, CallError::ConfirmationPrecondition(_)));
        assert!(session.scheduled_time().is_none());
        assert!(!session.confirmation_received());
    }

    #[test]
    fn test_confirm_only_once() {
        let mut session = CallSession::new(Uuid::new_v4());
        session.offer_slots(&[dt("2025-06-16 10:00"), dt("2025-06-16 14:00")]);

        assert!(session.confirm(dt("2025-06-16 14:00")).is_ok());
        assert!(session.confirm(dt("2025-06-16 10:00")).is_err());
        assert_eq!(session.scheduled_time(), Some(dt("2025-06-16 14:00")));
    }

    #[test]
    fn test_offer_caches_three() {
        let mut session = CallSession::new(Uuid::new_v4());
        let slots: Vec<_> = ["09:00", "09:30", "10:00", "10:30", "11:00"]
            .iter()
            .map(|t| dt(&format!("2025-06-16 {t}")))
            .collect();
        session.offer_slots(&slots);
        assert_eq!(session.available_slots, slots[..3]);
    }

    #[test]
    fn test_transcript_text_and_last_caller() {
        let mut session = CallSession::new(Uuid::new_v4());
        session.record(Speaker::Agent, "Hello");
        session.record(Speaker::Caller, "Hi, it's Dana");
        session.record(Speaker::Agent, "How can I help?");
        assert_eq!(session.last_caller_utterance(), Some("Hi, it's Dana"));
        assert_eq!(
            session.transcript_text(),
            "Agent: Hello\nCaller: Hi, it's Dana\nAgent: How can I help?"
        );
    }
}
