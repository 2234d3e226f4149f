use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::CallError;
use crate::models::slot::{format_slot, format_slots};
use crate::models::{Action, CallSession, CallState, CallSummary, Intent, Speaker, TranscriptEntry};
use crate::services::ai::classifier::ClassificationService;
use crate::services::ai::summary::CallSummaryBuilder;
use crate::services::audio::{AudioCapture, AudioSink};
use crate::services::clock::Clock;
use crate::services::scheduling::SchedulingEngine;
use crate::services::slot_matcher::best_slot;
use crate::services::speech::{collect_audio, SpeechSynthesisService};
use crate::services::time_expression::parse_requested_time;
use crate::services::transcription::{TranscriptEvent, TranscriptionService};

const DEFAULT_PURPOSE: &str = "Callback Request";
const BOOKING_NOTES: &str = "Scheduled by the call screening assistant";
const OFFERED_IN_SPEECH: usize = 2;

/// Checked in order, so longer phrases win over words they contain.
const PURPOSE_KEYWORDS: &[&str] = &[
    "blood test",
    "consultation",
    "appointment",
    "discussion",
    "follow up",
    "check up",
    "callback",
    "meeting",
    "call",
];

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub owner_name: String,
    /// Call ends when no caller turn completes for this long.
    pub silence_timeout: Duration,
    pub audio_poll_interval: Duration,
    pub transcript_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            owner_name: "the owner".to_string(),
            silence_timeout: Duration::from_secs(10),
            audio_poll_interval: Duration::from_millis(10),
            transcript_buffer: 64,
        }
    }
}

/// External services a call talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn AudioCapture>,
    pub transcription: Arc<dyn TranscriptionService>,
    pub classifier: Arc<dyn ClassificationService>,
    pub synthesis: Arc<dyn SpeechSynthesisService>,
    pub sink: Arc<dyn AudioSink>,
    pub scheduler: Arc<SchedulingEngine>,
    pub summarizer: Arc<CallSummaryBuilder>,
    pub clock: Arc<dyn Clock>,
}

/// What is left of a session once it has ended.
#[derive(Debug, Clone)]
pub struct CallReport {
    pub call_id: Uuid,
    pub state: CallState,
    pub intent: Intent,
    pub transcript: Vec<TranscriptEntry>,
    pub scheduled_time: Option<NaiveDateTime>,
    pub summary: CallSummary,
}

pub fn greeting_for(owner_name: &str) -> String {
    format!("Hello, you've reached {owner_name}'s AI assistant. How can I help you?")
}

pub(crate) fn extract_purpose(utterance: &str) -> String {
    let lower = utterance.to_lowercase();
    if let Some(keyword) = PURPOSE_KEYWORDS.iter().find(|k| lower.contains(*k)) {
        return title_case(keyword);
    }

    let words: Vec<&str> = utterance.split_whitespace().take(3).collect();
    if words.is_empty() {
        DEFAULT_PURPOSE.to_string()
    } else {
        words.join(" ")
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Forwards captured audio to transcription until cancelled.
async fn relay_audio(
    capture: Arc<dyn AudioCapture>,
    transcription: Arc<dyn TranscriptionService>,
    poll: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(chunk) = capture.read_chunk().await else {
                    continue;
                };
                if let Err(e) = transcription.send_audio(&chunk).await {
                    tracing::warn!(error = %e, "audio relay lost transcription");
                    break;
                }
                sent += 1;
                if sent == 1 {
                    tracing::info!("audio streaming started");
                } else if sent % 100 == 0 {
                    tracing::debug!(chunks = sent, "audio streaming");
                }
            }
        }
    }

    tracing::debug!(chunks = sent, "audio relay stopped");
}

/// Drives one call from greeting to summary. The orchestrator is the only
/// owner of the session; transcripts arrive over a channel and are handled one
/// at a time, while audio relaying runs as a separate task.
pub struct CallOrchestrator {
    config: SessionConfig,
    deps: Collaborators,
    session: CallSession,
    cancel: CancellationToken,
}

impl CallOrchestrator {
    pub fn new(call_id: Uuid, config: SessionConfig, deps: Collaborators) -> Self {
        Self {
            config,
            deps,
            session: CallSession::new(call_id),
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling the token hangs up at the next suspension point.
    pub fn hangup_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> CallState {
        self.session.state
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    fn transition(&mut self, next: CallState) {
        if self.session.state != next {
            tracing::debug!(
                call_id = %self.session.call_id,
                from = self.session.state.as_str(),
                to = next.as_str(),
                "call state"
            );
            self.session.state = next;
        }
    }

    pub async fn run(mut self) -> Result<CallReport, CallError> {
        let call_id = self.session.call_id;
        tracing::info!(%call_id, "call started");
        self.session.is_active = true;
        self.transition(CallState::Greeting);

        if let Err(e) = self.deps.synthesis.connect().await {
            tracing::warn!(%call_id, error = %e, "speech synthesis unavailable, aborting call");
            self.transition(CallState::Ended);
            return Err(CallError::SessionSetup(format!("speech synthesis: {e:#}")));
        }

        let greeting = greeting_for(&self.config.owner_name);
        self.session.record(Speaker::Agent, &greeting);
        self.play_greeting(&greeting).await;

        let (tx, rx) = mpsc::channel(self.config.transcript_buffer);
        if let Err(e) = self.open_transcription(tx).await {
            tracing::warn!(%call_id, error = %e, "aborting call");
            self.transition(CallState::Ended);
            return Err(e);
        }

        self.session.last_speech_time = Some(Instant::now());
        self.listen(rx).await;
        Ok(self.finish().await)
    }

    async fn open_transcription(
        &self,
        tx: mpsc::Sender<TranscriptEvent>,
    ) -> Result<(), CallError> {
        let transcription = &self.deps.transcription;
        transcription
            .connect(tx)
            .await
            .map_err(|e| CallError::SessionSetup(format!("transcription connect: {e:#}")))?;

        if let Err(e) = transcription.start_streaming().await {
            transcription.disconnect().await;
            return Err(CallError::SessionSetup(format!("transcription streaming: {e:#}")));
        }
        Ok(())
    }

    async fn listen(&mut self, mut rx: mpsc::Receiver<TranscriptEvent>) {
        self.transition(CallState::Listening);

        if let Err(e) = self.deps.capture.start().await {
            tracing::warn!(call_id = %self.session.call_id, error = %e, "failed to start audio capture");
            self.session.is_active = false;
            return;
        }

        let relay: JoinHandle<()> = tokio::spawn(relay_audio(
            self.deps.capture.clone(),
            self.deps.transcription.clone(),
            self.config.audio_poll_interval,
            self.cancel.child_token(),
        ));
        let cancel = self.cancel.clone();

        while self.session.is_active {
            let deadline = self
                .session
                .last_speech_time
                .unwrap_or_else(Instant::now)
                + self.config.silence_timeout;

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(call_id = %self.session.call_id, "call hung up");
                    self.session.is_active = false;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!(call_id = %self.session.call_id, "silence detected, ending call");
                    self.session.is_active = false;
                }
                event = rx.recv() => match event {
                    Some(TranscriptEvent { text, is_final: true }) => {
                        self.handle_turn(&text).await;
                        self.session.last_speech_time = Some(Instant::now());
                    }
                    Some(TranscriptEvent { text, .. }) => {
                        tracing::debug!(partial = %text, "interim transcript");
                    }
                    None => {
                        tracing::warn!(call_id = %self.session.call_id, "transcription stream closed");
                        self.session.is_active = false;
                    }
                },
            }
        }

        self.cancel.cancel();
        if let Err(e) = relay.await {
            tracing::warn!(error = %e, "audio relay task failed");
        }
    }

    /// One caller turn: classify, then act on the returned action.
    pub async fn handle_turn(&mut self, utterance: &str) {
        self.transition(CallState::Processing);
        tracing::info!(call_id = %self.session.call_id, caller = utterance, "caller turn");
        self.session.record(Speaker::Caller, utterance);

        let result = self
            .deps
            .classifier
            .classify(&self.session.transcript, self.session.intent)
            .await;
        self.session.record(Speaker::Agent, &result.response_text);
        self.session.intent = result.intent;
        self.session.confidence = result.confidence;

        tracing::info!(
            call_id = %self.session.call_id,
            intent = result.intent.as_str(),
            action = result.action.as_str(),
            confidence = result.confidence,
            "turn classified"
        );

        let reply = match result.action {
            Action::Schedule => {
                self.transition(CallState::Scheduling);
                self.offer_callback(utterance, &result.response_text).await
            }
            Action::Decline | Action::EndCall => {
                self.transition(CallState::Declining);
                self.session.pending_action = Some(result.action);
                self.session.is_active = false;
                result.response_text
            }
            Action::Confirm => {
                self.transition(CallState::Confirming);
                match self.confirm_callback().await {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::info!(reason = %e, "confirmation skipped, repeating agent reply");
                        result.response_text
                    }
                }
            }
            Action::Continue => result.response_text,
        };

        self.speak(&reply).await;

        if self.session.is_active {
            self.transition(CallState::Listening);
        }
    }

    async fn find_slots(&self) -> Result<Vec<NaiveDateTime>, CallError> {
        let slots = self.deps.scheduler.free_slots(self.deps.clock.now()).await;
        if slots.is_empty() {
            return Err(CallError::Capacity);
        }
        Ok(slots)
    }

    async fn offer_callback(&mut self, utterance: &str, response: &str) -> String {
        self.session.caller_purpose = extract_purpose(utterance);

        match self.find_slots().await {
            Ok(slots) => {
                self.session.offer_slots(&slots);
                let spoken = format_slots(&slots[..slots.len().min(OFFERED_IN_SPEECH)]);
                let message = format!(
                    "{response} Available times are {}. Which works for you?",
                    spoken.join(", ")
                );
                self.session.record(Speaker::Agent, &message);
                message
            }
            Err(e) => {
                tracing::warn!(error = %e, "no callback times to offer");
                response.to_string()
            }
        }
    }

    async fn confirm_callback(&mut self) -> Result<String, CallError> {
        self.session.ensure_confirmable()?;

        let requested = self
            .session
            .last_caller_utterance()
            .and_then(|u| parse_requested_time(u, self.deps.clock.now()));
        let chosen = best_slot(&self.session.available_slots, requested)
            .ok_or(CallError::ConfirmationPrecondition("no slots offered"))?;
        self.session.confirm(chosen)?;

        let label = if self.session.caller_purpose.is_empty() {
            DEFAULT_PURPOSE
        } else {
            self.session.caller_purpose.as_str()
        };
        match self.deps.scheduler.book(chosen, label, BOOKING_NOTES).await {
            Ok(Some(link)) => tracing::info!(slot = %chosen, link = %link, "calendar event created"),
            Ok(None) => tracing::info!(slot = %chosen, "calendar event created"),
            Err(e) => tracing::warn!(slot = %chosen, error = %e, "calendar event not created"),
        }

        let message = format!(
            "Perfect! I've scheduled your callback for {}. Thank you for calling!",
            format_slot(&chosen)
        );
        self.session.record(Speaker::Agent, &message);
        self.session.is_active = false;
        Ok(message)
    }

    async fn play_greeting(&self, text: &str) {
        match self.deps.synthesis.greeting(text).await {
            Ok(pcm) => self.play(&pcm).await,
            Err(e) => tracing::warn!(error = %e, "greeting synthesis failed"),
        }
    }

    async fn speak(&self, text: &str) {
        tracing::info!(call_id = %self.session.call_id, agent = text, "speaking");
        let audio = match self.deps.synthesis.synthesize(text).await {
            Ok(stream) => collect_audio(stream).await,
            Err(e) => Err(e),
        };
        match audio {
            Ok(pcm) => self.play(&pcm).await,
            Err(e) => tracing::warn!(error = %e, "speech synthesis failed"),
        }
    }

    async fn play(&self, pcm: &[u8]) {
        if pcm.is_empty() {
            tracing::warn!("synthesis returned no audio");
            return;
        }
        if let Err(e) = self.deps.sink.play(pcm).await {
            tracing::warn!(error = %e, "audio playback failed");
        }
    }

    async fn finish(mut self) -> CallReport {
        self.transition(CallState::Ended);
        self.session.is_active = false;
        self.cancel.cancel();
        self.deps.capture.stop().await;
        self.deps.transcription.disconnect().await;

        let mut summary = self
            .deps
            .summarizer
            .summarize(&self.session.transcript_text())
            .await;
        if let Some(booked) = self.session.scheduled_time() {
            summary.scheduled_callback = Some(booked);
        }

        tracing::info!(call_id = %self.session.call_id, "call ended\n{summary}");

        CallReport {
            call_id: self.session.call_id,
            state: self.session.state,
            intent: self.session.intent,
            scheduled_time: self.session.scheduled_time(),
            transcript: self.session.transcript,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_keyword() {
        assert_eq!(extract_purpose("I'm calling about my blood test results"), "Blood Test");
        assert_eq!(extract_purpose("Need a CONSULTATION next week"), "Consultation");
        assert_eq!(extract_purpose("please give me a callback"), "Callback");
        assert_eq!(extract_purpose("can we follow up on the quote"), "Follow Up");
    }

    #[test]
    fn test_purpose_falls_back_to_first_words() {
        assert_eq!(extract_purpose("Quarterly budget review with Acme"), "Quarterly budget review");
        assert_eq!(extract_purpose("Hi"), "Hi");
        assert_eq!(extract_purpose("   "), DEFAULT_PURPOSE);
    }
}
