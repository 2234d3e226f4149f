use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::CallError;
use crate::models::{CallSummary, Intent};
use crate::services::ai::{extract_json, LlmProvider, Message};

const SYSTEM_PROMPT: &str = "You are a call summarization assistant. Return ONLY valid JSON.";
const SUMMARY_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Deserialize)]
struct RawSummary {
    #[serde(default)]
    caller_intent: Option<String>,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    scheduled_callback: Option<Value>,
    #[serde(default)]
    key_details: Option<Value>,
    #[serde(default)]
    confidence_score: Option<Value>,
}

fn summary_prompt(transcript: &str) -> String {
    format!(
        r#"Summarize this phone call transcript.

Transcript:
{transcript}

Return a JSON object with exactly these fields:
- "caller_intent": short description of why they called
- "classification": "spam", "legitimate" or "unclear"
- "outcome": what happened (declined, scheduled, unclear)
- "scheduled_callback": "YYYY-MM-DD HH:MM" if a callback was booked, otherwise null
- "key_details": important facts mentioned (names, companies, numbers)
- "confidence_score": number between 0.0 and 1.0"#
    )
}

fn parse_callback(value: Option<&Value>) -> Option<NaiveDateTime> {
    let raw = value?.as_str()?.trim();
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn text_from(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn decode_summary(response: &str) -> Result<CallSummary, CallError> {
    let raw: RawSummary =
        extract_json(response).ok_or_else(|| CallError::Parse("summary as JSON".to_string()))?;

    let confidence_score = match &raw.confidence_score {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite())
    .map(|c| c.clamp(0.0, 1.0) as f32)
    .unwrap_or(0.0);

    Ok(CallSummary {
        caller_intent: raw.caller_intent.unwrap_or_else(|| "Unknown".to_string()),
        classification: raw
            .classification
            .as_deref()
            .map(Intent::parse)
            .unwrap_or_default(),
        outcome: raw.outcome.unwrap_or_else(|| "unclear".to_string()),
        scheduled_callback: parse_callback(raw.scheduled_callback.as_ref()),
        key_details: text_from(raw.key_details),
        confidence_score,
    })
}

/// Reduces a finished call's transcript into a `CallSummary` via the language model.
pub struct CallSummaryBuilder {
    llm: Arc<dyn LlmProvider>,
}

impl CallSummaryBuilder {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Never fails; any model or decode error yields `CallSummary::unavailable()`.
    pub async fn summarize(&self, transcript: &str) -> CallSummary {
        let messages = [Message {
            role: "user".to_string(),
            content: summary_prompt(transcript),
        }];

        let response = match self
            .llm
            .chat(SYSTEM_PROMPT, &messages, Some(SUMMARY_TEMPERATURE))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "summary generation failed");
                return CallSummary::unavailable();
            }
        };

        decode_summary(&response).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "summary response was not usable");
            CallSummary::unavailable()
        })
    }
}
