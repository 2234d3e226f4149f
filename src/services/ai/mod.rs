pub mod classifier;
pub mod ollama;
pub mod openai;
pub mod summary;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Speaker, TranscriptEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl From<&TranscriptEntry> for Message {
    fn from(entry: &TranscriptEntry) -> Self {
        let role = match entry.speaker {
            Speaker::Caller => "user",
            Speaker::Agent => "assistant",
        };
        Self {
            role: role.to_string(),
            content: entry.text.clone(),
        }
    }
}

/// A message as it goes over the wire, borrowed from the call transcript.
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// System prompt first, then the conversation in order.
pub(crate) fn wire_messages<'a>(
    system_prompt: &'a str,
    messages: &'a [Message],
) -> Vec<WireMessage<'a>> {
    std::iter::once(WireMessage {
        role: "system",
        content: system_prompt,
    })
    .chain(messages.iter().map(|m| WireMessage {
        role: &m.role,
        content: &m.content,
    }))
    .collect()
}

/// Chat completion backend. Implementations ask the model for a JSON object.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        temperature: Option<f32>,
    ) -> anyhow::Result<String>;
}

/// Pulls a JSON object out of model output that may be fenced or wrapped in prose.
pub(crate) fn extract_json<T: serde::de::DeserializeOwned>(response: &str) -> Option<T> {
    if let Ok(v) = serde_json::from_str::<T>(response) {
        return Some(v);
    }

    let trimmed = response.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(v) = serde_json::from_str::<T>(cleaned) {
        return Some(v);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str::<T>(&cleaned[start..=end]).ok()
}
