use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{wire_messages, LlmProvider, Message, WireMessage};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<SamplingOptions>,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Local model served by Ollama's `/api/chat`.
pub struct OllamaProvider {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        temperature: Option<f32>,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages(system_prompt, messages),
            stream: false,
            format: "json",
            options: temperature.map(|temperature| SamplingOptions { temperature }),
        };

        let reply: ChatResponse = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&request)
            .send()
            .await
            .context("Ollama request failed")?
            .error_for_status()
            .context("Ollama rejected the request")?
            .json()
            .await
            .context("unexpected Ollama payload")?;

        reply
            .message
            .map(|m| m.content)
            .context("Ollama reply had no message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_only_when_temperature_set() {
        let request = ChatRequest {
            model: "llama3.2",
            messages: wire_messages("summarize", &[]),
            stream: false,
            format: "json",
            options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("options").is_none());
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);

        let request = ChatRequest {
            options: Some(SamplingOptions { temperature: 0.3 }),
            ..request
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }
}
