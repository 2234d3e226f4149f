use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;

use super::{collect_audio, SpeechStream, SpeechSynthesisService};

const API_BASE: &str = "https://api.elevenlabs.io/v1";
const OUTPUT_FORMAT: &str = "pcm_16000";

pub struct ElevenLabsSynthesis {
    api_key: String,
    voice_id: String,
    model_id: String,
    client: reqwest::Client,
    greeting_cache: Mutex<Option<Vec<u8>>>,
}

impl ElevenLabsSynthesis {
    pub fn new(api_key: String, voice_id: String, model_id: String) -> Self {
        Self {
            api_key,
            voice_id,
            model_id,
            client: reqwest::Client::new(),
            greeting_cache: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SpeechSynthesisService for ElevenLabsSynthesis {
    async fn connect(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.api_key.is_empty(), "ELEVENLABS_API_KEY is not set");
        anyhow::ensure!(!self.voice_id.is_empty(), "ELEVENLABS_VOICE_ID is not set");
        Ok(())
    }

    async fn synthesize(&self, text: &str) -> anyhow::Result<SpeechStream> {
        let body = json!({
            "text": text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(format!("{API_BASE}/text-to-speech/{}/stream", self.voice_id))
            .query(&[("output_format", OUTPUT_FORMAT)])
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call ElevenLabs API")?
            .error_for_status()
            .context("ElevenLabs API returned error")?;

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).context("ElevenLabs stream interrupted"));
        Ok(Box::pin(stream))
    }

    async fn greeting(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let mut cache = self.greeting_cache.lock().await;
        if let Some(audio) = cache.as_ref() {
            return Ok(audio.clone());
        }

        let audio = collect_audio(self.synthesize(text).await?).await?;
        tracing::info!(bytes = audio.len(), "cached greeting audio");
        *cache = Some(audio.clone());
        Ok(audio)
    }
}
