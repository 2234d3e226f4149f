pub mod elevenlabs;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::{Stream, StreamExt};

/// Lazily produced PCM audio for one utterance.
pub type SpeechStream = Pin<Box<dyn Stream<Item = anyhow::Result<Vec<u8>>> + Send>>;

#[async_trait]
pub trait SpeechSynthesisService: Send + Sync {
    /// Checks the service is usable before a call starts.
    async fn connect(&self) -> anyhow::Result<()>;

    async fn synthesize(&self, text: &str) -> anyhow::Result<SpeechStream>;

    /// Same as `synthesize` but the audio is produced once and reused.
    async fn greeting(&self, text: &str) -> anyhow::Result<Vec<u8>>;
}

pub async fn collect_audio(mut stream: SpeechStream) -> anyhow::Result<Vec<u8>> {
    let mut audio = Vec::new();
    while let Some(chunk) = stream.next().await {
        audio.extend_from_slice(&chunk?);
    }
    Ok(audio)
}
