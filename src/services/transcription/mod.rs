pub mod dev;

use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

/// Streaming speech-to-text. Transcripts are delivered, in order, on the
/// channel handed to `connect`.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn connect(&self, events: mpsc::Sender<TranscriptEvent>) -> anyhow::Result<()>;

    async fn start_streaming(&self) -> anyhow::Result<()>;

    async fn send_audio(&self, chunk: &[u8]) -> anyhow::Result<()>;

    async fn disconnect(&self);
}
