use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{TranscriptEvent, TranscriptionService};

/// Transcription stand-in for local runs and tests: audio is counted and
/// dropped, transcripts are injected by hand (see `POST /api/dev/transcript`).
#[derive(Default)]
pub struct DevTranscription {
    events: Mutex<Option<mpsc::Sender<TranscriptEvent>>>,
    streaming: AtomicBool,
    audio_bytes: AtomicU64,
}

impl DevTranscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.events.lock().map(|e| e.is_some()).unwrap_or(false)
    }

    pub fn audio_bytes(&self) -> u64 {
        self.audio_bytes.load(Ordering::Relaxed)
    }

    pub async fn inject(&self, text: &str, is_final: bool) -> anyhow::Result<()> {
        let tx = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("transcription state poisoned"))?
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no call is connected"))?;

        tx.send(TranscriptEvent {
            text: text.to_string(),
            is_final,
        })
        .await
        .map_err(|_| anyhow::anyhow!("call is no longer listening"))
    }
}

#[async_trait]
impl TranscriptionService for DevTranscription {
    async fn connect(&self, events: mpsc::Sender<TranscriptEvent>) -> anyhow::Result<()> {
        let mut slot = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("transcription state poisoned"))?;
        *slot = Some(events);
        self.audio_bytes.store(0, Ordering::Relaxed);
        tracing::info!("dev transcription connected");
        Ok(())
    }

    async fn start_streaming(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.is_connected(), "transcription not connected");
        self.streaming.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn send_audio(&self, chunk: &[u8]) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.streaming.load(Ordering::Relaxed),
            "transcription is not streaming"
        );
        self.audio_bytes
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) {
        self.streaming.store(false, Ordering::Relaxed);
        if let Ok(mut slot) = self.events.lock() {
            slot.take();
        }
        tracing::info!(audio_bytes = self.audio_bytes(), "dev transcription disconnected");
    }
}
