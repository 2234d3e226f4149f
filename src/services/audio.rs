use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

/// Source of caller audio as fixed-size 16-bit PCM frames.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;

    /// `None` when no frame is ready or capture is stopped.
    async fn read_chunk(&self) -> Option<Vec<u8>>;

    async fn stop(&self);
}

/// Where synthesized speech goes.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, pcm: &[u8]) -> anyhow::Result<()>;
}

/// Capture that yields silent frames, for running without a phone line.
pub struct SilentLineCapture {
    frame_bytes: usize,
    recording: AtomicBool,
}

impl SilentLineCapture {
    pub fn new(sample_rate: u32, chunk_size: usize) -> Self {
        tracing::debug!(sample_rate, chunk_size, "silent line capture configured");
        Self {
            frame_bytes: chunk_size * 2,
            recording: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AudioCapture for SilentLineCapture {
    async fn start(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.frame_bytes > 0, "audio chunk size must be positive");
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read_chunk(&self) -> Option<Vec<u8>> {
        self.recording
            .load(Ordering::SeqCst)
            .then(|| vec![0; self.frame_bytes])
    }

    async fn stop(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }
}

/// Sink that only reports what would have been played.
pub struct LogSink;

#[async_trait]
impl AudioSink for LogSink {
    async fn play(&self, pcm: &[u8]) -> anyhow::Result<()> {
        tracing::debug!(bytes = pcm.len(), "playing synthesized audio");
        Ok(())
    }
}
