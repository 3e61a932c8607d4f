//! Mock speech-to-text engine for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::voice::{AudioPayload, Transcriber, VoiceError};

/// Mock implementation of the Transcriber trait.
///
/// Returns queued transcripts (or errors) in order. With an empty queue every
/// call fails, which mirrors a speech service that returns nothing usable.
#[derive(Debug, Default)]
pub struct MockTranscriber {
    responses: Arc<RwLock<VecDeque<Result<String, VoiceError>>>>,
    /// Size of each audio payload received.
    received: Arc<RwLock<Vec<usize>>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transcript.
    pub async fn push_text(&self, text: &str) {
        self.responses.write().await.push_back(Ok(text.to_string()));
    }

    /// Queue a failure.
    pub async fn push_error(&self, reason: &str) {
        self.responses
            .write()
            .await
            .push_back(Err(VoiceError::TranscriptionFailed(reason.to_string())));
    }

    /// Number of transcriptions requested.
    pub async fn call_count(&self) -> usize {
        self.received.read().await.len()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, VoiceError> {
        self.received.write().await.push(audio.bytes.len());
        self.responses
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(VoiceError::TranscriptionFailed("no mock transcript".into())))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
