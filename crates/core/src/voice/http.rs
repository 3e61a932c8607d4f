//! HTTP speech-to-text client.
//!
//! Posts the audio as a multipart upload (`file`, `model`, `language`) and
//! expects `{ "text": "..." }` back, the shape used by Whisper-compatible
//! transcription endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::VoiceConfig;

use super::{AudioPayload, Transcriber, VoiceError};

pub struct HttpTranscriber {
    client: Client,
    url: String,
    token: String,
    model: String,
    language: String,
}

impl HttpTranscriber {
    pub fn new(config: &VoiceConfig, token: String) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| VoiceError::Disabled(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            token,
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, VoiceError> {
        debug!(
            bytes = audio.bytes.len(),
            mime = %audio.mime_type,
            "Sending audio for transcription"
        );

        let part = Part::bytes(audio.bytes.clone())
            .file_name(file_name_for(&audio.mime_type))
            .mime_str(&audio.mime_type)
            .map_err(|e| VoiceError::TranscriptionFailed(format!("invalid MIME type: {}", e)))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::TranscriptionFailed(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            VoiceError::TranscriptionFailed(format!("Failed to parse response: {}", e))
        })?;

        Ok(result.text)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

fn file_name_for(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/ogg" | "audio/opus" => "voice.ogg",
        "audio/mpeg" | "audio/mp3" => "voice.mp3",
        "audio/wav" | "audio/x-wav" => "voice.wav",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "voice.m4a",
        "audio/webm" => "voice.webm",
        _ => "voice.bin",
    }
}
