//! Voice message support.
//!
//! `VoiceBridge` is resolved once at startup: either a working `Transcriber`
//! or an explicit `Unavailable` carrying the reason. Callers check the
//! variant instead of carrying an optional transcriber around.

mod http;

pub use http::HttpTranscriber;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::VoiceConfig;

/// Errors from the voice path.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// The speech service failed or returned no text.
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Voice support is not available for this process.
    #[error("Voice support disabled: {0}")]
    Disabled(String),
}

/// Raw audio as received from the chat frontend.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. "audio/ogg".
    pub mime_type: String,
}

impl AudioPayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

/// Speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Convert audio to text.
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, VoiceError>;

    /// Name of this engine for logs.
    fn name(&self) -> &str;
}

/// Voice capability of the running process.
#[derive(Clone)]
pub enum VoiceBridge {
    Available(Arc<dyn Transcriber>),
    Unavailable { reason: String },
}

impl VoiceBridge {
    /// Resolve the voice capability from configuration.
    ///
    /// The credentials file is read exactly once; a missing or empty file
    /// disables voice for the process lifetime.
    pub fn from_config(config: &VoiceConfig) -> Self {
        if !config.enabled {
            info!("Voice commands disabled in config");
            return Self::unavailable("disabled in configuration");
        }

        let path = match &config.credentials_path {
            Some(path) => path,
            None => {
                warn!("Voice enabled but no credentials path configured");
                return Self::unavailable("no credentials path configured");
            }
        };

        match read_credentials(path) {
            Some(token) => match HttpTranscriber::new(config, token) {
                Ok(transcriber) => {
                    info!("Voice commands enabled ({})", transcriber.name());
                    Self::Available(Arc::new(transcriber))
                }
                Err(e) => {
                    warn!("Failed to create transcriber: {}", e);
                    Self::unavailable(e.to_string())
                }
            },
            None => {
                info!(
                    "Voice commands disabled (credentials not found at {:?})",
                    path
                );
                Self::unavailable("credentials not found")
            }
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Transcribe, or report that voice is disabled.
    pub async fn transcribe(&self, audio: &AudioPayload) -> Result<String, VoiceError> {
        match self {
            Self::Available(transcriber) => {
                let text = transcriber.transcribe(audio).await?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(VoiceError::TranscriptionFailed(
                        "no speech recognized".to_string(),
                    ));
                }
                Ok(text.to_string())
            }
            Self::Unavailable { reason } => Err(VoiceError::Disabled(reason.clone())),
        }
    }
}

impl std::fmt::Debug for VoiceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(t) => f.debug_tuple("Available").field(&t.name()).finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

fn read_credentials(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let token = contents.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
