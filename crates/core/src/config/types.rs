use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Series library manager
    pub sonarr: BackendConfig,
    /// Movie library manager
    pub radarr: BackendConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Connection and add-defaults for one library manager (Sonarr or Radarr).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL (e.g., "http://localhost:8989")
    pub url: String,
    /// API key sent in the `X-Api-Key` header
    pub api_key: String,
    /// Quality profile applied to every add
    pub quality_profile_id: u32,
    /// Root folder applied to every add
    pub root_folder: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Voice transcription configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub enabled: bool,
    /// File holding the bearer token for the speech service.
    /// Read once at startup; voice stays disabled if the file is missing.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    /// Speech-to-text endpoint
    #[serde(default = "default_voice_url")]
    pub url: String,
    /// Model name sent with each request
    #[serde(default = "default_voice_model")]
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_voice_timeout")]
    pub timeout_secs: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            credentials_path: None,
            url: default_voice_url(),
            model: default_voice_model(),
            language: default_language(),
            timeout_secs: default_voice_timeout(),
        }
    }
}

fn default_voice_url() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_voice_model() -> String {
    "whisper-1".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_voice_timeout() -> u32 {
    60
}

/// Conversation session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Sessions older than this are cancelled (seconds)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Maximum candidates presented per search
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// How often the background sweeper discards expired sessions (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            max_candidates: default_max_candidates(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_max_candidates() -> usize {
    10
}

fn default_sweep_interval() -> u64 {
    60
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub sonarr: SanitizedBackendConfig,
    pub radarr: SanitizedBackendConfig,
    pub voice: SanitizedVoiceConfig,
    pub session: SessionConfig,
}

/// Sanitized backend config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBackendConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub quality_profile_id: u32,
    pub root_folder: String,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedVoiceConfig {
    pub enabled: bool,
    pub credentials_configured: bool,
    pub url: String,
    pub language: String,
}

impl From<&BackendConfig> for SanitizedBackendConfig {
    fn from(b: &BackendConfig) -> Self {
        Self {
            url: b.url.clone(),
            api_key_configured: !b.api_key.is_empty(),
            quality_profile_id: b.quality_profile_id,
            root_folder: b.root_folder.clone(),
            timeout_secs: b.timeout_secs,
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            sonarr: SanitizedBackendConfig::from(&config.sonarr),
            radarr: SanitizedBackendConfig::from(&config.radarr),
            voice: SanitizedVoiceConfig {
                enabled: config.voice.enabled,
                credentials_configured: config.voice.credentials_path.is_some(),
                url: config.voice.url.clone(),
                language: config.voice.language.clone(),
            },
            session: config.session.clone(),
        }
    }
}
