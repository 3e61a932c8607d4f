pub mod backend;
pub mod config;
pub mod conversation;
pub mod metrics;
pub mod resolver;
pub mod testing;
pub mod voice;

pub use backend::{
    AddRequest, AddedTitle, ArrClient, BackendError, Backends, Candidate, MediaBackend, MediaKind,
};
pub use config::{
    load_config, load_config_from_str, validate_config, BackendConfig, Config, ConfigError,
    SanitizedConfig, ServerConfig, SessionConfig, VoiceConfig,
};
pub use conversation::{
    ChatId, ConversationEngine, ConversationError, Inbound, Reply, Session, SessionState,
    StateName,
};
pub use resolver::{classify, Defaults, MediaDefaults, Query, RequestResolver, ResolveError};
pub use voice::{AudioPayload, HttpTranscriber, Transcriber, VoiceBridge, VoiceError};
