use std::sync::Arc;

use mediarequest_core::{Config, ConversationEngine, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<ConversationEngine>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<ConversationEngine>) -> Self {
        Self { config, engine }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &Arc<ConversationEngine> {
        &self.engine
    }
}
