use super::{
    types::{BackendConfig, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Both backends have an http(s) URL, an API key, a quality profile and a root folder
/// - Session limits are non-zero
///
/// Voice settings are not checked here: missing credentials disable voice
/// at startup instead of failing it.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    validate_backend("sonarr", &config.sonarr)?;
    validate_backend("radarr", &config.radarr)?;

    if config.session.idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "session.idle_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.session.max_candidates == 0 {
        return Err(ConfigError::ValidationError(
            "session.max_candidates cannot be 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_backend(name: &str, backend: &BackendConfig) -> Result<(), ConfigError> {
    if !(backend.url.starts_with("http://") || backend.url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "{}.url must be an http(s) URL, got '{}'",
            name, backend.url
        )));
    }
    if backend.api_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{}.api_key cannot be empty",
            name
        )));
    }
    if backend.quality_profile_id == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{}.quality_profile_id cannot be 0",
            name
        )));
    }
    if backend.root_folder.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{}.root_folder cannot be empty",
            name
        )));
    }
    Ok(())
}
