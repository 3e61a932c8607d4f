use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are separated by a double underscore, e.g.
/// `MEDIAREQ_SONARR__API_KEY` overrides `sonarr.api_key`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("MEDIAREQ_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = r#"
[server]
port = 9000

[sonarr]
url = "http://localhost:8989"
api_key = "a"
quality_profile_id = 1
root_folder = "/tv"

[radarr]
url = "http://localhost:7878"
api_key = "b"
quality_profile_id = 1
root_folder = "/movies"
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(VALID).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.sonarr.root_folder, "/tv");
    }

    #[test]
    fn test_load_config_from_str_missing_backend() {
        let toml = r#"
[server]
port = 8080
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{}", VALID).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.radarr.url, "http://localhost:7878");
    }
}
