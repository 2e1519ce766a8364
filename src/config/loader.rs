//! Configuration loading from disk and the environment.

use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a configuration from a TOML file, apply environment overrides, and
/// validate it.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ServerConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the default configuration with environment overrides applied.
pub fn load_default() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// `SERVER_HOST` and `SERVER_PORT` override the configured bind address.
fn apply_env_overrides(config: &mut ServerConfig) {
    let (file_host, file_port) = match config.listener.bind_address.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.to_string()),
        None => (config.listener.bind_address.clone(), String::new()),
    };

    let host = env::var("SERVER_HOST").unwrap_or(file_host);
    let port = env::var("SERVER_PORT").unwrap_or(file_port);
    config.listener.bind_address = format!("{host}:{port}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.shutdown.drain_timeout_secs, 30);
        assert!(!config.cors.enabled);
    }

    #[test]
    fn full_toml_round_trips() {
        let content = r#"
            [listener]
            bind_address = "0.0.0.0:9090"

            [shutdown]
            drain_timeout_secs = 5

            [cors]
            enabled = true
            allowed_origin = "http://localhost:5173"
        "#;
        let config: ServerConfig = toml::from_str(content).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9090");
        assert_eq!(config.shutdown.drain_timeout_secs, 5);
        assert!(config.cors.enabled);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        env::set_var("SERVER_HOST", "0.0.0.0");
        env::set_var("SERVER_PORT", "7777");

        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.listener.bind_address, "0.0.0.0:7777");

        env::remove_var("SERVER_HOST");
        env::remove_var("SERVER_PORT");
    }
}
