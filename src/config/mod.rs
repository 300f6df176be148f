//! Configuration management for the DDoS flow analyzer.
//!
//! This module handles loading application configuration from a TOML file
//! and environment variables, and validates it before any processing
//! starts: a value that would silently change detection semantics is a
//! fatal error, never a default.

use std::env;

use ::config::{Config as ConfigBuilder, ConfigError, Environment, File};

use crate::models::Config;

/// Load and validate configuration.
///
/// Sources, later ones overriding earlier: built-in defaults, the config
/// file (`--config`, the `CONFIG_FILE` environment variable, or
/// `config/default.toml`), then `DFA__`-prefixed environment variables
/// (e.g. `DFA__DETECTION__WINDOW_MINUTES=10`).
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config_file = path
        .map(str::to_string)
        .or_else(|| env::var("CONFIG_FILE").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let settings = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(path.is_some()))
        .add_source(Environment::with_prefix("DFA").separator("__"))
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    if config.llm.api_key.is_empty() {
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            config.llm.api_key = key;
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Reject configurations that would change detection semantics silently
fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.detection.window_minutes == 0 {
        return Err(ConfigError::Message(
            "detection.window_minutes must be positive".to_string(),
        ));
    }
    if config.detection.medium_freq_threshold <= 0.0 {
        return Err(ConfigError::Message(
            "detection.medium_freq_threshold must be positive".to_string(),
        ));
    }
    if config.detection.high_freq_threshold <= config.detection.medium_freq_threshold {
        return Err(ConfigError::Message(
            "detection.high_freq_threshold must exceed medium_freq_threshold"
                .to_string(),
        ));
    }
    if config.stream.batch_size == 0 {
        return Err(ConfigError::Message(
            "stream.batch_size must be positive".to_string(),
        ));
    }
    if config.llm.max_attempts == 0 {
        return Err(ConfigError::Message(
            "llm.max_attempts must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.detection.window_minutes, 5);
        assert_eq!(config.stream.batch_size, 1000);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let mut config = Config::default();
        config.detection.window_minutes = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let mut config = Config::default();
        config.detection.high_freq_threshold = 40.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.stream.batch_size = 0;
        assert!(validate(&config).is_err());
    }
}
