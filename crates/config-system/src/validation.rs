//! Configuration validation utilities

use crate::{ClientConfig, ConfigError, DecodingConfig, LoggingConfig, Result, ServerConfig, SessionConfig};
use std::collections::HashSet;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete configuration
    pub fn validate(config: &SessionConfig) -> Result<()> {
        Self::validate_client(&config.client)?;
        Self::validate_server(&config.server)?;
        Self::validate_decoding(&config.decoding)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_client(client: &ClientConfig) -> Result<()> {
        if let Some(uuid) = &client.uuid {
            if uuid.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "Client uuid cannot be empty".to_string(),
                ));
            }
        }

        if client.plot_ids.is_empty() {
            return Err(ConfigError::Validation(
                "At least one plot id is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for plot_id in &client.plot_ids {
            if plot_id.is_empty() {
                return Err(ConfigError::Validation(
                    "Plot ids cannot be empty".to_string(),
                ));
            }
            if !seen.insert(plot_id) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate plot id: {}",
                    plot_id
                )));
            }
        }

        Ok(())
    }

    fn validate_server(server: &ServerConfig) -> Result<()> {
        if server.host.is_empty() {
            return Err(ConfigError::Validation(
                "Server host cannot be empty".to_string(),
            ));
        }

        if server.port == 0 {
            return Err(ConfigError::Validation(
                "Invalid server port: 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_decoding(decoding: &DecodingConfig) -> Result<()> {
        if decoding.max_array_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_array_bytes must be greater than 0".to_string(),
            ));
        }

        if !(1..=8).contains(&decoding.max_rank) {
            return Err(ConfigError::Validation(format!(
                "Invalid max_rank: {}. Must be between 1 and 8",
                decoding.max_rank
            )));
        }

        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<()> {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown log level: {}. Expected one of {}",
                logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_message(config: &SessionConfig) -> String {
        match ConfigValidator::validate(config) {
            Err(ConfigError::Validation(message)) => message,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(ConfigValidator::validate(&SessionConfig::default()).is_ok());
    }

    #[test]
    fn test_plot_ids() {
        let mut config = SessionConfig::default();
        config.client.plot_ids = vec![];
        assert!(validation_message(&config).contains("At least one"));

        config.client.plot_ids = vec!["a".to_string(), "a".to_string()];
        assert!(validation_message(&config).contains("Duplicate"));

        config.client.plot_ids = vec!["a".to_string(), String::new()];
        assert!(validation_message(&config).contains("empty"));
    }

    #[test]
    fn test_server_and_decoding() {
        let mut config = SessionConfig::default();
        config.server.port = 0;
        assert!(validation_message(&config).contains("port"));

        let mut config = SessionConfig::default();
        config.decoding.max_rank = 9;
        assert!(validation_message(&config).contains("max_rank"));

        let mut config = SessionConfig::default();
        config.decoding.max_array_bytes = 0;
        assert!(validation_message(&config).contains("max_array_bytes"));
    }

    #[test]
    fn test_log_level() {
        let mut config = SessionConfig::default();
        config.logging.level = "WARN".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.logging.level = "loud".to_string();
        assert!(validation_message(&config).contains("loud"));
    }
}
