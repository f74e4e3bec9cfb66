//! Configuration system for beamplot
//! Loads, expands and validates plot session settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod parser;
pub mod validation;

pub use parser::{ConfigFormat, ConfigParser, ConfigSerializer, TemplateExpander};
pub use validation::ConfigValidator;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Complete session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub decoding: DecodingConfig,
    pub logging: LoggingConfig,
}

impl SessionConfig {
    /// Parse, expand and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = ConfigParser::parse_file(path)?;
        ConfigValidator::validate(&config)?;
        config.client.ensure_uuid();
        Ok(config)
    }
}

/// This client's identity and the plots it shows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Generated when absent
    pub uuid: Option<String>,
    /// Collaborative mode: shared edits need the baton
    pub shared: bool,
    pub plot_ids: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uuid: None,
            shared: true,
            plot_ids: vec!["plot_0".to_string()],
        }
    }
}

impl ClientConfig {
    /// Client uuid, generating and storing one if none is configured
    pub fn ensure_uuid(&mut self) -> &str {
        self.uuid.get_or_insert_with(|| {
            let uuid = uuid::Uuid::new_v4().to_string();
            log::info!("No client uuid configured, using {}", uuid);
            uuid
        })
    }
}

/// Plot server location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 80,
        }
    }
}

impl ServerConfig {
    /// Websocket endpoint of one plot for one client
    pub fn plot_url(&self, uuid: &str, plot_id: &str) -> String {
        format!("ws://{}:{}/plot/{}/{}", self.host, self.port, uuid, plot_id)
    }
}

/// Bounds applied to inbound array payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecodingConfig {
    pub max_array_bytes: usize,
    pub max_rank: usize,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            max_array_bytes: 256 * 1024 * 1024,
            max_rank: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.client.shared);
        assert_eq!(config.client.plot_ids, vec!["plot_0".to_string()]);
        assert_eq!(config.server.port, 80);
        assert_eq!(config.decoding.max_rank, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_plot_url() {
        let server = ServerConfig {
            host: "beamline".to_string(),
            port: 8000,
        };
        assert_eq!(
            server.plot_url("abc", "plot_1"),
            "ws://beamline:8000/plot/abc/plot_1"
        );
    }

    #[test]
    fn test_ensure_uuid_is_stable() {
        let mut client = ClientConfig::default();
        let first = client.ensure_uuid().to_string();
        assert_eq!(client.ensure_uuid(), first);

        let mut fixed = ClientConfig {
            uuid: Some("me".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(fixed.ensure_uuid(), "me");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(
            &path,
            "[client]\nshared = false\nplot_ids = [\"a\", \"b\"]\n\n[server]\nport = 8000\n",
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert!(!config.client.shared);
        assert_eq!(config.client.plot_ids.len(), 2);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.client.uuid.is_some());
    }
}
