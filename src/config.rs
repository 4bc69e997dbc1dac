//! Configuration
//!
//! Configuration structures for the responder (server) and initiator
//! (client) roles.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::psk::DEFAULT_PSK_PATH;

/// Port used by both roles unless configured otherwise
pub const DEFAULT_PORT: u16 = 9000;

/// Responder (server) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_bind_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_psk_path")]
    pub psk_path: PathBuf,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub io_timeout_secs: Option<u64>,
    #[serde(default)]
    pub key_confirmation: bool,
    #[serde(default)]
    pub allow_short_psk: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_psk_path() -> PathBuf {
    PathBuf::from(DEFAULT_PSK_PATH)
}

fn default_algorithm() -> String {
    "ML-KEM-768".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_attempts() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: DEFAULT_PORT,
            psk_path: default_psk_path(),
            algorithm: default_algorithm(),
            io_timeout_secs: None,
            key_confirmation: false,
            allow_short_psk: false,
            log_level: default_log_level(),
        }
    }
}

impl ResponderConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn exchange_options(&self) -> ExchangeOptions {
        ExchangeOptions {
            io_timeout: self.io_timeout_secs.map(Duration::from_secs),
            key_confirmation: self.key_confirmation,
            allow_short_psk: self.allow_short_psk,
        }
    }
}

/// Initiator (client) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatorConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_psk_path")]
    pub psk_path: PathBuf,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub io_timeout_secs: Option<u64>,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub key_confirmation: bool,
    #[serde(default)]
    pub allow_short_psk: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for InitiatorConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            port: DEFAULT_PORT,
            psk_path: default_psk_path(),
            algorithm: default_algorithm(),
            connect_timeout_secs: None,
            io_timeout_secs: None,
            connect_attempts: 1,
            retry_delay_ms: default_retry_delay_ms(),
            key_confirmation: false,
            allow_short_psk: false,
            log_level: default_log_level(),
        }
    }
}

impl InitiatorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "connect_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn exchange_options(&self) -> ExchangeOptions {
        ExchangeOptions {
            io_timeout: self.io_timeout_secs.map(Duration::from_secs),
            key_confirmation: self.key_confirmation,
            allow_short_psk: self.allow_short_psk,
        }
    }
}

/// Per-exchange settings shared by both roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// Limit for each read or write; `None` blocks indefinitely
    pub io_timeout: Option<Duration>,
    /// Exchange SHA3 confirmation tags after the ciphertext.
    /// Must match on both peers.
    pub key_confirmation: bool,
    /// Accept a PSK shorter than 32 bytes
    pub allow_short_psk: bool,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_responder_config() {
        let config = ResponderConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.psk_path, PathBuf::from("pqc_psk.key"));
        assert_eq!(config.algorithm, "ML-KEM-768");
        assert_eq!(config.exchange_options(), ExchangeOptions::default());
    }

    #[test]
    fn test_default_initiator_config() {
        let config = InitiatorConfig::default();
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.connect_attempts, 1);
        assert!(config.connect_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: InitiatorConfig = toml::from_str(
            r#"
            server_host = "192.168.1.2"
            io_timeout_secs = 5
            key_confirmation = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server_host, "192.168.1.2");
        assert_eq!(config.port, 9000);
        let options = config.exchange_options();
        assert_eq!(options.io_timeout, Some(Duration::from_secs(5)));
        assert!(options.key_confirmation);
        assert!(!options.allow_short_psk);
    }

    #[test]
    fn test_zero_connect_attempts_rejected() {
        let config = InitiatorConfig {
            connect_attempts: 0,
            ..InitiatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_shipped_configs_parse() {
        let server: ResponderConfig = toml::from_str(include_str!("../config/server.toml")).unwrap();
        assert_eq!(server.port, DEFAULT_PORT);

        let client: InitiatorConfig = toml::from_str(include_str!("../config/client.toml")).unwrap();
        assert_eq!(client.server_host, "192.168.1.2");
        assert!(client.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = ResponderConfig::from_file(Path::new("/nonexistent/server.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
