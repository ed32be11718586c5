//! SyncWatch client configuration
//!
//! Sections implement [`ConfigSection`] and are stored together in one TOML
//! file. The crate also owns the durable hidden-set file the overlay uses.
//!
//! - Invalid files are reported; missing files mean defaults
//! - Writes go through a temp file and an atomic rename
//!
//! # Example
//!
//! ```rust,no_run
//! use syncwatch_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("config dir");
//! let config = manager.load_or_default();
//! println!("Server: {}", config.server.base_url);
//! ```

mod error;
mod hidden_store;
mod manager;
mod persistence;
mod validation;

pub mod app_config;
pub mod auth_config;
pub mod server_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use hidden_store::HiddenSetFile;
pub use manager::{ConfigManager, ENV_BASE_URL, ENV_LOG_LEVEL};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use auth_config::{AuthConfig, CredentialsConfig};
pub use server_config::{ServerConfig, StreamConfig};

use serde::{Deserialize, Serialize};

/// Config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub auth: AuthConfig,
    pub app: AppConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section and returns all errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = [
            self.server.validate(),
            self.stream.validate(),
            self.auth.validate(),
            self.app.validate(),
            self.credentials.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .flatten()
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges `other` into this config, preferring its values
    ///
    /// Override chain: defaults < file < env vars < CLI args
    pub fn merge(&mut self, other: Config) {
        self.server.merge(other.server);
        self.stream.merge(other.stream);
        self.auth.merge(other.auth);
        self.app.merge(other.app);
        self.credentials.merge(other.credentials);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            stream: StreamConfig::default(),
            auth: AuthConfig::default(),
            app: AppConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwatch_core::Provider;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_errors_collected_across_sections() {
        let mut config = Config::default();
        config.server.base_url = "nowhere".to_string();
        config.auth.poll_interval_ms = 0;

        let errors = config.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"server.base_url"));
        assert!(fields.contains(&"auth.poll_interval_ms"));
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.credentials.set_token(Provider::Plex, "kept");

        let mut other = Config::default();
        other.server.base_url = "http://sync.local:9000".to_string();

        base.merge(other);
        assert_eq!(base.server.base_url, "http://sync.local:9000");
        assert_eq!(base.credentials.token(Provider::Plex), Some("kept"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            base_url = "http://10.0.0.2:8787"
            "#,
        )
        .expect("partial config");
        assert_eq!(config.server.base_url, "http://10.0.0.2:8787");
        assert_eq!(config.stream, StreamConfig::default());
        assert_eq!(config.version, CONFIG_VERSION);
    }
}
