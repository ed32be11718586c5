//! Configuration manager - main API for config operations

use crate::hidden_store::HiddenSetFile;
use crate::persistence::ConfigPersistence;
use crate::validation::ConfigSection;
use crate::{Config, ConfigError, ConfigResult, CredentialsConfig, LogLevel};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable overriding `server.base_url`
pub const ENV_BASE_URL: &str = "SYNCWATCH_SERVER_BASE_URL";
/// Environment variable overriding `app.log_level`
pub const ENV_LOG_LEVEL: &str = "SYNCWATCH_APP_LOG_LEVEL";

/// Loads, saves and locates configuration files
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a manager for the platform config directory
    ///
    /// - Linux: `~/.config/syncwatch/`
    /// - macOS: `~/Library/Application Support/syncwatch/`
    /// - Windows: `%APPDATA%\syncwatch\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let persistence = ConfigPersistence::new(config_dir.join("config.toml"));
        Ok(Self {
            persistence,
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "syncwatch")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::NoConfigDir("home directory not found".to_string()))
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Hidden-set file named by `config`, resolved against the config dir
    pub fn hidden_set_file(&self, config: &Config) -> HiddenSetFile {
        let configured = &config.app.hidden_set_file;
        if configured.is_absolute() {
            HiddenSetFile::new(configured.clone())
        } else {
            HiddenSetFile::new(self.config_dir.join(configured))
        }
    }

    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, logging any error and falling back to defaults
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, applies `update_fn`, and saves the result
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use syncwatch_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.auth.poll_interval_ms = 2_000;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Changes only the `[credentials]` section
    ///
    /// Only that section is validated, so an out-of-range value elsewhere in a
    /// hand-edited file does not stop a new token from being kept.
    pub fn update_credentials<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut CredentialsConfig),
    {
        let mut config = self.load()?;
        update_fn(&mut config.credentials);
        config.credentials.validate().map_err(ConfigError::Invalid)?;
        self.persistence.write(&config)
    }

    /// Writes a default config file if none exists; returns whether one was created
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validates the stored config and returns the problems as messages
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;
        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the file, then applies `SYNCWATCH_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

/// Applies overrides from `lookup`; unparsable values are logged and skipped
fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_BASE_URL) {
        log::info!("Server URL override: {}", url);
        config.server.base_url = url;
    }

    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        match level.parse::<LogLevel>() {
            Ok(level) => config.app.log_level = level,
            Err(e) => log::warn!("Ignoring {}: {}", ENV_LOG_LEVEL, e),
        }
    }
}
