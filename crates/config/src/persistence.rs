//! File system persistence for configuration
//!
//! Writes go to a temp file in the target directory, then get renamed over
//! the target, so a crash never leaves a half-written file behind.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Creates `path` and its parents if missing
pub(crate) fn ensure_directory_exists(path: &Path) -> ConfigResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Created directory: {}", path.display());
    Ok(())
}

/// Replaces `target` with `content` atomically
pub(crate) fn write_atomic(target: &Path, content: &str) -> ConfigResult<()> {
    let Some(dir) = target.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Err(ConfigError::NoConfigDir(format!(
            "{} has no parent directory",
            target.display()
        )));
    };
    ensure_directory_exists(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(content.as_bytes())?;
    staged.as_file().sync_all()?;
    staged.persist(target).map_err(|e| ConfigError::Write {
        path: target.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Reads and writes `config.toml`
pub struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Loads configuration from file
    ///
    /// A missing file yields the defaults. An empty or unparsable file is an
    /// error. Out-of-range values only produce warnings so a hand-edited file
    /// still loads and can be fixed.
    pub fn load(&self) -> ConfigResult<Config> {
        let Some(text) = self.read_text()? else {
            log::info!(
                "No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        };

        let config = self.decode(&text)?;
        if config.version > CONFIG_VERSION {
            log::warn!(
                "Config version {} is newer than {}; unknown keys are ignored",
                config.version,
                CONFIG_VERSION
            );
        }
        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("Config: {}", error);
            }
        }
        Ok(config)
    }

    /// Validates and saves `config`, copying the previous file to
    /// `config.toml.backup` first
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        self.write(config)
    }

    /// Saves without validating; callers check what they changed
    pub(crate) fn write(&self, config: &Config) -> ConfigResult<()> {
        if self.config_path.is_file() {
            let backup = self.config_path.with_extension("toml.backup");
            fs::copy(&self.config_path, &backup).map_err(ConfigError::Backup)?;
            log::debug!("Previous config kept at {}", backup.display());
        }

        write_atomic(&self.config_path, &toml::to_string_pretty(config)?)?;
        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    /// File contents, or `None` when there is no file yet
    fn read_text(&self) -> ConfigResult<Option<String>> {
        let text = match fs::read_to_string(&self.config_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.config_path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Err(ConfigError::Read {
                path: self.config_path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, "file is blank"),
            });
        }
        Ok(Some(text))
    }

    fn decode(&self, text: &str) -> ConfigResult<Config> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })
    }
}
