//! Application-level configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Default filter for `env_logger` when `RUST_LOG` is unset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = if wanted == "warning" { "warn" } else { wanted.as_str() };
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| {
                ValidationError::with_value(
                    "app.log_level",
                    "must be one of: error, warn, info, debug, trace",
                    s,
                )
            })
    }
}

/// Application-level settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Log level for application output
    pub log_level: LogLevel,

    /// Hidden-set file (relative to the config dir if not absolute)
    pub hidden_set_file: PathBuf,

    /// Minimum seconds between unforced connectivity checks
    pub status_min_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            hidden_set_file: PathBuf::from("hidden.json"),
            status_min_interval_secs: 120,
        }
    }
}

impl ConfigSection for AppConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let hidden_set_file = match self.hidden_set_file.as_os_str().is_empty() {
            true => Err(ValidationError::new("app.hidden_set_file", "must not be empty")),
            false => Ok(()),
        };
        Validator::collect_errors([
            hidden_set_file,
            Validator::in_range(
                self.status_min_interval_secs,
                0,
                86_400,
                "app.status_min_interval_secs",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.log_level = other.log_level;
        self.hidden_set_file = other.hidden_set_file;
        self.status_min_interval_secs = other.status_min_interval_secs;
    }

    fn section_name(&self) -> &'static str {
        "app"
    }
}
