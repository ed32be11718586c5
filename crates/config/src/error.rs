//! Errors raised while locating, reading or writing client configuration

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Local state (hidden set) could not be turned into JSON
    #[error("Cannot encode {what}: {source}")]
    Encode {
        what: &'static str,
        source: serde_json::Error,
    },

    /// Refused to save a config with invalid values
    #[error("Invalid config: {}", FieldList(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No usable config directory (no home directory, or a bare file name)
    #[error("No config directory: {0}")]
    NoConfigDir(String),

    #[error("Cannot back up previous config: {0}")]
    Backup(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A config field holding an unusable value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}{}", .value.as_deref().map(|v| format!(" (got {})", v)).unwrap_or_default())]
pub struct ValidationError {
    /// Dotted path, e.g. `server.base_url`
    pub field: String,
    pub message: String,
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Same as `new`, recording the rejected value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(field, message)
        }
    }
}

struct FieldList<'a>(&'a [ValidationError]);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("server.base_url", "must not be empty");
        assert_eq!(err.to_string(), "server.base_url must not be empty");

        let err = ValidationError::with_value("auth.poll_interval_ms", "must be between 100 and 60000", 5);
        assert_eq!(
            err.to_string(),
            "auth.poll_interval_ms must be between 100 and 60000 (got 5)"
        );
    }

    #[test]
    fn test_invalid_lists_every_field() {
        let err = ConfigError::Invalid(vec![
            ValidationError::new("server.base_url", "must not be empty"),
            ValidationError::with_value("stream.log_buffer_lines", "must be between 1 and 100000", 0),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid config: server.base_url must not be empty; \
             stream.log_buffer_lines must be between 1 and 100000 (got 0)"
        );
    }
}
