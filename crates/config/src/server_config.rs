//! Server connection and event stream configuration sections

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// How to reach the sync server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Server root URL
    pub base_url: String,

    /// Timeout for one-shot requests, in seconds
    pub request_timeout_secs: u64,

    /// Attempts for idempotent reads (1 disables retries)
    pub max_retries: usize,

    /// Delay before the first retry, in milliseconds
    pub retry_initial_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_initial_delay_ms: 250,
        }
    }
}

impl ConfigSection for ServerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::http_url(&self.base_url, "server.base_url"),
            Validator::in_range(
                self.request_timeout_secs,
                1,
                600,
                "server.request_timeout_secs",
            ),
            Validator::in_range(self.max_retries, 1, 10, "server.max_retries"),
            Validator::in_range(
                self.retry_initial_delay_ms,
                10,
                60_000,
                "server.retry_initial_delay_ms",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.base_url = other.base_url;
        self.request_timeout_secs = other.request_timeout_secs;
        self.max_retries = other.max_retries;
        self.retry_initial_delay_ms = other.retry_initial_delay_ms;
    }

    fn section_name(&self) -> &'static str {
        "server"
    }
}

/// Push stream behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// First reconnect delay when the server sends no `retry:` hint
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay
    pub reconnect_max_ms: u64,

    /// Log tag requested from the log stream
    pub log_tag: String,

    /// Lines kept by the log feed
    pub log_buffer_lines: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_ms: 1_000,
            reconnect_max_ms: 30_000,
            log_tag: "SYNC".to_string(),
            log_buffer_lines: 500,
        }
    }
}

impl ConfigSection for StreamConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(
                self.reconnect_initial_ms,
                100,
                60_000,
                "stream.reconnect_initial_ms",
            ),
            Validator::ordered(
                self.reconnect_initial_ms,
                self.reconnect_max_ms,
                "stream.reconnect_max_ms",
            ),
            Validator::not_empty(&self.log_tag, "stream.log_tag"),
            Validator::in_range(self.log_buffer_lines, 1, 100_000, "stream.log_buffer_lines"),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.reconnect_initial_ms = other.reconnect_initial_ms;
        self.reconnect_max_ms = other.reconnect_max_ms;
        self.log_tag = other.log_tag;
        self.log_buffer_lines = other.log_buffer_lines;
    }

    fn section_name(&self) -> &'static str {
        "stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
        assert!(StreamConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_base_url() {
        let config = ServerConfig {
            base_url: "127.0.0.1:8787".to_string(),
            ..ServerConfig::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.base_url");
    }

    #[test]
    fn test_reconnect_bounds_ordered() {
        let config = StreamConfig {
            reconnect_initial_ms: 10_000,
            reconnect_max_ms: 1_000,
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_tag() {
        let config = StreamConfig {
            log_tag: " ".to_string(),
            ..StreamConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
