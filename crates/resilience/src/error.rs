// crates/resilience/src/error.rs
//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// A poll session was configured with a zero interval or zero tick budget
    #[error("Invalid poll configuration for '{target}': {reason}")]
    InvalidPollConfig { target: String, reason: String },

    /// The poll session registry lock was poisoned by a panicking callback
    #[error("Poll registry lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_poll_config_error() {
        let err = ResilienceError::InvalidPollConfig {
            target: "plex".to_string(),
            reason: "max_ticks must be at least 1".to_string(),
        };
        assert!(err.to_string().contains("plex"));
        assert!(err.to_string().contains("max_ticks"));
    }
}
