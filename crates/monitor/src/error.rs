//! Error types for the monitor layer

use syncwatch_config::ConfigError;
use syncwatch_core::FailureKind;
use syncwatch_network::NetworkError;
use syncwatch_resilience::ResilienceError;
use thiserror::Error;

pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The run could not be started; the run view is unaffected
    #[error("Failed to start a sync run: {0}")]
    RunInitiationFailed(String),

    /// A run is already running or being requested
    #[error("A sync run is already in progress")]
    RunInProgress,

    /// The server reported that a run cannot be started right now
    #[error("The server cannot start a run right now")]
    RunNotAllowed,

    /// An authorization flow could not be started
    #[error("Could not start {provider} authorization: {reason}")]
    AuthStartFailed {
        provider: syncwatch_core::Provider,
        reason: String,
    },

    #[error("Lock poisoned")]
    LockPoisoned,
}

impl MonitorError {
    /// Maps this error onto the shared failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(e) => e.kind(),
            Self::RunInitiationFailed(_) | Self::RunInProgress | Self::RunNotAllowed => {
                FailureKind::RunInitiationFailed
            }
            Self::Resilience(_)
            | Self::Config(_)
            | Self::AuthStartFailed { .. }
            | Self::LockPoisoned => FailureKind::Transport,
        }
    }
}
