//! Error types and failure taxonomy for SyncWatch
//!
//! Nothing that happens while observing a run is fatal. Every failure falls into one of
//! two tiers:
//! - **Recoverable**: heals on its own (the next snapshot, poll tick or reconnect fixes it)
//! - **Degraded**: a one-shot notification to the caller; the display may stay stale or
//!   optimistic until the next successful refresh
//!
//! Each failure kind carries a recovery action so callers can react without matching
//! on transport details.

use std::fmt;
use thiserror::Error;

/// Result type for core decoding operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while decoding server payloads into domain types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Payload is valid JSON but violates a domain invariant
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },

    /// Payload could not be decoded at all
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates a malformed payload error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Every decoding error is a malformed payload from the caller's point of view
    pub fn kind(&self) -> FailureKind {
        FailureKind::MalformedPayload
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Heals without user involvement
    Recoverable,
    /// Surfaced once to the caller; state may remain stale until the next refresh
    Degraded,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
        }
    }
}

/// What the owning component does after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Wait for the transport or the next poll tick to retry
    RetryWithBackoff,
    /// Drop the payload and re-derive state from the next one
    AwaitNextSnapshot,
    /// Leave the optimistic local state untouched
    KeepOptimisticState,
    /// Tell the user; they restart the flow if they want to
    NotifyUser,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::AwaitNextSnapshot => write!(f, "Waiting for the next snapshot"),
            Self::KeepOptimisticState => write!(f, "Keeping local state"),
            Self::NotifyUser => write!(f, "User notified"),
        }
    }
}

/// The failure taxonomy shared by all components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Stream or fetch failure
    Transport,
    /// A payload that could not be decoded or violates an invariant
    MalformedPayload,
    /// The server rejected a delete request
    UserActionRejected,
    /// An authorization poll exhausted its tick budget
    AuthTimeout,
    /// The server refused or never received an "initiate run" request
    RunInitiationFailed,
}

impl FailureKind {
    /// Returns the severity level of this failure
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Transport | Self::MalformedPayload => ErrorSeverity::Recoverable,
            Self::UserActionRejected | Self::AuthTimeout | Self::RunInitiationFailed => {
                ErrorSeverity::Degraded
            }
        }
    }

    /// Returns the recovery action the owning component takes
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::Transport => RecoveryAction::RetryWithBackoff,
            Self::MalformedPayload => RecoveryAction::AwaitNextSnapshot,
            Self::UserActionRejected => RecoveryAction::KeepOptimisticState,
            Self::AuthTimeout | Self::RunInitiationFailed => RecoveryAction::NotifyUser,
        }
    }

    /// Returns a message suitable for display
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Transport => "Connection to the server was interrupted. Reconnecting...",
            Self::MalformedPayload => "Received an unreadable update from the server.",
            Self::UserActionRejected => {
                "The server did not confirm the removal. The item stays hidden until the next refresh."
            }
            Self::AuthTimeout => "Authorization was not completed in time. Start it again to retry.",
            Self::RunInitiationFailed => "Failed to start a sync run.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::MalformedPayload => write!(f, "malformed payload"),
            Self::UserActionRejected => write!(f, "user action rejected"),
            Self::AuthTimeout => write!(f, "authorization timeout"),
            Self::RunInitiationFailed => write!(f, "run initiation failed"),
        }
    }
}
