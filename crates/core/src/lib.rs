//! Core data model for SyncWatch
//!
//! Shared by every other crate: run snapshots, items, the hidden set, provider and
//! status types, and the failure taxonomy.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, CoreResult, ErrorSeverity, FailureKind, RecoveryAction};
pub use types::{
    HiddenSet, Item, ItemStatus, Provider, RunResult, RunSummary, ScheduleStatus, ServiceStatus,
    SideCounts, SyncStats, Timeline, VersionInfo,
};
