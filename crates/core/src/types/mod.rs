//! Domain types for SyncWatch
//!
//! This module contains the data model organized by responsibility:
//! - `run`: run summary snapshots and their timeline
//! - `item`: remote collection items
//! - `hidden`: the client-persisted hidden set
//! - `status`: providers, connectivity and scheduler state
//! - `stats`: collection statistics and version info

mod hidden;
mod item;
mod run;
mod stats;
mod status;

pub use hidden::HiddenSet;
pub use item::{Item, ItemStatus};
pub use run::{RunResult, RunSummary, SideCounts, Timeline};
pub use stats::{SyncStats, VersionInfo};
pub use status::{Provider, ScheduleStatus, ServiceStatus};
