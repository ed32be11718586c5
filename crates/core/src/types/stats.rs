//! Collection statistics and server version info

use serde::{Deserialize, Serialize};

/// Item counts over time, as kept by the server after each run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncStats {
    /// Items currently on either side
    pub now: u64,
    /// Count one week ago
    pub week: u64,
    /// Count one month ago
    pub month: u64,
    /// All-time additions
    pub added: Option<u64>,
    /// All-time removals
    pub removed: Option<u64>,
    /// Additions in the last run
    #[serde(rename = "new")]
    pub last_added: Option<u64>,
    /// Removals in the last run
    #[serde(rename = "del")]
    pub last_removed: Option<u64>,
}

impl SyncStats {
    /// Change since last week; negative when items were removed
    pub fn week_delta(&self) -> i64 {
        self.now as i64 - self.week as i64
    }

    /// Change since last month
    pub fn month_delta(&self) -> i64 {
        self.now as i64 - self.month as i64
    }
}

/// Server version and the newest published release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionInfo {
    pub current: String,
    /// Unknown when the release feed could not be reached
    pub latest: Option<String>,
    pub update_available: bool,
    /// Release page
    pub html_url: Option<String>,
}
