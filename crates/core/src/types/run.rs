//! Run summary snapshots
//!
//! A `RunSummary` is a full point-in-time description of one synchronization run. The
//! server pushes and serves it in a flat wire form; `RunSummary::from_json` decodes that
//! form and rejects payloads that break the snapshot invariants.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome reported by the job once post-run counts are known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunResult {
    /// Both sides hold the same items
    Equal,
    /// The sides still differ
    Changed,
    /// The job reported something we do not recognise
    Unknown,
}

impl RunResult {
    /// Parses the job's result word; an empty word means "not reported yet"
    pub fn from_wire(word: &str) -> Option<Self> {
        match word.trim().to_ascii_uppercase().as_str() {
            "" => None,
            "EQUAL" => Some(Self::Equal),
            "UNKNOWN" => Some(Self::Unknown),
            _ => Some(Self::Changed),
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "EQUAL"),
            Self::Changed => write!(f, "CHANGED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// The four milestones a run reports, in order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeline {
    pub start: bool,
    pub pre: bool,
    pub post: bool,
    pub done: bool,
}

impl Timeline {
    /// Number of milestones reached after `start` (0..=3)
    pub fn milestones_reached(&self) -> u8 {
        [self.pre, self.post, self.done]
            .iter()
            .filter(|flag| **flag)
            .count() as u8
    }

    /// Total number of flags set, `start` included (0..=4)
    pub fn completion(&self) -> u8 {
        self.milestones_reached() + u8::from(self.start)
    }

    /// True when no flag is set
    pub fn is_reset(&self) -> bool {
        !(self.start || self.pre || self.post || self.done)
    }

    /// True when every flag set in `other` is also set here
    pub fn covers(&self, other: &Timeline) -> bool {
        (self.start || !other.start)
            && (self.pre || !other.pre)
            && (self.post || !other.post)
            && (self.done || !other.done)
    }
}

/// Item counts on both sides of the sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCounts {
    pub side_a: u64,
    pub side_b: u64,
}

impl SideCounts {
    fn pair(side_a: Option<u64>, side_b: Option<u64>) -> Option<Self> {
        match (side_a, side_b) {
            (Some(side_a), Some(side_b)) => Some(Self { side_a, side_b }),
            _ => None,
        }
    }
}

/// Snapshot of one synchronization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub running: bool,
    pub exit_code: Option<i32>,
    pub result: Option<RunResult>,
    pub timeline: Timeline,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pre_counts: Option<SideCounts>,
    pub post_counts: Option<SideCounts>,
    /// Wall-clock duration reported by the server, in seconds
    pub duration_sec: Option<f64>,
    /// Short command name the job was started with
    pub command: Option<String>,
    /// Version string the job printed
    pub version: Option<String>,
}

/// Flat form served by the run summary resource and stream
#[derive(Debug, Deserialize)]
struct WireSummary {
    #[serde(default)]
    running: bool,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    timeline: Option<Timeline>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    duration_sec: Option<f64>,
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    plex_pre: Option<u64>,
    #[serde(default)]
    simkl_pre: Option<u64>,
    #[serde(default)]
    plex_post: Option<u64>,
    #[serde(default)]
    simkl_post: Option<u64>,
}

impl TryFrom<WireSummary> for RunSummary {
    type Error = CoreError;

    fn try_from(wire: WireSummary) -> CoreResult<Self> {
        if wire.running && wire.finished_at.is_some() {
            return Err(CoreError::malformed("finished_at is set on a running snapshot"));
        }
        if let Some(duration) = wire.duration_sec {
            if !duration.is_finite() || duration < 0.0 {
                return Err(CoreError::malformed(format!(
                    "duration_sec must be a non-negative number (got {})",
                    duration
                )));
            }
        }

        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());

        Ok(Self {
            running: wire.running,
            exit_code: wire.exit_code,
            result: wire.result.as_deref().and_then(RunResult::from_wire),
            timeline: wire.timeline.unwrap_or_default(),
            started_at: wire.started_at,
            finished_at: wire.finished_at,
            pre_counts: SideCounts::pair(wire.plex_pre, wire.simkl_pre),
            post_counts: SideCounts::pair(wire.plex_post, wire.simkl_post),
            duration_sec: wire.duration_sec,
            command: non_empty(wire.cmd),
            version: non_empty(wire.version),
        })
    }
}

impl RunSummary {
    /// Summary of a server that has never run the job
    pub fn idle() -> Self {
        Self {
            running: false,
            exit_code: None,
            result: None,
            timeline: Timeline::default(),
            started_at: None,
            finished_at: None,
            pre_counts: None,
            post_counts: None,
            duration_sec: None,
            command: None,
            version: None,
        }
    }

    /// Decodes a summary from its wire JSON
    pub fn from_json(payload: &str) -> CoreResult<Self> {
        let wire: WireSummary = serde_json::from_str(payload)?;
        Self::try_from(wire)
    }

    /// Decodes a summary from an already parsed JSON value
    pub fn from_value(value: serde_json::Value) -> CoreResult<Self> {
        let wire: WireSummary = serde_json::from_value(value)?;
        Self::try_from(wire)
    }

    /// True once the job has exited (successfully or not)
    pub fn is_finished(&self) -> bool {
        !self.running && self.exit_code.is_some()
    }

    /// Counts to display: post-run counts when known, pre-run counts otherwise
    pub fn latest_counts(&self) -> Option<SideCounts> {
        self.post_counts.or(self.pre_counts)
    }

    /// Plain-text report of this run, one line per known fact
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let title = match &self.version {
            Some(version) => format!("Watchlist sync {}", version),
            None => "Watchlist sync".to_string(),
        };
        lines.push(title);

        if let Some(started) = self.started_at {
            lines.push(format!("Start:    {}", started.format("%Y-%m-%dT%H:%M:%SZ")));
        }
        if let Some(finished) = self.finished_at {
            lines.push(format!("Finish:   {}", finished.format("%Y-%m-%dT%H:%M:%SZ")));
        }
        if let Some(command) = &self.command {
            lines.push(format!("Cmd:      {}", command));
        }
        if let Some(pre) = self.pre_counts {
            lines.push(format!("Pre:      A={} vs B={}", pre.side_a, pre.side_b));
        }
        if let Some(post) = self.post_counts {
            let result = self
                .result
                .map(|r| r.to_string())
                .unwrap_or_else(|| RunResult::Unknown.to_string());
            lines.push(format!(
                "Post:     A={} vs B={} -> {}",
                post.side_a, post.side_b, result
            ));
        }
        if let Some(duration) = self.duration_sec {
            lines.push(format!("Duration: {}s", duration));
        }
        if let Some(code) = self.exit_code {
            lines.push(format!("Exit:     {}", code));
        }
        lines
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::idle()
    }
}
