//! Service connectivity, schedule and provider types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authorization provider for one side of the sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Side A: a short link code is exchanged for an account token
    Plex,
    /// Side B: an OAuth authorize URL is exchanged for an access token
    Simkl,
}

impl Provider {
    /// Stable identifier, also used as the poll target name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plex => "plex",
            Self::Simkl => "simkl",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plex => write!(f, "Plex"),
            Self::Simkl => write!(f, "SIMKL"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plex" | "a" => Ok(Self::Plex),
            "simkl" | "b" => Ok(Self::Simkl),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Connectivity report from the status resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceStatus {
    pub plex_connected: bool,
    pub simkl_connected: bool,
    pub can_run: bool,
    pub debug: bool,
    /// Server time of the probe, seconds since epoch
    pub ts: Option<i64>,
}

impl ServiceStatus {
    pub fn is_connected(&self, provider: Provider) -> bool {
        match provider {
            Provider::Plex => self.plex_connected,
            Provider::Simkl => self.simkl_connected,
        }
    }
}

/// Scheduler state shown next to the run header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStatus {
    pub enabled: bool,
    /// Next scheduled run, seconds since epoch
    pub next_run_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("plex".parse::<Provider>(), Ok(Provider::Plex));
        assert_eq!("SIMKL".parse::<Provider>(), Ok(Provider::Simkl));
        assert!("trakt".parse::<Provider>().is_err());
    }

    #[test]
    fn test_status_defaults_missing_fields() {
        let status: ServiceStatus =
            serde_json::from_str(r#"{"plex_connected": true}"#).expect("valid status");
        assert!(status.is_connected(Provider::Plex));
        assert!(!status.is_connected(Provider::Simkl));
        assert!(!status.can_run);
    }
}
