// crates/network/src/api.rs
//! Typed bindings for the sync server's HTTP API

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use log::warn;
use serde::Deserialize;
use serde_json::{json, Value};
use syncwatch_core::{Item, RunSummary, ScheduleStatus, ServiceStatus, SyncStats, VersionInfo};

pub const RUN_SUMMARY_PATH: &str = "/api/run/summary";
pub const RUN_SUMMARY_STREAM_PATH: &str = "/api/run/summary/stream";
pub const RUN_PATH: &str = "/api/run";
pub const LOG_STREAM_PATH: &str = "/api/logs/stream";
pub const WATCHLIST_PATH: &str = "/api/watchlist";
pub const STATUS_PATH: &str = "/api/status";
pub const SCHEDULE_STATUS_PATH: &str = "/api/scheduling/status";
pub const CONFIG_PATH: &str = "/api/config";
pub const PLEX_PIN_PATH: &str = "/api/plex/pin/new";
pub const SIMKL_AUTHORIZE_PATH: &str = "/api/simkl/authorize";
pub const STATS_PATH: &str = "/api/stats";
pub const VERSION_PATH: &str = "/api/version";

/// `{ok, error?}` acknowledgement
#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl Ack {
    fn into_result(self) -> NetworkResult<()> {
        if self.ok {
            Ok(())
        } else {
            Err(NetworkError::Rejected(
                self.error.unwrap_or_else(|| "no reason given".to_string()),
            ))
        }
    }
}

/// Result of `GET /api/watchlist`
#[derive(Debug, Clone, PartialEq)]
pub enum ItemListing {
    Available {
        items: Vec<Item>,
        /// Seconds since epoch of the last completed sync
        last_sync_epoch: Option<i64>,
        missing_tmdb_key: bool,
    },
    /// The server has no list to offer yet; not an error
    Unavailable {
        reason: String,
        missing_tmdb_key: bool,
    },
}

#[derive(Debug, Deserialize)]
struct WireListing {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    missing_tmdb_key: bool,
    #[serde(default)]
    last_sync_epoch: Option<i64>,
}

impl From<WireListing> for ItemListing {
    fn from(wire: WireListing) -> Self {
        if !wire.ok {
            return ItemListing::Unavailable {
                reason: wire
                    .error
                    .unwrap_or_else(|| "item list unavailable".to_string()),
                missing_tmdb_key: wire.missing_tmdb_key,
            };
        }

        let total = wire.items.len();
        let items: Vec<Item> = wire
            .items
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Item>(raw) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping malformed item: {}", e);
                    None
                }
            })
            .collect();
        if items.len() < total {
            warn!("Dropped {} of {} items", total - items.len(), total);
        }

        ItemListing::Available {
            items,
            last_sync_epoch: wire.last_sync_epoch,
            missing_tmdb_key: wire.missing_tmdb_key,
        }
    }
}

/// Link code issued for provider A
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCode {
    pub code: String,
    /// Seconds until the code expires
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireLinkCode {
    #[serde(flatten)]
    ack: Ack,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "expiresIn")]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireAuthorize {
    #[serde(flatten)]
    ack: Ack,
    #[serde(default)]
    authorize_url: Option<String>,
}

/// Stats answer; `ok` is false until the server has computed any
#[derive(Debug, Deserialize)]
struct WireStats {
    #[serde(default)]
    ok: bool,
    #[serde(flatten)]
    stats: SyncStats,
}

#[derive(Debug, Default, Deserialize)]
struct WireSchedule {
    #[serde(default)]
    config: WireScheduleConfig,
    #[serde(default)]
    next_run_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct WireScheduleConfig {
    #[serde(default)]
    enabled: bool,
}

/// Percent-encodes one path segment
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' | b'@' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// The server API
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Current run summary snapshot
    pub async fn run_summary(&self) -> NetworkResult<RunSummary> {
        let value: Value = self.client.get_json(RUN_SUMMARY_PATH).await?;
        Ok(RunSummary::from_value(value)?)
    }

    /// Asks the server to start a run
    pub async fn start_run(&self) -> NetworkResult<()> {
        let ack: Ack = self.client.post_empty(RUN_PATH).await?;
        ack.into_result()
    }

    /// Authoritative item list
    pub async fn items(&self) -> NetworkResult<ItemListing> {
        let wire: WireListing = self.client.get_json(WATCHLIST_PATH).await?;
        Ok(wire.into())
    }

    /// Requests deletion of one item; only a 2xx answer counts as success
    pub async fn delete_item(&self, key: &str) -> NetworkResult<()> {
        let path = format!("{}/{}", WATCHLIST_PATH, encode_segment(key));
        self.client.delete(&path).await
    }

    /// Connectivity report; `fresh` bypasses the server's own cache
    pub async fn status(&self, fresh: bool) -> NetworkResult<ServiceStatus> {
        let path = if fresh {
            format!("{}?fresh=1", STATUS_PATH)
        } else {
            STATUS_PATH.to_string()
        };
        self.client.get_json(&path).await
    }

    pub async fn schedule_status(&self) -> NetworkResult<ScheduleStatus> {
        let wire: WireSchedule = self.client.get_json(SCHEDULE_STATUS_PATH).await?;
        Ok(ScheduleStatus {
            enabled: wire.config.enabled,
            next_run_at: wire.next_run_at,
        })
    }

    /// Collection statistics, or `None` while the server has none
    pub async fn stats(&self) -> NetworkResult<Option<SyncStats>> {
        let wire: WireStats = self.client.get_json(STATS_PATH).await?;
        Ok(wire.ok.then_some(wire.stats))
    }

    /// Server version and whether a newer release exists
    pub async fn version(&self) -> NetworkResult<VersionInfo> {
        self.client.get_json(VERSION_PATH).await
    }

    /// The server's configuration document, including provider tokens
    pub async fn server_config(&self) -> NetworkResult<Value> {
        self.client.get_json(CONFIG_PATH).await
    }

    /// Starts provider A's link flow and returns the code the user enters
    pub async fn request_link_code(&self) -> NetworkResult<LinkCode> {
        let wire: WireLinkCode = self.client.post_empty(PLEX_PIN_PATH).await?;
        wire.ack.into_result()?;
        let code = wire
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| NetworkError::Decode("link code missing from answer".to_string()))?;
        Ok(LinkCode {
            code,
            expires_in: wire.expires_in,
        })
    }

    /// Starts provider B's OAuth flow and returns the URL the user opens
    pub async fn request_authorize_url(&self, origin: &str) -> NetworkResult<String> {
        let wire: WireAuthorize = self
            .client
            .post_json(SIMKL_AUTHORIZE_PATH, &json!({ "origin": origin }))
            .await?;
        wire.ack.into_result()?;
        wire.authorize_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| NetworkError::Decode("authorize_url missing from answer".to_string()))
    }

    /// Path of the log stream for `tag`
    pub fn log_stream_path(tag: &str) -> String {
        format!("{}?tag={}", LOG_STREAM_PATH, encode_segment(tag))
    }
}
