//! Remote collection items

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Where an item currently lives, as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Present on both sides
    #[serde(rename = "both", alias = "bothSides")]
    BothSides,
    /// Present only on side A
    #[serde(rename = "plex_only", alias = "sideAOnly")]
    SideAOnly,
    /// Present only on side B
    #[serde(rename = "simkl_only", alias = "sideBOnly")]
    SideBOnly,
    /// The server has recorded the deletion
    #[serde(rename = "deleted", alias = "serverDeleted")]
    ServerDeleted,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BothSides => write!(f, "SYNCED"),
            Self::SideAOnly => write!(f, "SIDE A"),
            Self::SideBOnly => write!(f, "SIDE B"),
            Self::ServerDeleted => write!(f, "DELETED"),
        }
    }
}

/// An entry of the remote collection
///
/// Everything besides `key` and `status` is display metadata the core never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    pub status: ItemStatus,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl Item {
    /// Creates an item without metadata
    pub fn new(key: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            key: key.into(),
            status,
            meta: Map::new(),
        }
    }

    /// Adds a metadata field
    pub fn with_meta(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(field.into(), value.into());
        self
    }

    /// Title and year for display, falling back to the key
    pub fn label(&self) -> String {
        let title = self
            .meta
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.key);

        match self.meta.get("year") {
            Some(Value::Number(year)) => format!("{} ({})", title, year),
            Some(Value::String(year)) if !year.is_empty() => format!("{} ({})", title, year),
            _ => title.to_string(),
        }
    }
}
