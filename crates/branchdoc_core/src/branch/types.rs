//! Serializable branch metadata.
//!
//! These types are the persisted side of branching. They round-trip as JSON
//! inside a document row's `metadata` field, so field names follow the
//! camelCase used by the UI layer.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Name of the branch that always exists once branching is initialized.
pub const MAIN_BRANCH: &str = "main";

/// Deserializes a timestamp that should be epoch milliseconds, but may have
/// been written as an RFC 3339 string or a float by another client.
fn deserialize_timestamp_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", n))),
        Some(serde_json::Value::String(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.timestamp_millis())
            .or_else(|_| s.parse::<i64>())
            .map_err(|_| D::Error::custom(format!("invalid timestamp: {}", s))),
        Some(other) => Err(D::Error::custom(format!(
            "expected timestamp, got {:?}",
            other
        ))),
    }
}

/// A named, independently mutable line of document history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Branch {
    /// Base64-encoded CRDT snapshot ("" when the branch has no content yet)
    #[serde(default)]
    pub snapshot: String,

    /// Unix timestamp of creation (milliseconds)
    #[serde(default, deserialize_with = "deserialize_timestamp_lenient")]
    #[ts(type = "number")]
    pub created_at: i64,

    /// Unix timestamp of the last snapshot write (milliseconds)
    #[serde(default, deserialize_with = "deserialize_timestamp_lenient")]
    #[ts(type = "number")]
    pub updated_at: i64,
}

impl Branch {
    /// Create a branch holding `snapshot`, stamped with the current time.
    pub fn new(snapshot: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            snapshot,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One entry of the recent-snapshot list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RecentSnapshot {
    /// Base64-encoded CRDT snapshot
    pub snapshot: String,

    /// Unix timestamp when recorded (milliseconds)
    #[serde(default, deserialize_with = "deserialize_timestamp_lenient")]
    #[ts(type = "number")]
    pub timestamp: i64,

    /// Branch the snapshot was taken from
    pub branch_name: String,
}

/// The full persisted branching state of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct BranchesMetadata {
    /// Branches by name
    pub branches: IndexMap<String, Branch>,

    /// Branch currently shown to the user; absent means "main"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_branch: Option<String>,

    /// Newest-first list of recent snapshots, capped by the writer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_snapshots: Vec<RecentSnapshot>,
}

impl BranchesMetadata {
    /// Get a branch by name.
    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    /// Check whether a branch exists.
    pub fn contains(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// The active branch as stored, or "main" when unset.
    pub fn active_branch(&self) -> &str {
        self.active_branch.as_deref().unwrap_or(MAIN_BRANCH)
    }

    /// The active branch, falling back to "main" when the stored name does
    /// not reference an existing branch.
    pub fn resolved_active_branch(&self) -> &str {
        match self.active_branch.as_deref() {
            Some(name) if self.contains(name) => name,
            _ => MAIN_BRANCH,
        }
    }

    /// Branch names in stored order.
    pub fn branch_names(&self) -> Vec<String> {
        self.branches.keys().cloned().collect()
    }
}
