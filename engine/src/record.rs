//! Record types for synchronized data.

use crate::{error::Result, RecordId, Version};
use serde::{Deserialize, Deserializer, Serialize};

/// Local sync status of a record.
///
/// Stored on the wire and in the local cache as a small integer so cached
/// snapshots stay compatible with what the server hands out (`0` = clean).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SyncStatus {
    /// Acknowledged by the server
    #[default]
    Synced,
    /// Created locally, never reached the server
    PendingCreate,
    /// Edited locally, edit not yet acknowledged
    PendingUpdate,
    /// Deleted locally, tombstone awaiting replay
    PendingDelete,
}

impl SyncStatus {
    /// Whether the record carries no unacknowledged local change.
    pub fn is_clean(self) -> bool {
        self == SyncStatus::Synced
    }

    /// Whether the record must be replayed by the reconciliation sweep.
    pub fn is_pending(self) -> bool {
        !self.is_clean()
    }
}

impl From<SyncStatus> for u8 {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Synced => 0,
            SyncStatus::PendingCreate => 1,
            SyncStatus::PendingUpdate => 2,
            SyncStatus::PendingDelete => 3,
        }
    }
}

impl TryFrom<u8> for SyncStatus {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(SyncStatus::Synced),
            1 => Ok(SyncStatus::PendingCreate),
            2 => Ok(SyncStatus::PendingUpdate),
            3 => Ok(SyncStatus::PendingDelete),
            other => Err(format!("unknown sync status: {}", other)),
        }
    }
}

/// A synchronized record.
///
/// Only the sync-relevant fields are typed. Everything else the server sends
/// (numeric attributes, photo and location blobs, ...) lands in `payload` and
/// is written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Server-assigned identifier; negative for temporary local ids
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Grouping attribute used for filtering and pagination
    #[serde(rename = "owners", default, skip_serializing_if = "Option::is_none")]
    pub owner_key: Option<String>,
    /// Principal that owns the record
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    /// Display name, searchable by substring
    #[serde(default)]
    pub name: String,
    /// Server-authoritative version
    #[serde(default)]
    pub version: Version,
    /// Local sync status
    #[serde(default)]
    pub status: SyncStatus,
    /// Last acknowledged version a pending edit was based on (local only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<Version>,
    /// Opaque domain fields
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Create an unsaved record. It has no id yet, so it is a pending create.
    pub fn draft(name: impl Into<String>) -> Self {
        Self {
            id: None,
            owner_key: None,
            user_id: None,
            name: name.into(),
            version: 1,
            status: SyncStatus::PendingCreate,
            base_version: None,
            payload: serde_json::Map::new(),
        }
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the grouping attribute.
    pub fn with_owner_key(mut self, owner_key: impl Into<String>) -> Self {
        self.owner_key = Some(owner_key.into());
        self
    }

    /// Set the owning principal.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = status;
        self
    }

    /// Set an opaque payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Key under which the record is cached locally.
    pub fn cache_key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    /// Whether the server has never seen this record.
    pub fn is_local_only(&self) -> bool {
        match self.id {
            None => true,
            Some(id) => crate::temp_id::is_temporary(id),
        }
    }

    /// Mark the record as acknowledged by the server.
    pub fn mark_synced(&mut self) {
        self.status = SyncStatus::Synced;
        self.base_version = None;
    }

    /// Case-insensitive substring match on the name. Empty query matches all.
    pub fn name_contains(&self, query: &str) -> bool {
        query.is_empty() || self.name.to_lowercase().contains(&query.to_lowercase())
    }

    /// Parse a cached snapshot.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialize to a cache snapshot.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Accept principals sent either as JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
