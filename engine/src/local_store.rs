//! Local record store - the durable key/value cache.
//!
//! The store itself is a flat string map. [`RecordCache`] layers the record
//! conventions on top: one JSON snapshot per record under `id.to_string()`,
//! and a reserved key for the owner-group catalogue.

use crate::{error::Result, Record, RecordId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Reserved key holding the cached owner-group list.
pub const OWNER_GROUPS_KEY: &str = "owners";

/// A flat, persistent, string-keyed map.
///
/// Each call is an atomic unit: readers never observe a partially written
/// value. There are no cross-key transactions.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently stored.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// In-memory store, for tests and for hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Create an empty store wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

/// Typed record access over a [`LocalStore`].
#[derive(Clone)]
pub struct RecordCache {
    store: Arc<dyn LocalStore>,
}

impl RecordCache {
    /// Wrap a store.
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Read the record cached under `key`.
    ///
    /// A value that does not parse as a record is treated as absent.
    pub async fn load(&self, key: &str) -> Result<Option<Record>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match Record::from_json(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping malformed cache entry");
                Ok(None)
            }
        }
    }

    /// Read the record cached for `id`.
    pub async fn load_id(&self, id: RecordId) -> Result<Option<Record>> {
        self.load(&id.to_string()).await
    }

    /// Write a record snapshot under its own id.
    ///
    /// Records without an id cannot be cached; callers assign one first.
    pub async fn put(&self, record: &Record) -> Result<()> {
        let key = record.cache_key().ok_or_else(|| {
            crate::Error::Storage(format!("cannot cache record without id: {}", record.name))
        })?;
        self.store.set(&key, record.to_json()?).await
    }

    /// Drop the snapshot for `id`.
    pub async fn evict(&self, id: RecordId) -> Result<()> {
        self.store.remove(&id.to_string()).await
    }

    /// Every parsable record in the store, keyed by the store key it was read
    /// from. Non-record keys and malformed entries are skipped.
    pub async fn load_all(&self) -> Result<Vec<(String, Record)>> {
        let mut keys = self.store.keys().await?;
        keys.sort();
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if key == OWNER_GROUPS_KEY {
                continue;
            }
            if let Some(record) = self.load(&key).await? {
                records.push((key, record));
            }
        }
        Ok(records)
    }

    /// Visible records owned by `principal`; tombstones are hidden.
    pub async fn load_visible_for(&self, principal: &str) -> Result<Vec<Record>> {
        let mut records: Vec<Record> = self
            .load_all()
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .filter(|r| r.user_id.as_deref() == Some(principal))
            .filter(|r| r.status != crate::SyncStatus::PendingDelete)
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    /// Read the cached owner groups. Missing or malformed means empty.
    pub async fn load_owner_groups(&self) -> Result<Vec<String>> {
        let Some(raw) = self.store.get(OWNER_GROUPS_KEY).await? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring malformed owner-group cache");
            Vec::new()
        }))
    }

    /// Cache the owner groups.
    pub async fn put_owner_groups(&self, groups: &[String]) -> Result<()> {
        self.store
            .set(OWNER_GROUPS_KEY, serde_json::to_string(groups)?)
            .await
    }
}
