//! Remote client contract.
//!
//! The engine talks to the authoritative store only through [`RemoteClient`].
//! Implementations own the bearer credential; every call may fail with a
//! connectivity error.

use crate::{error::Result, Error, Record, RecordId};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A paged, filtered list request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// Owner group to match; empty matches every group
    pub owner_filter: String,
    /// Name substring; empty matches every name
    pub partial_name: String,
    /// Number of records to skip
    pub offset: usize,
    /// Maximum number of records to return
    pub size: usize,
}

impl PageQuery {
    /// Create a query.
    pub fn new(
        owner_filter: impl Into<String>,
        partial_name: impl Into<String>,
        offset: usize,
        size: usize,
    ) -> Self {
        Self {
            owner_filter: owner_filter.into(),
            partial_name: partial_name.into(),
            offset,
            size,
        }
    }

    /// Whether `record` falls inside this query's filters (ignores paging).
    pub fn matches(&self, record: &Record) -> bool {
        let owner_ok = self.owner_filter.is_empty()
            || record.owner_key.as_deref() == Some(self.owner_filter.as_str());
        owner_ok && record.name_contains(&self.partial_name)
    }
}

/// CRUD surface of the authoritative store.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Read one page of records.
    async fn list(&self, query: &PageQuery) -> Result<Vec<Record>>;

    /// Read the server's current copy of a record.
    async fn get(&self, id: RecordId) -> Result<Record>;

    /// List the owner groups the server knows about.
    async fn list_owner_groups(&self) -> Result<Vec<String>>;

    /// Create a record; the server assigns the id.
    async fn create(&self, record: &Record) -> Result<Record>;

    /// Replace a record.
    async fn update(&self, record: &Record) -> Result<Record>;

    /// Delete a record.
    async fn delete(&self, record: &Record) -> Result<()>;
}

/// A call observed by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    List(PageQuery),
    Get(RecordId),
    ListOwnerGroups,
    Create(Record),
    Update(Record),
    Delete(RecordId),
}

/// An in-memory authoritative store for testing.
///
/// Assigns ids from 1 upwards, rejects updates that do not advance the stored
/// version, and can be switched offline or told to fail the next call.
#[derive(Debug)]
pub struct MockRemote {
    records: Mutex<BTreeMap<RecordId, Record>>,
    owner_groups: Mutex<Vec<String>>,
    next_id: AtomicI64,
    online: AtomicBool,
    fail_next: Mutex<Option<Error>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    /// Create an empty, reachable mock.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            owner_groups: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            online: AtomicBool::new(true),
            fail_next: Mutex::new(None),
            latency: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert a server-side record directly and return it as stored.
    pub fn seed(&self, record: Record) -> Record {
        let mut record = record;
        let id = match record.id {
            Some(id) => {
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                id
            }
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        record.id = Some(id);
        record.mark_synced();
        self.records.lock().insert(id, record.clone());
        record
    }

    /// Mutate a stored record as if another client had edited it.
    pub fn edit_on_server(&self, id: RecordId, edit: impl FnOnce(&mut Record)) -> Option<Record> {
        let mut records = self.records.lock();
        let record = records.get_mut(&id)?;
        edit(record);
        Some(record.clone())
    }

    /// Set the owner groups returned by `list_owner_groups`.
    pub fn set_owner_groups(&self, groups: Vec<String>) {
        *self.owner_groups.lock() = groups;
    }

    /// Toggle reachability.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: Error) {
        *self.fail_next.lock() = Some(error);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// The server's copy of a record.
    pub fn record(&self, id: RecordId) -> Option<Record> {
        self.records.lock().get(&id).cloned()
    }

    /// Number of records stored server-side.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if the server holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    async fn enter(&self, call: RemoteCall) -> Result<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.calls.lock().push(call);
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn list(&self, query: &PageQuery) -> Result<Vec<Record>> {
        self.enter(RemoteCall::List(query.clone())).await?;
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| query.matches(r))
            .skip(query.offset)
            .take(query.size)
            .cloned()
            .collect())
    }

    async fn get(&self, id: RecordId) -> Result<Record> {
        self.enter(RemoteCall::Get(id)).await?;
        self.record(id).ok_or(Error::RecordNotFound(id))
    }

    async fn list_owner_groups(&self) -> Result<Vec<String>> {
        self.enter(RemoteCall::ListOwnerGroups).await?;
        Ok(self.owner_groups.lock().clone())
    }

    async fn create(&self, record: &Record) -> Result<Record> {
        self.enter(RemoteCall::Create(record.clone())).await?;
        let mut created = record.clone();
        created.id = None;
        Ok(self.seed(created))
    }

    async fn update(&self, record: &Record) -> Result<Record> {
        self.enter(RemoteCall::Update(record.clone())).await?;
        let id = record.id.ok_or_else(|| Error::Rejected {
            status: 400,
            message: "update without id".into(),
        })?;
        let mut records = self.records.lock();
        let stored = records.get_mut(&id).ok_or(Error::RecordNotFound(id))?;
        if record.version <= stored.version {
            return Err(Error::Rejected {
                status: 409,
                message: format!(
                    "stale version {} (server has {})",
                    record.version, stored.version
                ),
            });
        }
        *stored = record.clone();
        stored.mark_synced();
        Ok(stored.clone())
    }

    async fn delete(&self, record: &Record) -> Result<()> {
        let id = record.id.unwrap_or_default();
        self.enter(RemoteCall::Delete(id)).await?;
        self.records
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::RecordNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matching() {
        let record = Record::draft("Stardew Valley").with_owner_key("0 .. 20000");
        assert!(PageQuery::new("", "", 0, 10).matches(&record));
        assert!(PageQuery::new("0 .. 20000", "valley", 0, 10).matches(&record));
        assert!(!PageQuery::new("20000 .. 50000", "", 0, 10).matches(&record));
        assert!(!PageQuery::new("", "terraria", 0, 10).matches(&record));
    }

    #[tokio::test]
    async fn mock_assigns_ids_and_pages() {
        let remote = MockRemote::new();
        for i in 0..5 {
            remote
                .create(&Record::draft(format!("game {}", i)))
                .await
                .unwrap();
        }
        assert_eq!(remote.len(), 5);

        let page = remote.list(&PageQuery::new("", "", 3, 10)).await.unwrap();
        let ids: Vec<_> = page.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 5]);
        assert!(page.iter().all(|r| r.status.is_clean()));
    }

    #[tokio::test]
    async fn mock_rejects_stale_update() {
        let remote = MockRemote::new();
        let stored = remote.seed(Record::draft("Braid").with_version(3));

        let stale = stored.clone().with_version(3);
        let err = remote.update(&stale).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { status: 409, .. }));

        let fresh = stored.with_version(4);
        assert_eq!(remote.update(&fresh).await.unwrap().version, 4);
    }

    #[tokio::test]
    async fn mock_offline_and_injected_failures() {
        let remote = MockRemote::new();
        remote.set_online(false);
        assert!(remote.get(1).await.unwrap_err().is_connectivity());

        remote.set_online(true);
        remote.fail_next(Error::Rejected {
            status: 500,
            message: "boom".into(),
        });
        assert!(remote.list_owner_groups().await.is_err());
        assert!(remote.list_owner_groups().await.is_ok());
        assert_eq!(remote.calls().len(), 3);
    }
}
