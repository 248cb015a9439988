//! Edge case tests for tether-engine
//!
//! These tests cover teardown, overlapping operations and damaged caches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tether_engine::{
    Error, LocalStore, MemoryStore, MockRemote, PushEvent, PushMessage, PushPolicy, Record,
    SyncConfig, SyncController, SyncStatus,
};

fn controller_with(
    config: SyncConfig,
) -> (Arc<MockRemote>, Arc<MemoryStore>, Arc<SyncController>) {
    let remote = MockRemote::new_shared();
    let store = MemoryStore::new_shared();
    let controller = SyncController::new_shared(remote.clone(), store.clone(), "u1", config);
    (remote, store, controller)
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn results_after_teardown_are_discarded() {
    let (remote, _, controller) = controller_with(SyncConfig::default());
    remote.seed(Record::draft("Late").with_user_id("u1"));
    remote.set_latency(Duration::from_millis(50));

    let fetch = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.refresh("", "", true).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.teardown();
    fetch.await.unwrap();

    assert!(controller.state().records.is_empty());
    assert!(controller.is_torn_down());
}

#[tokio::test]
async fn torn_down_session_does_not_sweep() {
    let (remote, _, controller) = controller_with(SyncConfig::default());
    controller
        .save(Record::draft("Orphan").with_user_id("u1"), false)
        .await
        .unwrap();
    controller.teardown();

    let report = controller.sweep().await;
    assert_eq!(report.replayed(), 0);
    assert!(remote.calls().is_empty());
}

// ============================================================================
// Overlapping operations
// ============================================================================

#[tokio::test]
async fn newer_refresh_supersedes_older() {
    let (remote, _, controller) = controller_with(SyncConfig::default());
    remote.seed(Record::draft("alpha").with_user_id("u1"));
    remote.seed(Record::draft("beta").with_user_id("u1"));

    remote.set_latency(Duration::from_millis(80));
    let slow = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.refresh("", "alpha", true).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    remote.set_latency(Duration::ZERO);

    assert_eq!(controller.refresh("", "beta", true).await, 1);
    assert_eq!(slow.await.unwrap(), 0);

    let state = controller.state();
    assert_eq!(state.records.len(), 1);
    assert_eq!(state.records[0].name, "beta");
}

#[tokio::test]
async fn rapid_offline_creates_get_distinct_ids() {
    let (_, store, controller) = controller_with(SyncConfig::default());
    let mut ids = HashSet::new();
    for i in 0..100 {
        let saved = controller
            .save(Record::draft(format!("burst {}", i)).with_user_id("u1"), false)
            .await
            .unwrap();
        assert!(ids.insert(saved.id.unwrap()));
    }
    assert_eq!(store.len(), 100);
    assert_eq!(controller.state().records.len(), 100);
}

#[tokio::test]
async fn overlapping_pages_do_not_duplicate() {
    let (remote, _, controller) = controller_with(SyncConfig::default().with_page_size(2));
    for i in 0..3 {
        remote.seed(Record::draft(format!("g{}", i)).with_user_id("u1"));
    }
    controller.refresh("", "", true).await;

    // A record inserted ahead of the cursor shifts the next page back by one.
    remote.seed(Record::draft("early").with_id(0).with_user_id("u1"));
    assert_eq!(controller.next_page("", "", true).await, 2);

    let ids: Vec<_> = controller
        .state()
        .records
        .iter()
        .filter_map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn save_racing_sweep_creates_once() {
    let (remote, store, controller) = controller_with(SyncConfig::default());
    let pending = controller
        .save(Record::draft("Racer").with_user_id("u1"), false)
        .await
        .unwrap();

    remote.set_latency(Duration::from_millis(20));
    let (saved, report) = tokio::join!(controller.save(pending, true), controller.sweep());

    let saved = saved.unwrap();
    assert_eq!(saved.id, Some(1));
    assert_eq!(remote.len(), 1);
    assert!(report.created <= 1);
    assert_eq!(store.keys().await.unwrap(), vec!["1"]);

    let state = controller.state();
    assert_eq!(state.records.len(), 1);
    assert_eq!(state.records[0].id, Some(1));
}

#[tokio::test]
async fn stale_temporary_copy_follows_replayed_record() {
    let (remote, _, controller) = controller_with(SyncConfig::default());
    let pending = controller
        .save(Record::draft("Draft").with_user_id("u1"), false)
        .await
        .unwrap();
    assert_eq!(controller.sweep().await.created, 1);

    let mut renamed = pending.clone();
    renamed.name = "Renamed".into();
    let saved = controller.save(renamed, true).await.unwrap();
    assert_eq!(saved.id, Some(1));
    assert_eq!(remote.len(), 1);
    assert_eq!(remote.record(1).unwrap().name, "Renamed");

    controller.delete(pending, true).await.unwrap();
    assert!(remote.is_empty());
    assert!(controller.state().records.is_empty());
}

// ============================================================================
// Remote rejections
// ============================================================================

#[tokio::test]
async fn rejected_delete_keeps_record() {
    let (remote, store, controller) = controller_with(SyncConfig::default());
    remote.seed(Record::draft("Keep").with_user_id("u1"));
    controller.refresh("", "", true).await;

    remote.fail_next(Error::Rejected {
        status: 403,
        message: "forbidden".into(),
    });
    let record = controller.state().records[0].clone();
    let err = controller.delete(record, true).await.unwrap_err();

    assert!(matches!(err, Error::Rejected { status: 403, .. }));
    let state = controller.state();
    assert_eq!(state.records.len(), 1);
    assert_eq!(state.deleting_error, Some(err));
    assert!(store.get("1").await.unwrap().is_some());
}

#[tokio::test]
async fn delete_of_record_gone_on_server_succeeds() {
    let (remote, _, controller) = controller_with(SyncConfig::default());
    remote.seed(Record::draft("Gone").with_user_id("u1"));
    controller.refresh("", "", true).await;

    remote.fail_next(Error::RecordNotFound(1));
    let record = controller.state().records[0].clone();
    controller.delete(record, true).await.unwrap();
    assert!(controller.state().records.is_empty());
}

// ============================================================================
// Damaged cache
// ============================================================================

#[tokio::test]
async fn malformed_entries_skipped_in_offline_fetch() {
    let (_, store, controller) = controller_with(SyncConfig::default());
    let good = Record::draft("Fine")
        .with_id(1)
        .with_user_id("u1")
        .with_status(SyncStatus::Synced);
    store.set("1", good.to_json().unwrap()).await.unwrap();
    store.set("2", "{\"_id\": 2, \"status\": 42}".into()).await.unwrap();
    store.set("3", "garbage".into()).await.unwrap();

    controller.refresh("", "", false).await;
    let state = controller.state();
    assert_eq!(state.records, vec![good]);
}

#[tokio::test]
async fn malformed_owner_groups_cache_reads_empty() {
    let (_, store, controller) = controller_with(SyncConfig::default());
    store.set("owners", "not a list".into()).await.unwrap();

    let groups = controller.fetch_owner_groups(false).await;
    assert!(groups.is_empty());
    assert_eq!(
        controller.state().fetching_owners_error,
        Some(Error::Offline)
    );
}

// ============================================================================
// Push merge policy
// ============================================================================

#[tokio::test]
async fn merge_newer_applies_pushed_updates() {
    let (remote, store, controller) =
        controller_with(SyncConfig::default().with_push_policy(PushPolicy::MergeNewer));
    remote.seed(Record::draft("Before").with_user_id("u1"));
    controller.refresh("", "", true).await;

    let pushed = Record::draft("After")
        .with_id(1)
        .with_user_id("u1")
        .with_version(2)
        .with_status(SyncStatus::Synced);
    let applied = controller
        .handle_push(PushMessage {
            event: PushEvent::Updated,
            payload: pushed.clone(),
        })
        .await;
    assert!(applied);
    assert_eq!(controller.state().records[0].name, "After");
    let raw = store.get("1").await.unwrap().unwrap();
    assert_eq!(Record::from_json(&raw).unwrap(), pushed);

    // An echo of an older version is ignored.
    let stale = pushed.with_version(1);
    assert!(
        !controller
            .handle_push(PushMessage {
                event: PushEvent::Updated,
                payload: stale,
            })
            .await
    );

    let removed = controller
        .handle_push(PushMessage {
            event: PushEvent::Deleted,
            payload: Record::draft("After").with_id(1),
        })
        .await;
    assert!(removed);
    assert!(controller.state().records.is_empty());
    assert!(store.get("1").await.unwrap().is_none());
}

#[tokio::test]
async fn merge_newer_keeps_offline_delete() {
    let (remote, store, controller) =
        controller_with(SyncConfig::default().with_push_policy(PushPolicy::MergeNewer));
    remote.seed(Record::draft("Doomed").with_user_id("u1"));
    controller.refresh("", "", true).await;
    let record = controller.state().records[0].clone();
    controller.delete(record, false).await.unwrap();

    let pushed = Record::draft("Doomed v2")
        .with_id(1)
        .with_user_id("u1")
        .with_version(2)
        .with_status(SyncStatus::Synced);
    let applied = controller
        .handle_push(PushMessage {
            event: PushEvent::Updated,
            payload: pushed,
        })
        .await;
    assert!(!applied);

    let raw = store.get("1").await.unwrap().unwrap();
    assert_eq!(
        Record::from_json(&raw).unwrap().status,
        SyncStatus::PendingDelete
    );
    assert!(controller.state().records.is_empty());

    assert_eq!(controller.sweep().await.deleted, 1);
    assert!(remote.record(1).is_none());
}

#[tokio::test]
async fn merge_newer_skips_hidden_pending_entries() {
    for status in [
        SyncStatus::PendingCreate,
        SyncStatus::PendingUpdate,
        SyncStatus::PendingDelete,
    ] {
        let (_, store, controller) =
            controller_with(SyncConfig::default().with_push_policy(PushPolicy::MergeNewer));
        let local = Record::draft("Local edit")
            .with_id(5)
            .with_user_id("u1")
            .with_version(1)
            .with_status(status);
        store.set("5", local.to_json().unwrap()).await.unwrap();

        for event in [PushEvent::Created, PushEvent::Updated, PushEvent::Deleted] {
            let pushed = Record::draft("Server copy")
                .with_id(5)
                .with_user_id("u1")
                .with_version(3)
                .with_status(SyncStatus::Synced);
            let applied = controller
                .handle_push(PushMessage {
                    event,
                    payload: pushed,
                })
                .await;
            assert!(!applied, "push applied over {:?}", status);
        }

        let raw = store.get("5").await.unwrap().unwrap();
        assert_eq!(Record::from_json(&raw).unwrap(), local);
        assert!(controller.state().records.is_empty());
    }
}
