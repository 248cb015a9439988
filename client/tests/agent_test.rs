//! Sync agent lifecycle without a reachable server.

use std::collections::HashMap;
use std::sync::Arc;
use tether_client::{ClientConfig, FileStore, SyncAgent};
use tether_engine::{MockRemote, Record, SyncController, SyncStatus};

fn config(cache_dir: &std::path::Path) -> ClientConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("TETHER_BASE_URL", "http://127.0.0.1:9".to_string()),
        ("TETHER_TOKEN", "t0k".to_string()),
        ("TETHER_PRINCIPAL", "u1".to_string()),
        ("TETHER_CACHE_DIR", cache_dir.display().to_string()),
        ("TETHER_RECONNECT_SECS", "1".to_string()),
    ]);
    ClientConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn run_shows_cache_then_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = Arc::new(FileStore::open(&config.cache_dir).await.unwrap());

    let remote = MockRemote::new_shared();
    remote.set_online(false);
    let controller =
        SyncController::new_shared(remote, store, "u1", config.sync_config());
    controller
        .save(Record::draft("Offline draft").with_user_id("u1"), false)
        .await
        .unwrap();

    let agent = SyncAgent::with_controller(config, controller.clone());
    assert!(!agent.monitor().is_online());
    agent.run(async {}).await.unwrap();

    assert!(controller.is_torn_down());
    let state = controller.state();
    assert_eq!(state.records.len(), 1);
    assert_eq!(state.records[0].status, SyncStatus::PendingCreate);
}

#[tokio::test]
async fn open_creates_cache_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir.path().join("cache"));

    let agent = SyncAgent::open(config).await.unwrap();
    assert!(dir.path().join("cache").is_dir());
    assert_eq!(agent.controller().principal(), "u1");
}
