//! Connectivity monitor.
//!
//! The platform reports reachability through [`ConnectivityMonitor::set_online`].
//! [`spawn_reconnect_sweeps`] turns every offline-to-online edge into a
//! reconciliation sweep.

use crate::SyncController;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared reachability flag.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial reachability.
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Publish reachability. Returns whether the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            tracing::info!(online, "Connectivity changed");
        }
        changed
    }

    /// Current reachability.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Watch reachability changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Run a sweep on every transition to online.
///
/// The task ends on controller teardown or when every monitor handle is
/// dropped.
pub fn spawn_reconnect_sweeps(
    monitor: &ConnectivityMonitor,
    controller: Arc<SyncController>,
) -> JoinHandle<()> {
    let mut rx = monitor.subscribe();
    let token = controller.cancel_token();
    tokio::spawn(async move {
        let mut was_online = *rx.borrow_and_update();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *rx.borrow_and_update();
                    if online && !was_online {
                        let report = controller.sweep().await;
                        tracing::debug!(replayed = report.replayed(), "Reconnect sweep done");
                    }
                    was_online = online;
                }
            }
        }
        tracing::debug!("Reconnect sweep task stopped");
    })
}
