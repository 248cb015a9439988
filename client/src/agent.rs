//! Headless sync agent.
//!
//! Wires the HTTP remote, the file store and the push channel to a
//! [`SyncController`]. The push channel doubles as the connectivity probe:
//! the agent is online while the channel is open. Every reconnect flips the
//! [`ConnectivityMonitor`], which starts a reconciliation sweep in the
//! background, and refreshes the first page at the same time. Fetched pages
//! never overwrite pending local copies, so the two can overlap.

use crate::{ws, ClientConfig, FileStore, HttpRemoteClient, Result};
use std::future::Future;
use std::sync::Arc;
use tether_engine::{spawn_reconnect_sweeps, ConnectivityMonitor, SyncController};

/// A running client session.
#[derive(Debug)]
pub struct SyncAgent {
    config: ClientConfig,
    controller: Arc<SyncController>,
    monitor: ConnectivityMonitor,
}

impl SyncAgent {
    /// Open the local store and build the session for `config`.
    pub async fn open(config: ClientConfig) -> Result<Self> {
        let remote = Arc::new(HttpRemoteClient::from_config(&config)?);
        let store = Arc::new(FileStore::open(&config.cache_dir).await?);
        let controller = SyncController::new_shared(
            remote,
            store,
            config.principal.clone(),
            config.sync_config(),
        );
        Ok(Self::with_controller(config, controller))
    }

    /// Build an agent around an existing controller.
    pub fn with_controller(config: ClientConfig, controller: Arc<SyncController>) -> Self {
        Self {
            config,
            controller,
            monitor: ConnectivityMonitor::new(false),
        }
    }

    /// The session controller.
    pub fn controller(&self) -> &Arc<SyncController> {
        &self.controller
    }

    /// The connectivity monitor driving reconnect sweeps.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Run until `shutdown` resolves, then tear the session down.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.controller.subscribe(|action| {
            tracing::debug!(kind = %action.kind(), "State transition");
        });
        let sweeps = spawn_reconnect_sweeps(&self.monitor, self.controller.clone());

        // Show whatever the cache holds before the first connection attempt.
        self.controller.refresh("", "", false).await;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown requested");
            }
            _ = self.push_loop() => {}
        }

        self.monitor.set_online(false);
        self.controller.teardown();
        if let Err(e) = sweeps.await {
            tracing::warn!(error = %e, "Reconnect sweep task failed");
        }
        Ok(())
    }

    /// Keep the push channel open, reconnecting after a fixed delay.
    async fn push_loop(&self) {
        let url = self.config.push_url();
        let token = self.controller.cancel_token();
        while !token.is_cancelled() {
            match ws::connect(&url, &self.config.token).await {
                Ok(mut subscription) => {
                    self.on_connected().await;
                    while let Some(message) = subscription.next().await {
                        self.controller.handle_push(message).await;
                    }
                    subscription.close().await;
                    tracing::warn!("Push channel lost, working offline");
                    self.monitor.set_online(false);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Push channel unavailable");
                }
            }
            tokio::time::sleep(self.config.reconnect_interval).await;
        }
    }

    async fn on_connected(&self) {
        self.monitor.set_online(true);
        self.controller.fetch_owner_groups(true).await;
        self.controller.refresh("", "", true).await;
    }
}
