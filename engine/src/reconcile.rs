//! Reconciliation sweep: replays pending local changes against the remote.
//!
//! # Algorithm
//!
//! 1. Enumerate every key in the local store (sorted, owner-group key excluded)
//! 2. Skip malformed entries and records with nothing to replay
//! 3. Replay each pending record by status:
//!    - pending create: create remotely, re-key the cache entry under the
//!      server id, replace the temporary entry in state
//!    - pending update: optionally verify the server still holds the version
//!      the edit was based on, then update remotely
//!    - pending delete: delete remotely, drop the tombstone
//! 4. A failure leaves the record pending for the next sweep
//!
//! Every key is processed in its own failure scope. No retry, no backoff.

use crate::{
    controller::CancelToken, error::Result, Action, Error, Record, RecordId, SyncController,
    SyncStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome counts of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Pending creates accepted by the server
    pub created: usize,
    /// Pending updates accepted by the server
    pub updated: usize,
    /// Tombstones replayed (or already gone server-side)
    pub deleted: usize,
    /// Pending updates held back because the server moved on
    pub conflicts: usize,
    /// Replays that failed and stay pending
    pub failed: usize,
    /// Clean or unreadable entries left untouched
    pub skipped: usize,
}

impl SweepReport {
    /// Number of records whose pending change reached the server.
    pub fn replayed(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Whether anything is still pending after the sweep.
    pub fn has_leftovers(&self) -> bool {
        self.conflicts > 0 || self.failed > 0
    }
}

enum Replay {
    Created,
    Updated,
    Deleted,
    Conflict,
    Skipped,
}

/// Resets the single-run flag when the sweep ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One pass over the local store.
pub struct ReconciliationSweep<'a> {
    controller: &'a SyncController,
    token: CancelToken,
    report: SweepReport,
}

impl<'a> ReconciliationSweep<'a> {
    /// Prepare a sweep for `controller`'s session.
    pub fn new(controller: &'a SyncController) -> Self {
        Self {
            controller,
            token: controller.token(),
            report: SweepReport::default(),
        }
    }

    /// Run the sweep. Returns an empty report if another sweep is running or
    /// the session was torn down.
    pub async fn run(mut self) -> SweepReport {
        let Some(_guard) = RunGuard::acquire(&self.controller.sweeping) else {
            tracing::debug!("Sweep already running");
            return self.report;
        };
        if self.token.is_cancelled() {
            return self.report;
        }

        tracing::info!("Reconciliation sweep started");
        self.controller.dispatch(&self.token, Action::SweepStarted);

        let keys = match self.controller.cache.store().keys().await {
            Ok(mut keys) => {
                keys.sort();
                keys
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate local store");
                Vec::new()
            }
        };

        for key in keys {
            if key == crate::local_store::OWNER_GROUPS_KEY {
                continue;
            }
            if self.token.is_cancelled() {
                tracing::debug!("Sweep interrupted by teardown");
                break;
            }
            self.sweep_key(&key).await;
        }

        let report = self.report;
        tracing::info!(
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            conflicts = report.conflicts,
            failed = report.failed,
            skipped = report.skipped,
            "Reconciliation sweep finished"
        );
        self.controller
            .dispatch(&self.token, Action::SweepFinished { report });
        report
    }

    async fn sweep_key(&mut self, key: &str) {
        let record = match self.controller.cache.load(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.report.skipped += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read cache entry");
                self.report.failed += 1;
                return;
            }
        };
        if let Some(id) = record.id {
            self.controller.temp_ids.observe(id);
        }
        if record.status.is_clean() {
            self.report.skipped += 1;
            return;
        }

        let status = record.status;
        let outcome = match status {
            SyncStatus::PendingCreate => self.replay_create(key, record).await,
            SyncStatus::PendingUpdate => self.replay_update(record).await,
            SyncStatus::PendingDelete => self.replay_delete(key, record).await,
            SyncStatus::Synced => return,
        };

        match outcome {
            Ok(Replay::Created) => self.report.created += 1,
            Ok(Replay::Updated) => self.report.updated += 1,
            Ok(Replay::Deleted) => self.report.deleted += 1,
            Ok(Replay::Conflict) => self.report.conflicts += 1,
            Ok(Replay::Skipped) => self.report.skipped += 1,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    ?status,
                    error = %e,
                    "Replay failed, keeping record pending"
                );
                self.report.failed += 1;
            }
        }
    }

    async fn replay_create(&self, key: &str, record: Record) -> Result<Replay> {
        let previous = record.id;
        let _claim = match previous {
            Some(id) => Some(self.controller.claim_temporary(id).await),
            None => None,
        };
        // Re-read under the claim: a save may have pushed it meanwhile.
        let current = self.controller.cache.load(key).await?;
        let Some(record) = current.filter(|r| r.status == SyncStatus::PendingCreate) else {
            tracing::debug!(key = %key, "Pending create already sent");
            return Ok(Replay::Skipped);
        };
        let mut outgoing = record;
        outgoing.id = None;
        outgoing.mark_synced();

        let mut created = self.controller.remote.create(&outgoing).await?;
        created.mark_synced();
        self.controller.cache.put(&created).await?;
        if created.cache_key().as_deref() != Some(key) {
            self.controller.cache.store().remove(key).await?;
        }
        if let Some(previous) = previous {
            self.controller.promote(previous, &created);
        }
        tracing::debug!(previous = ?previous, id = ?created.id, "Replayed pending create");
        self.controller.dispatch(
            &self.token,
            Action::RecordReplaced {
                previous,
                record: created,
            },
        );
        Ok(Replay::Created)
    }

    async fn replay_update(&self, record: Record) -> Result<Replay> {
        let id = required_id(&record)?;

        if self.controller.config.sweep.check_remote_version {
            if let Some(base) = record.base_version {
                let server = self.controller.remote.get(id).await?;
                if server.version != base || !server.status.is_clean() {
                    tracing::info!(
                        id,
                        base_version = base,
                        server_version = server.version,
                        "Server moved past pending edit, raising conflict"
                    );
                    self.controller
                        .dispatch(&self.token, Action::ConflictDetected { server });
                    return Ok(Replay::Conflict);
                }
            }
        }

        let mut outgoing = record;
        outgoing.mark_synced();
        let mut updated = self.controller.remote.update(&outgoing).await?;
        updated.mark_synced();
        self.controller.cache.put(&updated).await?;
        tracing::debug!(id, version = updated.version, "Replayed pending update");
        self.controller.dispatch(
            &self.token,
            Action::RecordReplaced {
                previous: Some(id),
                record: updated,
            },
        );
        Ok(Replay::Updated)
    }

    async fn replay_delete(&self, key: &str, record: Record) -> Result<Replay> {
        let id = required_id(&record)?;
        match self.controller.remote.delete(&record).await {
            Ok(()) | Err(Error::RecordNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.controller.cache.store().remove(key).await?;
        tracing::debug!(id, "Replayed pending delete");
        self.controller
            .dispatch(&self.token, Action::RecordRemoved { id });
        Ok(Replay::Deleted)
    }
}

fn required_id(record: &Record) -> Result<RecordId> {
    record
        .id
        .ok_or_else(|| Error::Storage(format!("pending record without id: {}", record.name)))
}

impl SyncController {
    /// Replay every pending local change against the remote.
    pub async fn sweep(&self) -> SweepReport {
        ReconciliationSweep::new(self).run().await
    }

    /// Whether a sweep is currently running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::SeqCst)
    }
}
