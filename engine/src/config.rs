//! Configuration for the sync engine.

use crate::{state::DEFAULT_PAGE_SIZE, PushPolicy};
use serde::{Deserialize, Serialize};

/// Configuration for the reconciliation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepConfig {
    /// Re-read the server copy before replaying a pending update and raise a
    /// conflict instead of overwriting a concurrent server-side change.
    pub check_remote_version: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            check_remote_version: true,
        }
    }
}

/// Configuration for a [`SyncController`](crate::SyncController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Records per page for paged fetches.
    pub page_size: usize,
    /// What push messages do to the visible set.
    pub push_policy: PushPolicy,
    /// Reconciliation sweep behaviour.
    pub sweep: SweepConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            push_policy: PushPolicy::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the push merge policy.
    pub fn with_push_policy(mut self, policy: PushPolicy) -> Self {
        self.push_policy = policy;
        self
    }

    /// Enables or disables the version check before replaying updates.
    pub fn with_sweep_version_check(mut self, enabled: bool) -> Self {
        self.sweep.check_remote_version = enabled;
        self
    }
}
