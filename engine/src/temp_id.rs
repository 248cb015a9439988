//! Temporary identifiers for records created while offline.
//!
//! Temporary ids are negative so they can never collide with server-assigned
//! ids. They are seeded from wall-clock milliseconds but forced to be strictly
//! monotonic, so two creates within the same millisecond still get distinct ids.

use crate::RecordId;
use parking_lot::Mutex;

/// Whether `id` was minted locally and has never been acknowledged.
pub fn is_temporary(id: RecordId) -> bool {
    id < 0
}

/// Mints locally-unique temporary ids.
#[derive(Debug, Default)]
pub struct TempIdGenerator {
    last: Mutex<i64>,
}

impl TempIdGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next temporary id using the current wall clock.
    pub fn next_id(&self) -> RecordId {
        self.next_id_at(chrono::Utc::now().timestamp_millis())
    }

    /// Mint the next temporary id as if the clock read `now_ms`.
    pub fn next_id_at(&self, now_ms: i64) -> RecordId {
        let mut last = self.last.lock();
        let next = now_ms.max(*last + 1).max(1);
        *last = next;
        -next
    }

    /// Make sure future ids never reuse `id`, e.g. after reloading a cache
    /// that already holds temporary records.
    pub fn observe(&self, id: RecordId) {
        if is_temporary(id) {
            let mut last = self.last.lock();
            *last = (*last).max(-id);
        }
    }
}
