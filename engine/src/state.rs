//! Sync state - what the presentation layer renders.
//!
//! State only changes through [`reduce`], one [`Action`] at a time.

use crate::{Action, Error, Record, RecordId};
use serde::{Deserialize, Serialize};

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 12;

/// Position in the paged remote listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    /// Records skipped before this page
    pub offset: usize,
    /// Page size
    pub size: usize,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

impl PageCursor {
    /// Cursor at the first page.
    pub fn first(size: usize) -> Self {
        Self { offset: 0, size }
    }

    /// Cursor at the page after this one.
    pub fn next(self) -> Self {
        Self {
            offset: self.offset + self.size,
            size: self.size,
        }
    }

    /// Whether a page of `count` records leaves more to fetch.
    pub fn has_more_after(self, count: usize) -> bool {
        self.size > 0 && count >= self.size
    }
}

/// Everything the presentation layer may read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Visible records, in arrival order
    pub records: Vec<Record>,
    pub fetching: bool,
    pub fetching_error: Option<Error>,
    pub saving: bool,
    pub saving_error: Option<Error>,
    pub deleting: bool,
    pub deleting_error: Option<Error>,
    /// Server copy of the record in conflict; at most one at a time
    pub conflict: Option<Record>,
    /// Cursor of the last fetched page
    pub cursor: PageCursor,
    /// False once a short page was fetched
    pub more_pages: bool,
    pub owner_groups: Vec<String>,
    pub fetching_owners: bool,
    pub fetching_owners_error: Option<Error>,
    /// A reconciliation sweep is running
    pub sweeping: bool,
}

impl SyncState {
    /// Create an empty state with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            cursor: PageCursor::first(page_size),
            ..Self::default()
        }
    }

    /// Find a visible record by id.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == Some(id))
    }

    /// Whether a conflict awaits resolution.
    pub fn has_conflict(&self) -> bool {
        self.conflict.is_some()
    }

    /// Whether the last fetch fell back to the cache because the remote was
    /// unreachable.
    pub fn is_offline(&self) -> bool {
        self.fetching_error
            .as_ref()
            .is_some_and(Error::is_connectivity)
    }

    fn upsert(&mut self, record: Record) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    fn remove(&mut self, id: RecordId) {
        self.records.retain(|r| r.id != Some(id));
    }
}

/// Apply one transition to `state`.
pub fn reduce(state: &mut SyncState, action: &Action) {
    match action {
        Action::FetchStarted => {
            state.fetching = true;
            state.fetching_error = None;
        }
        Action::FetchSucceeded {
            records,
            append,
            cursor,
            count,
            ..
        } => {
            if *append {
                for record in records {
                    state.upsert(record.clone());
                }
            } else {
                state.records = records.clone();
            }
            state.cursor = *cursor;
            state.more_pages = cursor.has_more_after(*count);
            state.fetching = false;
        }
        Action::FetchFailed { error } => {
            state.fetching_error = Some(error.clone());
            state.fetching = false;
        }
        Action::SaveStarted => {
            state.saving = true;
            state.saving_error = None;
        }
        Action::SaveSucceeded { record } => {
            state.upsert(record.clone());
            state.saving = false;
        }
        Action::SaveFailed { error } => {
            state.saving_error = Some(error.clone());
            state.saving = false;
        }
        Action::DeleteStarted => {
            state.deleting = true;
            state.deleting_error = None;
        }
        Action::DeleteSucceeded { id } => {
            state.remove(*id);
            state.deleting = false;
        }
        Action::DeleteFailed { error } => {
            state.deleting_error = Some(error.clone());
            state.deleting = false;
        }
        Action::OwnersStarted => {
            state.fetching_owners = true;
            state.fetching_owners_error = None;
        }
        Action::OwnersSucceeded { groups } => {
            state.owner_groups = groups.clone();
            state.fetching_owners = false;
        }
        Action::OwnersFailed { error } => {
            state.fetching_owners_error = Some(error.clone());
            state.fetching_owners = false;
        }
        Action::ConflictDetected { server } => {
            state.conflict = Some(server.clone());
        }
        Action::ConflictResolved => {
            state.conflict = None;
        }
        Action::RecordReplaced { previous, record } => {
            let slot = previous
                .and_then(|prev| state.records.iter().position(|r| r.id == Some(prev)));
            match slot {
                Some(index) => {
                    state.records[index] = record.clone();
                    // The new id may already be visible from a later fetch.
                    let mut seen = false;
                    state.records.retain(|r| {
                        if r.id != record.id {
                            return true;
                        }
                        let keep = !seen;
                        seen = true;
                        keep
                    });
                }
                None => state.upsert(record.clone()),
            }
        }
        Action::RecordRemoved { id } => {
            state.remove(*id);
        }
        Action::SweepStarted => {
            state.sweeping = true;
        }
        Action::SweepFinished { .. } => {
            state.sweeping = false;
        }
        Action::PushApplied { record, removed } => {
            if *removed {
                if let Some(id) = record.id {
                    state.remove(id);
                }
            } else {
                state.upsert(record.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FetchSource, SyncStatus};

    fn record(id: RecordId) -> Record {
        Record::draft(format!("game {}", id))
            .with_id(id)
            .with_status(SyncStatus::Synced)
    }

    fn page(ids: std::ops::Range<RecordId>, append: bool, cursor: PageCursor) -> Action {
        let records: Vec<_> = ids.map(record).collect();
        Action::FetchSucceeded {
            count: records.len(),
            records,
            append,
            cursor,
            source: FetchSource::Remote,
        }
    }

    #[test]
    fn cursor_arithmetic() {
        let cursor = PageCursor::first(12);
        assert_eq!(cursor.next(), PageCursor { offset: 12, size: 12 });
        assert!(cursor.has_more_after(12));
        assert!(!cursor.has_more_after(5));
        assert!(!cursor.has_more_after(0));
        assert!(!PageCursor::first(0).has_more_after(0));
    }

    #[test]
    fn fetch_replaces_then_appends() {
        let mut state = SyncState::new(3);
        reduce(&mut state, &Action::FetchStarted);
        assert!(state.fetching);

        reduce(&mut state, &page(1..4, false, PageCursor::first(3)));
        assert_eq!(state.records.len(), 3);
        assert!(state.more_pages);
        assert!(!state.fetching);

        reduce(&mut state, &page(4..6, true, PageCursor::first(3).next()));
        assert_eq!(state.records.len(), 5);
        assert!(!state.more_pages);
        assert_eq!(state.cursor.offset, 3);

        reduce(&mut state, &page(10..11, false, PageCursor::first(3)));
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.records[0].id, Some(10));
    }

    #[test]
    fn started_clears_previous_error() {
        let mut state = SyncState::default();
        reduce(
            &mut state,
            &Action::FetchFailed {
                error: Error::Offline,
            },
        );
        assert!(state.is_offline());

        reduce(&mut state, &Action::FetchStarted);
        assert_eq!(state.fetching_error, None);
    }

    #[test]
    fn save_upserts_in_place() {
        let mut state = SyncState::default();
        reduce(&mut state, &page(1..3, false, PageCursor::default()));

        let edited = record(1).with_version(2);
        reduce(&mut state, &Action::SaveSucceeded { record: edited });
        reduce(&mut state, &Action::SaveSucceeded { record: record(9) });

        let ids: Vec<_> = state.records.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 9]);
        assert_eq!(state.get(1).map(|r| r.version), Some(2));
    }

    #[test]
    fn delete_removes_by_id() {
        let mut state = SyncState::default();
        reduce(&mut state, &page(1..4, false, PageCursor::default()));
        reduce(&mut state, &Action::DeleteStarted);
        reduce(&mut state, &Action::DeleteSucceeded { id: 2 });
        assert!(!state.deleting);
        assert!(state.get(2).is_none());
        assert_eq!(state.records.len(), 2);
    }

    #[test]
    fn conflict_slot_holds_one() {
        let mut state = SyncState::default();
        reduce(&mut state, &Action::ConflictDetected { server: record(1) });
        reduce(&mut state, &Action::ConflictDetected { server: record(2) });
        assert_eq!(state.conflict.as_ref().and_then(|r| r.id), Some(2));

        reduce(&mut state, &Action::ConflictResolved);
        assert!(!state.has_conflict());
    }

    #[test]
    fn replaced_keeps_position() {
        let mut state = SyncState::default();
        reduce(&mut state, &Action::SaveSucceeded { record: record(1) });
        reduce(&mut state, &Action::SaveSucceeded { record: record(-77) });
        reduce(&mut state, &Action::SaveSucceeded { record: record(3) });

        reduce(
            &mut state,
            &Action::RecordReplaced {
                previous: Some(-77),
                record: record(40),
            },
        );
        let ids: Vec<_> = state.records.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 40, 3]);

        reduce(&mut state, &Action::RecordRemoved { id: 1 });
        reduce(
            &mut state,
            &Action::RecordReplaced {
                previous: None,
                record: record(41),
            },
        );
        let ids: Vec<_> = state.records.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![40, 3, 41]);
    }

    #[test]
    fn replaced_does_not_duplicate_visible_id() {
        let mut state = SyncState::default();
        reduce(&mut state, &Action::SaveSucceeded { record: record(-5) });
        reduce(&mut state, &Action::SaveSucceeded { record: record(8) });
        reduce(
            &mut state,
            &Action::RecordReplaced {
                previous: Some(-5),
                record: record(8),
            },
        );
        let ids: Vec<_> = state.records.iter().filter_map(|r| r.id).collect();
        assert_eq!(ids, vec![8]);
    }

    #[test]
    fn push_applied_upserts_or_removes() {
        let mut state = SyncState::default();
        reduce(
            &mut state,
            &Action::PushApplied {
                record: record(5),
                removed: false,
            },
        );
        assert!(state.get(5).is_some());
        reduce(
            &mut state,
            &Action::PushApplied {
                record: record(5),
                removed: true,
            },
        );
        assert!(state.records.is_empty());
    }
}
