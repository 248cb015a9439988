//! State transitions and the notifier that broadcasts them.
//!
//! Every change to [`SyncState`](crate::SyncState) is expressed as an
//! [`Action`]. The controller reduces each action into state and then hands
//! the same action to the single subscriber, synchronously, before the next
//! action is dispatched.

use crate::{Error, PageCursor, Record, RecordId, SweepReport};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where a fetched page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchSource {
    /// A page read from the remote
    Remote,
    /// The offline fallback over the local cache
    Cache,
}

/// A discrete state transition.
///
/// Serializes as `{"kind": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum Action {
    FetchStarted,
    FetchSucceeded {
        records: Vec<Record>,
        append: bool,
        cursor: PageCursor,
        count: usize,
        source: FetchSource,
    },
    FetchFailed {
        error: Error,
    },
    SaveStarted,
    SaveSucceeded {
        record: Record,
    },
    SaveFailed {
        error: Error,
    },
    DeleteStarted,
    DeleteSucceeded {
        id: RecordId,
    },
    DeleteFailed {
        error: Error,
    },
    OwnersStarted,
    OwnersSucceeded {
        groups: Vec<String>,
    },
    OwnersFailed {
        error: Error,
    },
    ConflictDetected {
        server: Record,
    },
    ConflictResolved,
    /// A record was replaced by the server's copy, possibly under a new id.
    RecordReplaced {
        previous: Option<RecordId>,
        record: Record,
    },
    /// A record left the visible set outside a user delete.
    RecordRemoved {
        id: RecordId,
    },
    SweepStarted,
    SweepFinished {
        report: SweepReport,
    },
    /// A push message was merged into the visible set.
    PushApplied {
        record: Record,
        removed: bool,
    },
}

/// The kind of an [`Action`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FetchStarted,
    FetchSucceeded,
    FetchFailed,
    SaveStarted,
    SaveSucceeded,
    SaveFailed,
    DeleteStarted,
    DeleteSucceeded,
    DeleteFailed,
    OwnersStarted,
    OwnersSucceeded,
    OwnersFailed,
    ConflictDetected,
    ConflictResolved,
    RecordReplaced,
    RecordRemoved,
    SweepStarted,
    SweepFinished,
    PushApplied,
}

impl EventKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FetchStarted => "fetch-started",
            EventKind::FetchSucceeded => "fetch-succeeded",
            EventKind::FetchFailed => "fetch-failed",
            EventKind::SaveStarted => "save-started",
            EventKind::SaveSucceeded => "save-succeeded",
            EventKind::SaveFailed => "save-failed",
            EventKind::DeleteStarted => "delete-started",
            EventKind::DeleteSucceeded => "delete-succeeded",
            EventKind::DeleteFailed => "delete-failed",
            EventKind::OwnersStarted => "owners-started",
            EventKind::OwnersSucceeded => "owners-succeeded",
            EventKind::OwnersFailed => "owners-failed",
            EventKind::ConflictDetected => "conflict-detected",
            EventKind::ConflictResolved => "conflict-resolved",
            EventKind::RecordReplaced => "record-replaced",
            EventKind::RecordRemoved => "record-removed",
            EventKind::SweepStarted => "sweep-started",
            EventKind::SweepFinished => "sweep-finished",
            EventKind::PushApplied => "push-applied",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    /// The kind of this action.
    pub fn kind(&self) -> EventKind {
        match self {
            Action::FetchStarted => EventKind::FetchStarted,
            Action::FetchSucceeded { .. } => EventKind::FetchSucceeded,
            Action::FetchFailed { .. } => EventKind::FetchFailed,
            Action::SaveStarted => EventKind::SaveStarted,
            Action::SaveSucceeded { .. } => EventKind::SaveSucceeded,
            Action::SaveFailed { .. } => EventKind::SaveFailed,
            Action::DeleteStarted => EventKind::DeleteStarted,
            Action::DeleteSucceeded { .. } => EventKind::DeleteSucceeded,
            Action::DeleteFailed { .. } => EventKind::DeleteFailed,
            Action::OwnersStarted => EventKind::OwnersStarted,
            Action::OwnersSucceeded { .. } => EventKind::OwnersSucceeded,
            Action::OwnersFailed { .. } => EventKind::OwnersFailed,
            Action::ConflictDetected { .. } => EventKind::ConflictDetected,
            Action::ConflictResolved => EventKind::ConflictResolved,
            Action::RecordReplaced { .. } => EventKind::RecordReplaced,
            Action::RecordRemoved { .. } => EventKind::RecordRemoved,
            Action::SweepStarted => EventKind::SweepStarted,
            Action::SweepFinished { .. } => EventKind::SweepFinished,
            Action::PushApplied { .. } => EventKind::PushApplied,
        }
    }
}

/// Callback receiving every dispatched action.
pub type Subscriber = Arc<dyn Fn(&Action) + Send + Sync>;

/// Single-subscriber broadcast of state transitions.
///
/// Late subscribers see nothing that was dispatched before they subscribed.
#[derive(Default)]
pub struct EventNotifier {
    subscriber: RwLock<Option<Subscriber>>,
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

impl EventNotifier {
    /// Create a notifier with no subscriber.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the subscriber, replacing any previous one.
    pub fn subscribe(&self, subscriber: impl Fn(&Action) + Send + Sync + 'static) {
        let previous = self.subscriber.write().replace(Arc::new(subscriber));
        if previous.is_some() {
            tracing::warn!("Replacing existing event subscriber");
        }
    }

    /// Remove the subscriber.
    pub fn unsubscribe(&self) {
        self.subscriber.write().take();
    }

    /// Whether a subscriber is installed.
    pub fn is_subscribed(&self) -> bool {
        self.subscriber.read().is_some()
    }

    /// Deliver `action` to the subscriber, if any.
    pub fn notify(&self, action: &Action) {
        // Clone out so the subscriber may call back into the notifier.
        let subscriber = self.subscriber.read().clone();
        if let Some(subscriber) = subscriber {
            subscriber(action);
        }
    }
}
