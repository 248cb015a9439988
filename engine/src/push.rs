//! Push channel message protocol and merge policy.
//!
//! After connecting, the client sends an [`AuthorizationMessage`]; from then on
//! the server sends [`PushMessage`]s describing changes made elsewhere.
//!
//! Pushed changes are not merged into the visible set by default: the client
//! would otherwise double-apply its own writes echoed back by the server.
//! [`PushPolicy::MergeNewer`] opts in to merging with a version guard.

use crate::{Action, Record};
use serde::{Deserialize, Serialize};

/// Kind of change announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushEvent {
    Created,
    Updated,
    Deleted,
}

/// A change notification from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    /// What happened
    pub event: PushEvent,
    /// The record as the server now sees it
    pub payload: Record,
}

/// Credentials payload of the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token: String,
}

/// First frame sent by the client on a new connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthorizationMessage {
    Authorization { payload: TokenPayload },
}

impl AuthorizationMessage {
    /// Build the handshake for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        AuthorizationMessage::Authorization {
            payload: TokenPayload {
                token: token.into(),
            },
        }
    }
}

/// How push messages affect the visible set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PushPolicy {
    /// Log only; never touch state (default)
    #[default]
    LogOnly,
    /// Apply creates/updates carrying a newer version and deletes, unless the
    /// visible copy has a pending local edit
    MergeNewer,
}

impl PushPolicy {
    /// Decide what, if anything, `message` does to the visible set given the
    /// currently visible copy of the same record.
    pub fn decide(self, message: &PushMessage, visible: Option<&Record>) -> Option<Action> {
        if self == PushPolicy::LogOnly {
            return None;
        }
        message.payload.id?;
        if visible.is_some_and(|r| r.status.is_pending()) {
            return None;
        }
        match message.event {
            PushEvent::Created | PushEvent::Updated => {
                let newer = visible.map_or(true, |r| message.payload.version > r.version);
                newer.then(|| {
                    let mut record = message.payload.clone();
                    record.mark_synced();
                    Action::PushApplied {
                        record,
                        removed: false,
                    }
                })
            }
            PushEvent::Deleted => visible.map(|_| Action::PushApplied {
                record: message.payload.clone(),
                removed: true,
            }),
        }
    }
}
