//! Conflict detection and resolution.
//!
//! A conflict exists when the server's copy of a record is not the version the
//! client last observed, or when either side carries an unacknowledged change.
//! Nothing is merged automatically: the user picks a side and the chosen
//! record is resubmitted one version past the server's.

use crate::Record;
use serde::{Deserialize, Serialize};

/// Which side of a conflict to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Resubmit the local edit
    KeepLocal,
    /// Resubmit the server's record under the local id
    KeepRemote,
}

/// A detected divergence between a local record and the server's copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// The client's view
    pub local: Record,
    /// The server's current copy
    pub server: Record,
}

impl Conflict {
    /// Compare a local record with the server's copy.
    pub fn detect(local: &Record, server: &Record) -> Option<Self> {
        let diverged = server.version != local.version
            || !server.status.is_clean()
            || !local.status.is_clean();
        diverged.then(|| Conflict {
            local: local.clone(),
            server: server.clone(),
        })
    }

    /// Build the record to resubmit for `resolution`, using `local_edit` as
    /// the local side.
    pub fn resolve(&self, local_edit: &Record, resolution: Resolution) -> Record {
        resolve(local_edit, &self.server, resolution)
    }
}

/// Build the record to resubmit when resolving against `server`.
///
/// Either way the result carries `server.version + 1`, keeps the local id,
/// and records the server version it was based on.
pub fn resolve(local_edit: &Record, server: &Record, resolution: Resolution) -> Record {
    let mut chosen = match resolution {
        Resolution::KeepLocal => local_edit.clone(),
        Resolution::KeepRemote => server.clone(),
    };
    chosen.id = local_edit.id.or(server.id);
    chosen.version = server.version + 1;
    chosen.mark_synced();
    chosen.base_version = Some(server.version);
    chosen
}
