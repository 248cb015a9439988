//! Error types for the Tether engine.

use crate::RecordId;
use serde::Serialize;
use thiserror::Error;

/// All possible errors from the Tether engine.
///
/// Errors are `Clone` so the last failure of each operation can be kept in
/// [`SyncState`](crate::SyncState) for the presentation layer to render.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "detail", rename_all = "camelCase")]
pub enum Error {
    // Connectivity errors
    #[error("device is offline")]
    Offline,

    #[error("network error: {0}")]
    Network(String),

    // Remote errors
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    // Local errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("local storage error: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error means the remote could not be reached at all.
    ///
    /// Connectivity errors send operations down the offline path; every other
    /// error is surfaced as-is.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Offline | Error::Network(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
