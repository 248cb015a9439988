//! # Tether Engine
//!
//! An offline-first record sync engine for client applications.
//!
//! This crate keeps a client's view of a remote record collection usable while
//! disconnected. Reads fall back to a local cache, writes made offline are
//! tagged pending and replayed when connectivity returns, and divergence
//! between a local edit and the server's copy is surfaced as a conflict for
//! the user to resolve.
//!
//! ## Design Principles
//!
//! - **Server is authoritative**: local changes are proposals until acknowledged
//! - **Platform-neutral**: storage and transport are traits; HTTP, WebSocket
//!   and file IO live in `tether-client`
//! - **One way to change state**: every transition is an [`Action`] reduced
//!   into [`SyncState`] and broadcast to a single subscriber
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] carries a server id (negative while only known locally), a
//! grouping key, the owning principal, a version and a [`SyncStatus`]:
//! - `Synced` - acknowledged by the server
//! - `PendingCreate` / `PendingUpdate` / `PendingDelete` - awaiting replay
//!
//! ### Controller
//!
//! [`SyncController`] runs fetch, save and delete against a [`RemoteClient`],
//! falling back to a [`LocalStore`] when the remote is unreachable.
//!
//! ### Conflicts
//!
//! [`SyncController::get_remote_version`] compares a local record with the
//! server's copy. A mismatch fills the single conflict slot; the user picks a
//! [`Resolution`] and the chosen side is resubmitted one version past the
//! server's.
//!
//! ### Reconciliation
//!
//! [`ReconciliationSweep`] replays every pending record on reconnect. See
//! [`spawn_reconnect_sweeps`] for wiring it to a [`ConnectivityMonitor`].
//!
//! ## Quick Start
//!
//! ```rust
//! use tether_engine::{MemoryStore, MockRemote, Record, SyncConfig, SyncController, SyncStatus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let remote = MockRemote::new_shared();
//! let store = MemoryStore::new_shared();
//! let controller = SyncController::new(remote.clone(), store, "u1", SyncConfig::default());
//!
//! // Offline save: queued locally under a temporary id.
//! let draft = Record::draft("Outer Wilds").with_user_id("u1");
//! let pending = controller.save(draft, false).await.unwrap();
//! assert_eq!(pending.status, SyncStatus::PendingCreate);
//!
//! // Back online: the sweep replays it.
//! let report = controller.sweep().await;
//! assert_eq!(report.created, 1);
//! assert_eq!(remote.len(), 1);
//! # }
//! ```

pub mod config;
pub mod conflict;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod events;
pub mod local_store;
pub mod push;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod state;
pub mod temp_id;

// Re-export main types at crate root
pub use config::{SweepConfig, SyncConfig};
pub use conflict::{Conflict, Resolution};
pub use connectivity::{spawn_reconnect_sweeps, ConnectivityMonitor};
pub use controller::{CancelToken, SyncController};
pub use error::Error;
pub use events::{Action, EventKind, EventNotifier, FetchSource, Subscriber};
pub use local_store::{LocalStore, MemoryStore, RecordCache, OWNER_GROUPS_KEY};
pub use push::{AuthorizationMessage, PushEvent, PushMessage, PushPolicy, TokenPayload};
pub use reconcile::{ReconciliationSweep, SweepReport};
pub use record::{Record, SyncStatus};
pub use remote::{MockRemote, PageQuery, RemoteCall, RemoteClient};
pub use state::{reduce, PageCursor, SyncState, DEFAULT_PAGE_SIZE};
pub use temp_id::TempIdGenerator;

/// Type aliases for clarity
pub type RecordId = i64;
pub type Version = u64;
