//! # Tether Client
//!
//! Concrete adapters for [`tether_engine`]:
//!
//! - [`HttpRemoteClient`] - the record server's REST API over `reqwest`
//! - [`ws::connect`] - the authenticated push channel over `tokio-tungstenite`
//! - [`FileStore`] - a durable one-file-per-key local store
//! - [`ClientConfig`] - environment-driven configuration
//! - [`SyncAgent`] - a headless session tying them together

pub mod agent;
pub mod config;
pub mod error;
pub mod file_store;
pub mod http;
pub mod ws;

pub use agent::SyncAgent;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use file_store::FileStore;
pub use http::HttpRemoteClient;
pub use ws::PushSubscription;
