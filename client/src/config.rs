//! Configuration management for the client.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tether_engine::{PushPolicy, SyncConfig, DEFAULT_PAGE_SIZE};

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the record server, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Bearer token for HTTP calls and the push handshake
    pub token: String,
    /// Principal whose records this client syncs
    pub principal: String,
    /// Directory of the durable local store
    pub cache_dir: PathBuf,
    /// Records per page
    pub page_size: usize,
    /// Merge push messages into the visible set
    pub push_merge: bool,
    /// Timeout of a single HTTP call
    pub timeout: Duration,
    /// Delay between push channel reconnect attempts
    pub reconnect_interval: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("TETHER_BASE_URL").ok_or(ConfigError::Missing("TETHER_BASE_URL"))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "TETHER_BASE_URL",
                value: base_url,
            });
        }
        let base_url = base_url.trim_end_matches('/').to_string();

        let token = lookup("TETHER_TOKEN").ok_or(ConfigError::Missing("TETHER_TOKEN"))?;
        let principal =
            lookup("TETHER_PRINCIPAL").ok_or(ConfigError::Missing("TETHER_PRINCIPAL"))?;

        let cache_dir = lookup("TETHER_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".tether-cache"));

        let page_size = parse_or(&lookup, "TETHER_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "TETHER_PAGE_SIZE",
                value: "0".into(),
            });
        }
        let push_merge = parse_or(&lookup, "TETHER_PUSH_MERGE", false)?;
        let timeout = Duration::from_secs(parse_or(&lookup, "TETHER_TIMEOUT_SECS", 30)?);
        let reconnect_interval =
            Duration::from_secs(parse_or(&lookup, "TETHER_RECONNECT_SECS", 5)?);

        Ok(Self {
            base_url,
            token,
            principal,
            cache_dir,
            page_size,
            push_merge,
            timeout,
            reconnect_interval,
        })
    }

    /// Engine configuration derived from this client configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let policy = if self.push_merge {
            PushPolicy::MergeNewer
        } else {
            PushPolicy::LogOnly
        };
        SyncConfig::new()
            .with_page_size(self.page_size)
            .with_push_policy(policy)
    }

    /// WebSocket endpoint of the push channel: the server root with a `ws`
    /// scheme.
    pub fn push_url(&self) -> String {
        match self.base_url.strip_prefix("https://") {
            Some(rest) => format!("wss://{}", rest),
            None => format!("ws://{}", self.base_url.trim_start_matches("http://")),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Configuration errors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {value}")]
    Invalid { key: &'static str, value: String },
}
