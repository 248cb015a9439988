//! Unified error handling for the client adapters.

use crate::config::ConfigError;

/// Client set-up and transport error type.
///
/// Errors raised inside engine calls are already mapped to
/// [`tether_engine::Error`]; this type covers everything around them.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] tether_engine::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for client set-up.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Map an IO failure of the local store into the engine's error type.
pub(crate) fn storage_error(context: &str, error: std::io::Error) -> tether_engine::Error {
    tether_engine::Error::Storage(format!("{}: {}", context, error))
}

/// Map a transport failure into the engine's error type.
pub(crate) fn transport_error(error: reqwest::Error) -> tether_engine::Error {
    if error.is_decode() {
        tether_engine::Error::Serialization(error.to_string())
    } else {
        tether_engine::Error::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_keeps_context() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = storage_error("write 12", io);
        assert_eq!(err, tether_engine::Error::Storage("write 12: denied".into()));
        assert!(!err.is_connectivity());
    }

    #[test]
    fn engine_errors_convert() {
        let err: ClientError = tether_engine::Error::Offline.into();
        assert!(matches!(err, ClientError::Engine(tether_engine::Error::Offline)));
        assert!(err.to_string().contains("Engine error"));
    }
}
