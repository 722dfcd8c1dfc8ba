//! Error types for the router-core crate.
//!
//! Only [`RouterError::Config`] ever escapes [`crate::RoutingEngine::search`].
//! The remaining variants are produced by the ledger, cache and call log,
//! whose callers log and absorb them.

/// Errors that can occur while routing a web search.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Malformed request or engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem error on the state directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// The named exclusive lock could not be acquired.
    #[error("lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

/// Convenience type alias for router-core results.
pub type Result<T> = std::result::Result<T, RouterError>;
