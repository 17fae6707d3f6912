//! Error types for listkv
//!
//! Provides a unified error type for all operations, plus the coarse
//! [`ErrorKind`] taxonomy that is forwarded unchanged over the wire.

use thiserror::Error;

/// Result type alias using ListError
pub type Result<T> = std::result::Result<T, ListError>;

/// Unified error type for listkv operations
#[derive(Debug, Error)]
pub enum ListError {
    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("List already exists: {0}")]
    AlreadyExists(String),

    #[error("List not found: {0}")]
    NotFound(String),

    #[error("List is empty: {0}")]
    EmptyList(String),

    #[error("Invalid index {index} for list {key} of length {len}")]
    InvalidIndex { key: String, index: i64, len: usize },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An error reported by a remote server, carrying the server's kind.
    #[error("Server error ({kind:?}): {message}")]
    Remote { kind: ErrorKind, message: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error classification shared by the store and the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    EmptyList,
    InvalidIndex,
    /// Journal or snapshot read/write failure
    IoFailure,
    /// Anything outside the store taxonomy (protocol, network, config)
    Other,
}

impl ListError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ListError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            ListError::NotFound(_) => ErrorKind::NotFound,
            ListError::EmptyList(_) => ErrorKind::EmptyList,
            ListError::InvalidIndex { .. } => ErrorKind::InvalidIndex,
            ListError::Io(_)
            | ListError::WalWrite(_)
            | ListError::Snapshot(_)
            | ListError::Serialization(_) => ErrorKind::IoFailure,
            ListError::Network(_) | ListError::Protocol(_) | ListError::Config(_) => {
                ErrorKind::Other
            }
            ListError::Remote { kind, .. } => *kind,
        }
    }
}

impl From<serde_json::Error> for ListError {
    fn from(err: serde_json::Error) -> Self {
        ListError::Serialization(err.to_string())
    }
}
