//! Centralized error types for attachscope.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the attachscope library.
#[derive(Error, Debug)]
pub enum ScopeError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The hash length matches none of md5, sha1, sha256 or sha512.
    #[error("Invalid hash {0:?}: length matches no known algorithm")]
    InvalidHash(String),

    /// No record in the store matched the query.
    #[error("No sample with {field} = {value} in index '{index}'")]
    NotFound {
        index: String,
        field: String,
        value: String,
    },

    /// A non-transient store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed configuration (processor options, config file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The payload could not be decoded from its transfer encoding.
    #[error("Payload decoding error: {0}")]
    Decode(String),

    /// A stored record lacks a field we need.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Convenience alias for `Result<T, ScopeError>`.
pub type Result<T> = std::result::Result<T, ScopeError>;

impl ScopeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures reported by an [`IndexStore`](crate::store::IndexStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The cluster could not be reached.
    #[error("Connection to the cluster failed: {0}")]
    Connection(String),

    /// The target index or template does not exist (yet).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The cluster rejected the request.
    #[error("Request rejected with status {status}: {body}")]
    Request { status: u16, body: String },

    /// The response body could not be understood.
    #[error("Invalid response from cluster: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Whether a maintenance operation should be retried after this error.
    ///
    /// Only connection failures and "not found" responses are transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::NotFound(_))
    }
}

/// Failures reported by an analysis backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Backend request failed: {0}")]
    Request(String),

    /// The backend answered with an error status.
    #[error("Backend returned status {0}")]
    Status(u16),

    /// The backend answered with something we cannot use.
    #[error("Unusable backend response: {0}")]
    InvalidResponse(String),

    /// The attachment payload could not be prepared for the backend.
    #[error("Unusable payload: {0}")]
    Payload(String),

    /// Local I/O around a backend call failed.
    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An external analysis command exited unsuccessfully.
    #[error("Command '{program}' failed: {reason}")]
    Command { program: String, reason: String },
}
