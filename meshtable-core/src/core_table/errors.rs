/*
    errors.rs - Error types for the replicated table

    Defines the errors that can surface from:
    - Content construction (size bound)
    - Capacity ceilings
    - Payload encryption/decryption
    - Snapshot persistence
*/

use thiserror::Error;
use uuid::Uuid;

/// Scope whose ceiling was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityScope {
    /// Too many namespaces in the table
    Namespaces,
    /// Too many entries in one namespace
    Records(Uuid),
}

impl std::fmt::Display for CapacityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityScope::Namespaces => write!(f, "namespaces"),
            CapacityScope::Records(ns) => write!(f, "records in namespace {}", ns),
        }
    }
}

/// Errors that can occur in table operations
#[derive(Debug, Error)]
pub enum TableError {
    /// Payload larger than the per-item bound
    #[error("Content too large: {size} bytes (max {max})")]
    ContentTooLarge { size: usize, max: usize },

    /// A hard ceiling was reached and pruning did not free room.
    /// Not retryable.
    #[error("Capacity exceeded: {scope} limit {limit} reached")]
    CapacityExceeded { scope: CapacityScope, limit: usize },

    /// Payload cipher failure
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Snapshot persistence failure
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Rejected table configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TableError {
    /// Whether this error signals an abuse/configuration condition that must abort the caller
    pub fn is_fatal(&self) -> bool {
        matches!(self, TableError::CapacityExceeded { .. } | TableError::ContentTooLarge { .. })
    }
}

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

/// Errors from a `ContentCipher`
#[derive(Debug, Error)]
pub enum CipherError {
    /// No key material for the namespace
    #[error("No key for namespace {0}")]
    MissingKey(Uuid),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Authentication or decryption failed
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Plaintext could not be (de)serialized
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl From<bincode::Error> for CipherError {
    fn from(err: bincode::Error) -> Self {
        CipherError::Malformed(err.to_string())
    }
}

/// Errors from a `NamespaceState`
#[derive(Debug, Error)]
pub enum StateError {
    /// Storage I/O error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot on disk is not readable
    #[error("Corrupted snapshot: {0}")]
    Corrupted(String),
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for StateError {
    fn from(err: bincode::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Result type for persistence operations
pub type StateResult<T> = Result<T, StateError>;
