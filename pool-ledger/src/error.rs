//! Error types for the pool ledger
//!
//! Only infrastructure failures and programmer errors live here. Replays,
//! registry conflicts and malformed input are ordinary outcomes and are
//! reported through [`crate::processor::ProcessOutcome`].

use thiserror::Error;

/// Result type for pool ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pool ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (outcome recorded without a claim, rewritten entry, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, commit task aborted, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Other(format!("metrics: {}", err))
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl Error {
    /// Rebuild an equivalent error for fan-out to several waiters.
    ///
    /// Batched commits answer every caller in the batch with the same result,
    /// and the underlying error types are not `Clone`.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Error::Storage(msg) => Error::Storage(msg.clone()),
            Error::InvariantViolation(msg) => Error::InvariantViolation(msg.clone()),
            Error::Concurrency(msg) => Error::Concurrency(msg.clone()),
            Error::Config(msg) => Error::Config(msg.clone()),
            Error::Other(msg) => Error::Other(msg.clone()),
            Error::Serialization(err) => Error::Storage(format!("serialization: {}", err)),
            Error::Io(err) => Error::Storage(format!("io: {}", err)),
        }
    }
}
