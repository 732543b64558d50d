//! Error types for the Plan B state store
//!
//! Every layer (codecs, environments, shapes, the store facade) reports
//! failures through the single [`Error`] enum defined here. "Not found" is
//! never an error; lookups return `Ok(None)` instead.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Result type alias for Plan B operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Plan B state store
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (creating store directories, reading config)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fatal error reported by the underlying LMDB engine (map full, disk full, ...)
    #[error("Store error: {0}")]
    Store(#[from] heed::Error),

    /// A stored buffer was truncated or malformed
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Encoded key exceeds the engine's key size limit
    #[error("Key too long: {len} bytes exceeds maximum of {max}")]
    KeyTooLong {
        /// Encoded key length
        len: usize,
        /// Maximum permitted length
        max: usize,
    },

    /// Session start is after its end
    #[error("Invalid session: start {start} is after end {end}")]
    InvalidSession {
        /// Session start
        start: DateTime<Utc>,
        /// Session end
        end: DateTime<Utc>,
    },

    /// Range lower bound is above its upper bound
    #[error("Invalid range: from {from} is greater than to {to}")]
    InvalidRange {
        /// Lower bound
        from: i64,
        /// Upper bound
        to: i64,
    },

    /// Input value cannot be represented at the requested precision
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Time zone id could not be resolved
    #[error("Invalid zone id: {0}")]
    InvalidZone(String),

    /// Configuration value rejected
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// No shape registered under this name
    #[error("Unknown shape: {0}")]
    UnknownShape(String),

    /// A shape with this name is already registered
    #[error("Shape already registered: {0}")]
    DuplicateShape(String),

    /// The shape exists but was requested with different key/value types
    #[error("Shape {shape} is not a {expected}")]
    ShapeTypeMismatch {
        /// Shape name
        shape: String,
        /// Requested type
        expected: &'static str,
    },

    /// Operation aborted by the caller's cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// The environment has been shut down
    #[error("Environment closed")]
    Closed,
}

impl Error {
    /// Construct a corruption error from any displayable cause.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Returns true if this error came from the storage engine itself.
    ///
    /// These errors leave the engine unable to continue writing safely and
    /// are surfaced rather than retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Io(_))
    }
}
