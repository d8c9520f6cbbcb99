//! Error types for sdna-common.

use thiserror::Error;

/// Errors from reading schema bytes and from the shared containers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of data at offset {offset}: needed {needed} bytes, {available} left")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("string at offset {offset} has no NUL terminator")]
    MissingNullTerminator { offset: usize },

    #[error("string at offset {offset} is not UTF-8: {source}")]
    Utf8 {
        offset: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing storage could not be grown.
    #[error("allocation of {requested} bytes failed")]
    AllocationFailed { requested: usize },

    /// Key was already present in an [`OpenHashMap`](crate::OpenHashMap).
    #[error("key already present")]
    InsertConflict,
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
