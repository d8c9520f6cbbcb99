//! Error types for schema reading, compiling and building.

use thiserror::Error;

/// Errors that can occur when working with schema blobs.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error (truncated blob, bad UTF-8, ...).
    #[error("{0}")]
    Common(#[from] sdna_common::Error),

    /// A section did not start with its magic.
    #[error("schema section missing: expected {expected}, found {actual:?}")]
    SectionMissing {
        expected: &'static str,
        actual: String,
    },

    /// A table count exceeds the configured maximum.
    #[error("{table} table has {count} entries (maximum {max})")]
    TableTooLarge {
        table: &'static str,
        count: usize,
        max: usize,
    },

    /// A struct references a name or type past the end of its table.
    #[error("{table} index {index} out of range (table size: {len})")]
    IndexOutOfRange {
        table: &'static str,
        index: usize,
        len: usize,
    },

    /// A struct embeds itself, directly or through other structs.
    #[error("struct {0} embeds itself")]
    RecursiveStruct(String),

    /// A builder member refers to an undeclared type.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Unsupported pointer width.
    #[error("unsupported pointer width: {0} (expected 4 or 8)")]
    InvalidPointerWidth(u8),
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, Error>;
