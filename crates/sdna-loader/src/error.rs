//! Error types for loading and saving snapshots.

use thiserror::Error;

/// Errors that can occur when loading or writing a snapshot.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] sdna_common::Error),

    /// Schema decoding or compiling error.
    #[error("schema: {0}")]
    Schema(#[from] sdna_schema::Error),

    /// The file header is malformed or does not match the configuration.
    #[error("invalid file header: {0}")]
    HeaderInvalid(String),

    /// The stream ended inside a header or record.
    #[error("stream truncated: needed {needed} bytes but only {available} available")]
    ReadTruncated { needed: usize, available: usize },

    /// A record buffer could not be allocated.
    #[error("allocation of {requested} bytes failed")]
    AllocationFailed { requested: usize },

    /// A key was registered twice where that is not allowed.
    #[error("duplicate key: {0}")]
    InsertConflict(String),

    /// The file schema could not be linked against the memory schema.
    #[error("link failed: {0}")]
    LinkFailed(String),

    /// A collaborator hook refused the load.
    #[error("rejected by hook: {0}")]
    Rejected(String),
}

/// Broad classification of load failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    HeaderInvalid,
    SectionMissing,
    TableTooLarge,
    AllocationFailed,
    ReadTruncated,
    InsertConflict,
    LinkFailed,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Common(e) => common_kind(e),
            Self::Schema(e) => match e {
                sdna_schema::Error::Common(e) => common_kind(e),
                sdna_schema::Error::SectionMissing { .. }
                | sdna_schema::Error::IndexOutOfRange { .. } => ErrorKind::SectionMissing,
                sdna_schema::Error::TableTooLarge { .. } => ErrorKind::TableTooLarge,
                sdna_schema::Error::RecursiveStruct(_)
                | sdna_schema::Error::UnknownType(_)
                | sdna_schema::Error::InvalidPointerWidth(_) => ErrorKind::LinkFailed,
            },
            Self::HeaderInvalid(_) => ErrorKind::HeaderInvalid,
            Self::ReadTruncated { .. } => ErrorKind::ReadTruncated,
            Self::AllocationFailed { .. } => ErrorKind::AllocationFailed,
            Self::InsertConflict(_) => ErrorKind::InsertConflict,
            Self::LinkFailed(_) | Self::Rejected(_) => ErrorKind::LinkFailed,
        }
    }
}

fn common_kind(error: &sdna_common::Error) -> ErrorKind {
    use sdna_common::Error as E;
    match error {
        E::UnexpectedEof { .. } => ErrorKind::ReadTruncated,
        E::AllocationFailed { .. } => ErrorKind::AllocationFailed,
        E::InsertConflict => ErrorKind::InsertConflict,
        E::Io(_) => ErrorKind::Io,
        E::Utf8 { .. } | E::MissingNullTerminator { .. } => ErrorKind::SectionMissing,
    }
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, Error>;
