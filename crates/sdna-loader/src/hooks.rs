//! Collaborator hooks.
//!
//! The loader owns no typed collections. Whoever drives a load implements
//! [`LoadHooks`] to see the memory schema up front, decide which types to
//! skip, and receive each record once it is in memory layout.

use sdna_schema::CompiledSchema;

use crate::{RecordHeader, RecordId, Result};

/// Severity of a diagnostic sent to [`LoadHooks::report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A record ready to be filed by the collaborator.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    pub id: RecordId,
    pub header: &'a RecordHeader,
    /// Memory-layout bytes.
    pub data: &'a [u8],
    /// Memory struct the bytes are laid out as; `None` for opaque blocks.
    pub memory_struct: Option<usize>,
}

/// Callbacks invoked during a load.
pub trait LoadHooks {
    /// Called once before any record is read.
    fn initialize_memory_schema(&mut self, _memory: &CompiledSchema) -> Result<()> {
        Ok(())
    }

    /// Whether records of the struct type with this name hash are skipped.
    fn should_skip(&self, _type_hash: u32) -> bool {
        false
    }

    /// Whether records of this struct type are copied verbatim instead of patched.
    fn is_verbatim_type(&self, _type_hash: u32) -> bool {
        false
    }

    /// Called for every patched record, in file order.
    fn on_record_ready(&mut self, _record: RecordView<'_>) -> Result<()> {
        Ok(())
    }

    /// Advisory diagnostics. Forwards to `tracing` by default.
    fn report(&self, level: ReportLevel, message: &str) {
        match level {
            ReportLevel::Debug => tracing::debug!("{}", message),
            ReportLevel::Info => tracing::info!("{}", message),
            ReportLevel::Warn => tracing::warn!("{}", message),
            ReportLevel::Error => tracing::error!("{}", message),
        }
    }
}

/// Hooks that accept everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl LoadHooks for NoHooks {}
