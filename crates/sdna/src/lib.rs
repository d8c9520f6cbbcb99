//! SDNA - schema-evolving object-graph snapshots.
//!
//! This crate provides a unified interface to the SDNA library crates.
//!
//! # Crates
//!
//! - [`sdna_common`] - Common utilities (binary reading, byte order, CRC32C, containers)
//! - [`sdna_schema`] - Schema tables, struct compiler and struct linker
//! - [`sdna_loader`] - Chunk loader, object patcher and snapshot writer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sdna::prelude::*;
//!
//! // Layout of the running build, saved earlier with `sdna extract-schema`
//! let memory = Arc::new(sdna::load_memory_schema("memory.sdna")?);
//!
//! let graph = Loader::new(memory).load_path("scene.snap")?;
//! for (code, count) in graph.counts_by_code() {
//!     println!("{}: {}", code, count);
//! }
//! # Ok::<(), sdna::Error>(())
//! ```

use std::path::Path;

// Re-export all sub-crates
pub use sdna_common as common;
pub use sdna_loader as loader;
pub use sdna_schema as schema;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use sdna_common::{crc, BinaryReader, Endian, OpenHashMap, SpanArray};
    pub use sdna_loader::{
        FileHeader, GraphWriter, LoadHooks, LoadState, LoadedGraph, Loader, LoaderConfig,
        RecordCode, RecordId, RecordView,
    };
    pub use sdna_schema::{
        CompiledSchema, LinkFlags, LinkGraph, NumericValue, Schema, SchemaBuilder, SchemaOptions,
    };
}

/// Errors from any SDNA crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] sdna_common::Error),

    #[error(transparent)]
    Schema(#[from] sdna_schema::Error),

    #[error(transparent)]
    Loader(#[from] sdna_loader::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Read a schema blob in the running build's byte order and pointer width
/// and compile it, for use as the memory schema of a [`loader::Loader`].
pub fn load_memory_schema<P: AsRef<Path>>(path: P) -> Result<schema::CompiledSchema> {
    let blob = std::fs::read(path)?;
    let compiled =
        schema::CompiledSchema::from_blob(&blob, &schema::SchemaOptions::default())?;
    Ok(compiled)
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_load_memory_schema() {
        let mut builder = SchemaBuilder::new();
        let point = builder.add_struct("Point");
        builder.add_member(point, "int", "x").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.sdna");
        std::fs::write(&path, builder.to_blob().unwrap()).unwrap();

        let memory = load_memory_schema(&path).unwrap();
        assert!(memory.schema().struct_by_name("Point").is_some());
        assert!(load_memory_schema(dir.path().join("missing.sdna")).is_err());
    }
}
