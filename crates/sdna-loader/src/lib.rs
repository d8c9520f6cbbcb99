//! Chunk loader and object patcher for SDNA snapshots.
//!
//! A snapshot is a file header, a sequence of records tagged with the address
//! they had in the writing process, and a schema record describing the
//! writer's structs. [`Loader`] reads every record, links the embedded schema
//! against the running build's [`CompiledSchema`](sdna_schema::CompiledSchema)
//! and rewrites each record into the running build's layout, with pointers
//! remapped to record handles.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sdna_loader::{Loader, LoaderConfig};
//! use sdna_schema::{CompiledSchema, SchemaBuilder};
//!
//! let mut builder = SchemaBuilder::new();
//! let point = builder.add_struct("Point");
//! builder.add_member(point, "int", "x")?;
//! builder.add_member(point, "int", "y")?;
//! let memory = Arc::new(CompiledSchema::compile(builder.build()?)?);
//!
//! let mut loader = Loader::new(memory).with_config(LoaderConfig::new().skip_type("Cache"));
//! let graph = loader.load_path("scene.snap")?;
//! for (id, _) in graph.records_of_type("Point") {
//!     println!("{:?} x = {:?}", id, graph.read_member(id, 0, "x"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! - **Headers** ([`FileHeader`], [`RecordLayout`]): 12-byte file header,
//!   20 or 24 byte record headers
//! - **Streams** ([`ByteStream`]): borrowed bytes, memory-mapped files, gzip
//! - **Loader** ([`Loader`]): record loop and [`LoadState`] machine
//! - **Patcher** ([`Patcher`]): file layout to memory layout, pointer remapping
//! - **Writer** ([`GraphWriter`]): save path for snapshots

mod address_map;
mod config;
mod error;
mod graph;
mod header;
mod hooks;
mod loader;
mod patcher;
mod record;
mod stream;
mod writer;

pub use address_map::AddressMap;
pub use config::LoaderConfig;
pub use error::{Error, ErrorKind, Result};
pub use graph::LoadedGraph;
pub use header::{
    FileHeader, RawRecordHeader32, RawRecordHeader64, RecordCode, RecordHeader, RecordLayout,
    DEFAULT_IDENTIFIER, FILE_HEADER_SIZE,
};
pub use hooks::{LoadHooks, NoHooks, RecordView, ReportLevel};
pub use loader::{scan_schema, scan_schema_path, LoadState, Loader};
pub use patcher::{PatchStats, Patcher};
pub use record::{Record, RecordBuffer, RecordId};
pub use stream::{open_stream, ByteStream, FileStream, GzipStream, MemoryStream, GZIP_MAGIC};
pub use writer::{FileSink, GraphWriter, DEFAULT_VERSION};
