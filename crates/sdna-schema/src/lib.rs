//! Schema tables, struct compiler and struct linker for SDNA snapshots.
//!
//! A snapshot carries a description of the structs of the build that wrote
//! it. This crate decodes that description, lays every struct out as a flat
//! list of members with resolved offsets, and links it against the layout of
//! the running build.
//!
//! # Quick Start
//!
//! ```
//! use sdna_schema::{CompiledSchema, LinkFlags, LinkGraph, SchemaBuilder, SchemaOptions};
//!
//! // Layout of the running build
//! let mut builder = SchemaBuilder::new();
//! let point = builder.add_struct("Point");
//! builder.add_member(point, "int", "x")?;
//! builder.add_member(point, "int", "y")?;
//! let memory = CompiledSchema::compile(builder.build()?)?;
//!
//! // Layout found in a file written by an older build
//! let mut old = SchemaBuilder::new();
//! let point = old.add_struct("Point");
//! old.add_member(point, "short", "y")?;
//! old.add_member(point, "float", "x")?;
//! let blob = old.to_blob()?;
//! let options = SchemaOptions::new(old.endian(), old.pointer_width());
//! let file = CompiledSchema::from_blob(&blob, &options)?;
//!
//! let graph = LinkGraph::link(&memory, &file);
//! let x = graph.memory_struct(0).unwrap().members[0];
//! assert!(x.flags.contains(LinkFlags::NEEDS_CAST));
//! println!("{}", graph.report(&memory, &file));
//! # Ok::<(), sdna_schema::Error>(())
//! ```
//!
//! # Architecture
//!
//! - **Tables** ([`Schema`]): names, types, type lengths and raw structs
//! - **Builder** ([`SchemaBuilder`]): produces schema blobs for the running build
//! - **Compiler** ([`CompiledSchema`]): per-struct member offsets and key chains
//! - **Linker** ([`LinkGraph`]): member-by-member links with [`LinkFlags`]

mod builder;
mod compiler;
mod error;
mod linker;
mod schema;
mod types;

pub mod structs;

pub use builder::{SchemaBuilder, StructHandle};
pub use compiler::{CompiledSchema, KeyLink, MemberDef, StructDef, MAX_EMBED_DEPTH};
pub use error::{Error, Result};
pub use linker::{LinkFlags, LinkGraph, LinkReport, MemberLink, StructLink};
pub use schema::{
    Schema, SchemaOptions, DEFAULT_MAX_TABLE_LEN, NAME_MAGIC, SDNA_MAGIC, STRC_MAGIC, TLEN_MAGIC,
    TYPE_MAGIC,
};
pub use types::{NumericValue, PrimitiveKind, PRIMITIVE_TYPES};
