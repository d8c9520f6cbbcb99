//! Common utilities for SDNA.
//!
//! This crate provides foundational types and utilities used across all SDNA crates:
//!
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices in either byte order
//! - [`Endian`] - Byte order markers and 16/32/64-bit swapping
//! - [`crc`] - CRC32C hashing of type and member names
//! - [`SpanArray`] - Growable array with explicit growth and reusable storage
//! - [`OpenHashMap`] - Hash table with bucket/chain index arrays and swap-remove

mod endian;
mod error;
mod open_map;
mod reader;
mod span;

pub mod crc;

pub use endian::{swap16, swap32, swap64, swap_in_place, Endian};
pub use error::{Error, Result};
pub use open_map::{OpenHashMap, StableHash, NO_ENTRY};
pub use reader::BinaryReader;
pub use span::{SpanArray, DEFAULT_REUSE_LIMIT, MIN_GROWTH};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
