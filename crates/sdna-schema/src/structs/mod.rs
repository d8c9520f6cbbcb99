//! Schema table entries.

mod name;
mod raw;
mod type_entry;

pub use name::{NameEntry, MAX_ARRAY_DIMS};
pub use raw::{RawMember, StructRaw};
pub use type_entry::TypeEntry;
