//! Type entries from the `TYPE` and `TLEN` tables.

use sdna_common::crc;

use crate::PrimitiveKind;

/// A named type and its byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TypeEntry {
    /// Type name.
    pub name: String,
    /// CRC32C of the name.
    pub hash: u32,
    /// Declared size in bytes.
    pub length: u16,
    /// Index into the struct table if this type is an aggregate.
    pub struct_index: Option<u32>,
    /// Primitive kind, if the name is a known scalar type.
    pub primitive: Option<PrimitiveKind>,
}

impl TypeEntry {
    pub fn new(name: &str, length: u16) -> Self {
        Self {
            name: name.to_string(),
            hash: crc::hash_str(name),
            length,
            struct_index: None,
            primitive: PrimitiveKind::from_type_name(name),
        }
    }

    #[inline]
    pub fn is_struct(&self) -> bool {
        self.struct_index.is_some()
    }
}
