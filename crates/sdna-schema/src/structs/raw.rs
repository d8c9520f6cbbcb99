//! Struct definitions as stored in the `STRC` table.

/// One `(type, name)` member pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RawMember {
    /// Index into the type table.
    pub type_index: u16,
    /// Index into the name table.
    pub name_index: u16,
}

/// A struct as declared: its type and members in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StructRaw {
    /// Index into the type table.
    pub type_index: u16,
    pub members: Vec<RawMember>,
}
