//! Schema builder for producing schema blobs.
//!
//! Every build that writes graph files embeds a description of its own
//! structs. The builder assembles that description one struct at a time,
//! computing struct lengths as members are added.
//!
//! ```
//! use sdna_schema::SchemaBuilder;
//!
//! let mut builder = SchemaBuilder::new();
//! let point = builder.add_struct("Point");
//! builder.add_member(point, "float", "x")?;
//! builder.add_member(point, "float", "y")?;
//!
//! let node = builder.add_struct("Node");
//! builder.add_member(node, "Node", "*next")?;
//! builder.add_member(node, "Point", "corners[4]")?;
//!
//! let schema = builder.build()?;
//! assert_eq!(schema.struct_by_name("Node"), Some(1));
//! # Ok::<(), sdna_schema::Error>(())
//! ```

use std::hash::BuildHasherDefault;
use std::io::Write;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use sdna_common::Endian;

use crate::structs::{NameEntry, RawMember, StructRaw, TypeEntry};
use crate::{Error, Result, Schema, PRIMITIVE_TYPES};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Handle to a struct in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructHandle(pub u32);

/// Builder for schema tables.
#[derive(Debug)]
pub struct SchemaBuilder {
    names: Vec<NameEntry>,
    name_lookup: FxHashMap<String, u16>,
    types: Vec<TypeEntry>,
    type_lookup: FxHashMap<String, u16>,
    structs: Vec<StructRaw>,
    endian: Endian,
    pointer_width: u8,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Create a builder for the running build, with all primitive types declared.
    pub fn new() -> Self {
        let mut builder = Self {
            names: Vec::new(),
            name_lookup: FxHashMap::default(),
            types: Vec::new(),
            type_lookup: FxHashMap::default(),
            structs: Vec::new(),
            endian: Endian::NATIVE,
            pointer_width: std::mem::size_of::<usize>() as u8,
        };
        for (name, kind) in PRIMITIVE_TYPES {
            builder.declare_type(name, kind.size() as u16);
        }
        builder
    }

    /// Describe a build with a different pointer size.
    pub fn with_pointer_width(mut self, pointer_width: u8) -> Self {
        self.pointer_width = pointer_width;
        self
    }

    /// Describe a build with a different byte order.
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn pointer_width(&self) -> u8 {
        self.pointer_width
    }

    /// Declare an opaque type known only by its length.
    ///
    /// Declaring an existing name updates its length.
    pub fn add_type(&mut self, name: &str, length: u16) -> u16 {
        let index = self.declare_type(name, length);
        self.types[index as usize].length = length;
        index
    }

    /// Declare a struct. Its length grows as members are added.
    ///
    /// Adding a struct that already exists returns the existing handle.
    pub fn add_struct(&mut self, name: &str) -> StructHandle {
        let type_index = self.declare_type(name, 0);
        if let Some(existing) = self.types[type_index as usize].struct_index {
            return StructHandle(existing);
        }

        let struct_index = self.structs.len() as u32;
        self.types[type_index as usize].struct_index = Some(struct_index);
        self.structs.push(StructRaw {
            type_index,
            members: Vec::new(),
        });
        StructHandle(struct_index)
    }

    /// Append a member to a struct.
    ///
    /// `decl` is the member declaration, for example `"x"`, `"*next"`,
    /// `"mat[4][4]"` or `"(*update)()"`. Pointer members may name types that
    /// have not been declared; they are declared with length zero.
    pub fn add_member(&mut self, handle: StructHandle, type_name: &str, decl: &str) -> Result<()> {
        let struct_index = handle.0 as usize;
        let owner_type = self
            .structs
            .get(struct_index)
            .map(|s| s.type_index)
            .ok_or(Error::IndexOutOfRange {
                table: "struct",
                index: struct_index,
                len: self.structs.len(),
            })?;

        let name_index = self.intern_name(decl)?;
        let name = &self.names[name_index as usize];
        let is_pointer = name.is_pointer();
        let array_len = name.array_len as usize;

        let type_index = match self.type_lookup.get(type_name).copied() {
            Some(index) => index,
            None if is_pointer => self.declare_type(type_name, 0),
            None => return Err(Error::UnknownType(type_name.to_string())),
        };

        let element = if is_pointer {
            self.pointer_width as usize
        } else {
            self.types[type_index as usize].length as usize
        };
        let owner = &mut self.types[owner_type as usize];
        let length = owner.length as usize + element * array_len;
        owner.length = u16::try_from(length).map_err(|_| Error::TableTooLarge {
            table: "TLEN",
            count: length,
            max: u16::MAX as usize,
        })?;

        self.structs[struct_index].members.push(RawMember {
            type_index,
            name_index,
        });
        Ok(())
    }

    /// Finish the tables.
    pub fn build(&self) -> Result<Schema> {
        Schema::from_parts(
            self.names.clone(),
            self.types.clone(),
            self.structs.clone(),
            self.endian,
            self.pointer_width,
        )
    }

    /// Encode the tables as a schema blob in the builder's byte order.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        Ok(self.build()?.to_blob(self.endian))
    }

    /// Write the schema blob to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let blob = self.to_blob()?;
        writer
            .write_all(&blob)
            .map_err(sdna_common::Error::from)?;
        Ok(())
    }

    fn declare_type(&mut self, name: &str, length: u16) -> u16 {
        if let Some(&index) = self.type_lookup.get(name) {
            return index;
        }
        let index = self.types.len() as u16;
        self.types.push(TypeEntry::new(name, length));
        self.type_lookup.insert(name.to_string(), index);
        index
    }

    fn intern_name(&mut self, decl: &str) -> Result<u16> {
        if let Some(&index) = self.name_lookup.get(decl) {
            return Ok(index);
        }
        let index = u16::try_from(self.names.len()).map_err(|_| Error::TableTooLarge {
            table: "NAME",
            count: self.names.len() + 1,
            max: u16::MAX as usize,
        })?;
        self.names.push(NameEntry::parse(decl));
        self.name_lookup.insert(decl.to_string(), index);
        Ok(index)
    }
}
