//! Schema table reader.
//!
//! A schema blob describes every struct layout of one build:
//!
//! ```text
//! "SDNA"
//! "NAME" u32 count, NUL-terminated member declarations   (padded to 4)
//! "TYPE" u32 count, NUL-terminated type names            (padded to 4)
//! "TLEN" u16 length per type                             (padded to 4)
//! "STRC" u32 count, per struct: u16 type, u16 n, n × (u16 type, u16 name)
//! ```
//!
//! Integers are stored in the byte order of the build that produced the blob.

use std::hash::BuildHasherDefault;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use sdna_common::{BinaryReader, Endian};

use crate::structs::{NameEntry, RawMember, StructRaw, TypeEntry};
use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

pub const SDNA_MAGIC: &[u8; 4] = b"SDNA";
pub const NAME_MAGIC: &[u8; 4] = b"NAME";
pub const TYPE_MAGIC: &[u8; 4] = b"TYPE";
pub const TLEN_MAGIC: &[u8; 4] = b"TLEN";
pub const STRC_MAGIC: &[u8; 4] = b"STRC";

/// Default upper bound on the entries of any one table.
pub const DEFAULT_MAX_TABLE_LEN: usize = 1 << 16;

/// How to interpret a schema blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Byte order of the blob's integers.
    pub endian: Endian,
    /// Pointer size in bytes (4 or 8) of the build described by the blob.
    pub pointer_width: u8,
    /// Tables with more entries than this are rejected.
    pub max_table_len: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            endian: Endian::NATIVE,
            pointer_width: std::mem::size_of::<usize>() as u8,
            max_table_len: DEFAULT_MAX_TABLE_LEN,
        }
    }
}

impl SchemaOptions {
    pub fn new(endian: Endian, pointer_width: u8) -> Self {
        Self {
            endian,
            pointer_width,
            ..Self::default()
        }
    }

    pub fn with_max_table_len(mut self, max_table_len: usize) -> Self {
        self.max_table_len = max_table_len;
        self
    }
}

/// Decoded name, type and struct tables of one build.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Schema {
    names: Vec<NameEntry>,
    types: Vec<TypeEntry>,
    structs: Vec<StructRaw>,
    /// Type name hash → type index, for struct types. First definition wins.
    #[cfg_attr(feature = "serde", serde(skip))]
    type_by_name: FxHashMap<u32, u32>,
    endian: Endian,
    pointer_width: u8,
}

impl Schema {
    /// Decode a schema blob.
    pub fn parse(blob: &[u8], options: &SchemaOptions) -> Result<Self> {
        let max = options.max_table_len;
        let mut reader = BinaryReader::with_endian(blob, options.endian);

        expect_section(&mut reader, SDNA_MAGIC, "SDNA")?;

        expect_section(&mut reader, NAME_MAGIC, "NAME")?;
        let name_count = read_count(&mut reader, "NAME", max)?;
        let mut names = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            names.push(NameEntry::parse(reader.read_cstring()?));
        }
        reader.align(4);

        expect_section(&mut reader, TYPE_MAGIC, "TYPE")?;
        let type_count = read_count(&mut reader, "TYPE", max)?;
        let mut type_names = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            type_names.push(reader.read_cstring()?);
        }
        reader.align(4);

        expect_section(&mut reader, TLEN_MAGIC, "TLEN")?;
        let mut types = Vec::with_capacity(type_count);
        for name in type_names {
            types.push(TypeEntry::new(name, reader.read_u16()?));
        }
        reader.align(4);

        expect_section(&mut reader, STRC_MAGIC, "STRC")?;
        let struct_count = read_count(&mut reader, "STRC", max)?;
        let mut structs = Vec::with_capacity(struct_count);
        for _ in 0..struct_count {
            let type_index = reader.read_u16()?;
            let member_count = reader.read_u16()? as usize;
            let mut members = Vec::with_capacity(member_count);
            for _ in 0..member_count {
                members.push(RawMember {
                    type_index: reader.read_u16()?,
                    name_index: reader.read_u16()?,
                });
            }
            structs.push(StructRaw {
                type_index,
                members,
            });
        }

        Self::from_parts(names, types, structs, options.endian, options.pointer_width)
    }

    /// Assemble a schema from already decoded tables.
    ///
    /// Validates every index, back-fills each struct type's struct index and
    /// builds the name → type lookup.
    pub fn from_parts(
        names: Vec<NameEntry>,
        mut types: Vec<TypeEntry>,
        structs: Vec<StructRaw>,
        endian: Endian,
        pointer_width: u8,
    ) -> Result<Self> {
        if pointer_width != 4 && pointer_width != 8 {
            return Err(Error::InvalidPointerWidth(pointer_width));
        }

        let mut type_by_name = FxHashMap::default();
        type_by_name.reserve(structs.len());

        for (struct_index, raw) in structs.iter().enumerate() {
            check_index("type", raw.type_index as usize, types.len())?;
            for member in &raw.members {
                check_index("type", member.type_index as usize, types.len())?;
                check_index("name", member.name_index as usize, names.len())?;
            }

            let ty = &mut types[raw.type_index as usize];
            if ty.struct_index.is_none() {
                ty.struct_index = Some(struct_index as u32);
            }
            type_by_name.entry(ty.hash).or_insert(raw.type_index as u32);
        }

        Ok(Self {
            names,
            types,
            structs,
            type_by_name,
            endian,
            pointer_width,
        })
    }

    #[inline]
    pub fn names(&self) -> &[NameEntry] {
        &self.names
    }

    #[inline]
    pub fn types(&self) -> &[TypeEntry] {
        &self.types
    }

    #[inline]
    pub fn structs(&self) -> &[StructRaw] {
        &self.structs
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn pointer_width(&self) -> u8 {
        self.pointer_width
    }

    /// Type index of the struct type with this name hash.
    #[inline]
    pub fn type_by_hash(&self, hash: u32) -> Option<usize> {
        self.type_by_name.get(&hash).map(|&i| i as usize)
    }

    /// Struct index of the struct type with this name hash.
    pub fn struct_by_type_hash(&self, hash: u32) -> Option<usize> {
        self.type_by_hash(hash)
            .and_then(|t| self.types[t].struct_index)
            .map(|s| s as usize)
    }

    /// Struct index of the struct type with this name.
    pub fn struct_by_name(&self, name: &str) -> Option<usize> {
        self.struct_by_type_hash(sdna_common::crc::hash_str(name))
    }

    /// Type entry of a struct.
    pub fn struct_type(&self, struct_index: usize) -> Option<&TypeEntry> {
        self.structs
            .get(struct_index)
            .map(|s| &self.types[s.type_index as usize])
    }

    /// Name of a struct's type.
    pub fn struct_name(&self, struct_index: usize) -> Option<&str> {
        self.struct_type(struct_index).map(|t| t.name.as_str())
    }

    /// Encode the tables as a blob in the given byte order.
    pub fn to_blob(&self, endian: Endian) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(SDNA_MAGIC);

        out.extend_from_slice(NAME_MAGIC);
        push_u32(&mut out, endian, self.names.len() as u32);
        for name in &self.names {
            out.extend_from_slice(name.text.as_bytes());
            out.push(0);
        }
        pad4(&mut out);

        out.extend_from_slice(TYPE_MAGIC);
        push_u32(&mut out, endian, self.types.len() as u32);
        for ty in &self.types {
            out.extend_from_slice(ty.name.as_bytes());
            out.push(0);
        }
        pad4(&mut out);

        out.extend_from_slice(TLEN_MAGIC);
        for ty in &self.types {
            push_u16(&mut out, endian, ty.length);
        }
        pad4(&mut out);

        out.extend_from_slice(STRC_MAGIC);
        push_u32(&mut out, endian, self.structs.len() as u32);
        for raw in &self.structs {
            push_u16(&mut out, endian, raw.type_index);
            push_u16(&mut out, endian, raw.members.len() as u16);
            for member in &raw.members {
                push_u16(&mut out, endian, member.type_index);
                push_u16(&mut out, endian, member.name_index);
            }
        }
        out
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("names", &self.names.len())
            .field("types", &self.types.len())
            .field("structs", &self.structs.len())
            .field("endian", &self.endian)
            .field("pointer_width", &self.pointer_width)
            .finish()
    }
}

fn expect_section(
    reader: &mut BinaryReader<'_>,
    magic: &[u8; 4],
    expected: &'static str,
) -> Result<()> {
    let actual = reader.read_bytes(4)?;
    if actual != magic {
        return Err(Error::SectionMissing {
            expected,
            actual: String::from_utf8_lossy(actual).into_owned(),
        });
    }
    Ok(())
}

fn read_count(reader: &mut BinaryReader<'_>, table: &'static str, max: usize) -> Result<usize> {
    let count = reader.read_u32()? as usize;
    if count > max {
        return Err(Error::TableTooLarge { table, count, max });
    }
    Ok(count)
}

fn check_index(table: &'static str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(Error::IndexOutOfRange { table, index, len });
    }
    Ok(())
}

fn push_u16(out: &mut Vec<u8>, endian: Endian, value: u16) {
    let mut bytes = [0u8; 2];
    endian.write_u16(&mut bytes, value);
    out.extend_from_slice(&bytes);
}

fn push_u32(out: &mut Vec<u8>, endian: Endian, value: u32) {
    let mut bytes = [0u8; 4];
    endian.write_u32(&mut bytes, value);
    out.extend_from_slice(&bytes);
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}
