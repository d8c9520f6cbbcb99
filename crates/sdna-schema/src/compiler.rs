//! Struct compiler.
//!
//! Turns each raw struct into a flat list of leaf members with resolved byte
//! offsets. Embedded struct members are expanded in place, once per array
//! element, so that two schemas can be compared member by member even when
//! they nest structs differently.

use sdna_common::crc;

use crate::{Error, PrimitiveKind, Result, Schema, SchemaOptions};

/// Maximum nesting of embedded structs.
pub const MAX_EMBED_DEPTH: usize = 32;

/// One step of the path from a struct down to an embedded member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KeyLink {
    /// Hash of the embedding member's type name.
    pub type_hash: u32,
    /// Hash of the embedding member's base name.
    pub name_hash: u32,
    /// Array element of the embedding member.
    pub element: u32,
}

/// A leaf member with its resolved placement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MemberDef {
    pub type_index: u16,
    pub name_index: u16,
    /// Hash of the type name.
    pub type_hash: u32,
    /// Hash of the base name.
    pub name_hash: u32,
    /// Byte offset from the start of the outermost struct.
    pub offset: usize,
    /// Total byte span (`element_size × array_len`).
    pub size: usize,
    pub element_size: usize,
    pub array_len: u32,
    pub pointer_depth: u8,
    pub is_function: bool,
    pub primitive: Option<PrimitiveKind>,
    /// Array element of the innermost embedding member, 0 at the top level.
    pub array_index: u32,
    /// Embedding depth, 0 for members declared directly on the struct.
    pub depth: u8,
    pub key_chain: Vec<KeyLink>,
}

impl StructDef {
    /// Distance between consecutive elements of this struct in a record.
    ///
    /// Misaligned structs whose members run past the declared length are
    /// spaced by the member span so elements never overlap.
    #[inline]
    pub fn stride(&self) -> usize {
        self.length.max(self.compiled_length)
    }
}

impl MemberDef {
    #[inline]
    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    /// Byte range of this member inside one struct element.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// A compiled struct.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StructDef {
    pub struct_index: u32,
    pub type_index: u16,
    pub type_hash: u32,
    /// Declared length from the `TLEN` table.
    pub length: usize,
    /// Sum of the expanded member spans.
    pub compiled_length: usize,
    /// Declared and compiled lengths differ.
    pub misaligned: bool,
    pub members: Vec<MemberDef>,
}

/// A schema with every struct compiled.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CompiledSchema {
    schema: Schema,
    structs: Vec<StructDef>,
}

impl CompiledSchema {
    /// Compile every struct of a schema.
    pub fn compile(schema: Schema) -> Result<Self> {
        let mut structs = Vec::with_capacity(schema.structs().len());
        let mut stack = Vec::new();

        for struct_index in 0..schema.structs().len() {
            let raw = &schema.structs()[struct_index];
            let ty = &schema.types()[raw.type_index as usize];

            let mut members = Vec::new();
            let mut chain = Vec::new();
            let compiled_length = expand(
                &schema,
                struct_index,
                0,
                0,
                &mut chain,
                &mut stack,
                &mut members,
            )?;

            let length = ty.length as usize;
            let misaligned = compiled_length != length;
            if misaligned {
                tracing::warn!(
                    "struct {} is misaligned: declared {} bytes, members span {}",
                    ty.name,
                    length,
                    compiled_length
                );
            }

            structs.push(StructDef {
                struct_index: struct_index as u32,
                type_index: raw.type_index,
                type_hash: ty.hash,
                length,
                compiled_length,
                misaligned,
                members,
            });
        }

        tracing::debug!(
            structs = structs.len(),
            pointer_width = schema.pointer_width(),
            "compiled schema"
        );
        Ok(Self { schema, structs })
    }

    /// Parse and compile a schema blob.
    pub fn from_blob(blob: &[u8], options: &SchemaOptions) -> Result<Self> {
        Self::compile(Schema::parse(blob, options)?)
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    #[inline]
    pub fn struct_def(&self, struct_index: usize) -> Option<&StructDef> {
        self.structs.get(struct_index)
    }

    /// Compiled struct of a type, if the type is a struct.
    pub fn struct_for_type(&self, type_index: usize) -> Option<&StructDef> {
        let ty = self.schema.types().get(type_index)?;
        self.structs.get(ty.struct_index? as usize)
    }

    pub fn struct_by_type_hash(&self, hash: u32) -> Option<&StructDef> {
        self.structs.get(self.schema.struct_by_type_hash(hash)?)
    }

    pub fn struct_by_name(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(self.schema.struct_by_name(name)?)
    }

    /// Name of a struct's type.
    pub fn struct_name(&self, def: &StructDef) -> &str {
        &self.schema.types()[def.type_index as usize].name
    }

    /// Base name of a member.
    pub fn member_name(&self, member: &MemberDef) -> &str {
        &self.schema.names()[member.name_index as usize].base
    }

    /// Declared type name of a member.
    pub fn member_type_name(&self, member: &MemberDef) -> &str {
        &self.schema.types()[member.type_index as usize].name
    }

    /// Dotted path of a member, e.g. `pts[1].x`.
    pub fn member_path(&self, member: &MemberDef) -> String {
        let mut path = String::new();
        for link in &member.key_chain {
            let embedding = self
                .schema
                .names()
                .iter()
                .find(|n| n.base_hash == link.name_hash);
            match embedding {
                Some(name) if name.array_len > 1 => {
                    path.push_str(&format!("{}[{}].", name.base, link.element))
                }
                Some(name) => path.push_str(&format!("{}.", name.base)),
                None => path.push_str(&format!("?[{}].", link.element)),
            }
        }
        path.push_str(self.member_name(member));
        path
    }

    /// Find a leaf member by dotted path such as `pts[1].x` or `co[2]`.
    ///
    /// Returns the member and the element index inside it.
    pub fn member_by_path(&self, struct_index: usize, path: &str) -> Option<(&MemberDef, u32)> {
        let def = self.structs.get(struct_index)?;
        let mut segments = Vec::new();
        for segment in path.split('.') {
            segments.push(parse_segment(segment)?);
        }
        let (last, outer) = segments.split_last()?;

        let member = def.members.iter().find(|m| {
            m.name_hash == last.0
                && m.key_chain.len() == outer.len()
                && m.key_chain.iter().zip(outer).all(|(link, (hash, element))| {
                    link.name_hash == *hash && link.element == *element
                })
        })?;
        (last.1 < member.array_len).then_some((member, last.1))
    }
}

/// Append the leaves of `struct_index` at `base_offset`, returning the span covered.
fn expand(
    schema: &Schema,
    struct_index: usize,
    base_offset: usize,
    depth: usize,
    chain: &mut Vec<KeyLink>,
    stack: &mut Vec<usize>,
    out: &mut Vec<MemberDef>,
) -> Result<usize> {
    let raw = &schema.structs()[struct_index];
    if depth > MAX_EMBED_DEPTH || stack.contains(&struct_index) {
        let name = &schema.types()[raw.type_index as usize].name;
        return Err(Error::RecursiveStruct(name.clone()));
    }
    stack.push(struct_index);

    let pointer_width = schema.pointer_width() as usize;
    let declared = schema.types()[raw.type_index as usize].length as usize;
    let mut offset = base_offset;

    'members: for member in &raw.members {
        let ty = &schema.types()[member.type_index as usize];
        let name = &schema.names()[member.name_index as usize];

        match ty.struct_index {
            Some(nested) if !name.is_pointer() => {
                for element in 0..name.array_len {
                    // Elements past the declared length cannot be stored.
                    if offset - base_offset > declared {
                        tracing::warn!(
                            "{} embeds {} elements of {}, stopping at {} bytes",
                            schema.types()[raw.type_index as usize].name,
                            name.array_len,
                            ty.name,
                            offset - base_offset
                        );
                        break 'members;
                    }
                    chain.push(KeyLink {
                        type_hash: ty.hash,
                        name_hash: name.base_hash,
                        element,
                    });
                    let span = expand(
                        schema,
                        nested as usize,
                        offset,
                        depth + 1,
                        chain,
                        stack,
                        out,
                    );
                    chain.pop();
                    let span = span?;
                    offset += span;
                    if span == 0 {
                        break;
                    }
                }
            }
            _ => {
                let element_size = if name.is_pointer() {
                    pointer_width
                } else {
                    ty.length as usize
                };
                let size = element_size * name.array_len as usize;
                out.push(MemberDef {
                    type_index: member.type_index,
                    name_index: member.name_index,
                    type_hash: ty.hash,
                    name_hash: name.base_hash,
                    offset,
                    size,
                    element_size,
                    array_len: name.array_len,
                    pointer_depth: name.pointer_depth,
                    is_function: name.is_function,
                    primitive: if name.is_pointer() { None } else { ty.primitive },
                    array_index: chain.last().map_or(0, |link| link.element),
                    depth: depth as u8,
                    key_chain: chain.clone(),
                });
                offset += size;
            }
        }
    }

    stack.pop();
    Ok(offset - base_offset)
}

fn parse_segment(segment: &str) -> Option<(u32, u32)> {
    let segment = segment.trim();
    match segment.find('[') {
        Some(open) => {
            let close = segment.rfind(']')?;
            let index = segment.get(open + 1..close)?.trim().parse().ok()?;
            Some((crc::hash_str(&segment[..open]), index))
        }
        None if !segment.is_empty() => Some((crc::hash_str(segment), 0)),
        None => None,
    }
}
