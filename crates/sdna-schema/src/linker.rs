//! Struct linker.
//!
//! Matches a file schema against the memory schema. The memory schema drives:
//! each memory struct is paired with the file struct of the same type name,
//! and each of its members with the first compatible file member at the same
//! embedding path. Links are stored on both sides so the patcher can walk
//! either schema.

use bitflags::bitflags;

use crate::{CompiledSchema, MemberDef};

bitflags! {
    /// State of a struct or member link.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LinkFlags: u8 {
        /// A counterpart exists in the other schema.
        const CAN_LINK = 1 << 0;
        /// No counterpart; the member stays zeroed.
        const MISSING = 1 << 1;
        /// The struct's members do not span its declared length.
        const MISALIGNED = 1 << 2;
        /// Excluded from patching by the caller.
        const SKIP = 1 << 3;
        /// Values must be converted between primitive kinds.
        const NEEDS_CAST = 1 << 4;
    }
}

/// Link of one member to its counterpart's member index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLink {
    pub target: Option<u32>,
    pub flags: LinkFlags,
}

impl MemberLink {
    const MISSING: Self = Self {
        target: None,
        flags: LinkFlags::MISSING,
    };
}

/// Link of one struct to its counterpart's struct index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLink {
    pub target: Option<u32>,
    pub flags: LinkFlags,
    pub members: Vec<MemberLink>,
}

impl StructLink {
    fn unlinked(member_count: usize, misaligned: bool) -> Self {
        let mut flags = LinkFlags::MISSING;
        flags.set(LinkFlags::MISALIGNED, misaligned);
        Self {
            target: None,
            flags,
            members: vec![MemberLink::MISSING; member_count],
        }
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.target.is_some()
    }
}

/// Symmetric links between a memory schema and a file schema.
#[derive(Debug, Clone)]
pub struct LinkGraph {
    memory: Vec<StructLink>,
    file: Vec<StructLink>,
}

impl LinkGraph {
    /// Link every memory struct and member against the file schema.
    pub fn link(memory: &CompiledSchema, file: &CompiledSchema) -> Self {
        let mut memory_links: Vec<_> = memory
            .structs()
            .iter()
            .map(|def| StructLink::unlinked(def.members.len(), def.misaligned))
            .collect();
        let mut file_links: Vec<_> = file
            .structs()
            .iter()
            .map(|def| StructLink::unlinked(def.members.len(), def.misaligned))
            .collect();

        for (memory_index, memory_def) in memory.structs().iter().enumerate() {
            let Some(file_def) = file.struct_by_type_hash(memory_def.type_hash) else {
                tracing::debug!(
                    "struct {} not present in file schema",
                    memory.struct_name(memory_def)
                );
                continue;
            };
            let file_index = file_def.struct_index as usize;

            let memory_link = &mut memory_links[memory_index];
            let file_link = &mut file_links[file_index];
            memory_link.target = Some(file_index as u32);
            memory_link.flags.remove(LinkFlags::MISSING);
            memory_link.flags.insert(LinkFlags::CAN_LINK);
            file_link.target = Some(memory_index as u32);
            file_link.flags.remove(LinkFlags::MISSING);
            file_link.flags.insert(LinkFlags::CAN_LINK);

            for (i, memory_member) in memory_def.members.iter().enumerate() {
                let candidate = file_def.members.iter().enumerate().find_map(|(j, file_member)| {
                    if file_link.members[j].target.is_some() {
                        return None;
                    }
                    match_member(memory_member, file_member).map(|flags| (j, flags))
                });

                if let Some((j, flags)) = candidate {
                    memory_link.members[i] = MemberLink {
                        target: Some(j as u32),
                        flags,
                    };
                    file_link.members[j] = MemberLink {
                        target: Some(i as u32),
                        flags,
                    };
                } else {
                    tracing::debug!(
                        "member {}.{} not present in file schema",
                        memory.struct_name(memory_def),
                        memory.member_path(memory_member)
                    );
                }
            }
        }

        Self {
            memory: memory_links,
            file: file_links,
        }
    }

    #[inline]
    pub fn memory_structs(&self) -> &[StructLink] {
        &self.memory
    }

    #[inline]
    pub fn file_structs(&self) -> &[StructLink] {
        &self.file
    }

    #[inline]
    pub fn memory_struct(&self, index: usize) -> Option<&StructLink> {
        self.memory.get(index)
    }

    #[inline]
    pub fn file_struct(&self, index: usize) -> Option<&StructLink> {
        self.file.get(index)
    }

    /// Exclude a memory struct (and its file counterpart) from patching.
    pub fn mark_skipped(&mut self, memory_index: usize) {
        let Some(link) = self.memory.get_mut(memory_index) else {
            return;
        };
        link.flags.insert(LinkFlags::SKIP);
        if let Some(file_link) = link.target.and_then(|t| self.file.get_mut(t as usize)) {
            file_link.flags.insert(LinkFlags::SKIP);
        }
    }

    /// Summarise the links for display.
    pub fn report(&self, memory: &CompiledSchema, file: &CompiledSchema) -> LinkReport {
        let mut report = LinkReport::default();

        for (def, link) in memory.structs().iter().zip(&self.memory) {
            let name = memory.struct_name(def);
            if link.flags.contains(LinkFlags::MISALIGNED) {
                report.misaligned.push(name.to_string());
            }
            if link.flags.contains(LinkFlags::SKIP) {
                report.skipped.push(name.to_string());
            }
            if !link.is_linked() {
                report.missing_structs.push(name.to_string());
                continue;
            }
            report.linked_structs += 1;

            for (member, member_link) in def.members.iter().zip(&link.members) {
                if member_link.flags.contains(LinkFlags::MISSING) {
                    report
                        .missing_members
                        .push(format!("{}.{}", name, memory.member_path(member)));
                } else {
                    report.linked_members += 1;
                    if member_link.flags.contains(LinkFlags::NEEDS_CAST) {
                        report
                            .cast_members
                            .push(format!("{}.{}", name, memory.member_path(member)));
                    }
                }
            }
        }

        for (def, link) in file.structs().iter().zip(&self.file) {
            if !link.is_linked() {
                report.file_only_structs.push(file.struct_name(def).to_string());
            }
        }

        report
    }
}

/// Decide whether a file member can fill a memory member.
///
/// Candidates must sit at the same embedding path under the same base name.
/// An identical type always links; pointers link only on identical type and
/// indirection; integers of any width link freely; other numeric pairs link
/// with a cast.
fn match_member(memory: &MemberDef, file: &MemberDef) -> Option<LinkFlags> {
    if memory.name_hash != file.name_hash
        || memory.array_index != file.array_index
        || memory.depth != file.depth
        || memory.key_chain != file.key_chain
    {
        return None;
    }

    if memory.is_pointer() || file.is_pointer() {
        let same = memory.type_hash == file.type_hash
            && memory.pointer_depth == file.pointer_depth
            && memory.is_function == file.is_function;
        return same.then_some(LinkFlags::CAN_LINK);
    }

    if memory.type_hash == file.type_hash {
        return Some(LinkFlags::CAN_LINK);
    }

    match (memory.primitive, file.primitive) {
        (Some(m), Some(f)) if m.is_integer() && f.is_integer() => Some(LinkFlags::CAN_LINK),
        (Some(m), Some(f)) if m.is_numeric() && f.is_numeric() => {
            Some(LinkFlags::CAN_LINK | LinkFlags::NEEDS_CAST)
        }
        _ => None,
    }
}

/// Human-readable summary of a [`LinkGraph`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LinkReport {
    pub linked_structs: usize,
    pub linked_members: usize,
    /// Memory structs with no file counterpart.
    pub missing_structs: Vec<String>,
    /// File structs the memory schema no longer has.
    pub file_only_structs: Vec<String>,
    pub missing_members: Vec<String>,
    pub cast_members: Vec<String>,
    pub misaligned: Vec<String>,
    pub skipped: Vec<String>,
}

impl std::fmt::Display for LinkReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} structs linked, {} members linked",
            self.linked_structs, self.linked_members
        )?;
        let sections = [
            ("missing structs", &self.missing_structs),
            ("file-only structs", &self.file_only_structs),
            ("missing members", &self.missing_members),
            ("cast members", &self.cast_members),
            ("misaligned structs", &self.misaligned),
            ("skipped structs", &self.skipped),
        ];
        for (title, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            writeln!(f, "{} ({}):", title, entries.len())?;
            for entry in entries {
                writeln!(f, "  {}", entry)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchemaBuilder;

    fn compile(builder: SchemaBuilder) -> CompiledSchema {
        CompiledSchema::compile(builder.build().unwrap()).unwrap()
    }

    fn single(type_name: &str) -> CompiledSchema {
        let mut builder = SchemaBuilder::new();
        let s = builder.add_struct("Sample");
        builder.add_member(s, type_name, "value").unwrap();
        compile(builder)
    }

    fn point_xy() -> CompiledSchema {
        let mut builder = SchemaBuilder::new();
        let p = builder.add_struct("Point");
        builder.add_member(p, "int", "x").unwrap();
        builder.add_member(p, "int", "y").unwrap();
        compile(builder)
    }

    fn point_yxz() -> CompiledSchema {
        let mut builder = SchemaBuilder::new();
        let p = builder.add_struct("Point");
        builder.add_member(p, "int", "y").unwrap();
        builder.add_member(p, "int", "x").unwrap();
        builder.add_member(p, "int", "z").unwrap();
        compile(builder)
    }

    #[test]
    fn test_identity_linking() {
        let mut builder = SchemaBuilder::new();
        let node = builder.add_struct("Node");
        builder.add_member(node, "Node", "*next").unwrap();
        builder.add_member(node, "double", "weights[3]").unwrap();
        builder.add_member(node, "void", "(*callback)()").unwrap();
        let schema = compile(builder);

        let graph = LinkGraph::link(&schema, &schema);
        for (i, link) in graph.memory_structs().iter().enumerate() {
            assert_eq!(link.target, Some(i as u32));
            for (j, member) in link.members.iter().enumerate() {
                assert_eq!(member.target, Some(j as u32));
                assert_eq!(member.flags, LinkFlags::CAN_LINK);
            }
        }
    }

    #[test]
    fn test_integer_width_change_needs_no_cast() {
        let memory = single("int");
        let file = single("short");
        let graph = LinkGraph::link(&memory, &file);

        let member = graph.memory_struct(0).unwrap().members[0];
        assert_eq!(member.target, Some(0));
        assert!(!member.flags.contains(LinkFlags::NEEDS_CAST));
    }

    #[test]
    fn test_float_widening_needs_cast_both_ways() {
        let memory = single("double");
        let file = single("float");
        let graph = LinkGraph::link(&memory, &file);

        let memory_member = graph.memory_struct(0).unwrap().members[0];
        let file_member = graph.file_struct(0).unwrap().members[0];
        assert!(memory_member.flags.contains(LinkFlags::NEEDS_CAST));
        assert!(file_member.flags.contains(LinkFlags::NEEDS_CAST));
    }

    #[test]
    fn test_pointer_requires_exact_type() {
        let mut memory = SchemaBuilder::new();
        let s = memory.add_struct("Holder");
        memory.add_member(s, "Mesh", "*data").unwrap();

        let mut file = SchemaBuilder::new();
        let s = file.add_struct("Holder");
        file.add_member(s, "Curve", "*data").unwrap();

        let graph = LinkGraph::link(&compile(memory), &compile(file));
        let member = graph.memory_struct(0).unwrap().members[0];
        assert_eq!(member, MemberLink::MISSING);
    }

    #[test]
    fn test_reordered_members_link_by_name() {
        let memory = point_xy();
        let file = point_yxz();
        let graph = LinkGraph::link(&memory, &file);

        let link = graph.memory_struct(0).unwrap();
        assert_eq!(link.members[0].target, Some(1));
        assert_eq!(link.members[1].target, Some(0));
        assert!(link.members.iter().all(|m| !m.flags.contains(LinkFlags::MISSING)));

        // Symmetric, and the dropped member is missing on the file side.
        let file_link = graph.file_struct(0).unwrap();
        assert_eq!(file_link.members[0].target, Some(1));
        assert_eq!(file_link.members[1].target, Some(0));
        assert_eq!(file_link.members[2], MemberLink::MISSING);
    }

    #[test]
    fn test_missing_struct_marks_members_missing() {
        let memory = point_xy();
        let file = single("int");
        let graph = LinkGraph::link(&memory, &file);

        let link = graph.memory_struct(0).unwrap();
        assert!(link.flags.contains(LinkFlags::MISSING));
        assert!(link.members.iter().all(|m| m.flags == LinkFlags::MISSING));

        let report = graph.report(&memory, &file);
        assert_eq!(report.missing_structs, vec!["Point".to_string()]);
        assert_eq!(report.file_only_structs, vec!["Sample".to_string()]);
    }

    #[test]
    fn test_nested_path_must_match() {
        let mut memory = SchemaBuilder::new();
        let v = memory.add_struct("Vec2");
        memory.add_member(v, "float", "x").unwrap();
        memory.add_member(v, "float", "y").unwrap();
        let s = memory.add_struct("Segment");
        memory.add_member(s, "Vec2", "a").unwrap();
        memory.add_member(s, "Vec2", "b").unwrap();

        let mut file = SchemaBuilder::new();
        let v = file.add_struct("Vec2");
        file.add_member(v, "float", "x").unwrap();
        file.add_member(v, "float", "y").unwrap();
        let s = file.add_struct("Segment");
        file.add_member(s, "Vec2", "b").unwrap();
        file.add_member(s, "float", "x").unwrap();

        let memory = compile(memory);
        let file = compile(file);
        let graph = LinkGraph::link(&memory, &file);
        let segment = memory.schema().struct_by_name("Segment").unwrap();
        let link = graph.memory_struct(segment).unwrap();

        // a.x and a.y have no counterpart even though a top-level x exists.
        assert!(link.members[0].flags.contains(LinkFlags::MISSING));
        assert!(link.members[1].flags.contains(LinkFlags::MISSING));
        assert_eq!(link.members[2].target, Some(0));
        assert_eq!(link.members[3].target, Some(1));
    }

    #[test]
    fn test_mark_skipped_and_report() {
        let memory = point_xy();
        let file = point_yxz();
        let mut graph = LinkGraph::link(&memory, &file);
        graph.mark_skipped(0);

        assert!(graph.memory_struct(0).unwrap().flags.contains(LinkFlags::SKIP));
        assert!(graph.file_struct(0).unwrap().flags.contains(LinkFlags::SKIP));

        let report = graph.report(&memory, &file);
        assert_eq!(report.linked_structs, 1);
        assert_eq!(report.linked_members, 2);
        assert_eq!(report.skipped, vec!["Point".to_string()]);
        assert!(report.to_string().contains("skipped structs (1)"));
    }
}
