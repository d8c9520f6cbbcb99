//! Result of a completed load.

use std::collections::BTreeMap;
use std::sync::Arc;

use sdna_schema::{CompiledSchema, LinkGraph, NumericValue, PrimitiveKind};

use crate::patcher::PatchStats;
use crate::record::{Record, RecordId};
use crate::{FileHeader, RecordCode};

/// Records of one snapshot in the memory layout of the running build.
#[derive(Debug)]
pub struct LoadedGraph {
    pub(crate) header: FileHeader,
    pub(crate) memory: Arc<CompiledSchema>,
    pub(crate) file: CompiledSchema,
    pub(crate) links: LinkGraph,
    pub(crate) records: Vec<Record>,
    pub(crate) schema_blob: Vec<u8>,
    pub(crate) stats: PatchStats,
    pub(crate) duplicates: usize,
}

impl LoadedGraph {
    #[inline]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    #[inline]
    pub fn memory_schema(&self) -> &CompiledSchema {
        &self.memory
    }

    #[inline]
    pub fn file_schema(&self) -> &CompiledSchema {
        &self.file
    }

    #[inline]
    pub fn links(&self) -> &LinkGraph {
        &self.links
    }

    /// The schema blob as stored in the file.
    #[inline]
    pub fn schema_blob(&self) -> &[u8] {
        &self.schema_blob
    }

    #[inline]
    pub fn stats(&self) -> &PatchStats {
        &self.stats
    }

    /// Records discarded because their address was already registered.
    #[inline]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[inline]
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.index())
    }

    /// Iterate records with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (RecordId(i as u32), r))
    }

    /// Record behind a handle read from a patched pointer slot.
    pub fn resolve(&self, handle: u64) -> Option<&Record> {
        self.record(RecordId::from_handle(handle)?)
    }

    /// Records carrying a given code.
    pub fn records_with_code(
        &self,
        code: RecordCode,
    ) -> impl Iterator<Item = (RecordId, &Record)> + '_ {
        self.iter().filter(move |(_, r)| r.header.code == code)
    }

    /// Patched records laid out as the named memory struct.
    pub fn records_of_type<'a>(
        &'a self,
        type_name: &str,
    ) -> impl Iterator<Item = (RecordId, &'a Record)> + 'a {
        let wanted = self.memory.schema().struct_by_name(type_name);
        self.iter()
            .filter(move |(_, r)| wanted.is_some() && r.memory_struct() == wanted)
    }

    /// Number of records per code.
    pub fn counts_by_code(&self) -> BTreeMap<RecordCode, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.header.code).or_insert(0) += 1;
        }
        counts
    }

    /// Read a numeric member of a patched record by dotted path.
    ///
    /// `element` selects the struct element for records holding several.
    pub fn read_member(&self, id: RecordId, element: usize, path: &str) -> Option<NumericValue> {
        let (bytes, kind) = self.member_bytes(id, element, path)?;
        kind.read(bytes, self.memory.schema().endian())
    }

    /// Read a pointer member of a patched record as a handle.
    pub fn read_pointer(&self, id: RecordId, element: usize, path: &str) -> Option<u64> {
        let record = self.record(id)?;
        let def = self.memory.struct_def(record.memory_struct()?)?;
        let (member, index) = self.memory.member_by_path(def.struct_index as usize, path)?;
        if !member.is_pointer() {
            return None;
        }
        let width = self.memory.schema().pointer_width() as usize;
        let start = element * def.stride() + member.offset + index as usize * width;
        let bytes = record.data()?.get(start..start + width)?;
        self.memory.schema().endian().read_uint(bytes, width)
    }

    fn member_bytes(
        &self,
        id: RecordId,
        element: usize,
        path: &str,
    ) -> Option<(&[u8], PrimitiveKind)> {
        let record = self.record(id)?;
        let def = self.memory.struct_def(record.memory_struct()?)?;
        let (member, index) = self.memory.member_by_path(def.struct_index as usize, path)?;
        let kind = member.primitive?;
        let start = element * def.stride() + member.offset + index as usize * member.element_size;
        let bytes = record.data()?.get(start..start + member.element_size)?;
        Some((bytes, kind))
    }
}
