//! Object patcher.
//!
//! Rewrites every record from the file layout into the memory layout:
//! linked members are copied, cast or byte-swapped into place, pointers are
//! remapped to record handles, and members without a link stay zeroed.

use sdna_common::{swap_in_place, Endian, SpanArray};
use sdna_schema::{CompiledSchema, LinkFlags, LinkGraph, MemberDef};

use crate::hooks::{LoadHooks, ReportLevel};
use crate::record::{Record, RecordId};
use crate::{AddressMap, RecordCode, Result};

/// Counters from one patching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PatchStats {
    /// Records rewritten member by member.
    pub patched: usize,
    /// Struct records copied verbatim on request of the hooks.
    pub verbatim: usize,
    /// Opaque blocks kept as they were read.
    pub opaque: usize,
    /// Opaque blocks rewritten as pointer arrays.
    pub corrected: usize,
    /// Records nothing in the memory schema can hold.
    pub dropped: usize,
    /// Non-null pointers with no record at their address.
    pub unresolved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Patch { file_struct: usize, memory_struct: usize },
    Verbatim { memory_struct: usize },
    Opaque,
    Drop,
}

struct PassState {
    dispositions: Vec<Disposition>,
    corrected: Vec<Option<Vec<u8>>>,
    stats: PatchStats,
}

/// Rewrites records using a linked pair of schemas.
pub struct Patcher<'a> {
    memory: &'a CompiledSchema,
    file: &'a CompiledSchema,
    links: &'a LinkGraph,
    addresses: &'a AddressMap,
    file_endian: Endian,
    file_pointer_width: usize,
    memory_endian: Endian,
    memory_pointer_width: usize,
}

impl<'a> Patcher<'a> {
    pub fn new(
        memory: &'a CompiledSchema,
        file: &'a CompiledSchema,
        links: &'a LinkGraph,
        addresses: &'a AddressMap,
    ) -> Self {
        Self {
            memory,
            file,
            links,
            addresses,
            file_endian: file.schema().endian(),
            file_pointer_width: file.schema().pointer_width() as usize,
            memory_endian: memory.schema().endian(),
            memory_pointer_width: memory.schema().pointer_width() as usize,
        }
    }

    #[inline]
    fn swaps(&self) -> bool {
        self.file_endian.differs_from(self.memory_endian)
    }

    /// Patch every record in place.
    ///
    /// Struct records are handled first, so that opaque pointer arrays they
    /// reference are converted before opaque blocks are finalised.
    pub fn run<H: LoadHooks + ?Sized>(
        &self,
        records: &mut [Record],
        hooks: &H,
    ) -> Result<PatchStats> {
        let mut state = PassState {
            dispositions: records
                .iter()
                .map(|record| self.disposition(record, hooks))
                .collect(),
            corrected: vec![None; records.len()],
            stats: PatchStats::default(),
        };

        for index in 0..records.len() {
            match state.dispositions[index] {
                Disposition::Patch {
                    file_struct,
                    memory_struct,
                } => {
                    let patched = self.patch_record(
                        records,
                        index,
                        file_struct,
                        memory_struct,
                        &mut state,
                        hooks,
                    )?;
                    records[index].install(patched, Some(memory_struct));
                    state.stats.patched += 1;
                }
                Disposition::Verbatim { memory_struct } => {
                    records[index].promote(Some(memory_struct));
                    state.stats.verbatim += 1;
                }
                Disposition::Opaque | Disposition::Drop => {}
            }
        }

        for (index, record) in records.iter_mut().enumerate() {
            match state.dispositions[index] {
                Disposition::Opaque => match state.corrected[index].take() {
                    Some(array) => {
                        record.install_corrected(array);
                        state.stats.corrected += 1;
                    }
                    None => {
                        record.promote(None);
                        state.stats.opaque += 1;
                    }
                },
                Disposition::Drop => {
                    record.release();
                    state.stats.dropped += 1;
                }
                _ => {}
            }
        }

        if state.stats.unresolved > 0 {
            hooks.report(
                ReportLevel::Warn,
                &format!("{} pointers did not resolve to a record", state.stats.unresolved),
            );
        }
        Ok(state.stats)
    }

    fn disposition<H: LoadHooks + ?Sized>(&self, record: &Record, hooks: &H) -> Disposition {
        let header = &record.header;
        if header.code == RecordCode::DATA {
            return Disposition::Opaque;
        }

        let file_struct = header.type_index as usize;
        let Some(file_def) = self.file.struct_def(file_struct) else {
            hooks.report(
                ReportLevel::Warn,
                &format!(
                    "record {} at {:#x} has unknown struct index {}",
                    header.code, header.address, file_struct
                ),
            );
            return Disposition::Drop;
        };

        let Some(link) = self.links.file_struct(file_struct) else {
            return Disposition::Drop;
        };
        let Some(memory_struct) = link.target.map(|t| t as usize) else {
            hooks.report(
                ReportLevel::Debug,
                &format!(
                    "dropping {} record: struct {} is not in the memory schema",
                    header.code,
                    self.file.struct_name(file_def)
                ),
            );
            return Disposition::Drop;
        };
        if link.flags.contains(LinkFlags::SKIP) {
            return Disposition::Drop;
        }

        if hooks.is_verbatim_type(file_def.type_hash) {
            Disposition::Verbatim { memory_struct }
        } else {
            Disposition::Patch {
                file_struct,
                memory_struct,
            }
        }
    }

    fn patch_record<H: LoadHooks + ?Sized>(
        &self,
        records: &[Record],
        index: usize,
        file_struct: usize,
        memory_struct: usize,
        state: &mut PassState,
        hooks: &H,
    ) -> Result<Vec<u8>> {
        let record = &records[index];
        let raw = record.raw().unwrap_or(&[]);
        let (Some(file_def), Some(memory_def), Some(link)) = (
            self.file.struct_def(file_struct),
            self.memory.struct_def(memory_struct),
            self.links.memory_struct(memory_struct),
        ) else {
            return Ok(Vec::new());
        };

        let file_len = file_def.length;
        let memory_len = memory_def.stride();
        let mut count = record.header.count as usize;
        // A zero-length file struct carries nothing, one zeroed element is enough.
        let present = match file_len {
            0 => count.min(1),
            _ => raw.len() / file_len,
        };
        if present < count {
            hooks.report(
                ReportLevel::Warn,
                &format!(
                    "{} record at {:#x} claims {} elements but holds {} bytes, keeping {}",
                    record.header.code,
                    record.header.address,
                    count,
                    raw.len(),
                    present
                ),
            );
            count = present;
        }

        let mut out = SpanArray::filled(count * memory_len, 0u8)?.into_vec();

        for element in 0..count {
            let src_base = element * file_len;
            let dst_base = element * memory_len;

            for (memory_member, member_link) in memory_def.members.iter().zip(&link.members) {
                let Some(target) = member_link.target else {
                    continue;
                };
                let file_member = &file_def.members[target as usize];

                let src_start = src_base + file_member.offset;
                let dst_start = dst_base + memory_member.offset;
                let (Some(src), Some(dst)) = (
                    raw.get(src_start..src_start + file_member.size),
                    out.get_mut(dst_start..dst_start + memory_member.size),
                ) else {
                    continue;
                };

                if memory_member.is_pointer() {
                    self.patch_pointer(records, memory_member, file_member, src, dst, state);
                } else {
                    self.patch_scalar(memory_member, file_member, src, dst);
                }
            }
        }

        Ok(out)
    }

    fn patch_pointer(
        &self,
        records: &[Record],
        memory: &MemberDef,
        file: &MemberDef,
        src: &[u8],
        dst: &mut [u8],
        state: &mut PassState,
    ) {
        // Function addresses mean nothing in another process.
        if memory.is_function {
            return;
        }

        let slots = memory.array_len.min(file.array_len) as usize;
        for slot in 0..slots {
            let Some(address) = src
                .get(slot * self.file_pointer_width..)
                .and_then(|s| self.file_endian.read_uint(s, self.file_pointer_width))
            else {
                break;
            };

            let handle = if memory.pointer_depth == 1 {
                self.resolve(address, state)
            } else {
                self.resolve_array(records, address, state)
            };

            if let Some(slot_bytes) = dst.get_mut(slot * self.memory_pointer_width..) {
                self.memory_endian
                    .write_uint(slot_bytes, self.memory_pointer_width, handle);
            }
        }
    }

    fn patch_scalar(&self, memory: &MemberDef, file: &MemberDef, src: &[u8], dst: &mut [u8]) {
        match (memory.primitive, file.primitive) {
            (Some(to), Some(from)) if to == from => {
                let n = src.len().min(dst.len());
                dst[..n].copy_from_slice(&src[..n]);
                if self.swaps() {
                    for element in dst[..n].chunks_exact_mut(to.size().max(1)) {
                        swap_in_place(element);
                    }
                }
            }
            (Some(to), Some(from)) => {
                let elements = memory.array_len.min(file.array_len) as usize;
                for k in 0..elements {
                    let value = src
                        .get(k * file.element_size..)
                        .and_then(|s| from.read(s, self.file_endian));
                    let (Some(value), Some(out)) = (value, dst.get_mut(k * memory.element_size..))
                    else {
                        break;
                    };
                    to.write(value, out, self.memory_endian);
                }
            }
            _ => {
                let n = src.len().min(dst.len());
                dst[..n].copy_from_slice(&src[..n]);
            }
        }
    }

    /// Handle of the record at `address`, or 0.
    fn resolve(&self, address: u64, state: &mut PassState) -> u64 {
        match self.addresses.lookup(address) {
            Some(id) if state.dispositions[id.index()] != Disposition::Drop => id.handle(),
            Some(_) => 0,
            None => {
                if self.addresses.normalize(address) != 0 {
                    state.stats.unresolved += 1;
                    tracing::debug!("unresolved pointer {:#x}", address);
                }
                0
            }
        }
    }

    /// Handle of a pointer array, converting an opaque block on first use.
    fn resolve_array(&self, records: &[Record], address: u64, state: &mut PassState) -> u64 {
        let Some(id) = self.addresses.lookup(address) else {
            return self.resolve(address, state);
        };

        match state.dispositions[id.index()] {
            Disposition::Drop => 0,
            Disposition::Opaque => {
                if state.corrected[id.index()].is_none() {
                    let array = self.convert_pointer_array(records, id, state);
                    state.corrected[id.index()] = Some(array);
                }
                id.handle()
            }
            _ => id.handle(),
        }
    }

    fn convert_pointer_array(
        &self,
        records: &[Record],
        id: RecordId,
        state: &mut PassState,
    ) -> Vec<u8> {
        let raw = records[id.index()].raw().unwrap_or(&[]);
        let slots = raw.len() / self.file_pointer_width;
        let mut array = vec![0u8; slots * self.memory_pointer_width];

        for (slot, bytes) in raw.chunks_exact(self.file_pointer_width).enumerate() {
            let address = self
                .file_endian
                .read_uint(bytes, self.file_pointer_width)
                .unwrap_or(0);
            let handle = self.resolve(address, state);
            self.memory_endian.write_uint(
                &mut array[slot * self.memory_pointer_width..],
                self.memory_pointer_width,
                handle,
            );
        }
        array
    }
}
