//! Loaded records and their buffers.

use crate::RecordHeader;

/// Index of a record in a loaded graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RecordId(pub u32);

impl RecordId {
    /// Value written into patched pointer slots: the index plus one, so that
    /// zero stays null.
    #[inline]
    pub fn handle(self) -> u64 {
        self.0 as u64 + 1
    }

    /// Inverse of [`handle`](Self::handle). Zero maps to `None`.
    #[inline]
    pub fn from_handle(handle: u64) -> Option<Self> {
        let index = handle.checked_sub(1)?;
        u32::try_from(index).ok().map(Self)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bytes of one record.
///
/// A record starts in the file layout, is replaced exactly once by its memory
/// layout, or is released when nothing in the running build can use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBuffer {
    /// File layout, as read.
    Raw(Vec<u8>),
    /// Memory layout, after patching.
    Patched(Vec<u8>),
    /// Dropped without patching.
    Released,
}

/// A record read from a snapshot.
#[derive(Debug, Clone)]
pub struct Record {
    pub header: RecordHeader,
    buffer: RecordBuffer,
    /// Memory struct the patched bytes are laid out as.
    memory_struct: Option<u32>,
    /// Pointer array already converted to the memory pointer width.
    corrected: bool,
}

impl Record {
    pub fn new(header: RecordHeader, raw: Vec<u8>) -> Self {
        Self {
            header,
            buffer: RecordBuffer::Raw(raw),
            memory_struct: None,
            corrected: false,
        }
    }

    #[inline]
    pub fn buffer(&self) -> &RecordBuffer {
        &self.buffer
    }

    /// File-layout bytes, until the record is patched.
    pub fn raw(&self) -> Option<&[u8]> {
        match &self.buffer {
            RecordBuffer::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Memory-layout bytes, once the record is patched.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.buffer {
            RecordBuffer::Patched(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[inline]
    pub fn is_patched(&self) -> bool {
        matches!(self.buffer, RecordBuffer::Patched(_))
    }

    #[inline]
    pub fn memory_struct(&self) -> Option<usize> {
        self.memory_struct.map(|s| s as usize)
    }

    #[inline]
    pub fn is_corrected(&self) -> bool {
        self.corrected
    }

    /// Replace the file-layout bytes with the memory layout.
    ///
    /// Returns `false`, leaving the record untouched, unless it is still raw.
    pub fn install(&mut self, patched: Vec<u8>, memory_struct: Option<usize>) -> bool {
        if !matches!(self.buffer, RecordBuffer::Raw(_)) {
            return false;
        }
        self.buffer = RecordBuffer::Patched(patched);
        self.memory_struct = memory_struct.map(|s| s as u32);
        true
    }

    /// Keep the file bytes as the memory layout, without copying.
    pub fn promote(&mut self, memory_struct: Option<usize>) -> bool {
        match std::mem::replace(&mut self.buffer, RecordBuffer::Released) {
            RecordBuffer::Raw(bytes) => {
                self.buffer = RecordBuffer::Patched(bytes);
                self.memory_struct = memory_struct.map(|s| s as u32);
                true
            }
            other => {
                self.buffer = other;
                false
            }
        }
    }

    /// Install a width-corrected pointer array.
    pub fn install_corrected(&mut self, patched: Vec<u8>) -> bool {
        let installed = self.install(patched, None);
        self.corrected |= installed;
        installed
    }

    /// Drop the bytes of a record nothing can use.
    pub fn release(&mut self) {
        self.buffer = RecordBuffer::Released;
        self.memory_struct = None;
    }
}
