//! Cursor over schema blobs.
//!
//! Schema tables are runs of NUL-terminated names and fixed-width counts in
//! the byte order of whichever build produced them, each table padded to a
//! four-byte boundary.

use crate::{Endian, Error, Result};

/// Bounds-checked cursor that decodes integers in a fixed byte order.
///
/// ```
/// use sdna_common::{BinaryReader, Endian};
///
/// let blob = b"\x00\x02Point\0x\0\0";
/// let mut reader = BinaryReader::with_endian(blob, Endian::Big);
/// assert_eq!(reader.read_u16().unwrap(), 2);
/// assert_eq!(reader.read_cstring().unwrap(), "Point");
/// assert_eq!(reader.read_cstring().unwrap(), "x");
/// reader.align(4);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
    endian: Endian,
}

impl<'a> BinaryReader<'a> {
    /// Little-endian cursor.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self::with_endian(data, Endian::Little)
    }

    #[inline]
    pub const fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            position: 0,
            endian,
        }
    }

    #[inline]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Skip to the next multiple of `alignment` from the start of the data.
    ///
    /// Padding past the end is allowed; the next read reports the shortfall.
    pub fn align(&mut self, alignment: usize) {
        let rem = self.position % alignment;
        if rem != 0 {
            self.position = self.position.saturating_add(alignment - rem);
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if available < count {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available,
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let endian = self.endian;
        self.read_bytes(2).map(|b| endian.read_u16(b))
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let endian = self.endian;
        self.read_bytes(4).map(|b| endian.read_u32(b))
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        let offset = self.position;
        let rest = self.data.get(offset..).unwrap_or(&[]);
        let len = memchr::memchr(0, rest).ok_or(Error::MissingNullTerminator { offset })?;

        self.position = offset + len + 1;
        std::str::from_utf8(&rest[..len]).map_err(|source| Error::Utf8 { offset, source })
    }
}
