//! Byte order handling.
//!
//! Snapshots record the byte order of the build that wrote them. Every integer
//! read or written through this module goes through an explicit [`Endian`], so
//! the same code path serves little- and big-endian files.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of a file, a schema blob or the current build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Endian {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl Endian {
    /// Byte order of the running build.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endian = Endian::Little;
    /// Byte order of the running build.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endian = Endian::Big;

    /// Parse the file-header marker (`'v'` little, `'V'` big).
    pub const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'v' => Some(Endian::Little),
            b'V' => Some(Endian::Big),
            _ => None,
        }
    }

    /// The file-header marker for this byte order.
    pub const fn marker(self) -> u8 {
        match self {
            Endian::Little => b'v',
            Endian::Big => b'V',
        }
    }

    /// Whether data in this byte order must be swapped to match `other`.
    #[inline]
    pub fn differs_from(self, other: Endian) -> bool {
        self != other
    }

    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(bytes),
            Endian::Big => BigEndian::read_u64(bytes),
        }
    }

    #[inline]
    pub fn write_u16(self, bytes: &mut [u8], value: u16) {
        match self {
            Endian::Little => LittleEndian::write_u16(bytes, value),
            Endian::Big => BigEndian::write_u16(bytes, value),
        }
    }

    #[inline]
    pub fn write_u32(self, bytes: &mut [u8], value: u32) {
        match self {
            Endian::Little => LittleEndian::write_u32(bytes, value),
            Endian::Big => BigEndian::write_u32(bytes, value),
        }
    }

    #[inline]
    pub fn write_u64(self, bytes: &mut [u8], value: u64) {
        match self {
            Endian::Little => LittleEndian::write_u64(bytes, value),
            Endian::Big => BigEndian::write_u64(bytes, value),
        }
    }

    /// Read an unsigned integer of `width` bytes (1, 2, 4 or 8).
    ///
    /// Returns `None` for any other width or a short slice.
    pub fn read_uint(self, bytes: &[u8], width: usize) -> Option<u64> {
        let bytes = bytes.get(..width)?;
        match width {
            1 => Some(bytes[0] as u64),
            2 => Some(self.read_u16(bytes) as u64),
            4 => Some(self.read_u32(bytes) as u64),
            8 => Some(self.read_u64(bytes)),
            _ => None,
        }
    }

    /// Write the low `width` bytes of `value` (1, 2, 4 or 8).
    ///
    /// Returns `false` if the width is unsupported or the slice is short.
    pub fn write_uint(self, bytes: &mut [u8], width: usize, value: u64) -> bool {
        let Some(bytes) = bytes.get_mut(..width) else {
            return false;
        };
        match width {
            1 => bytes[0] = value as u8,
            2 => self.write_u16(bytes, value as u16),
            4 => self.write_u32(bytes, value as u32),
            8 => self.write_u64(bytes, value),
            _ => return false,
        }
        true
    }
}

#[inline]
pub const fn swap16(value: u16) -> u16 {
    value.swap_bytes()
}

#[inline]
pub const fn swap32(value: u32) -> u32 {
    value.swap_bytes()
}

#[inline]
pub const fn swap64(value: u64) -> u64 {
    value.swap_bytes()
}

/// Reverse a 2, 4 or 8 byte value in place.
///
/// Other lengths are left untouched and `false` is returned.
pub fn swap_in_place(bytes: &mut [u8]) -> bool {
    match bytes.len() {
        2 | 4 | 8 => {
            bytes.reverse();
            true
        }
        _ => false,
    }
}
