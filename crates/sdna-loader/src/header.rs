//! File and record headers.
//!
//! A snapshot starts with a 12-byte file header:
//!
//! ```text
//! SNAPDNA - v 300
//! ^^^^^^^ identifier (7 bytes)
//!         ^ pointer width: '_' = 4 bytes, '-' = 8 bytes
//!           ^ byte order: 'v' = little, 'V' = big
//!             ^^^ version, three ASCII digits
//! ```
//!
//! followed by records, each introduced by a record header whose address
//! field has the file's pointer width.

use sdna_common::{swap32, swap64, Endian, FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Size of the file header in bytes.
pub const FILE_HEADER_SIZE: usize = 12;

/// Identifier written by [`GraphWriter`](crate::GraphWriter) unless configured otherwise.
pub const DEFAULT_IDENTIFIER: [u8; 7] = *b"SNAPDNA";

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileHeader {
    pub identifier: [u8; 7],
    /// Pointer size in bytes of the build that wrote the file (4 or 8).
    pub pointer_width: u8,
    pub endian: Endian,
    /// Version number, 0 to 999.
    pub version: u16,
}

impl FileHeader {
    pub fn new(pointer_width: u8, endian: Endian, version: u16) -> Self {
        Self {
            identifier: DEFAULT_IDENTIFIER,
            pointer_width,
            endian,
            version,
        }
    }

    pub fn with_identifier(mut self, identifier: [u8; 7]) -> Self {
        self.identifier = identifier;
        self
    }

    /// Parse the first 12 bytes of a file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.get(..FILE_HEADER_SIZE).ok_or(Error::ReadTruncated {
            needed: FILE_HEADER_SIZE,
            available: bytes.len(),
        })?;

        let mut identifier = [0u8; 7];
        identifier.copy_from_slice(&bytes[..7]);

        let pointer_width = match bytes[7] {
            b'_' => 4,
            b'-' => 8,
            other => {
                return Err(Error::HeaderInvalid(format!(
                    "unknown pointer width marker {:?}",
                    other as char
                )))
            }
        };

        let endian = Endian::from_marker(bytes[8]).ok_or_else(|| {
            Error::HeaderInvalid(format!("unknown byte order marker {:?}", bytes[8] as char))
        })?;

        let digits = &bytes[9..12];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(Error::HeaderInvalid(format!(
                "version is not three digits: {:?}",
                String::from_utf8_lossy(digits)
            )));
        }
        let version = digits
            .iter()
            .fold(0u16, |acc, d| acc * 10 + (d - b'0') as u16);

        Ok(Self {
            identifier,
            pointer_width,
            endian,
            version,
        })
    }

    /// Encode the header.
    pub fn to_bytes(&self) -> Result<[u8; FILE_HEADER_SIZE]> {
        let pointer_marker = match self.pointer_width {
            4 => b'_',
            8 => b'-',
            other => {
                return Err(Error::HeaderInvalid(format!(
                    "unsupported pointer width {}",
                    other
                )))
            }
        };
        if self.version > 999 {
            return Err(Error::HeaderInvalid(format!(
                "version {} does not fit in three digits",
                self.version
            )));
        }

        let mut out = [0u8; FILE_HEADER_SIZE];
        out[..7].copy_from_slice(&self.identifier);
        out[7] = pointer_marker;
        out[8] = self.endian.marker();
        out[9..].copy_from_slice(format!("{:03}", self.version).as_bytes());
        Ok(out)
    }

    /// Record header layout used by this file.
    pub fn record_layout(&self) -> RecordLayout {
        RecordLayout {
            pointer_width: self.pointer_width,
            endian: self.endian,
        }
    }

    /// Identifier as text, for display.
    pub fn identifier_str(&self) -> String {
        String::from_utf8_lossy(&self.identifier).into_owned()
    }
}

/// Four-byte record code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RecordCode(pub [u8; 4]);

impl RecordCode {
    /// Schema blob.
    pub const SCHEMA: Self = Self(*b"DNA1");
    /// End of stream.
    pub const END: Self = Self(*b"ENDB");
    /// Opaque block, copied without member patching.
    pub const DATA: Self = Self(*b"DATA");

    /// Build a code from up to four ASCII characters, zero padded.
    pub const fn new(code: &[u8]) -> Self {
        let mut bytes = [0u8; 4];
        let mut i = 0;
        while i < code.len() && i < 4 {
            bytes[i] = code[i];
            i += 1;
        }
        Self(bytes)
    }

    #[inline]
    pub fn is_reserved(self) -> bool {
        self == Self::SCHEMA || self == Self::END || self == Self::DATA
    }
}

impl std::fmt::Display for RecordCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in &self.0 {
            if b == 0 {
                continue;
            }
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// Record header as stored by a 32-bit build.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawRecordHeader32 {
    pub code: [u8; 4],
    pub length: u32,
    pub address: u32,
    pub type_index: u32,
    pub count: u32,
}

/// Record header as stored by a 64-bit build.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawRecordHeader64 {
    pub code: [u8; 4],
    pub length: u32,
    pub address: u64,
    pub type_index: u32,
    pub count: u32,
}

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RecordHeader {
    pub code: RecordCode,
    /// Payload length in bytes.
    pub length: u32,
    /// Address of the object in the writing process.
    pub address: u64,
    /// Struct index in the file schema.
    pub type_index: u32,
    /// Number of struct elements in the payload.
    pub count: u32,
}

/// Pointer width and byte order of record headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub pointer_width: u8,
    pub endian: Endian,
}

impl RecordLayout {
    /// Encoded header size: 20 bytes for 32-bit files, 24 for 64-bit.
    pub const fn header_size(&self) -> usize {
        if self.pointer_width == 8 {
            std::mem::size_of::<RawRecordHeader64>()
        } else {
            std::mem::size_of::<RawRecordHeader32>()
        }
    }

    #[inline]
    fn swaps(&self) -> bool {
        self.endian.differs_from(Endian::NATIVE)
    }

    /// Decode a header from exactly [`header_size`](Self::header_size) bytes.
    pub fn decode(&self, bytes: &[u8]) -> Result<RecordHeader> {
        let swap = self.swaps();
        let fix32 = |v: u32| if swap { swap32(v) } else { v };

        let truncated = || Error::ReadTruncated {
            needed: self.header_size(),
            available: bytes.len(),
        };

        if self.pointer_width == 8 {
            let raw = RawRecordHeader64::read_from_bytes(bytes).map_err(|_| truncated())?;
            let address = raw.address;
            Ok(RecordHeader {
                code: RecordCode(raw.code),
                length: fix32(raw.length),
                address: if swap { swap64(address) } else { address },
                type_index: fix32(raw.type_index),
                count: fix32(raw.count),
            })
        } else {
            let raw = RawRecordHeader32::read_from_bytes(bytes).map_err(|_| truncated())?;
            Ok(RecordHeader {
                code: RecordCode(raw.code),
                length: fix32(raw.length),
                address: fix32(raw.address) as u64,
                type_index: fix32(raw.type_index),
                count: fix32(raw.count),
            })
        }
    }

    /// Encode a header, appending it to `out`.
    ///
    /// On 32-bit layouts the address keeps only its low 32 bits.
    pub fn encode(&self, header: &RecordHeader, out: &mut Vec<u8>) {
        let swap = self.swaps();
        let fix32 = |v: u32| if swap { swap32(v) } else { v };

        if self.pointer_width == 8 {
            let raw = RawRecordHeader64 {
                code: header.code.0,
                length: fix32(header.length),
                address: if swap {
                    swap64(header.address)
                } else {
                    header.address
                },
                type_index: fix32(header.type_index),
                count: fix32(header.count),
            };
            out.extend_from_slice(raw.as_bytes());
        } else {
            let raw = RawRecordHeader32 {
                code: header.code.0,
                length: fix32(header.length),
                address: fix32(header.address as u32),
                type_index: fix32(header.type_index),
                count: fix32(header.count),
            };
            out.extend_from_slice(raw.as_bytes());
        }
    }
}
