//! Primitive member kinds and numeric conversion.

use sdna_common::Endian;

/// Primitive scalar types a schema can declare.
///
/// Anything that is not one of these names is either a struct or an opaque
/// type known only by its byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PrimitiveKind {
    /// Signed 8-bit integer (`char`, `int8_t`).
    I8,
    /// Unsigned 8-bit integer (`uchar`, `uint8_t`).
    U8,
    /// Signed 16-bit integer (`short`, `int16_t`).
    I16,
    /// Unsigned 16-bit integer (`ushort`, `uint16_t`).
    U16,
    /// Signed 32-bit integer (`int`, `long`, `int32_t`).
    I32,
    /// Unsigned 32-bit integer (`uint`, `ulong`, `uint32_t`).
    U32,
    /// Signed 64-bit integer (`int64_t`).
    I64,
    /// Unsigned 64-bit integer (`uint64_t`).
    U64,
    /// 32-bit floating point (`float`).
    F32,
    /// 64-bit floating point (`double`).
    F64,
    /// One byte, zero or non-zero (`bool`).
    Bool,
    /// No storage (`void`).
    Void,
}

/// Primitive type names with their kinds, in the order a fresh schema declares them.
pub const PRIMITIVE_TYPES: &[(&str, PrimitiveKind)] = &[
    ("void", PrimitiveKind::Void),
    ("char", PrimitiveKind::I8),
    ("uchar", PrimitiveKind::U8),
    ("short", PrimitiveKind::I16),
    ("ushort", PrimitiveKind::U16),
    ("int", PrimitiveKind::I32),
    ("uint", PrimitiveKind::U32),
    ("long", PrimitiveKind::I32),
    ("ulong", PrimitiveKind::U32),
    ("float", PrimitiveKind::F32),
    ("double", PrimitiveKind::F64),
    ("int64_t", PrimitiveKind::I64),
    ("uint64_t", PrimitiveKind::U64),
    ("int8_t", PrimitiveKind::I8),
    ("uint8_t", PrimitiveKind::U8),
    ("int16_t", PrimitiveKind::I16),
    ("uint16_t", PrimitiveKind::U16),
    ("int32_t", PrimitiveKind::I32),
    ("uint32_t", PrimitiveKind::U32),
    ("bool", PrimitiveKind::Bool),
];

impl PrimitiveKind {
    /// Look up a primitive by its type name.
    pub fn from_type_name(name: &str) -> Option<Self> {
        PRIMITIVE_TYPES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    /// Size in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::I8 | Self::U8 | Self::Bool => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64 | Self::Void)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Void)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Decode one value from `bytes` in the given byte order.
    ///
    /// Returns `None` for `Void` or when `bytes` is too short.
    pub fn read(self, bytes: &[u8], endian: Endian) -> Option<NumericValue> {
        let raw = endian.read_uint(bytes, self.size())?;
        Some(match self {
            Self::I8 => NumericValue::Signed(raw as u8 as i8 as i64),
            Self::I16 => NumericValue::Signed(raw as u16 as i16 as i64),
            Self::I32 => NumericValue::Signed(raw as u32 as i32 as i64),
            Self::I64 => NumericValue::Signed(raw as i64),
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => NumericValue::Unsigned(raw),
            Self::Bool => NumericValue::Unsigned((raw != 0) as u64),
            Self::F32 => NumericValue::Float(f32::from_bits(raw as u32) as f64),
            Self::F64 => NumericValue::Float(f64::from_bits(raw)),
            Self::Void => return None,
        })
    }

    /// Encode `value` into `bytes` in the given byte order.
    ///
    /// Narrowing follows Rust `as` semantics: integers keep their low bits,
    /// floats truncate toward zero and saturate at the target range.
    pub fn write(self, value: NumericValue, bytes: &mut [u8], endian: Endian) -> bool {
        let raw = match self {
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => value.as_i64() as u64,
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => value.as_u64(),
            Self::Bool => value.is_nonzero() as u64,
            Self::F32 => (value.as_f64() as f32).to_bits() as u64,
            Self::F64 => value.as_f64().to_bits(),
            Self::Void => return false,
        };
        endian.write_uint(bytes, self.size(), raw)
    }

    /// Canonical type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::I8 => "int8_t",
            Self::U8 => "uint8_t",
            Self::I16 => "int16_t",
            Self::U16 => "uint16_t",
            Self::I32 => "int32_t",
            Self::U32 => "uint32_t",
            Self::I64 => "int64_t",
            Self::U64 => "uint64_t",
            Self::F32 => "float",
            Self::F64 => "double",
            Self::Bool => "bool",
            Self::Void => "void",
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scalar in a width-independent form, used to cast between kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl NumericValue {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Signed(v) => v,
            Self::Unsigned(v) => v as i64,
            Self::Float(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            Self::Signed(v) => v as u64,
            Self::Unsigned(v) => v,
            Self::Float(v) => {
                if v < 0.0 {
                    v as i64 as u64
                } else {
                    v as u64
                }
            }
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Signed(v) => v as f64,
            Self::Unsigned(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    fn is_nonzero(self) -> bool {
        match self {
            Self::Signed(v) => v != 0,
            Self::Unsigned(v) => v != 0,
            Self::Float(v) => v != 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_sizes() {
        assert_eq!(PrimitiveKind::from_type_name("int"), Some(PrimitiveKind::I32));
        assert_eq!(PrimitiveKind::from_type_name("double"), Some(PrimitiveKind::F64));
        assert_eq!(PrimitiveKind::from_type_name("Point"), None);
        assert_eq!(PrimitiveKind::I16.size(), 2);
        assert_eq!(PrimitiveKind::Void.size(), 0);
    }

    #[test]
    fn test_families() {
        assert!(PrimitiveKind::I8.is_integer());
        assert!(PrimitiveKind::Bool.is_integer());
        assert!(!PrimitiveKind::F32.is_integer());
        assert!(PrimitiveKind::F32.is_numeric());
        assert!(!PrimitiveKind::Void.is_numeric());
    }

    #[test]
    fn test_sign_extension_on_read() {
        let bytes = (-5i16).to_le_bytes();
        let value = PrimitiveKind::I16.read(&bytes, Endian::Little).unwrap();
        assert_eq!(value, NumericValue::Signed(-5));

        let mut out = [0u8; 4];
        assert!(PrimitiveKind::I32.write(value, &mut out, Endian::Little));
        assert_eq!(i32::from_le_bytes(out), -5);
    }

    #[test]
    fn test_float_widening_and_narrowing() {
        let bytes = 1.5f32.to_be_bytes();
        let value = PrimitiveKind::F32.read(&bytes, Endian::Big).unwrap();

        let mut out = [0u8; 8];
        assert!(PrimitiveKind::F64.write(value, &mut out, Endian::Little));
        assert_eq!(f64::from_le_bytes(out), 1.5);

        let mut int_out = [0u8; 4];
        PrimitiveKind::I32.write(NumericValue::Float(-7.9), &mut int_out, Endian::Little);
        assert_eq!(i32::from_le_bytes(int_out), -7);
    }

    #[test]
    fn test_integer_narrowing_truncates() {
        let mut out = [0u8; 1];
        PrimitiveKind::U8.write(NumericValue::Signed(0x1FF), &mut out, Endian::Little);
        assert_eq!(out[0], 0xFF);
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(PrimitiveKind::I32.read(&[1, 2], Endian::Little).is_none());
        let mut out = [0u8; 2];
        assert!(!PrimitiveKind::F64.write(NumericValue::Float(1.0), &mut out, Endian::Little));
    }
}
