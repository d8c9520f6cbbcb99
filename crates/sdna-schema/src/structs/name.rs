//! Member declaration entries from the `NAME` table.

use sdna_common::crc;

/// Maximum number of array dimensions recorded per declaration.
pub const MAX_ARRAY_DIMS: usize = 4;

/// A member declaration such as `x`, `*next`, `co[3]` or `(*update)()`.
///
/// The declaration text is lexed once into its pointer depth, array extents
/// and base name. The base name hash is what links members whose array size
/// or indirection changed between builds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NameEntry {
    /// Declaration text as stored in the schema.
    pub text: String,
    /// Declaration with `*`, `()` and `[N]` removed.
    pub base: String,
    /// CRC32C of the full declaration.
    pub hash: u32,
    /// CRC32C of the base name.
    pub base_hash: u32,
    /// Number of `*` indirections.
    pub pointer_depth: u8,
    /// Declared as `(*name)(...)`.
    pub is_function: bool,
    dims: [u32; MAX_ARRAY_DIMS],
    dim_count: u8,
    /// Product of all array extents (1 for scalars).
    pub array_len: u32,
}

impl NameEntry {
    /// Lex a declaration.
    pub fn parse(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut base = String::with_capacity(text.len());
        let mut pointer_depth = 0u8;
        let mut is_function = false;
        let mut dims = [0u32; MAX_ARRAY_DIMS];
        let mut dim_count = 0usize;
        let mut array_len = 1u32;

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'*' => pointer_depth = pointer_depth.saturating_add(1),
                b'(' => {
                    if base.is_empty() {
                        is_function = bytes.get(i + 1) == Some(&b'*');
                    } else {
                        // Parameter list of a function pointer.
                        break;
                    }
                }
                b')' => {}
                b'[' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && bytes[end] != b']' {
                        end += 1;
                    }
                    let extent = text[start..end]
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|&n| n > 0)
                        .unwrap_or(1);
                    if dim_count < MAX_ARRAY_DIMS {
                        dims[dim_count] = extent;
                        dim_count += 1;
                    }
                    array_len = array_len.saturating_mul(extent);
                    i = end;
                }
                b if b.is_ascii_whitespace() => {}
                _ => {
                    // Multi-byte characters are copied byte run by byte run.
                    let ch_len = utf8_len(bytes[i]);
                    if let Some(s) = text.get(i..i + ch_len) {
                        base.push_str(s);
                    }
                    i += ch_len;
                    continue;
                }
            }
            i += 1;
        }

        Self {
            text: text.to_string(),
            hash: crc::hash_str(text),
            base_hash: crc::hash_str(&base),
            base,
            pointer_depth,
            is_function,
            dims,
            dim_count: dim_count as u8,
            array_len,
        }
    }

    #[inline]
    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    /// Recorded array extents, outermost first.
    pub fn dims(&self) -> &[u32] {
        &self.dims[..self.dim_count as usize]
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let name = NameEntry::parse("flag");
        assert_eq!(name.base, "flag");
        assert_eq!(name.pointer_depth, 0);
        assert_eq!(name.array_len, 1);
        assert!(name.dims().is_empty());
        assert_eq!(name.hash, name.base_hash);
    }

    #[test]
    fn test_pointer_and_double_pointer() {
        let next = NameEntry::parse("*next");
        assert_eq!(next.base, "next");
        assert_eq!(next.pointer_depth, 1);

        let mats = NameEntry::parse("**mat");
        assert_eq!(mats.base, "mat");
        assert_eq!(mats.pointer_depth, 2);
        assert_ne!(mats.hash, mats.base_hash);
    }

    #[test]
    fn test_array_dimensions() {
        let mat = NameEntry::parse("mat[4][4]");
        assert_eq!(mat.base, "mat");
        assert_eq!(mat.dims(), &[4, 4]);
        assert_eq!(mat.array_len, 16);

        let ptrs = NameEntry::parse("*slots[8]");
        assert_eq!(ptrs.pointer_depth, 1);
        assert_eq!(ptrs.array_len, 8);
    }

    #[test]
    fn test_resized_array_keeps_base_hash() {
        let old = NameEntry::parse("co[3]");
        let new = NameEntry::parse("co[4]");
        assert_ne!(old.hash, new.hash);
        assert_eq!(old.base_hash, new.base_hash);
    }

    #[test]
    fn test_function_pointer() {
        let func = NameEntry::parse("(*update)(void *data, int flag)");
        assert!(func.is_function);
        assert_eq!(func.pointer_depth, 1);
        assert_eq!(func.base, "update");
        assert_eq!(func.array_len, 1);
    }

    #[test]
    fn test_degenerate_extent_counts_as_one() {
        let name = NameEntry::parse("pad[0]");
        assert_eq!(name.array_len, 1);
        assert_eq!(name.dims(), &[1]);
    }
}
