//! CRC32C hashing utilities.
//!
//! Every type name and member declaration in a schema is identified by the
//! CRC32C of its text, so the same name hashes identically across builds.

/// Compute CRC32C hash of a byte slice.
///
/// Uses hardware acceleration when available (SSE4.2 on x86).
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Compute CRC32C hash of a string.
#[inline]
pub fn hash_str(s: &str) -> u32 {
    hash_bytes(s.as_bytes())
}
