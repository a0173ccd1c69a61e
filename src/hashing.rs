//! `hash32` primitive used by the sub-command result cache: a short, deterministic digest of
//! either the process environment or the in-scope variable table, truncated to 32 bits to produce
//! an 8-hex-character cache key component.

use xxhash_rust::xxh3::xxh3_64;

/// Deterministic 32-bit hash of arbitrary bytes, used for both the environment hash and the
/// variable hash that make up a preprocessor cache key.
pub fn hash32(bytes: &[u8]) -> u32 {
    let full = xxh3_64(bytes);
    (full ^ (full >> 32)) as u32
}

/// Render a hash as the 8 uppercase hex characters the cache key format requires.
pub fn hash32_hex(hash: u32) -> String {
    format!("{:08X}", hash)
}
