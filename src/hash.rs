//! Stable key hashing: 13-byte BLAKE2s fingerprints and bucket mapping.
//!
//! Goals:
//! - A short, collision-resistant fingerprint that keeps index entries small
//!   and doubles as the bucket selector.
//! - Keep the mapping invariant across toolchains/platforms: the fingerprint
//!   bytes are interpreted as a little-endian unsigned integer, mod n_buckets.

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2sVar;

use crate::consts::FINGERPRINT_LEN;

pub type Fingerprint = [u8; FINGERPRINT_LEN];

/// Compute the 13-byte BLAKE2s fingerprint of a key.
pub fn fingerprint(key: &[u8]) -> Fingerprint {
    // 13 <= 32, so the output size is always valid for BLAKE2s.
    let mut hasher = Blake2sVar::new(FINGERPRINT_LEN).expect("valid BLAKE2s output size");
    hasher.update(key);
    let mut out = [0u8; FINGERPRINT_LEN];
    hasher
        .finalize_variable(&mut out)
        .expect("output buffer matches configured size");
    out
}

/// Bucket index for a fingerprint: uint_le(fp) mod n_buckets.
#[inline]
pub fn index_bucket(fp: &Fingerprint, n_buckets: u32) -> u32 {
    debug_assert!(n_buckets > 0, "n_buckets must be > 0");
    let mut wide = [0u8; 16];
    wide[..FINGERPRINT_LEN].copy_from_slice(fp);
    (u128::from_le_bytes(wide) % n_buckets as u128) as u32
}

/// Convenience wrapper: key -> bucket in one step.
#[inline]
pub fn bucket_of_key(key: &[u8], n_buckets: u32) -> u32 {
    index_bucket(&fingerprint(key), n_buckets)
}
