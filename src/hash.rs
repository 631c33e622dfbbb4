//! The key digest function.
//!
//! Every keyed operation digests its key exactly once and reuses the result
//! for bucket selection, slot comparison, and (during resize) relocation, so
//! the function must be deterministic across the lifetime of a table.

/// Digests a byte key to a 64-bit value.
///
/// This is the classic multiplicative string hash: seed 5381, each byte
/// folded as `h = h * 33 + byte` with wrapping arithmetic. It is total
/// (defined for the empty slice) and allocation-free.
///
/// Occupied slots cache this digest, which lets lookups reject mismatched
/// slots on a single `u64` compare and lets resize relocate entries without
/// ever touching key bytes again.
///
/// # Examples
///
/// ```rust
/// # use bucket_table::hash::digest;
/// #
/// assert_eq!(digest(b""), 5381);
/// assert_eq!(digest(b"a"), digest(b"a"));
/// assert_ne!(digest(b"a"), digest(b"b"));
/// ```
#[inline]
#[must_use]
pub fn digest(key: &[u8]) -> u64 {
    let mut hash: u64 = 5381;
    for &byte in key {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_seed() {
        assert_eq!(digest(b""), 5381);
    }

    #[test]
    fn single_byte_fold() {
        assert_eq!(digest(b"a"), 5381 * 33 + u64::from(b'a'));
        assert_eq!(digest(&[0xFF]), 5381 * 33 + 0xFF);
    }

    #[test]
    fn multi_byte_fold() {
        let mut expected: u64 = 5381;
        for &b in b"user:1" {
            expected = expected.wrapping_mul(33).wrapping_add(u64::from(b));
        }
        assert_eq!(digest(b"user:1"), expected);
    }

    #[test]
    fn deterministic() {
        for key in [&b"a"[..], b"key", b"user:1", b"\x00\x01\x02"] {
            assert_eq!(digest(key), digest(key));
        }
    }

    #[test]
    fn long_keys_wrap_without_panic() {
        let key = vec![0xABu8; 4096];
        let _ = digest(&key);
    }
}
