//! Fixed-capacity inline key storage.
//!
//! Keys live inside their slot as a fixed byte array plus an explicit
//! length. Validation happens exactly once, at [`KeyBuf::new`]: empty and
//! oversized keys are rejected (never truncated), and the tail of the buffer
//! past the key is always zeroed.

use core::fmt;

use crate::error::TableError;

/// Maximum key length in bytes.
pub const KEY_MAX_LEN: usize = 255;

/// A validated key, stored inline as `KEY_MAX_LEN` bytes plus a length.
///
/// Comparisons look at exactly the stored `len` bytes; the zero padding past
/// the key never participates in equality or hashing.
///
/// # Examples
///
/// ```rust
/// # use bucket_table::{KeyBuf, TableError};
/// #
/// let key = KeyBuf::new(b"user:1")?;
/// assert_eq!(key.as_bytes(), b"user:1");
///
/// assert_eq!(KeyBuf::new(b""), Err(TableError::InvalidKey(0)));
/// assert_eq!(KeyBuf::new(&[0u8; 256]), Err(TableError::InvalidKey(256)));
/// # Ok::<(), TableError>(())
/// ```
#[derive(Clone, Copy)]
pub struct KeyBuf {
    bytes: [u8; KEY_MAX_LEN],
    len: u8,
}

impl KeyBuf {
    /// Validates and copies `key` into fixed storage.
    ///
    /// Returns [`TableError::InvalidKey`] when `key` is empty or longer than
    /// [`KEY_MAX_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, TableError> {
        if key.is_empty() || key.len() > KEY_MAX_LEN {
            return Err(TableError::InvalidKey(key.len()));
        }

        let mut bytes = [0u8; KEY_MAX_LEN];
        bytes[..key.len()].copy_from_slice(key);

        Ok(Self {
            bytes,
            len: key.len() as u8,
        })
    }

    /// The key bytes, without padding.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Length of the key in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Always false; empty keys cannot be constructed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl PartialEq for KeyBuf {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for KeyBuf {}

impl PartialEq<[u8]> for KeyBuf {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Debug for KeyBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyBuf({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let key = KeyBuf::new(b"user:1").unwrap();
        assert_eq!(key.as_bytes(), b"user:1");
        assert_eq!(key.len(), 6);
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(KeyBuf::new(b""), Err(TableError::InvalidKey(0)));
    }

    #[test]
    fn rejects_oversized() {
        let long = vec![b'x'; KEY_MAX_LEN + 1];
        assert_eq!(KeyBuf::new(&long), Err(TableError::InvalidKey(256)));
    }

    #[test]
    fn accepts_max_length() {
        let max = vec![b'k'; KEY_MAX_LEN];
        let key = KeyBuf::new(&max).unwrap();
        assert_eq!(key.as_bytes(), &max[..]);
    }

    #[test]
    fn padding_is_zeroed_and_ignored() {
        let a = KeyBuf::new(b"ab").unwrap();
        assert!(a.bytes[2..].iter().all(|&b| b == 0));

        // A key that happens to contain the padding byte is still distinct.
        let b = KeyBuf::new(b"ab\x00").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn equality_is_exact_bytes() {
        assert_eq!(KeyBuf::new(b"key").unwrap(), KeyBuf::new(b"key").unwrap());
        assert_ne!(KeyBuf::new(b"key").unwrap(), KeyBuf::new(b"kex").unwrap());
        assert_ne!(KeyBuf::new(b"key").unwrap(), KeyBuf::new(b"ke").unwrap());
    }
}
