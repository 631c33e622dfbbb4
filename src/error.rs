//! Error types returned by table operations.

use crate::key::KEY_MAX_LEN;

/// The failure modes of a [`Table`](crate::Table).
///
/// `KeyNotFound`, `KeyExists`, and `BucketFull` are expected, recoverable
/// outcomes that callers branch on. A full bucket in particular is the
/// signal to call [`Table::resize`](crate::Table::resize), since the table
/// never grows itself. `RehashOverflow` means a resize was rolled back in
/// full and the table is exactly as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// A capacity was zero, or a resize target was smaller than the current
    /// element count.
    #[error("capacity must be non-zero and at least the current element count")]
    InvalidCapacity,

    /// A key was empty or longer than [`KEY_MAX_LEN`] bytes. Oversized keys
    /// are rejected, never truncated.
    #[error("key length {0} is outside 1..={KEY_MAX_LEN}")]
    InvalidKey(usize),

    /// No entry exists for the given key.
    #[error("no entry for the given key")]
    KeyNotFound,

    /// An entry already exists for the given key and the operation is
    /// insert-only.
    #[error("an entry for the given key already exists")]
    KeyExists,

    /// Every slot in the key's bucket is occupied by other keys. The table
    /// does not resolve this itself; resize to make room.
    #[error("the key's bucket is full; resize the table to make room")]
    BucketFull,

    /// A resize could not place every element into the new bucket layout.
    /// The operation was rolled back and the original table is unchanged.
    #[error("rehash overflowed a destination bucket; table left unchanged")]
    RehashOverflow,
}
