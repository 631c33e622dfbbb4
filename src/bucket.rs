//! Fixed-capacity buckets and their slot scan helpers.
//!
//! A bucket is exactly [`BUCKET_CAPACITY`] optional slots with no chaining
//! and no spill: collisions inside a bucket are resolved by scanning the
//! fixed array, so every single-key operation is O(`BUCKET_CAPACITY`). A
//! full bucket is an error surfaced to the caller, never a silent overflow
//! into a neighbor.

use crate::key::KeyBuf;

/// Number of slots in every bucket.
///
/// Insertion into a bucket whose eight slots are all occupied fails with
/// [`TableError::BucketFull`](crate::TableError::BucketFull); the table
/// never chains and never grows on its own.
pub const BUCKET_CAPACITY: usize = 8;

/// One occupied storage cell: the key, its cached digest, and the value.
///
/// `hash` is always `digest(key.as_bytes())`. Caching it lets slot scans
/// reject non-matching slots on a single integer compare and lets resize
/// relocate slots without re-digesting keys.
#[derive(Debug)]
pub(crate) struct Slot<V> {
    pub(crate) hash: u64,
    pub(crate) key: KeyBuf,
    pub(crate) value: V,
}

/// A fixed array of optional slots, aligned to a cache line so that two
/// adjacent buckets never share a line under concurrent access.
#[repr(align(64))]
pub(crate) struct Bucket<V> {
    slots: [Option<Slot<V>>; BUCKET_CAPACITY],
}

impl<V> Bucket<V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Scans for the occupied slot matching `hash` and `key`.
    #[inline]
    pub(crate) fn find(&self, hash: u64, key: &KeyBuf) -> Option<&Slot<V>> {
        self.slots
            .iter()
            .flatten()
            .find(|slot| slot.hash == hash && slot.key == *key)
    }

    #[inline]
    pub(crate) fn find_mut(&mut self, hash: u64, key: &KeyBuf) -> Option<&mut Slot<V>> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|slot| slot.hash == hash && slot.key == *key)
    }

    /// Removes and returns the slot matching `hash` and `key`.
    pub(crate) fn take(&mut self, hash: u64, key: &KeyBuf) -> Option<Slot<V>> {
        self.slots
            .iter_mut()
            .find(|entry| {
                entry
                    .as_ref()
                    .is_some_and(|slot| slot.hash == hash && slot.key == *key)
            })?
            .take()
    }

    /// Places `slot` into the first empty cell, or hands it back if the
    /// bucket is full.
    pub(crate) fn insert(&mut self, slot: Slot<V>) -> Result<(), Slot<V>> {
        match self.slots.iter_mut().find(|entry| entry.is_none()) {
            Some(empty) => {
                *empty = Some(slot);
                Ok(())
            }
            None => Err(slot),
        }
    }

    /// Drops every slot, returning how many were occupied.
    pub(crate) fn clear(&mut self) -> usize {
        let mut removed = 0;
        for entry in &mut self.slots {
            if entry.take().is_some() {
                removed += 1;
            }
        }
        removed
    }

    #[inline]
    pub(crate) fn any_occupied(&self) -> bool {
        self.slots.iter().any(|entry| entry.is_some())
    }

    pub(crate) fn occupied(&self) -> impl Iterator<Item = &Slot<V>> {
        self.slots.iter().flatten()
    }

    /// Moves every slot out of the bucket, leaving it empty.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Slot<V>> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;

    fn slot(key: &[u8], value: i32) -> Slot<i32> {
        Slot {
            hash: digest(key),
            key: KeyBuf::new(key).unwrap(),
            value,
        }
    }

    #[test]
    fn insert_then_find() {
        let mut bucket = Bucket::new();
        bucket.insert(slot(b"a", 1)).unwrap();
        bucket.insert(slot(b"b", 2)).unwrap();

        let key = KeyBuf::new(b"b").unwrap();
        let found = bucket.find(digest(b"b"), &key).unwrap();
        assert_eq!(found.value, 2);

        let miss = KeyBuf::new(b"c").unwrap();
        assert!(bucket.find(digest(b"c"), &miss).is_none());
    }

    #[test]
    fn fills_at_capacity() {
        let mut bucket = Bucket::new();
        for i in 0..BUCKET_CAPACITY {
            let key = format!("key-{i}");
            bucket.insert(slot(key.as_bytes(), i as i32)).unwrap();
        }

        let overflow = bucket.insert(slot(b"one-too-many", 99));
        let rejected = overflow.unwrap_err();
        assert_eq!(rejected.value, 99);
        assert!(bucket.any_occupied());
    }

    #[test]
    fn take_frees_a_slot() {
        let mut bucket = Bucket::new();
        for i in 0..BUCKET_CAPACITY {
            let key = format!("key-{i}");
            bucket.insert(slot(key.as_bytes(), i as i32)).unwrap();
        }

        let key = KeyBuf::new(b"key-3").unwrap();
        let removed = bucket.take(digest(b"key-3"), &key).unwrap();
        assert_eq!(removed.value, 3);
        assert!(bucket.take(digest(b"key-3"), &key).is_none());

        bucket.insert(slot(b"replacement", 42)).unwrap();
    }

    #[test]
    fn hash_collision_still_compares_keys() {
        // Same cached hash, different key bytes; the scan must not match.
        let mut bucket = Bucket::new();
        bucket
            .insert(Slot {
                hash: 7,
                key: KeyBuf::new(b"left").unwrap(),
                value: 1,
            })
            .unwrap();

        let other = KeyBuf::new(b"right").unwrap();
        assert!(bucket.find(7, &other).is_none());
    }

    #[test]
    fn clear_reports_count() {
        let mut bucket = Bucket::new();
        bucket.insert(slot(b"a", 1)).unwrap();
        bucket.insert(slot(b"b", 2)).unwrap();

        assert_eq!(bucket.clear(), 2);
        assert!(!bucket.any_occupied());
        assert_eq!(bucket.clear(), 0);
    }

    #[test]
    fn drain_moves_everything_out() {
        let mut bucket = Bucket::new();
        bucket.insert(slot(b"a", 1)).unwrap();
        bucket.insert(slot(b"b", 2)).unwrap();

        let mut values: Vec<i32> = bucket.drain().map(|s| s.value).collect();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
        assert!(!bucket.any_occupied());
    }
}
