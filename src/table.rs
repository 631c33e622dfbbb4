//! The concurrent fixed-bucket table.
//!
//! # Locking discipline
//!
//! The unit of mutual exclusion is one bucket: each bucket lives inside its
//! own [`parking_lot::RwLock`], padded to a cache line, so operations on keys
//! that map to different buckets never contend. Single-key operations hash
//! the key once, take exactly one bucket lock (read for `get`/`exists`,
//! write for `set`/`add`/`delete`/`replace`), scan at most
//! [`BUCKET_CAPACITY`] slots, and release the lock before returning. Guards
//! make release unconditional on every path, including error returns.
//!
//! `clear` needs the whole table quiescent: it acquires every bucket's write
//! lock in strictly ascending index order and holds all of them while it
//! wipes. Any two whole-table operations therefore serialize instead of
//! deadlocking, because both walk the indexes in the same direction.
//!
//! `resize` replaces the bucket array itself, which no set of per-bucket
//! locks can make sound under a shared reference. The array therefore sits
//! behind an outer `RwLock` that every operation acquires in read mode
//! (shared, so per-key parallelism is unaffected) and only `resize` ever
//! acquires in write mode. From any other thread's perspective a resize is
//! atomic: the old layout with its locks, or the new one, never a mix.
//!
//! The element count is a separate `Relaxed` atomic maintained beside the
//! bucket locks, so [`Table::len`] and [`Table::load_factor`] never lock.
//! The price is that the walking snapshots
//! ([`Table::occupied_bucket_fraction`], [`Table::memory_usage`]) read one
//! bucket at a time and are best-effort under concurrent mutation, not
//! linearizable. That relaxation is intentional.

use core::fmt;
use core::mem;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering;

use parking_lot::RwLock;

use crate::bucket::BUCKET_CAPACITY;
use crate::bucket::Bucket;
use crate::bucket::Slot;
use crate::error::TableError;
use crate::hash::digest;
use crate::key::KeyBuf;

cfg_if::cfg_if! {
    if #[cfg(feature = "power-of-two")] {
        /// Rounds a requested bucket count up to the next power of two.
        fn round_capacity(requested: usize) -> usize {
            if requested.is_power_of_two() {
                requested
            } else {
                let rounded = requested.next_power_of_two();
                tracing::info!(
                    requested,
                    rounded,
                    "bucket count is not a power of two; rounding up"
                );
                rounded
            }
        }

        #[inline(always)]
        fn bucket_index(hash: u64, bucket_count: usize) -> usize {
            debug_assert!(bucket_count.is_power_of_two());
            (hash as usize) & (bucket_count - 1)
        }
    } else {
        fn round_capacity(requested: usize) -> usize {
            requested
        }

        #[inline(always)]
        fn bucket_index(hash: u64, bucket_count: usize) -> usize {
            (hash % bucket_count as u64) as usize
        }
    }
}

/// One bucket and the lock that guards it, padded out to a cache line so
/// adjacent shards never false-share under concurrent access.
#[repr(align(64))]
struct Shard<V> {
    bucket: RwLock<Bucket<V>>,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Self {
            bucket: RwLock::new(Bucket::new()),
        }
    }
}

/// A concurrent key-value table of fixed-capacity buckets with one
/// reader-writer lock per bucket.
///
/// Keys are non-empty byte strings of at most
/// [`KEY_MAX_LEN`](crate::KEY_MAX_LEN) bytes. Values are owned by the table
/// from insertion until they are deleted, replaced, or the table is dropped;
/// mutating operations hand displaced values back to the caller rather than
/// destroying them internally.
///
/// Insertion into a bucket whose [`BUCKET_CAPACITY`] slots are all taken
/// fails with [`TableError::BucketFull`]; the table never grows on its own.
/// Call [`Table::resize`] to make room.
///
/// # Examples
///
/// ```rust
/// # use bucket_table::{Table, TableError};
/// #
/// let table: Table<Vec<u8>> = Table::new(16)?;
///
/// table.set(b"session:9", b"alive".to_vec())?;
/// assert_eq!(table.get(b"session:9")?.as_deref(), Some(&b"alive"[..]));
///
/// let removed = table.delete(b"session:9")?;
/// assert_eq!(removed, b"alive");
/// assert!(table.is_empty());
/// # Ok::<(), TableError>(())
/// ```
pub struct Table<V> {
    /// Index-aligned buckets and their locks; written only by `resize`.
    shards: RwLock<Box<[Shard<V>]>>,
    /// Mirror of `shards.len()`, updated under the outer write lock, read
    /// lock-free by `capacity` and `load_factor`.
    bucket_count: AtomicUsize,
    /// Total occupied slots across all buckets.
    len: AtomicUsize,
}

impl<V> Table<V> {
    /// Creates a table with `initial_capacity` buckets.
    ///
    /// With the `power-of-two` feature (the default), the bucket count is
    /// rounded up to the next power of two. Zero capacity is rejected with
    /// [`TableError::InvalidCapacity`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use bucket_table::{Table, TableError, BUCKET_CAPACITY};
    /// #
    /// let table: Table<u64> = Table::new(16)?;
    /// assert_eq!(table.capacity(), 16 * BUCKET_CAPACITY);
    /// assert!(Table::<u64>::new(0).is_err());
    /// # Ok::<(), TableError>(())
    /// ```
    pub fn new(initial_capacity: usize) -> Result<Self, TableError> {
        if initial_capacity == 0 {
            return Err(TableError::InvalidCapacity);
        }

        let bucket_count = round_capacity(initial_capacity);
        let shards: Box<[Shard<V>]> = (0..bucket_count).map(|_| Shard::new()).collect();

        Ok(Self {
            shards: RwLock::new(shards),
            bucket_count: AtomicUsize::new(bucket_count),
            len: AtomicUsize::new(0),
        })
    }

    #[inline]
    fn shard_for<'a>(shards: &'a [Shard<V>], hash: u64) -> &'a Shard<V> {
        &shards[bucket_index(hash, shards.len())]
    }

    /// Inserts or updates `key`.
    ///
    /// Returns `Ok(Some(old))` when an existing entry was updated in place
    /// (the element count is unchanged), `Ok(None)` when a new entry was
    /// written into an empty slot, and [`TableError::BucketFull`] when the
    /// key is absent and its bucket has no free slot. On `BucketFull` the
    /// offered value is dropped; callers that intend to resize and retry
    /// should keep their own copy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use bucket_table::{Table, TableError};
    /// #
    /// let table: Table<&str> = Table::new(16)?;
    /// assert_eq!(table.set(b"k", "v1")?, None);
    /// assert_eq!(table.set(b"k", "v2")?, Some("v1"));
    /// assert_eq!(table.len(), 1);
    /// # Ok::<(), TableError>(())
    /// ```
    pub fn set(&self, key: &[u8], value: V) -> Result<Option<V>, TableError> {
        let key = KeyBuf::new(key)?;
        let hash = digest(key.as_bytes());

        let shards = self.shards.read();
        let mut bucket = Self::shard_for(&shards, hash).bucket.write();

        if let Some(slot) = bucket.find_mut(hash, &key) {
            return Ok(Some(mem::replace(&mut slot.value, value)));
        }

        match bucket.insert(Slot { hash, key, value }) {
            Ok(()) => {
                self.len.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(_rejected) => Err(TableError::BucketFull),
        }
    }

    /// Inserts `key`, failing if it is already present.
    ///
    /// Returns [`TableError::KeyExists`] when the key is present (the stored
    /// value is untouched and the offered value is dropped) and
    /// [`TableError::BucketFull`] when the bucket has no free slot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use bucket_table::{Table, TableError};
    /// #
    /// let table: Table<&str> = Table::new(16)?;
    /// table.add(b"k", "first")?;
    /// assert_eq!(table.add(b"k", "second"), Err(TableError::KeyExists));
    /// assert_eq!(table.get(b"k")?, Some("first"));
    /// # Ok::<(), TableError>(())
    /// ```
    pub fn add(&self, key: &[u8], value: V) -> Result<(), TableError> {
        let key = KeyBuf::new(key)?;
        let hash = digest(key.as_bytes());

        let shards = self.shards.read();
        let mut bucket = Self::shard_for(&shards, hash).bucket.write();

        if bucket.find(hash, &key).is_some() {
            return Err(TableError::KeyExists);
        }

        match bucket.insert(Slot { hash, key, value }) {
            Ok(()) => {
                self.len.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_rejected) => Err(TableError::BucketFull),
        }
    }

    /// Looks up `key` and returns an owned clone of its value.
    ///
    /// The clone is made while the bucket's read lock is held and is what
    /// crosses the lock boundary (never a reference into the table), so the
    /// result remains valid even if another thread deletes or replaces the
    /// entry immediately afterwards.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use bucket_table::{Table, TableError};
    /// #
    /// let table: Table<String> = Table::new(16)?;
    /// table.set(b"k", "v".to_string())?;
    /// assert_eq!(table.get(b"k")?, Some("v".to_string()));
    /// assert_eq!(table.get(b"missing")?, None);
    /// # Ok::<(), TableError>(())
    /// ```
    pub fn get(&self, key: &[u8]) -> Result<Option<V>, TableError>
    where
        V: Clone,
    {
        let key = KeyBuf::new(key)?;
        let hash = digest(key.as_bytes());

        let shards = self.shards.read();
        let bucket = Self::shard_for(&shards, hash).bucket.read();

        Ok(bucket.find(hash, &key).map(|slot| slot.value.clone()))
    }

    /// Returns whether `key` is present. Allocation-free membership scan
    /// under the bucket's read lock.
    pub fn exists(&self, key: &[u8]) -> Result<bool, TableError> {
        let key = KeyBuf::new(key)?;
        let hash = digest(key.as_bytes());

        let shards = self.shards.read();
        let bucket = Self::shard_for(&shards, hash).bucket.read();

        Ok(bucket.find(hash, &key).is_some())
    }

    /// Removes `key`, returning its value.
    ///
    /// Ownership of the value passes back to the caller; dropping the return
    /// value is what releases its resources. Fails with
    /// [`TableError::KeyNotFound`] if the key is absent.
    pub fn delete(&self, key: &[u8]) -> Result<V, TableError> {
        let key = KeyBuf::new(key)?;
        let hash = digest(key.as_bytes());

        let shards = self.shards.read();
        let mut bucket = Self::shard_for(&shards, hash).bucket.write();

        match bucket.take(hash, &key) {
            Some(slot) => {
                self.len.fetch_sub(1, Ordering::Relaxed);
                Ok(slot.value)
            }
            None => Err(TableError::KeyNotFound),
        }
    }

    /// Replaces the value of an existing `key`, returning the old value.
    ///
    /// Unlike [`Table::set`] this never inserts: it fails with
    /// [`TableError::KeyNotFound`] when the key is absent, and the offered
    /// value is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use bucket_table::{Table, TableError};
    /// #
    /// let table: Table<&str> = Table::new(16)?;
    /// assert_eq!(table.replace(b"k", "v"), Err(TableError::KeyNotFound));
    /// table.set(b"k", "v1")?;
    /// assert_eq!(table.replace(b"k", "v2")?, "v1");
    /// # Ok::<(), TableError>(())
    /// ```
    pub fn replace(&self, key: &[u8], value: V) -> Result<V, TableError> {
        let key = KeyBuf::new(key)?;
        let hash = digest(key.as_bytes());

        let shards = self.shards.read();
        let mut bucket = Self::shard_for(&shards, hash).bucket.write();

        match bucket.find_mut(hash, &key) {
            Some(slot) => Ok(mem::replace(&mut slot.value, value)),
            None => Err(TableError::KeyNotFound),
        }
    }

    /// Removes every entry, returning how many were removed.
    ///
    /// Acquires every bucket's write lock in ascending index order and holds
    /// all of them until the table is clean, so concurrent operations observe
    /// either the full table or the empty one. Clearing an empty table is a
    /// no-op returning zero.
    pub fn clear(&self) -> usize {
        let shards = self.shards.read();

        // Ascending acquisition is the table's one global lock order; any two
        // whole-table operations serialize on it instead of deadlocking.
        let mut guards: Vec<_> = shards.iter().map(|shard| shard.bucket.write()).collect();

        let mut removed = 0;
        for bucket in &mut guards {
            removed += bucket.clear();
        }
        self.len.store(0, Ordering::Relaxed);

        removed
    }

    /// Changes the number of buckets, relocating every entry by its cached
    /// digest.
    ///
    /// Validates that `new_capacity` is non-zero and at least the current
    /// element count ([`TableError::InvalidCapacity`] otherwise); with the
    /// `power-of-two` feature the target is rounded up. Resizing to the
    /// current bucket count is a no-op success.
    ///
    /// The operation is transactional: destination occupancy is verified
    /// before anything moves, so a layout that would overflow a destination
    /// bucket fails with [`TableError::RehashOverflow`] and leaves the table
    /// exactly as it was. Aggregate capacity above the element count does not
    /// guarantee success: a skewed digest distribution can still overflow
    /// one destination bucket, and that is an expected, recoverable outcome.
    ///
    /// The element count is unchanged by a successful resize.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use bucket_table::{Table, TableError};
    /// #
    /// let table: Table<u32> = Table::new(1)?;
    /// for i in 0..8u32 {
    ///     table.add(format!("key-{i}").as_bytes(), i)?;
    /// }
    /// assert!(matches!(table.add(b"key-8", 8), Err(TableError::BucketFull)));
    ///
    /// table.resize(16)?;
    /// table.add(b"key-8", 8)?;
    /// assert_eq!(table.len(), 9);
    /// # Ok::<(), TableError>(())
    /// ```
    pub fn resize(&self, new_capacity: usize) -> Result<(), TableError> {
        if new_capacity == 0 {
            return Err(TableError::InvalidCapacity);
        }

        let mut shards = self.shards.write();

        if new_capacity < self.len.load(Ordering::Relaxed) {
            return Err(TableError::InvalidCapacity);
        }

        let new_capacity = round_capacity(new_capacity);
        if new_capacity == shards.len() {
            return Ok(());
        }

        // Feasibility pass before anything moves: count destination
        // occupancy so an overflow aborts with the table untouched.
        let mut fill = vec![0usize; new_capacity];
        for shard in shards.iter_mut() {
            for slot in shard.bucket.get_mut().occupied() {
                let idx = bucket_index(slot.hash, new_capacity);
                fill[idx] += 1;
                if fill[idx] > BUCKET_CAPACITY {
                    tracing::warn!(
                        new_capacity,
                        bucket = idx,
                        "resize aborted: destination bucket would overflow"
                    );
                    return Err(TableError::RehashOverflow);
                }
            }
        }

        let mut new_shards: Box<[Shard<V>]> = (0..new_capacity).map(|_| Shard::new()).collect();
        for shard in shards.iter_mut() {
            for slot in shard.bucket.get_mut().drain() {
                let idx = bucket_index(slot.hash, new_capacity);
                let placed = new_shards[idx].bucket.get_mut().insert(slot);
                debug_assert!(placed.is_ok(), "feasibility pass admitted an overflow");
            }
        }

        *shards = new_shards;
        self.bucket_count.store(new_capacity, Ordering::Relaxed);

        Ok(())
    }

    /// Number of entries, read from the atomic counter without locking.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the table holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current number of buckets.
    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count.load(Ordering::Relaxed)
    }

    /// Total slot capacity: `bucket_count() * BUCKET_CAPACITY`.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bucket_count() * BUCKET_CAPACITY
    }

    /// Occupied fraction of total slot capacity, in `[0, 1]`.
    ///
    /// Computed from the atomic counter without locking.
    #[must_use]
    pub fn load_factor(&self) -> f64 {
        let capacity = self.capacity();
        if capacity == 0 {
            return 0.0;
        }
        self.len() as f64 / capacity as f64
    }

    /// Fraction of buckets with at least one occupied slot, in `[0, 1]`.
    ///
    /// Read-locks each bucket in turn rather than the whole table at once:
    /// under concurrent mutation this is a best-effort snapshot, not a
    /// linearizable one.
    #[must_use]
    pub fn occupied_bucket_fraction(&self) -> f64 {
        let shards = self.shards.read();
        if shards.is_empty() {
            return 0.0;
        }

        let occupied = shards
            .iter()
            .filter(|shard| shard.bucket.read().any_occupied())
            .count();

        occupied as f64 / shards.len() as f64
    }

    /// Estimates the table's memory footprint in bytes.
    ///
    /// Sums the fixed metadata, the shard array (buckets and their locks),
    /// and `sizer(value)` for every occupied slot. Buckets are read-locked
    /// one at a time, so the same best-effort-snapshot caveat as
    /// [`Table::occupied_bucket_fraction`] applies.
    pub fn memory_usage(&self, sizer: impl Fn(&V) -> usize) -> usize {
        let shards = self.shards.read();

        let mut total = mem::size_of::<Self>() + shards.len() * mem::size_of::<Shard<V>>();
        for shard in shards.iter() {
            let bucket = shard.bucket.read();
            for slot in bucket.occupied() {
                total += sizer(&slot.value);
            }
        }

        total
    }
}

impl<V> fmt::Debug for Table<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.len())
            .field("bucket_count", &self.bucket_count())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
