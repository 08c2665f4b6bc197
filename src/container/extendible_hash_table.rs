use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;

use crate::common::{QuarryError, Result};

/// Directory growth stops at the hash width: past that point no further
/// bit can distinguish colliding keys, so a full bucket of same-prefix
/// keys would double the directory forever.
const MAX_GLOBAL_DEPTH: usize = usize::BITS as usize - 1;

/// A bucket holds up to `bucket_size` key-value pairs and discriminates
/// its keys by the low `local_depth` bits of their hash.
struct Bucket<K, V> {
    local_depth: usize,
    items: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    fn new(local_depth: usize, capacity: usize) -> Self {
        Self {
            local_depth,
            items: Vec::with_capacity(capacity),
        }
    }
}

/// Directory state: `dir[i]` is an index into the bucket arena. Several
/// directory slots may reference the same bucket; slots `i` and `j`
/// share a bucket exactly when `i ≡ j (mod 2^local_depth)`.
struct Directory<K, V> {
    global_depth: usize,
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// ExtendibleHashTable maps keys to values with O(1) average lookup and
/// grows by doubling its directory and splitting overflowing buckets.
///
/// The table is generic over the hasher so tests can substitute a
/// deterministic one; callers normally rely on the `RandomState`
/// default. All operations serialize on the table's own latch.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hasher: S,
    inner: Mutex<Directory<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
{
    /// Creates a table whose buckets hold up to `bucket_size` pairs.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            bucket_size,
            hasher,
            inner: Mutex::new(Directory {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0, bucket_size)],
            }),
        }
    }

    /// Directory slot for `key` given the current directory length.
    fn slot_of(&self, key: &K, dir_len: usize) -> usize {
        self.hasher.hash_one(key) as usize & (dir_len - 1)
    }

    /// Looks up the value bound to `key`.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let inner = self.inner.lock();
        let slot = self.slot_of(key, inner.dir.len());
        inner.buckets[inner.dir[slot]]
            .items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Removes the binding for `key`. Returns whether it existed.
    pub fn remove(&self, key: &K) -> bool {
        let inner = &mut *self.inner.lock();
        let slot = self.slot_of(key, inner.dir.len());
        let bucket = &mut inner.buckets[inner.dir[slot]];
        match bucket.items.iter().position(|(k, _)| k == key) {
            Some(i) => {
                bucket.items.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Inserts `key → value`, replacing any existing binding.
    ///
    /// A full target bucket is split until the key fits: if the bucket's
    /// local depth has caught up with the global depth the directory
    /// doubles first, then the bucket's pairs are redistributed by the
    /// newly discriminating hash bit. Fails with `CapacityExceeded` only
    /// when the directory would outgrow the hash width.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let inner = &mut *self.inner.lock();
        loop {
            let slot = self.slot_of(&key, inner.dir.len());
            let bucket_id = inner.dir[slot];
            let bucket = &mut inner.buckets[bucket_id];

            if let Some((_, v)) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                *v = value;
                return Ok(());
            }
            if bucket.items.len() < self.bucket_size {
                bucket.items.push((key, value));
                return Ok(());
            }

            if bucket.local_depth == inner.global_depth {
                if inner.global_depth == MAX_GLOBAL_DEPTH {
                    return Err(QuarryError::CapacityExceeded);
                }
                // Double the directory; each new slot aliases the bucket
                // of the slot it mirrors.
                inner.dir.extend_from_within(..);
                inner.global_depth += 1;
            }
            self.split(inner, bucket_id);
        }
    }

    /// Splits `bucket_id` into itself and a fresh sibling one bit deeper,
    /// rewiring the directory slots whose new bit is set and
    /// redistributing the pairs by that bit.
    fn split(&self, inner: &mut Directory<K, V>, bucket_id: usize) {
        let old_depth = inner.buckets[bucket_id].local_depth;
        let bit = 1usize << old_depth;

        let items = std::mem::take(&mut inner.buckets[bucket_id].items);
        inner.buckets[bucket_id].local_depth = old_depth + 1;

        let sibling_id = inner.buckets.len();
        inner
            .buckets
            .push(Bucket::new(old_depth + 1, self.bucket_size));

        for (slot, target) in inner.dir.iter_mut().enumerate() {
            if *target == bucket_id && slot & bit != 0 {
                *target = sibling_id;
            }
        }

        for (k, v) in items {
            let target = if self.hasher.hash_one(&k) as usize & bit != 0 {
                sibling_id
            } else {
                bucket_id
            };
            inner.buckets[target].items.push((k, v));
        }
    }

    /// Number of low-order hash bits addressing the directory.
    pub fn global_depth(&self) -> usize {
        self.inner.lock().global_depth
    }

    /// Local depth of the bucket referenced by directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock();
        inner.buckets[inner.dir[dir_index]].local_depth
    }

    /// Number of distinct buckets reachable from the directory.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    /// Number of key-value pairs stored.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.buckets.iter().map(|b| b.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::hash::{BuildHasherDefault, Hasher};

    use super::*;

    /// Hashes a key to its own low bytes, so directory slots are the
    /// key's low bits and split shapes are deterministic.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | u64::from(b);
            }
        }

        fn write_u32(&mut self, i: u32) {
            self.0 = u64::from(i);
        }

        fn write_u64(&mut self, i: u64) {
            self.0 = i;
        }
    }

    type Identity = BuildHasherDefault<IdentityHasher>;

    fn identity_table<V>(bucket_size: usize) -> ExtendibleHashTable<u64, V, Identity> {
        ExtendibleHashTable::with_hasher(bucket_size, Identity::default())
    }

    #[test]
    fn test_insert_and_get() {
        let table = ExtendibleHashTable::new(4);
        table.insert(1, "a").unwrap();
        table.insert(2, "b").unwrap();

        assert_eq!(table.get(&1), Some("a"));
        assert_eq!(table.get(&2), Some("b"));
        assert_eq!(table.get(&3), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let table = ExtendibleHashTable::new(4);
        table.insert(7, 100).unwrap();
        table.insert(7, 200).unwrap();

        assert_eq!(table.get(&7), Some(200));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove() {
        let table = ExtendibleHashTable::new(4);
        table.insert(1, "a").unwrap();

        assert!(table.remove(&1));
        assert!(!table.remove(&1));
        assert_eq!(table.get(&1), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_directory_doubles_on_overflow() {
        let table = identity_table(2);
        table.insert(0, "a").unwrap();
        table.insert(1, "b").unwrap();
        // Third insert overflows the single depth-0 bucket; bit 0 then
        // separates even from odd keys into exactly two buckets.
        table.insert(2, "c").unwrap();

        assert!(table.global_depth() >= 1);
        assert_eq!(table.num_buckets(), 2);
        assert_eq!(table.get(&0), Some("a"));
        assert_eq!(table.get(&1), Some("b"));
        assert_eq!(table.get(&2), Some("c"));
    }

    #[test]
    fn test_split_keeps_depth_invariants() {
        let table = identity_table(2);
        for key in 0..16u64 {
            table.insert(key, key).unwrap();
        }

        let global = table.global_depth();
        let dir_len = 1 << global;
        for slot in 0..dir_len {
            let local = table.local_depth(slot);
            assert!(local <= global);
            // A slot and its alias at the same low local-depth bits
            // reference the same bucket.
            if local < global {
                let alias = slot ^ (1 << local);
                assert_eq!(table.local_depth(alias), local);
            }
        }
        for key in 0..16u64 {
            assert_eq!(table.get(&key), Some(key));
        }
    }

    #[test]
    fn test_growth_preserves_all_bindings() {
        let table = ExtendibleHashTable::new(4);
        for key in 0..512u32 {
            table.insert(key, key * 3).unwrap();
        }

        assert_eq!(table.len(), 512);
        for key in 0..512u32 {
            assert_eq!(table.get(&key), Some(key * 3));
        }
        assert!(table.num_buckets() > 1);
        assert!(table.global_depth() >= 1);
    }

    #[test]
    fn test_remove_then_reinsert_after_split() {
        let table = identity_table(2);
        for key in 0..8u64 {
            table.insert(key, key).unwrap();
        }

        assert!(table.remove(&3));
        assert_eq!(table.get(&3), None);

        table.insert(3, 33).unwrap();
        assert_eq!(table.get(&3), Some(33));
    }

    #[test]
    fn test_directory_aliasing_after_double() {
        // One bucket overflows while its neighbor stays shallow: the
        // shallow bucket must remain shared by several directory slots.
        let table = identity_table(2);
        table.insert(0, ()).unwrap();
        table.insert(4, ()).unwrap();
        table.insert(8, ()).unwrap();

        let global = table.global_depth();
        assert!(global >= 2);
        // Keys 0, 4, 8 all have low bits 00; odd slots still alias
        // buckets of lower local depth.
        assert!(table.local_depth(1) < global || table.num_buckets() < (1 << global));
    }
}
