use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// A bucket holding up to `capacity` key/value pairs at some local depth.
struct Bucket<K, V> {
    /// Local depth: the number of low-order hash bits all keys in this
    /// bucket agree on. Only mutated while the directory lock is held
    /// exclusively.
    depth: AtomicUsize,
    capacity: usize,
    items: RwLock<Vec<(K, V)>>,
}

impl<K: Eq + Clone, V: Clone> Bucket<K, V> {
    fn new(capacity: usize, depth: usize) -> Self {
        Self {
            depth: AtomicUsize::new(depth),
            capacity,
            items: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    fn find(&self, key: &K) -> Option<V> {
        let items = self.items.read();
        items.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn remove(&self, key: &K) -> bool {
        let mut items = self.items.write();
        match items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Inserts or updates. Returns false only when the key is new and the
    /// bucket is full.
    fn insert(&self, key: K, value: V) -> bool {
        let mut items = self.items.write();
        if let Some((_, v)) = items.iter_mut().find(|(k, _)| *k == key) {
            *v = value;
            return true;
        }
        if items.len() >= self.capacity {
            return false;
        }
        items.push((key, value));
        true
    }
}

/// Directory state guarded by the table-wide lock.
struct Directory<K, V> {
    global_depth: usize,
    buckets: Vec<Arc<Bucket<K, V>>>,
    num_buckets: usize,
}

/// In-memory extendible hash table.
///
/// The directory has `2^global_depth` entries, each pointing at a bucket
/// with `local_depth <= global_depth`; `2^(global_depth - local_depth)`
/// entries share each bucket. When an insert hits a full bucket the bucket
/// splits (doubling the directory first if its local depth already equals
/// the global depth), so inserts never fail for lack of space.
///
/// The directory lock is taken shared by reads and exclusive by writes;
/// buckets carry their own reader/writer locks so concurrent reads do not
/// serialize on one another while the directory is stable.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hasher: S,
    dir: RwLock<Directory<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a table with one empty bucket at global depth 0.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Creates a table using the supplied hasher. Useful when callers need
    /// to control bucket placement (tests, or a cheaper integer hash).
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            bucket_size,
            hasher,
            dir: RwLock::new(Directory {
                global_depth: 0,
                buckets: vec![Arc::new(Bucket::new(bucket_size, 0))],
                num_buckets: 1,
            }),
        }
    }

    fn index_of(&self, key: &K, global_depth: usize) -> usize {
        let mask = (1usize << global_depth) - 1;
        (self.hasher.hash_one(key) as usize) & mask
    }

    /// Looks up the value for a key.
    pub fn find(&self, key: &K) -> Option<V> {
        let dir = self.dir.read();
        let index = self.index_of(key, dir.global_depth);
        dir.buckets[index].find(key)
    }

    /// Removes a key. Returns true if it was present.
    pub fn remove(&self, key: &K) -> bool {
        let dir = self.dir.write();
        let index = self.index_of(key, dir.global_depth);
        dir.buckets[index].remove(key)
    }

    /// Inserts a key/value pair; an existing key has its value replaced.
    /// Splits buckets (growing the directory as needed) until the pair fits.
    pub fn insert(&self, key: K, value: V) {
        let mut dir = self.dir.write();

        // Each failed attempt strictly increases the local depth of the
        // offending bucket, so the loop terminates.
        loop {
            let index = self.index_of(&key, dir.global_depth);
            if dir.buckets[index].insert(key.clone(), value.clone()) {
                return;
            }

            if dir.buckets[index].depth() == dir.global_depth {
                Self::double_directory(&mut dir);
            }
            let index = self.index_of(&key, dir.global_depth);
            self.split_bucket(&mut dir, index);
        }
    }

    /// Doubles the directory: the new upper half mirrors the lower half.
    fn double_directory(dir: &mut Directory<K, V>) {
        let old_size = dir.buckets.len();
        dir.buckets.reserve(old_size);
        for i in 0..old_size {
            let bucket = Arc::clone(&dir.buckets[i]);
            dir.buckets.push(bucket);
        }
        dir.global_depth += 1;
    }

    /// Splits the bucket referenced by directory entry `index`, rewiring
    /// the half of its aliases with bit `local_depth` set to a fresh
    /// bucket, then rehashing the old bucket's items across the pair.
    fn split_bucket(&self, dir: &mut Directory<K, V>, index: usize) {
        let old_bucket = Arc::clone(&dir.buckets[index]);
        let old_depth = old_bucket.depth();
        debug_assert!(old_depth < dir.global_depth);

        let new_bucket = Arc::new(Bucket::new(self.bucket_size, old_depth + 1));
        old_bucket.depth.store(old_depth + 1, Ordering::Relaxed);

        for i in 0..dir.buckets.len() {
            if Arc::ptr_eq(&dir.buckets[i], &old_bucket) && (i >> old_depth) & 1 == 1 {
                dir.buckets[i] = Arc::clone(&new_bucket);
            }
        }
        dir.num_buckets += 1;

        // Rehash with the deeper mask. Every item lands in the old or the
        // new bucket, so capacity cannot be exceeded here.
        let items: Vec<(K, V)> = old_bucket.items.write().drain(..).collect();
        for (k, v) in items {
            let i = self.index_of(&k, dir.global_depth);
            dir.buckets[i].items.write().push((k, v));
        }
    }

    /// Returns the global depth of the directory.
    pub fn global_depth(&self) -> usize {
        self.dir.read().global_depth
    }

    /// Returns the local depth of the bucket at the given directory index.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        self.dir.read().buckets[dir_index].depth()
    }

    /// Returns the number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.dir.read().num_buckets
    }

    /// Returns the number of directory entries (2^global_depth).
    pub fn dir_size(&self) -> usize {
        self.dir.read().buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hasher;

    /// Hashes an integer key to itself so tests control bucket placement.
    #[derive(Clone, Default)]
    struct IdentityState;

    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            let mut buf = [0u8; 8];
            let len = bytes.len().min(8);
            buf[..len].copy_from_slice(&bytes[..len]);
            self.0 = u64::from_le_bytes(buf);
        }

        fn write_u32(&mut self, i: u32) {
            self.0 = i as u64;
        }

        fn write_u64(&mut self, i: u64) {
            self.0 = i;
        }
    }

    impl BuildHasher for IdentityState {
        type Hasher = IdentityHasher;

        fn build_hasher(&self) -> IdentityHasher {
            IdentityHasher(0)
        }
    }

    fn identity_table(bucket_size: usize) -> ExtendibleHashTable<u32, u32, IdentityState> {
        ExtendibleHashTable::with_hasher(bucket_size, IdentityState)
    }

    #[test]
    fn test_insert_and_find() {
        let table: ExtendibleHashTable<u32, String> = ExtendibleHashTable::new(4);

        table.insert(1, "a".to_string());
        table.insert(2, "b".to_string());
        table.insert(3, "c".to_string());

        assert_eq!(table.find(&1), Some("a".to_string()));
        assert_eq!(table.find(&2), Some("b".to_string()));
        assert_eq!(table.find(&3), Some("c".to_string()));
        assert_eq!(table.find(&4), None);
    }

    #[test]
    fn test_insert_updates_existing_key() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);

        table.insert(7, 100);
        table.insert(7, 200);

        assert_eq!(table.find(&7), Some(200));
        assert_eq!(table.num_buckets(), 1);
    }

    #[test]
    fn test_remove() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(4);

        table.insert(1, 10);
        table.insert(2, 20);

        assert!(table.remove(&1));
        assert_eq!(table.find(&1), None);
        assert_eq!(table.find(&2), Some(20));
        assert!(!table.remove(&1));
    }

    #[test]
    fn test_directory_doubles_on_split() {
        let table = identity_table(2);
        assert_eq!(table.global_depth(), 0);

        // Keys 0..4 at bucket size 2 force splits
        for k in 0..4u32 {
            table.insert(k, k);
        }

        assert!(table.global_depth() >= 1);
        assert_eq!(table.dir_size(), 1 << table.global_depth());
        for k in 0..4u32 {
            assert_eq!(table.find(&k), Some(k));
        }
    }

    #[test]
    fn test_colliding_low_bits_recursive_split() {
        let table = identity_table(2);

        // All keys share the low 3 bits (pattern 0b101), so splitting at
        // depths 1 and 2 cannot separate them and the loop must recurse.
        for i in 0..4u32 {
            let key = (i << 3) | 0b101;
            table.insert(key, i);
        }

        assert!(table.global_depth() >= 3);
        for i in 0..4u32 {
            let key = (i << 3) | 0b101;
            assert_eq!(table.find(&key), Some(i));
        }
    }

    #[test]
    fn test_local_depth_invariant() {
        let table = identity_table(2);

        for k in 0..32u32 {
            table.insert(k, k);
        }

        let global = table.global_depth();
        assert_eq!(table.dir_size(), 1 << global);

        // Every key hashes into a directory slot whose bucket's local-depth
        // mask agrees with the slot index.
        for k in 0..32u32 {
            let index = (k as usize) & ((1 << global) - 1);
            let local = table.local_depth(index);
            assert!(local <= global);
            let mask = (1usize << local) - 1;
            assert_eq!((k as usize) & mask, index & mask);
        }
    }

    #[test]
    fn test_num_buckets_counts_distinct_buckets() {
        let table = identity_table(1);

        table.insert(0, 0);
        assert_eq!(table.num_buckets(), 1);

        table.insert(1, 1);
        assert_eq!(table.num_buckets(), 2);

        table.insert(2, 2);
        assert_eq!(table.num_buckets(), 3);
    }

    #[test]
    fn test_many_inserts_all_found() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(4);

        for k in 0..1000u32 {
            table.insert(k, k * 2);
        }

        for k in 0..1000u32 {
            assert_eq!(table.find(&k), Some(k * 2), "missing key {}", k);
        }
    }
}
