//! Hash table with separate bucket and chain index arrays.
//!
//! [`OpenHashMap`] stores its entries densely in one array and threads a
//! singly-linked chain per bucket through two parallel index arrays:
//!
//! - `bucket_head[hash & (capacity - 1)]` is the first entry of a bucket,
//! - `chain_next[entry]` is the next entry in the same bucket.
//!
//! Both use [`NO_ENTRY`] as the end-of-chain sentinel. Removal moves the last
//! entry into the freed slot, so entry indices are only stable between
//! removals.

use std::cell::Cell;

use crate::{Error, Result, SpanArray};

/// End-of-chain sentinel in `bucket_head` and `chain_next`.
pub const NO_ENTRY: u32 = u32::MAX;

/// Smallest bucket count allocated on first insert.
const MIN_BUCKETS: usize = 8;

/// Keys stored in an [`OpenHashMap`] provide their own 32-bit hash.
pub trait StableHash {
    fn stable_hash(&self) -> u32;
}

impl StableHash for u32 {
    #[inline]
    fn stable_hash(&self) -> u32 {
        // Fibonacci multiplier spreads sequential keys over the low bits.
        self.wrapping_mul(0x9E37_79B9)
    }
}

impl StableHash for u64 {
    #[inline]
    fn stable_hash(&self) -> u32 {
        let folded = (*self ^ (*self >> 29)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        (folded ^ (folded >> 32)) as u32
    }
}

impl StableHash for String {
    #[inline]
    fn stable_hash(&self) -> u32 {
        crate::crc::hash_str(self)
    }
}

#[derive(Debug, Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u32,
}

/// Hash table keyed by [`StableHash`] types.
#[derive(Debug, Clone)]
pub struct OpenHashMap<K, V> {
    entries: SpanArray<Entry<K, V>>,
    bucket_head: SpanArray<u32>,
    chain_next: SpanArray<u32>,
    /// Last successful lookup as `(hash, entry index)`.
    last_hit: Cell<Option<(u32, u32)>>,
}

impl<K, V> Default for OpenHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OpenHashMap<K, V> {
    pub const fn new() -> Self {
        Self {
            entries: SpanArray::new(),
            bucket_head: SpanArray::new(),
            chain_next: SpanArray::new(),
            last_hit: Cell::new(None),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buckets (always zero or a power of two).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bucket_head.len()
    }

    /// Entry at a dense index. Indices shift on removal.
    pub fn entry_at(&self, index: usize) -> Option<(&K, &V)> {
        self.entries.get(index).map(|e| (&e.key, &e.value))
    }

    /// Iterate entries in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|e| &e.value)
    }

    /// Remove every entry. See [`SpanArray::clear`] for `reuse`.
    pub fn clear(&mut self, reuse: bool) {
        self.entries.clear(reuse);
        self.bucket_head.clear(reuse);
        self.chain_next.clear(reuse);
        self.last_hit.set(None);
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        (hash as usize) & (self.bucket_head.len() - 1)
    }

    fn grow(&mut self) -> Result<()> {
        let new_capacity = self
            .entries
            .len()
            .saturating_mul(2)
            .next_power_of_two()
            .max(MIN_BUCKETS);

        self.bucket_head = SpanArray::filled(new_capacity, NO_ENTRY)?;
        for index in 0..self.entries.len() {
            let bucket = self.bucket_of(self.entries[index].hash);
            self.chain_next[index] = self.bucket_head[bucket];
            self.bucket_head[bucket] = index as u32;
        }
        Ok(())
    }
}

impl<K: StableHash + Eq, V> OpenHashMap<K, V> {
    /// Dense index of `key`, if present.
    pub fn find_index(&self, key: &K) -> Option<usize> {
        if self.bucket_head.is_empty() {
            return None;
        }
        let hash = key.stable_hash();

        if let Some((cached_hash, cached_index)) = self.last_hit.get() {
            if cached_hash == hash {
                if let Some(entry) = self.entries.get(cached_index as usize) {
                    if entry.key == *key {
                        return Some(cached_index as usize);
                    }
                }
            }
        }

        let mut current = self.bucket_head[self.bucket_of(hash)];
        while current != NO_ENTRY {
            let entry = &self.entries[current as usize];
            if entry.hash == hash && entry.key == *key {
                self.last_hit.set(Some((hash, current)));
                return Some(current as usize);
            }
            current = self.chain_next[current as usize];
        }
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_index(key).map(|i| &self.entries[i].value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.find_index(key)?;
        Some(&mut self.entries[index].value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find_index(key).is_some()
    }

    /// Insert a new key.
    ///
    /// Returns the dense index of the entry, or [`Error::InsertConflict`] if
    /// the key is already present (the existing value is left untouched).
    pub fn insert(&mut self, key: K, value: V) -> Result<usize> {
        if self.contains_key(&key) {
            return Err(Error::InsertConflict);
        }
        if self.entries.len() >= self.bucket_head.len() {
            self.grow()?;
        }

        let hash = key.stable_hash();
        let index = self.entries.append(Entry { key, value, hash })?;
        self.chain_next.append(NO_ENTRY)?;

        let bucket = self.bucket_of(hash);
        self.chain_next[index] = self.bucket_head[bucket];
        self.bucket_head[bucket] = index as u32;

        self.last_hit.set(None);
        Ok(index)
    }

    /// Remove `key`, returning its value.
    ///
    /// The last entry is moved into the freed slot and its chain link is
    /// redirected to the new position.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if self.bucket_head.is_empty() {
            return None;
        }
        let hash = key.stable_hash();
        let bucket = self.bucket_of(hash);

        let mut previous = NO_ENTRY;
        let mut current = self.bucket_head[bucket];
        while current != NO_ENTRY {
            let entry = &self.entries[current as usize];
            if entry.hash == hash && entry.key == *key {
                break;
            }
            previous = current;
            current = self.chain_next[current as usize];
        }
        if current == NO_ENTRY {
            return None;
        }

        let removed = current as usize;
        let next = self.chain_next[removed];
        if previous == NO_ENTRY {
            self.bucket_head[bucket] = next;
        } else {
            self.chain_next[previous as usize] = next;
        }

        let last = self.entries.len() - 1;
        if removed != last {
            let last_bucket = self.bucket_of(self.entries[last].hash);
            if self.bucket_head[last_bucket] == last as u32 {
                self.bucket_head[last_bucket] = current;
            } else {
                let mut link = self.bucket_head[last_bucket];
                while link != NO_ENTRY {
                    let follow = self.chain_next[link as usize];
                    if follow == last as u32 {
                        self.chain_next[link as usize] = current;
                        break;
                    }
                    link = follow;
                }
            }
            self.chain_next[removed] = self.chain_next[last];
        }
        self.chain_next.pop();

        self.last_hit.set(None);
        Some(self.entries.remove_swap(removed).value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Key whose hash is chosen by the test, to force collisions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Colliding(u32, u32);

    impl StableHash for Colliding {
        fn stable_hash(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn test_insert_then_find() {
        let mut map = OpenHashMap::new();
        map.insert(10u64, "ten").unwrap();
        map.insert(20u64, "twenty").unwrap();

        assert_eq!(map.get(&10), Some(&"ten"));
        assert_eq!(map.get(&20), Some(&"twenty"));
        assert_eq!(map.get(&30), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut map = OpenHashMap::new();
        map.insert(1u32, 'a').unwrap();
        assert!(matches!(map.insert(1u32, 'b'), Err(Error::InsertConflict)));
        assert_eq!(map.get(&1), Some(&'a'));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_capacity_is_power_of_two() {
        let mut map = OpenHashMap::new();
        for i in 0..100u32 {
            map.insert(i, i).unwrap();
            assert!(map.capacity().is_power_of_two());
            assert!(map.capacity() >= map.len());
        }
        for i in 0..100u32 {
            assert_eq!(map.get(&i), Some(&i));
        }
    }

    #[test]
    fn test_remove_swaps_last_entry_into_slot() {
        let mut map = OpenHashMap::new();
        map.insert(Colliding(1, 5), "a").unwrap();
        map.insert(Colliding(2, 5), "b").unwrap();
        map.insert(Colliding(3, 9), "c").unwrap();

        assert_eq!(map.remove(&Colliding(1, 5)), Some("a"));

        // "c" was last and now occupies index 0.
        assert_eq!(map.entry_at(0), Some((&Colliding(3, 9), &"c")));
        assert_eq!(map.find_index(&Colliding(3, 9)), Some(0));
        assert_eq!(map.get(&Colliding(2, 5)), Some(&"b"));
        assert_eq!(map.get(&Colliding(1, 5)), None);
    }

    #[test]
    fn test_remove_within_single_chain() {
        let mut map = OpenHashMap::new();
        for i in 0..6 {
            map.insert(Colliding(i, 7), i).unwrap();
        }

        assert_eq!(map.remove(&Colliding(2, 7)), Some(2));
        assert_eq!(map.remove(&Colliding(5, 7)), Some(5));
        assert_eq!(map.remove(&Colliding(0, 7)), Some(0));

        for i in [1, 3, 4] {
            assert_eq!(map.get(&Colliding(i, 7)), Some(&i));
        }
        assert_eq!(map.len(), 3);
        assert_eq!(map.remove(&Colliding(0, 7)), None);
    }

    #[test]
    fn test_cached_lookup_invalidated_by_remove() {
        let mut map = OpenHashMap::new();
        map.insert(42u64, 1).unwrap();
        map.insert(43u64, 2).unwrap();

        assert_eq!(map.get(&42), Some(&1));
        assert_eq!(map.get(&42), Some(&1));

        map.remove(&42);
        assert_eq!(map.get(&42), None);
        assert_eq!(map.get(&43), Some(&2));
    }

    #[test]
    fn test_cached_lookup_invalidated_by_insert() {
        let mut map = OpenHashMap::new();
        map.insert(Colliding(1, 3), "a").unwrap();
        assert_eq!(map.find_index(&Colliding(1, 3)), Some(0));
        assert!(map.last_hit.get().is_some());

        let before = map.capacity();
        for i in 2..40 {
            map.insert(Colliding(i, 3), "b").unwrap();
            assert!(map.last_hit.get().is_none());
        }
        assert!(map.capacity() > before);

        assert_eq!(map.get(&Colliding(1, 3)), Some(&"a"));
        assert_eq!(map.last_hit.get(), Some((3, 0)));
        assert_eq!(map.get(&Colliding(39, 3)), Some(&"b"));
    }

    #[test]
    fn test_random_operation_sequence() {
        // Small LCG so the sequence is reproducible without extra dependencies.
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as u32
        };

        let mut map = OpenHashMap::new();
        let mut shadow = std::collections::HashMap::new();
        let (mut inserts, mut removals, mut rejected) = (0usize, 0usize, 0usize);

        for _ in 0..4000 {
            let key = (next() % 257) as u64;
            match next() % 3 {
                0 | 1 => {
                    let value = next();
                    match map.insert(key, value) {
                        Ok(_) => {
                            inserts += 1;
                            shadow.insert(key, value);
                        }
                        Err(Error::InsertConflict) => rejected += 1,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                _ => {
                    let expected = shadow.remove(&key);
                    let actual = map.remove(&key);
                    assert_eq!(actual, expected);
                    if actual.is_some() {
                        removals += 1;
                    }
                }
            }
            assert_eq!(map.len(), inserts - removals);
        }

        assert!(rejected > 0);
        for (key, value) in &shadow {
            assert_eq!(map.get(key), Some(value));
        }
        assert_eq!(map.len(), shadow.len());
    }
}
