//! ProbeHashMap: the public map surface and the rehash engine.

use crate::cursor::EntryCursor;
use crate::prime::{self, MAX_CAPACITY};
use crate::raw_table::{Probe, RawTable, Slot};
use crate::view::{Entries, EntriesView, KeysView, ValuesView};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use std::collections::hash_map::{DefaultHasher, RandomState};

/// Capacity used when none, or an unusable one, is requested.
pub const DEFAULT_CAPACITY: usize = 11;

/// Load factor used when a non-positive one is requested.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.5;

/// Ceiling on the configurable load factor. Quadratic probing over a
/// prime-sized table only guarantees reaching an empty slot while at most
/// half the slots are in use, so occupancy is never allowed past this.
pub const MAX_LOAD_FACTOR: f64 = 0.5;

/// A key→value map over an open-addressed, quadratically probed,
/// prime-sized slot array.
///
/// Keys are unique; removal writes a tombstone that keeps probe chains
/// alive and is reclaimed by later insertions on the same path. The table
/// grows to the next prime at or above double its capacity before any
/// insertion that would push used slots past `load_factor * capacity`.
///
/// Structural changes (new-key insert, removal, rehash, clear) bump an
/// internal generation counter; detached [cursors](crate::EntryCursor)
/// snapshot it to detect modification mid-iteration. Value-only overwrites
/// do not count as structural.
pub struct ProbeHashMap<K, V, S = RandomState> {
    table: RawTable<K, V>,
    hasher: S,
    /// Capacity chosen at construction; `clear` shrinks back to it.
    initial_capacity: usize,
    load_factor: f64,
    generation: u64,
}

fn coerce_capacity(requested: usize) -> usize {
    if requested <= 2 {
        DEFAULT_CAPACITY
    } else if requested >= MAX_CAPACITY {
        MAX_CAPACITY
    } else if prime::is_prime(requested) {
        requested
    } else {
        prime::next_prime(requested)
    }
}

fn coerce_load_factor(requested: f64) -> f64 {
    // `!(x > 0.0)` also catches NaN.
    if !(requested > 0.0) {
        DEFAULT_LOAD_FACTOR
    } else if requested > MAX_LOAD_FACTOR {
        MAX_LOAD_FACTOR
    } else {
        requested
    }
}

impl<K, V> ProbeHashMap<K, V>
where
    K: Eq + Hash,
{
    /// An empty map with capacity 11 and load factor 0.5.
    pub fn new() -> Self {
        Self::with_capacity_and_load_factor(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR)
    }

    /// An empty map with the given capacity, coerced up to a usable prime:
    /// requests of 2 or less become 11, composites round up to the next
    /// prime.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    /// An empty map with the given capacity and load factor. The capacity
    /// is coerced as in [`with_capacity`](Self::with_capacity); the load
    /// factor falls back to 0.5 when non-positive and is capped at
    /// [`MAX_LOAD_FACTOR`].
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f64) -> Self {
        Self::with_capacity_load_factor_and_hasher(capacity, load_factor, RandomState::new())
    }
}

impl<K, V> Default for ProbeHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ProbeHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_load_factor_and_hasher(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::with_capacity_load_factor_and_hasher(capacity, DEFAULT_LOAD_FACTOR, hasher)
    }

    pub fn with_capacity_load_factor_and_hasher(
        capacity: usize,
        load_factor: f64,
        hasher: S,
    ) -> Self {
        let capacity = coerce_capacity(capacity);
        Self {
            table: RawTable::with_capacity(capacity),
            hasher,
            initial_capacity: capacity,
            load_factor: coerce_load_factor(load_factor),
            generation: 0,
        }
    }

    fn hash_of<Q>(&self, key: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(key)
    }

    /// Reference to the value mapped to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(key);
        let index = self.table.find(hash, |k| k.borrow() == key)?;
        self.table.entry(index).map(|(_, value)| value)
    }

    /// Mutable reference to the value mapped to `key`. Value mutation is
    /// not a structural change; live cursors keep iterating.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(key);
        let index = self.table.find(hash, |k| k.borrow() == key)?;
        self.table.entry_mut(index).map(|(_, value)| value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(key);
        self.table.find(hash, |k| k.borrow() == key).is_some()
    }

    /// Whether any live entry maps to `value`. Linear scan over occupied
    /// slots.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.table.entries().any(|(_, _, stored)| stored == value)
    }

    /// Physical slot index of `key`'s occupied slot. Exposed so that probe
    /// placement (for one, tombstone reuse) is observable; the index is
    /// only stable until the next structural change.
    pub fn locate<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(key);
        self.table.find(hash, |k| k.borrow() == key)
    }

    /// Map `key` to `value`, returning the previously mapped value if the
    /// key was present.
    ///
    /// The growth check runs before the probe, so a rehash triggered by
    /// this call settles the table the probe then scans. Overwriting an
    /// existing key changes neither the count nor the generation; writing
    /// a new key reuses the first tombstone on its probe path and bumps
    /// both.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        // Grow before any insertion that could leave more than
        // load_factor * capacity slots in use. Comparing used + 1 keeps
        // post-insert occupancy at or below (capacity - 1) / 2, which is
        // what bounds every probe scan -- including scans for absent keys
        // that happen between insertions.
        let used_after = (self.table.used() + 1) as f64;
        if used_after > self.load_factor * self.table.capacity() as f64 {
            self.grow();
        }
        let hash = self.hash_of(&key);
        match self.table.probe(hash, |k| *k == key) {
            Probe::Hit(index) => {
                let previous = self
                    .table
                    .replace_value(index, value)
                    .expect("probe hit must address an occupied slot");
                Some(previous)
            }
            Probe::Free(index) => {
                self.table.occupy(index, key, value);
                self.generation += 1;
                None
            }
        }
    }

    /// Remove `key`'s mapping, returning its value. The slot becomes a
    /// tombstone; the capacity does not shrink.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Like [`remove`](Self::remove), but yields the stored key as well.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(key);
        let index = self.table.find(hash, |k| k.borrow() == key)?;
        let entry = self
            .table
            .vacate(index)
            .expect("find must address an occupied slot");
        self.generation += 1;
        Some(entry)
    }

    /// Keep only the entries `keep` approves of. The predicate may mutate
    /// values; rejected entries become tombstones.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        let mut from = 0;
        while let Some(index) = self.table.next_occupied(from) {
            let discard = match self.table.entry_mut(index) {
                Some((key, value)) => !keep(key, value),
                None => false,
            };
            if discard {
                self.table.vacate(index);
                self.generation += 1;
            }
            from = index + 1;
        }
    }

    /// Grow to the next prime at or above double the current capacity,
    /// clamping at [`MAX_CAPACITY`](crate::prime::MAX_CAPACITY).
    fn grow(&mut self) {
        let old_capacity = self.table.capacity();
        let doubled = old_capacity.saturating_mul(2);
        let new_capacity = if doubled >= MAX_CAPACITY {
            MAX_CAPACITY
        } else {
            prime::next_prime(doubled)
        };
        if new_capacity == old_capacity {
            return;
        }
        self.rehash_into(new_capacity);
    }

    /// Redistribute every live entry into a fresh all-empty table of
    /// `new_capacity` slots. Each entry goes through the full probe scan
    /// against the new capacity -- direct `hash % capacity` placement
    /// could silently stack two keys into one slot. Tombstones are left
    /// behind, and the whole rehash is one generation bump.
    fn rehash_into(&mut self, new_capacity: usize) {
        let old_len = self.table.len();
        let old = core::mem::replace(&mut self.table, RawTable::with_capacity(new_capacity));
        for (key, value) in old.into_entries() {
            let hash = self.hasher.hash_one(&key);
            match self.table.probe(hash, |k| *k == key) {
                Probe::Free(index) => self.table.occupy(index, key, value),
                // Keys were unique in the old table; a hit here means a
                // pathological Eq. Last write wins.
                Probe::Hit(index) => {
                    self.table.replace_value(index, value);
                }
            }
        }
        debug_assert_eq!(self.table.len(), old_len);
        self.generation += 1;
    }
}

impl<K, V, S> ProbeHashMap<K, V, S> {
    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Current slot-array length. Always prime.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Discard every entry and shrink the slot array back to the capacity
    /// the map was constructed with.
    pub fn clear(&mut self) {
        self.table = RawTable::with_capacity(self.initial_capacity);
        self.generation += 1;
    }

    /// Live view of the keys.
    pub fn keys(&self) -> KeysView<'_, K, V, S> {
        KeysView::new(self)
    }

    /// Live view of the values.
    pub fn values(&self) -> ValuesView<'_, K, V, S> {
        ValuesView::new(self)
    }

    /// Live view of the key/value pairs.
    pub fn entries(&self) -> EntriesView<'_, K, V, S> {
        EntriesView::new(self)
    }

    /// Borrowing iterator over `(&K, &V)` in ascending slot order.
    pub fn iter(&self) -> Entries<'_, K, V> {
        self.entries().iter()
    }

    /// Fail-fast cursor over the entries; shorthand for
    /// `self.entries().cursor()`.
    pub fn cursor(&self) -> EntryCursor {
        self.entries().cursor()
    }

    pub(crate) fn raw(&self) -> &RawTable<K, V> {
        &self.table
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Vacate the occupied slot at `index` directly, bypassing the probe.
    /// Cursors use this for their sanctioned mid-iteration removal.
    pub(crate) fn remove_at(&mut self, index: usize) -> Option<(K, V)> {
        let entry = self.table.vacate(index)?;
        self.generation += 1;
        Some(entry)
    }
}

/// Structural copy: the slot array is cloned verbatim, preserving the
/// current capacity and tombstone layout. The clone starts with a fresh
/// generation; live cursors on the original do not transfer. Equality and
/// hashing are layout-blind, so a clone always compares equal to its
/// source.
impl<K, V, S> Clone for ProbeHashMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            hasher: self.hasher.clone(),
            initial_capacity: self.initial_capacity,
            load_factor: self.load_factor,
            generation: 0,
        }
    }
}

/// Two maps are equal when they are the same size and every pair of one is
/// present in the other with an equal value, regardless of slot layout,
/// capacity, or hasher seed.
impl<K, V, S> PartialEq for ProbeHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.table
            .entries()
            .all(|(_, key, value)| other.get(key).map_or(false, |ov| *ov == *value))
    }
}

impl<K, V, S> Eq for ProbeHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

/// Order-independent: the wrapping sum of per-entry hashes, each computed
/// with a fixed-key [`DefaultHasher`] so that equal maps hash equal even
/// across different `RandomState` seeds. Consistent with [`PartialEq`].
impl<K, V, S> Hash for ProbeHashMap<K, V, S>
where
    K: Hash,
    V: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut sum: u64 = 0;
        for (_, key, value) in self.table.entries() {
            let mut entry_hasher = DefaultHasher::new();
            key.hash(&mut entry_hasher);
            value.hash(&mut entry_hasher);
            sum = sum.wrapping_add(entry_hasher.finish());
        }
        state.write_usize(self.len());
        state.write_u64(sum);
    }
}

impl<K, V, S> fmt::Debug for ProbeHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.entries().map(|(_, key, value)| (key, value)))
            .finish()
    }
}

/// Renders `{(key --> value), ...}` over occupied slots in index order;
/// an empty map renders `{}`.
impl<K, V, S> fmt::Display for ProbeHashMap<K, V, S>
where
    K: fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut first = true;
        for (_, key, value) in self.table.entries() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "({key} --> {value})")?;
            first = false;
        }
        f.write_str("}")
    }
}

impl<K, V, S> Extend<(K, V)> for ProbeHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for ProbeHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::with_capacity_load_factor_and_hasher(
            DEFAULT_CAPACITY,
            DEFAULT_LOAD_FACTOR,
            S::default(),
        );
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a ProbeHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Entries<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> IntoIterator for ProbeHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            remaining: self.table.len(),
            slots: Vec::from(self.table.into_slots()).into_iter(),
        }
    }
}

/// Owned iterator over the map's entries in ascending slot order.
pub struct IntoIter<K, V> {
    slots: std::vec::IntoIter<Slot<K, V>>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.slots.next()? {
                Slot::Occupied { key, value } => {
                    self.remaining -= 1;
                    return Some((key, value));
                }
                _ => continue,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> core::iter::FusedIterator for IntoIter<K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: construction coercions -- tiny capacities become 11,
    /// composites round up, primes stick, bad load factors fall back.
    #[test]
    fn construction_coercions() {
        let tiny: ProbeHashMap<i32, i32> = ProbeHashMap::with_capacity(0);
        assert_eq!(tiny.capacity(), 11);
        let two: ProbeHashMap<i32, i32> = ProbeHashMap::with_capacity(2);
        assert_eq!(two.capacity(), 11);
        let three: ProbeHashMap<i32, i32> = ProbeHashMap::with_capacity(3);
        assert_eq!(three.capacity(), 3);
        let composite: ProbeHashMap<i32, i32> = ProbeHashMap::with_capacity(12);
        assert_eq!(composite.capacity(), 13);
        let prime: ProbeHashMap<i32, i32> = ProbeHashMap::with_capacity(29);
        assert_eq!(prime.capacity(), 29);

        let negative: ProbeHashMap<i32, i32> =
            ProbeHashMap::with_capacity_and_load_factor(11, -1.0);
        assert_eq!(negative.load_factor(), DEFAULT_LOAD_FACTOR);
        let nan: ProbeHashMap<i32, i32> =
            ProbeHashMap::with_capacity_and_load_factor(11, f64::NAN);
        assert_eq!(nan.load_factor(), DEFAULT_LOAD_FACTOR);
        let oversized: ProbeHashMap<i32, i32> =
            ProbeHashMap::with_capacity_and_load_factor(11, 0.9);
        assert_eq!(oversized.load_factor(), MAX_LOAD_FACTOR);
        let small: ProbeHashMap<i32, i32> =
            ProbeHashMap::with_capacity_and_load_factor(11, 0.2);
        assert_eq!(small.load_factor(), 0.2);
    }

    /// Invariant: overwriting a key returns the old value and is not a
    /// structural change (the generation stays put).
    #[test]
    fn overwrite_returns_previous_and_keeps_generation() {
        let mut map = ProbeHashMap::new();
        assert_eq!(map.insert("k", 1), None);
        let generation = map.generation();
        assert_eq!(map.insert("k", 2), Some(1));
        assert_eq!(map.generation(), generation);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k"), Some(&2));
    }

    /// Invariant: every structural operation bumps the generation exactly
    /// once -- including a rehash, which is one bump for the whole
    /// redistribution.
    #[test]
    fn generation_counts_structural_changes() {
        let mut map: ProbeHashMap<i32, i32> =
            ProbeHashMap::with_capacity_and_load_factor(5, 0.5);
        assert_eq!(map.generation(), 0);
        map.insert(1, 10);
        assert_eq!(map.generation(), 1);
        map.remove(&1);
        assert_eq!(map.generation(), 2);
        map.clear();
        assert_eq!(map.generation(), 3);

        map.insert(1, 10);
        let before = map.generation();
        // used + 1 = 2 <= 0.5 * 5: plain insert, one bump.
        map.insert(2, 20);
        assert_eq!(map.generation(), before + 1);
        // used + 1 = 3 > 2.5: rehash (one bump) plus the insert (one bump).
        map.insert(3, 30);
        assert_eq!(map.generation(), before + 3);
        assert_eq!(map.capacity(), 11);
    }

    /// Invariant: get_mut mutates in place without a structural change.
    #[test]
    fn get_mut_updates_value_only() {
        let mut map = ProbeHashMap::new();
        map.insert("k", 1);
        let generation = map.generation();
        *map.get_mut("k").expect("key present") += 10;
        assert_eq!(map.get("k"), Some(&11));
        assert_eq!(map.generation(), generation);
    }

    /// Invariant: rehash redistributes every entry through the probe path;
    /// nothing is lost or duplicated even when every key collides.
    #[test]
    fn rehash_redistributes_under_full_collision() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                7
            }
        }

        let mut map: ProbeHashMap<i32, i32, ConstBuildHasher> =
            ProbeHashMap::with_capacity_load_factor_and_hasher(11, 0.5, ConstBuildHasher);
        for i in 0..20 {
            map.insert(i, i * 10);
        }
        assert_eq!(map.len(), 20);
        assert!(map.capacity() > 11);
        for i in 0..20 {
            assert_eq!(map.get(&i), Some(&(i * 10)), "key {i} after rehash");
        }
    }

    /// Invariant: retain drops exactly the rejected entries and lets the
    /// predicate mutate the kept ones.
    #[test]
    fn retain_filters_and_mutates() {
        let mut map: ProbeHashMap<i32, i32> = (0..10).map(|i| (i, i)).collect();
        map.retain(|key, value| {
            *value *= 2;
            key % 2 == 0
        });
        assert_eq!(map.len(), 5);
        for i in (0..10).step_by(2) {
            assert_eq!(map.get(&i), Some(&(i * 2)));
        }
        for i in (1..10).step_by(2) {
            assert_eq!(map.get(&i), None);
        }
    }
}
