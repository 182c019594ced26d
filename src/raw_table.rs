//! Storage layer: tagged slots, the slot array, and the probe resolver.
//!
//! `RawTable` owns the raw storage and the occupied/tombstone counters, and
//! resolves keys to slot indices by quadratic probing. It never hashes
//! anything itself: callers pass the 64-bit hash and an equality closure,
//! so this layer stays free of `Hash`/`BuildHasher` bounds and never runs
//! user code outside the probe scan.

/// One position in the table.
///
/// `Tombstone` is distinct from `Empty` so that a probe scan can tell
/// "never used" from "used then deleted": scans stop at `Empty` but run
/// through tombstones, which keeps probe chains to later entries alive.
#[derive(Clone, Debug)]
pub(crate) enum Slot<K, V> {
    Empty,
    Occupied { key: K, value: V },
    Tombstone,
}

/// Where a probe scan ended.
pub(crate) enum Probe {
    /// An occupied slot whose key matched.
    Hit(usize),
    /// The insertion point for a missing key: the first tombstone seen on
    /// the scan, or failing that the empty slot that terminated it.
    Free(usize),
}

#[derive(Clone, Debug)]
pub(crate) struct RawTable<K, V> {
    slots: Box<[Slot<K, V>]>,
    occupied: usize,
    tombstones: usize,
}

impl<K, V> RawTable<K, V> {
    /// `capacity` must already be prime; this layer does not re-check.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Slot::Empty).collect(),
            occupied: 0,
            tombstones: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.occupied
    }

    /// Occupied plus tombstone slots. This is the number a probe scan
    /// cannot pass through, so growth decisions compare it, not `len`,
    /// against the load-factor threshold.
    pub(crate) fn used(&self) -> usize {
        self.occupied + self.tombstones
    }

    /// Single-pass quadratic probe for the key `eq` recognizes.
    ///
    /// Visits `(base + j^2) mod capacity` for `j = 0, 1, 2, ...` until an
    /// exact match or an empty slot. The first tombstone on the path is
    /// remembered and returned as the insertion point in preference to the
    /// terminating empty slot, so re-inserted keys reclaim deleted slots
    /// instead of lengthening their probe chains.
    ///
    /// Termination relies on the capacity being prime and `used()` staying
    /// at or below half of it; the map layer maintains both.
    pub(crate) fn probe(&self, hash: u64, mut eq: impl FnMut(&K) -> bool) -> Probe {
        let capacity = self.slots.len();
        let mut index = (hash % capacity as u64) as usize;
        // Consecutive squares differ by successive odd numbers, so the
        // scan advances by 1, 3, 5, ... instead of computing j^2.
        let mut step = 1;
        let mut reusable = None;
        loop {
            match &self.slots[index] {
                Slot::Occupied { key, .. } if eq(key) => return Probe::Hit(index),
                Slot::Occupied { .. } => {}
                Slot::Tombstone => {
                    if reusable.is_none() {
                        reusable = Some(index);
                    }
                }
                Slot::Empty => return Probe::Free(reusable.unwrap_or(index)),
            }
            index = (index + step) % capacity;
            step += 2;
        }
    }

    /// Slot index of the occupied entry for this key, if present.
    pub(crate) fn find(&self, hash: u64, eq: impl FnMut(&K) -> bool) -> Option<usize> {
        match self.probe(hash, eq) {
            Probe::Hit(index) => Some(index),
            Probe::Free(_) => None,
        }
    }

    /// Key/value of the slot at `index`, if it is occupied.
    pub(crate) fn entry(&self, index: usize) -> Option<(&K, &V)> {
        match self.slots.get(index) {
            Some(Slot::Occupied { key, value }) => Some((key, value)),
            _ => None,
        }
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<(&K, &mut V)> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied { key, value }) => Some((&*key, value)),
            _ => None,
        }
    }

    /// Write a live entry into a `Free` slot returned by `probe`.
    pub(crate) fn occupy(&mut self, index: usize, key: K, value: V) {
        if matches!(self.slots[index], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        debug_assert!(!matches!(self.slots[index], Slot::Occupied { .. }));
        self.slots[index] = Slot::Occupied { key, value };
        self.occupied += 1;
    }

    /// Overwrite the value of an occupied slot, returning the old value.
    /// `None` means the slot was not occupied, which callers treat as an
    /// internal invariant violation.
    pub(crate) fn replace_value(&mut self, index: usize, value: V) -> Option<V> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied { value: stored, .. }) => {
                Some(core::mem::replace(stored, value))
            }
            _ => None,
        }
    }

    /// Convert an occupied slot into a tombstone, returning its entry.
    pub(crate) fn vacate(&mut self, index: usize) -> Option<(K, V)> {
        match core::mem::replace(&mut self.slots[index], Slot::Tombstone) {
            Slot::Occupied { key, value } => {
                self.occupied -= 1;
                self.tombstones += 1;
                Some((key, value))
            }
            other => {
                // Not occupied: restore whatever state was there.
                self.slots[index] = other;
                None
            }
        }
    }

    /// Index of the first occupied slot at or after `from`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<usize> {
        (from..self.slots.len()).find(|&i| matches!(self.slots[i], Slot::Occupied { .. }))
    }

    /// Occupied entries in ascending slot order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (usize, &K, &V)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { key, value } => Some((index, key, value)),
                _ => None,
            })
    }

    /// Consume the table, yielding owned entries in ascending slot order.
    pub(crate) fn into_entries(self) -> impl Iterator<Item = (K, V)> {
        Vec::from(self.slots).into_iter().filter_map(|slot| match slot {
            Slot::Occupied { key, value } => Some((key, value)),
            _ => None,
        })
    }

    /// Consume the table, handing over the raw slot array.
    pub(crate) fn into_slots(self) -> Box<[Slot<K, V>]> {
        self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(capacity: usize, entries: &[(u64, i32)]) -> RawTable<u64, i32> {
        let mut table = RawTable::with_capacity(capacity);
        for &(key, value) in entries {
            match table.probe(key, |k| *k == key) {
                Probe::Free(index) => table.occupy(index, key, value),
                Probe::Hit(_) => panic!("duplicate key in fixture"),
            }
        }
        table
    }

    /// Invariant: with no collisions, a key lands on `hash % capacity`.
    #[test]
    fn probe_lands_on_base_index_without_collision() {
        let table = table_with(11, &[(3, 30)]);
        assert_eq!(table.find(3, |k| *k == 3), Some(3));
    }

    /// Invariant: colliding keys follow the quadratic sequence
    /// base, base+1, base+4, base+9, ... modulo capacity.
    #[test]
    fn probe_walks_quadratic_sequence_on_collision() {
        // Keys 3, 14, 25 all hash to base index 3 in an 11-slot table.
        let table = table_with(11, &[(3, 0), (14, 1), (25, 2)]);
        assert_eq!(table.find(3, |k| *k == 3), Some(3));
        assert_eq!(table.find(14, |k| *k == 14), Some(4)); // 3 + 1
        assert_eq!(table.find(25, |k| *k == 25), Some(7)); // 3 + 4
    }

    /// Invariant: a scan for a missing key resolves to the first tombstone
    /// on its probe path, not the later empty slot.
    #[test]
    fn free_slot_prefers_first_tombstone() {
        let mut table = table_with(11, &[(3, 0), (14, 1)]);
        let vacated = table.vacate(3).expect("slot 3 occupied");
        assert_eq!(vacated, (3, 0));

        // Key 25 shares base index 3: the scan passes the tombstone at 3,
        // the live entry at 4, and stops at the empty slot 7 -- but the
        // insertion point must be the remembered tombstone.
        match table.probe(25, |k| *k == 25) {
            Probe::Free(index) => assert_eq!(index, 3),
            Probe::Hit(_) => panic!("key 25 is not in the table"),
        }
    }

    /// Invariant: a scan for a present key runs through tombstones rather
    /// than stopping at them.
    #[test]
    fn lookup_probes_through_tombstones() {
        let mut table = table_with(11, &[(3, 0), (14, 1), (25, 2)]);
        table.vacate(3).expect("slot 3 occupied");
        table.vacate(4).expect("slot 4 occupied");
        assert_eq!(table.find(25, |k| *k == 25), Some(7));
    }

    /// Invariant: occupy over a tombstone trades the tombstone counter for
    /// the occupied counter; vacate does the reverse.
    #[test]
    fn counters_track_slot_states() {
        let mut table = table_with(11, &[(1, 10), (2, 20)]);
        assert_eq!((table.len(), table.used()), (2, 2));

        table.vacate(1).expect("slot 1 occupied");
        assert_eq!((table.len(), table.used()), (1, 2));

        match table.probe(12, |k| *k == 12) {
            // Key 12 has base index 1: reuses the tombstone.
            Probe::Free(index) => {
                assert_eq!(index, 1);
                table.occupy(index, 12, 120);
            }
            Probe::Hit(_) => panic!("key 12 is not in the table"),
        }
        assert_eq!((table.len(), table.used()), (2, 2));
    }

    /// Invariant: vacate on an empty or tombstone slot is a no-op.
    #[test]
    fn vacate_non_occupied_is_noop() {
        let mut table = table_with(11, &[(5, 50)]);
        assert!(table.vacate(0).is_none());
        table.vacate(5).expect("slot 5 occupied");
        assert!(table.vacate(5).is_none());
        assert_eq!(table.len(), 0);
        assert_eq!(table.used(), 1);
    }

    /// Invariant: entries() and next_occupied() walk ascending slot order
    /// and skip everything that is not occupied.
    #[test]
    fn iteration_skips_empty_and_tombstones() {
        let mut table = table_with(11, &[(2, 20), (5, 50), (8, 80)]);
        table.vacate(5).expect("slot 5 occupied");

        let seen: Vec<(usize, u64)> = table.entries().map(|(i, k, _)| (i, *k)).collect();
        assert_eq!(seen, vec![(2, 2), (8, 8)]);

        assert_eq!(table.next_occupied(0), Some(2));
        assert_eq!(table.next_occupied(3), Some(8));
        assert_eq!(table.next_occupied(9), None);
    }
}
