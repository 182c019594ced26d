#![cfg(test)]

// Property tests for ProbeHashMap kept inside the crate so they can scan
// the raw slot array for structural invariants the public API hides.

use crate::prime::is_prime;
use crate::probe_hash_map::ProbeHashMap;
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, the pool shrinks, and op lists shrink in length.
#[derive(Clone, Copy, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(usize),
    Mutate(usize, i32),
    Retain(i32),
    Iterate,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Get),
            1 => idx.clone().prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => any::<i32>().prop_map(OpI::Retain),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Structural post-conditions checked after every op via the raw slot scan:
// no two occupied slots share a key, the occupied count matches len(),
// capacity is prime and at least the construction floor.
fn check_structure<S: BuildHasher>(map: &ProbeHashMap<String, i32, S>) {
    let mut seen = BTreeSet::new();
    let mut occupied = 0;
    for (_, key, _) in map.raw().entries() {
        assert!(seen.insert(key.clone()), "duplicate occupied key {key:?}");
        occupied += 1;
    }
    assert_eq!(occupied, map.len(), "len() drifted from the slot scan");
    assert!(is_prime(map.capacity()), "capacity {} not prime", map.capacity());
    assert!(map.raw().used() >= map.len());
}

fn run_state_machine<S: BuildHasher>(
    mut sut: ProbeHashMap<String, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    let initial_capacity = sut.capacity();
    let mut last_capacity = sut.capacity();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let previous = sut.insert(k.clone(), v);
                prop_assert_eq!(previous, model.insert(k, v));
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.remove(k.as_str()), model.remove(k));
            }
            OpI::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k.as_str()), model.get(k));
            }
            OpI::Contains(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.contains_key(k.as_str()), model.contains_key(k));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                match (sut.get_mut(k.as_str()), model.get_mut(k)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.saturating_add(d);
                        *mv = mv.saturating_add(d);
                    }
                    (None, None) => {}
                    _ => prop_assert!(false, "presence mismatch for {:?}", k),
                }
            }
            OpI::Retain(pivot) => {
                sut.retain(|_, v| *v <= pivot);
                model.retain(|_, v| *v <= pivot);
            }
            OpI::Iterate => {
                let sut_pairs: BTreeSet<(String, i32)> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let model_pairs: BTreeSet<(String, i32)> =
                    model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(sut_pairs, model_pairs);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), initial_capacity);
            }
        }

        // Capacity never shrinks except through clear, and never leaves the
        // primes.
        if sut.capacity() < last_capacity {
            prop_assert!(matches!(op, OpI::Clear));
        }
        last_capacity = sut.capacity();

        check_structure(&sut);
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap,
// with a full slot scan after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(ProbeHashMap::new(), pool, ops)?;
    }
}

// Collision variant: a constant hasher drives every key down the same
// probe sequence, stressing the tombstone tie-break and rehash paths.
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
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(ProbeHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Property: delete-heavy churn on a handful of keys terminates and stays
// correct. Without tombstones counting toward the growth threshold, this
// workload fills every probe path with tombstones and the scan never ends.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_churn_terminates(rounds in 1usize..400, keys in 1usize..4) {
        let mut map: ProbeHashMap<String, i32> = ProbeHashMap::with_capacity(11);
        for round in 0..rounds {
            let key = format!("k{}", round % keys);
            map.insert(key.clone(), round as i32);
            prop_assert_eq!(map.get(key.as_str()), Some(&(round as i32)));
            map.remove(key.as_str());
            prop_assert_eq!(map.get(key.as_str()), None);
        }
        prop_assert!(map.is_empty());
        prop_assert!(is_prime(map.capacity()));
    }
}

// Property: whenever an insertion crosses the threshold, the capacity
// after it is the next prime at or above double the capacity before it.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_growth_is_doubled_prime(count in 1usize..200) {
        let mut map: ProbeHashMap<usize, usize> = ProbeHashMap::with_capacity(11);
        for i in 0..count {
            let before = map.capacity();
            map.insert(i, i);
            let after = map.capacity();
            if after != before {
                prop_assert_eq!(after, crate::prime::next_prime(before * 2));
            }
        }
        prop_assert_eq!(map.len(), count);
    }
}
