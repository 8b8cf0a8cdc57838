//! Spec §8 properties 1, 3, 4, 5: every table variant must agree with a
//! `std::collections::HashMap` oracle over any sequence of operations, must
//! never produce a phantom key, must round-trip insert/get/remove, and must
//! make removal idempotent.

use std::collections::HashMap;

use proptest::prelude::*;

use hashtables_core::{QuadraticMap, RobinHoodMap, SimdMap};

#[derive(Clone, Debug)]
enum Op {
    Emplace(u16, u32),
    Remove(u16),
    Get(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u16..64, any::<u32>()).prop_map(|(k, v)| Op::Emplace(k, v)),
        (0u16..64).prop_map(Op::Remove),
        (0u16..64).prop_map(Op::Get),
    ]
}

fn apply_and_compare_dense(ops: &[Op]) {
    let mut table: SimdMap<u16, u32> = SimdMap::new();
    let mut oracle: HashMap<u16, u32> = HashMap::new();
    for op in ops {
        match *op {
            Op::Emplace(k, v) => {
                table.emplace(k, v);
                oracle.insert(k, v);
            }
            Op::Remove(k) => {
                let removed = table.remove(&k);
                let expected = oracle.remove(&k);
                assert_eq!(removed, expected, "remove({k}) diverged from oracle");
            }
            Op::Get(_) => {}
        }
        for k in 0u16..64 {
            assert_eq!(table.get(&k), oracle.get(&k), "get({k}) diverged from oracle");
        }
    }
    assert_eq!(table.len(), oracle.len());
}

fn apply_and_compare_robin_hood(ops: &[Op]) {
    let mut table: RobinHoodMap<u16, u32> = RobinHoodMap::new();
    let mut oracle: HashMap<u16, u32> = HashMap::new();
    for op in ops {
        match *op {
            Op::Emplace(k, v) => {
                table.emplace(k, v);
                oracle.insert(k, v);
            }
            Op::Remove(k) => {
                let removed = table.remove(&k);
                let expected = oracle.remove(&k);
                assert_eq!(removed, expected, "remove({k}) diverged from oracle");
            }
            Op::Get(_) => {}
        }
        for k in 0u16..64 {
            assert_eq!(table.get(&k), oracle.get(&k), "get({k}) diverged from oracle");
        }
    }
    assert_eq!(table.len(), oracle.len());
}

fn apply_and_compare_quadratic(ops: &[Op]) {
    let mut table: QuadraticMap<u16, u32> = QuadraticMap::new();
    let mut oracle: HashMap<u16, u32> = HashMap::new();
    for op in ops {
        match *op {
            Op::Emplace(k, v) => {
                table.emplace(k, v);
                oracle.insert(k, v);
            }
            Op::Remove(k) => {
                let removed = table.remove(&k);
                let expected = oracle.remove(&k);
                assert_eq!(removed, expected, "remove({k}) diverged from oracle");
            }
            Op::Get(_) => {}
        }
        for k in 0u16..64 {
            assert_eq!(table.get(&k), oracle.get(&k), "get({k}) diverged from oracle");
        }
    }
    assert_eq!(table.len(), oracle.len());
}

proptest! {
    #[test]
    fn dense_matches_hashmap_oracle(ops in prop::collection::vec(op_strategy(), 0..300)) {
        apply_and_compare_dense(&ops);
    }

    #[test]
    fn robin_hood_matches_hashmap_oracle(ops in prop::collection::vec(op_strategy(), 0..300)) {
        apply_and_compare_robin_hood(&ops);
    }

    #[test]
    fn quadratic_matches_hashmap_oracle(ops in prop::collection::vec(op_strategy(), 0..300)) {
        apply_and_compare_quadratic(&ops);
    }
}

#[test]
fn round_trip_every_key_dense() {
    let mut map: SimdMap<u32, u32> = SimdMap::new();
    for k in 0..500u32 {
        map.emplace(k, k * 7);
        assert_eq!(map.get(&k), Some(&(k * 7)));
        map.remove(&k);
        assert_eq!(map.get(&k), None);
    }
}

#[test]
fn idempotent_removal_dense() {
    let mut map: SimdMap<&str, u32> = SimdMap::new();
    map.emplace("a", 1);
    assert_eq!(map.remove(&"a"), Some(1));
    assert_eq!(map.remove(&"a"), None);
    assert_eq!(map.len(), 0);
}

#[test]
fn idempotent_removal_robin_hood() {
    let mut map: RobinHoodMap<&str, u32> = RobinHoodMap::new();
    map.emplace("a", 1);
    assert_eq!(map.remove(&"a"), Some(1));
    assert_eq!(map.remove(&"a"), None);
    assert_eq!(map.len(), 0);
}

#[test]
fn idempotent_removal_quadratic() {
    let mut map: QuadraticMap<&str, u32> = QuadraticMap::new();
    map.emplace("a", 1);
    assert_eq!(map.remove(&"a"), Some(1));
    assert_eq!(map.remove(&"a"), None);
    assert_eq!(map.len(), 0);
}

#[test]
fn no_phantom_keys_after_clear() {
    let mut map: SimdMap<u32, u32> = SimdMap::new();
    for k in 0..100u32 {
        map.emplace(k, k);
    }
    map.clear();
    for k in 0..100u32 {
        assert_eq!(map.get(&k), None);
    }
    assert_eq!(map.len(), 0);
}
