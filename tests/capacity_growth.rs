//! Spec §8 property 6 and scenarios S1/S2/S4: capacity tracks
//! `next_pow2(ceil(N/load_factor))` within one doubling, and an adversarial
//! constant-hash workload still disambiguates every key by equality.

use hashtables_core::{hash::ConstHasher, MapConfig, QuadraticMap, RobinHoodMap, SimdMap};

/// S1: capacity=16, LF=0.5, emplace 1..=8.
#[test]
fn s1_no_resize_below_load_factor() {
    let config = MapConfig::new().capacity(16).load_factor(0.5);
    let mut map: SimdMap<u32, u32> = SimdMap::with_config(config);
    for i in 1..=8u32 {
        map.emplace(i, i * 10);
    }
    assert_eq!(map.len(), 8);
    assert_eq!(map.capacity(), 16);
    for i in 1..=8u32 {
        assert_eq!(map.get(&i), Some(&(i * 10)));
    }
    assert_eq!(map.get(&9), None);
}

/// S2: capacity=16, LF=0.75, emplace 1..=13 triggers a resize to 32.
#[test]
fn s2_resize_doubles_capacity() {
    let config = MapConfig::new().capacity(16).load_factor(0.75);
    let mut map: SimdMap<u32, u32> = SimdMap::with_config(config);
    for i in 1..=13u32 {
        map.emplace(i, i);
    }
    assert_eq!(map.capacity(), 32);
    for i in 1..=13u32 {
        assert_eq!(map.get(&i), Some(&i));
    }
}

/// S4: every key hashes to the same bucket; all 1000 must still be
/// retrievable, and capacity must have grown by successive doublings to
/// satisfy the load factor.
#[test]
fn s4_all_keys_collide_dense() {
    let config = MapConfig::new()
        .capacity(16)
        .load_factor(0.75)
        .hasher(ConstHasher { fixed: 42 });
    let mut map: SimdMap<u32, u32, _> = SimdMap::with_config(config);
    for i in 1..=1000u32 {
        map.emplace(i, i);
    }
    assert_eq!(map.len(), 1000);
    for i in 1..=1000u32 {
        assert_eq!(map.get(&i), Some(&i));
    }
    assert!(map.capacity().is_power_of_two());
    assert!(map.capacity() as f64 >= 1000.0 / 0.9);
}

#[test]
fn s4_all_keys_collide_robin_hood() {
    let config = MapConfig::new()
        .capacity(16)
        .load_factor(0.75)
        .hasher(ConstHasher { fixed: 42 });
    let mut map: RobinHoodMap<u32, u32, _> = RobinHoodMap::with_config(config);
    for i in 1..=1000u32 {
        map.emplace(i, i);
    }
    assert_eq!(map.len(), 1000);
    for i in 1..=1000u32 {
        assert_eq!(map.get(&i), Some(&i));
    }
}

#[test]
fn s4_all_keys_collide_quadratic() {
    let config = MapConfig::new()
        .capacity(16)
        .load_factor(0.75)
        .hasher(ConstHasher { fixed: 42 });
    let mut map: QuadraticMap<u32, u32, _> = QuadraticMap::with_config(config);
    for i in 1..=1000u32 {
        map.emplace(i, i);
    }
    assert_eq!(map.len(), 1000);
    for i in 1..=1000u32 {
        assert_eq!(map.get(&i), Some(&i));
    }
}

#[test]
fn capacity_grows_within_one_doubling_of_ceil_n_over_lf() {
    let config = MapConfig::new().capacity(16).load_factor(0.875);
    let mut map: SimdMap<u32, u32> = SimdMap::with_config(config);
    for i in 0..3000u32 {
        map.emplace(i, i);
    }
    assert_eq!(map.len(), 3000);
    let expected_min = ((3000.0f64 / 0.875).ceil() as usize).next_power_of_two();
    assert!(map.capacity() >= expected_min);
    assert!(map.capacity() <= expected_min * 2);
}
