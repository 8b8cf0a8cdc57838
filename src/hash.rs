//! The hasher interface.
//!
//! The core only ever needs a 32-bit hash and an equality check; everything
//! about *how* those are produced is pluggable. `MapHasher` is a first-class
//! trait so that every table variant (single-threaded and concurrent)
//! shares one definition instead of each reaching for `BuildHasher`
//! directly.

use std::hash::{BuildHasher, Hash, Hasher};

/// Produces a 32-bit hash and an equality test for keys of type `K`.
///
/// Implementations must be deterministic and side-effect free; `eq` must be
/// reflexive, symmetric and transitive, and consistent with `hash`
/// (`eq(a, b) => hash(a) == hash(b)`). No cryptographic strength is implied
/// or required.
pub trait MapHasher<K: ?Sized> {
    fn hash(&self, key: &K) -> u32;
    fn eq(&self, a: &K, b: &K) -> bool;
}

/// Default hasher: FxHash, chosen for small keys. `std::hash::Hasher::finish`
/// only ever returns a `u64`, so the 32-bit hash the core wants is obtained
/// by folding the two halves together rather than truncating — truncation
/// alone would throw away entropy that the Fibonacci home mix depends on.
#[derive(Clone, Default)]
pub struct FxMapHasher {
    build: fxhash::FxBuildHasher,
}

impl<K: Hash + Eq + ?Sized> MapHasher<K> for FxMapHasher {
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        let mut state = self.build.build_hasher();
        key.hash(&mut state);
        let h = state.finish();
        ((h >> 32) as u32) ^ (h as u32)
    }

    #[inline]
    fn eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// A hasher that returns a fixed hash for every key, used to drive the
/// all-keys-collide scenario (spec scenario S4). Equality still delegates
/// to `PartialEq`, so the table remains correct — every key still probes
/// to the same home group and must walk the full chain to disambiguate.
#[cfg(any(test, feature = "test-util"))]
#[derive(Clone, Copy, Default)]
pub struct ConstHasher {
    pub fixed: u32,
}

#[cfg(any(test, feature = "test-util"))]
impl<K: Eq + ?Sized> MapHasher<K> for ConstHasher {
    #[inline]
    fn hash(&self, _key: &K) -> u32 {
        self.fixed
    }

    #[inline]
    fn eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}
