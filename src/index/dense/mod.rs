//! `SimdMap`, the SIMD-scanned dense hash table.
//!
//! A `cfg_if` selects the SSE2 `Group` implementation when the target
//! supports it, falling back to the portable SWAR implementation otherwise;
//! the raw probing machinery lives in `table`.

use cfg_if::cfg_if;

mod bitmask;
mod table;

cfg_if! {
    if #[cfg(all(
        target_feature = "sse2",
        any(target_arch = "x86", target_arch = "x86_64"),
        not(miri),
    ))] {
        #[path = "sse2.rs"]
        mod imp;
    } else {
        #[path = "generic.rs"]
        mod imp;
    }
}

use crate::config::{clamp_load_factor, MapConfig};
use crate::hash::{FxMapHasher, MapHasher};
use crate::index::EmplaceResult;
use table::RawTable;

/// A SIMD-scanned, open-addressed hash table (spec.md C2–C4).
///
/// Every operation — `emplace`, `get`, `update`, `remove` — walks the same
/// triangular probe sequence over 16-slot groups, comparing a 7-bit
/// fingerprint byte against all 16 slots in a group at once rather than
/// one key at a time. This is the crate's default table variant: use it
/// unless you specifically need Robin-Hood's bounded worst-case probe
/// length ([`crate::index::robin_hood::RobinHoodMap`]), quadratic
/// probing's simplicity ([`crate::index::quadratic::QuadraticMap`]), or
/// lock-free concurrent access ([`crate::index::concurrent::ConcurrentMap`]).
pub struct SimdMap<K, V, H = FxMapHasher> {
    table: RawTable<(K, V)>,
    hasher: H,
    load_factor: f64,
    probe_log: bool,
}

impl<K, V> SimdMap<K, V, FxMapHasher>
where
    K: std::hash::Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }
}

impl<K, V> Default for SimdMap<K, V, FxMapHasher>
where
    K: std::hash::Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> SimdMap<K, V, H>
where
    H: MapHasher<K>,
{
    pub fn with_config(config: MapConfig<H>) -> Self {
        let load_factor = clamp_load_factor(config.load_factor_value());
        let capacity = config.capacity_value();
        let probe_log = config.probe_log_enabled();
        let hasher = config.into_hasher();
        Self {
            table: RawTable::with_capacity(capacity, load_factor),
            hasher,
            load_factor,
            probe_log,
        }
    }

    #[inline]
    fn rehash_closure<'a>(hasher: &'a H) -> impl Fn(&(K, V)) -> u32 + 'a {
        move |(k, _)| hasher.hash(k)
    }

    /// Inserts `key`/`value`, replacing and returning any prior value for
    /// `key` (spec.md §4.4).
    ///
    /// The duplicate check and the fresh insertion are two separate calls
    /// into the raw table — the same split real hashbrown uses — rather
    /// than one combined "probe, then insert-or-update" call: an
    /// equality closure borrowing `key` and a move of `key` into the
    /// stored `(K, V)` tuple cannot be live in the same call.
    pub fn emplace(&mut self, key: K, value: V) -> EmplaceResult<V> {
        let hash = self.hasher.hash(&key);
        let hasher = &self.hasher;
        if let Some(bucket) = self.table.find(hash, |(k, _)| hasher.eq(k, &key)) {
            let (_, old) = unsafe { std::mem::replace(bucket.as_mut(), (key, value)) };
            return EmplaceResult::Updated(old);
        }
        let hasher = &self.hasher;
        self.table
            .insert(hash, (key, value), Self::rehash_closure(hasher));
        EmplaceResult::Inserted
    }

    /// Looks up `key`. `O(1)` expected, `O(n)` worst case under adversarial
    /// collisions (spec.md scenario S4).
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hasher.hash(key);
        if self.probe_log {
            log::trace!("dense get: hash={hash:#x} capacity={}", self.table.capacity());
        }
        self.table
            .find(hash, |(k, _)| self.hasher.eq(k, key))
            .map(|bucket| unsafe { &bucket.as_ref().1 })
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hasher.hash(key);
        self.table
            .find(hash, |(k, _)| self.hasher.eq(k, key))
            .map(|bucket| unsafe { &mut bucket.as_mut().1 })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Fallible counterpart to `get`/`Index`: returns `MapError::KeyNotFound`
    /// instead of `None` (spec.md §7's typed-error channel, exposed
    /// alongside the `Option` one for callers that prefer `?`).
    pub fn try_get(&self, key: &K) -> crate::error::Result<&V> {
        self.get(key).ok_or(crate::error::MapError::KeyNotFound)
    }

    /// The slot index `key` currently occupies, if present. Cheap: the
    /// probe that finds it is the same one `get` already pays for (spec.md
    /// §9 Open Question, resolved in favor of exposing it on every
    /// single-threaded variant).
    pub fn index_of(&self, key: &K) -> Option<usize> {
        let hash = self.hasher.hash(key);
        self.table.find_index(hash, |(k, _)| self.hasher.eq(k, key))
    }

    /// Updates the value at an existing `key` in place, returning
    /// `MapError::KeyNotFound` if it is absent (spec.md §4.4, §7).
    pub fn update(&mut self, key: &K, f: impl FnOnce(&mut V)) -> crate::error::Result<()> {
        match self.get_mut(key) {
            Some(v) => {
                f(v);
                Ok(())
            }
            None => Err(crate::error::MapError::KeyNotFound),
        }
    }

    /// Returns a reference to the value for `key`, inserting
    /// `V::default()` first if it is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        K: Clone,
        V: Default,
    {
        let hash = self.hasher.hash(&key);
        let hasher = &self.hasher;
        if self
            .table
            .find(hash, |(k, _)| hasher.eq(k, &key))
            .is_none()
        {
            self.table
                .insert(hash, (key.clone(), V::default()), Self::rehash_closure(hasher));
        }
        let hasher = &self.hasher;
        unsafe {
            &mut self
                .table
                .find(hash, |(k, _)| hasher.eq(k, &key))
                .expect("just inserted")
                .as_mut()
                .1
        }
    }

    /// Removes `key`, returning its value if present. May trigger an
    /// in-place rehash once the tombstone budget is exceeded (spec.md
    /// §4.4.3).
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let hash = self.hasher.hash(key);
        let hasher = &self.hasher;
        self.table
            .remove(hash, |(k, _)| hasher.eq(k, key), Self::rehash_closure(hasher))
            .map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of live tombstones currently pending an in-place rehash.
    pub fn tombstone_len(&self) -> usize {
        self.table.tombstone_len()
    }

    /// Iterates over every live entry. Order is unspecified and tied to
    /// the table's current physical layout (spec.md §4.10).
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        unsafe { self.table.iter().map(|b| {
            let (k, v) = b.as_ref();
            (k, v)
        }) }
    }
}

impl<K, V, H> std::ops::Index<&K> for SimdMap<K, V, H>
where
    H: MapHasher<K>,
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

/// `map[key] = v` updates an existing entry in place; it does NOT insert
/// (spec.md §6 distinguishes the indexer from `emplace` on exactly this
/// point). Panics on an absent key, mirroring `Index`'s own panicking
/// behavior — `IndexMut::index_mut`'s signature has no error channel, so
/// `try_get`/`get_mut` remain the fallible path.
impl<K, V, H> std::ops::IndexMut<&K> for SimdMap<K, V, H>
where
    H: MapHasher<K>,
{
    fn index_mut(&mut self, key: &K) -> &mut V {
        self.get_mut(key).expect("key not found")
    }
}
