//! `QuadraticMap`, the plain triangular-probed tombstone table.
//!
//! Shares the same fingerprint/home mixing and triangular probe sequence
//! with [`super::dense::SimdMap`], but tests one slot at a time instead of
//! scanning a 16-wide group with SIMD — the simpler, pre-SIMD open
//! addressing style (quadratic probing plus tombstones, no group-parallel
//! comparison). Slower than the dense table in practice, but easier to
//! read, and it shares the dense table's exact external contract.

use crate::config::{clamp_load_factor, MapConfig};
use crate::hash::{FxMapHasher, MapHasher};
use crate::index::{h2, home, max_live_before_resize, tombstone_budget, EmplaceResult};

/// Minimum capacity; single-threaded variants accept 8.
pub const MIN_CAPACITY: u32 = 8;

#[derive(Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Tombstone,
    Live(u8),
}

struct Slot<K, V> {
    state: SlotState,
    entry: Option<(K, V)>,
}

impl<K, V> Slot<K, V> {
    fn empty() -> Self {
        Self {
            state: SlotState::Empty,
            entry: None,
        }
    }
}

/// Triangular-number probe sequence, identical in shape to the dense
/// table's `ProbeSeq` but advancing one slot per step instead of one
/// 16-slot group per step.
struct ProbeSeq {
    mask: usize,
    pos: usize,
    stride: usize,
}

impl Iterator for ProbeSeq {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.stride > self.mask {
            return None;
        }
        let result = self.pos;
        self.stride += 1;
        self.pos = (self.pos + self.stride) & self.mask;
        Some(result)
    }
}

/// An open-addressed, triangular-quadratic-probed hash table with
/// tombstone deletion. Shares `SimdMap`'s public contract
/// (`emplace`/`get`/`update`/`remove`/`iter`) but without SIMD group
/// scanning; use it as a simpler reference implementation or where the
/// target lacks SSE2 and the portable SWAR fallback isn't worth the extra
/// code path.
pub struct QuadraticMap<K, V, H = FxMapHasher> {
    slots: Vec<Slot<K, V>>,
    mask: usize,
    shift: u32,
    len: usize,
    tombstones: usize,
    tombstone_budget: usize,
    load_factor: f64,
    hasher: H,
    probe_log: bool,
}

impl<K, V> QuadraticMap<K, V, FxMapHasher>
where
    K: std::hash::Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_config(MapConfig::default().capacity(MIN_CAPACITY))
    }
}

impl<K, V> Default for QuadraticMap<K, V, FxMapHasher>
where
    K: std::hash::Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> QuadraticMap<K, V, H>
where
    H: MapHasher<K>,
{
    pub fn with_config(config: MapConfig<H>) -> Self {
        let load_factor = clamp_load_factor(config.load_factor_value());
        let capacity = (config.capacity_value() as usize)
            .max(MIN_CAPACITY as usize)
            .next_power_of_two();
        let probe_log = config.probe_log_enabled();
        let hasher = config.into_hasher();
        Self::allocate(capacity, load_factor, hasher, probe_log)
    }

    fn allocate(capacity: usize, load_factor: f64, hasher: H, probe_log: bool) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::empty);
        Self {
            slots,
            mask: capacity - 1,
            shift: 32 - capacity.trailing_zeros(),
            len: 0,
            tombstones: 0,
            tombstone_budget: tombstone_budget(capacity, load_factor),
            load_factor,
            hasher,
            probe_log,
        }
    }

    #[inline]
    fn probe_seq(&self, hash: u32) -> ProbeSeq {
        ProbeSeq {
            mask: self.mask,
            pos: home(hash, self.shift) & self.mask,
            stride: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn tombstone_len(&self) -> usize {
        self.tombstones
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::empty();
        }
        self.len = 0;
        self.tombstones = 0;
    }

    /// Inserts `key`/`value`, following the same scan-for-match /
    /// track-first-tombstone / insert-at-empty-or-reused-tombstone
    /// algorithm as `SimdMap::emplace`, just one slot per step instead of
    /// one 16-slot group.
    pub fn emplace(&mut self, key: K, value: V) -> EmplaceResult<V> {
        if self.len + 1 > max_live_before_resize(self.capacity(), self.load_factor) {
            self.resize(self.capacity() * 2);
        }
        let hash = self.hasher.hash(&key);
        let target_h2 = h2(hash);
        let mut first_tombstone: Option<usize> = None;
        for pos in self.probe_seq(hash) {
            match self.slots[pos].state {
                SlotState::Live(h) if h == target_h2 => {
                    let (k, _) = self.slots[pos].entry.as_ref().expect("live slot");
                    if self.hasher.eq(k, &key) {
                        let (_, old_v) = self.slots[pos].entry.as_mut().expect("live slot");
                        let prev = std::mem::replace(old_v, value);
                        return EmplaceResult::Updated(prev);
                    }
                }
                SlotState::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(pos);
                    }
                }
                SlotState::Empty => {
                    let target = first_tombstone.unwrap_or(pos);
                    self.slots[target] = Slot {
                        state: SlotState::Live(target_h2),
                        entry: Some((key, value)),
                    };
                    self.len += 1;
                    if first_tombstone.is_some() {
                        self.tombstones -= 1;
                    }
                    return EmplaceResult::Inserted;
                }
                SlotState::Live(_) => {}
            }
        }
        unreachable!("probe_seq always terminates at an EMPTY slot");
    }

    fn find_slot(&self, key: &K) -> Option<usize> {
        let hash = self.hasher.hash(key);
        if self.probe_log {
            log::trace!("quadratic get: hash={hash:#x} capacity={}", self.capacity());
        }
        let target_h2 = h2(hash);
        for pos in self.probe_seq(hash) {
            match self.slots[pos].state {
                SlotState::Live(h) if h == target_h2 => {
                    let (k, _) = self.slots[pos].entry.as_ref().expect("live slot");
                    if self.hasher.eq(k, key) {
                        return Some(pos);
                    }
                }
                SlotState::Empty => return None,
                _ => {}
            }
        }
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_slot(key)
            .and_then(|pos| self.slots[pos].entry.as_ref().map(|(_, v)| v))
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let pos = self.find_slot(key)?;
        self.slots[pos].entry.as_mut().map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find_slot(key).is_some()
    }

    /// Fallible counterpart to `get`/`Index`, for callers that want a typed
    /// error instead of an `Option`.
    pub fn try_get(&self, key: &K) -> crate::error::Result<&V> {
        self.get(key).ok_or(crate::error::MapError::KeyNotFound)
    }

    /// The slot index `key` currently occupies, if present.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.find_slot(key)
    }

    pub fn update(&mut self, key: &K, f: impl FnOnce(&mut V)) -> crate::error::Result<()> {
        match self.get_mut(key) {
            Some(v) => {
                f(v);
                Ok(())
            }
            None => Err(crate::error::MapError::KeyNotFound),
        }
    }

    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        K: Clone,
        V: Default,
    {
        if self.find_slot(&key).is_none() {
            self.emplace(key.clone(), V::default());
        }
        let pos = self.find_slot(&key).expect("just inserted");
        self.slots[pos]
            .entry
            .as_mut()
            .map(|(_, v)| v)
            .expect("live slot")
    }

    /// Marks the matching slot as a tombstone. No back-shift — unlike
    /// Robin-Hood, a quadratic probe chain has no PSL ordering to exploit,
    /// so a tombstone (not a hole) must keep later entries' probe chains
    /// intact. Triggers an in-place rehash once the tombstone budget is
    /// exceeded.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let pos = self.find_slot(key)?;
        let (_, value) = self.slots[pos].entry.take().expect("live slot");
        self.slots[pos].state = SlotState::Tombstone;
        self.len -= 1;
        self.tombstones += 1;
        if self.tombstones >= self.tombstone_budget {
            self.resize(self.capacity());
        }
        Some(value)
    }

    /// Rebuilds at `new_capacity` (equal to the current capacity for an
    /// in-place rehash, doubled for a growth resize), turning every
    /// tombstone back into `Empty` and re-probing every live entry to its
    /// canonical position under the new shift.
    fn resize(&mut self, new_capacity: usize) {
        log::debug!(
            "quadratic table resize: {} -> {} buckets ({} live, {} tombstones)",
            self.capacity(),
            new_capacity,
            self.len,
            self.tombstones
        );
        let old_slots = std::mem::replace(&mut self.slots, Vec::new());
        self.slots.resize_with(new_capacity, Slot::empty);
        self.mask = new_capacity - 1;
        self.shift = 32 - new_capacity.trailing_zeros();
        self.tombstone_budget = tombstone_budget(new_capacity, self.load_factor);
        self.tombstones = 0;
        self.len = 0;
        for slot in old_slots {
            if let Some((k, v)) = slot.entry {
                let hash = self.hasher.hash(&k);
                let target_h2 = h2(hash);
                for pos in self.probe_seq(hash) {
                    if matches!(self.slots[pos].state, SlotState::Empty) {
                        self.slots[pos] = Slot {
                            state: SlotState::Live(target_h2),
                            entry: Some((k, v)),
                        };
                        self.len += 1;
                        break;
                    }
                }
            }
        }
    }

    /// Iterates over every live entry. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .map(|(k, v)| (k, v))
    }
}

impl<K, V, H> std::ops::Index<&K> for QuadraticMap<K, V, H>
where
    H: MapHasher<K>,
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

/// See `SimdMap`'s `IndexMut` impl: updates in place, never inserts.
impl<K, V, H> std::ops::IndexMut<&K> for QuadraticMap<K, V, H>
where
    H: MapHasher<K>,
{
    fn index_mut(&mut self, key: &K) -> &mut V {
        self.get_mut(key).expect("key not found")
    }
}
