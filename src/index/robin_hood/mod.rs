//! C5 — Robin-Hood linear probing with PSL-based displacement.
//!
//! Shares C1's hasher contract and C2's Fibonacci home-index mixing with
//! [`super::dense::SimdMap`], but probes linearly instead of by SIMD group
//! and tracks one PSL (Probe-Sequence-Length) value per slot instead of a
//! fingerprint, following the classic Robin-Hood displacement rule sketched
//! in this pack's `p5chmitz-dsa-rust` associative probing reference: on
//! insert, a richer (lower-PSL) incumbent yields its slot to a poorer
//! (higher-PSL) newcomer, and removal back-shifts the tail of the chain
//! rather than leaving a tombstone.

use crate::config::{validate_load_factor, MapConfig};
use crate::hash::{FxMapHasher, MapHasher};
use crate::index::{max_live_before_resize, EmplaceResult};

/// `0` means empty. A live slot's PSL is stored as `distance + 1` so the
/// zero value is unambiguous. Widened past a byte: an adversarial
/// constant-hash workload puts every key in one contiguous chain, so PSL
/// tracks the live count, not `log2(capacity)`.
const EMPTY_PSL: u32 = 0;

struct Slot<K, V> {
    psl: u32,
    entry: Option<(K, V)>,
}

impl<K, V> Slot<K, V> {
    fn empty() -> Self {
        Self {
            psl: EMPTY_PSL,
            entry: None,
        }
    }
}

/// A linear-probed hash table with Robin-Hood displacement (spec.md C5).
///
/// Worst-case probe length is bounded by `max_psl`, a capacity-indexed cap
/// (not a small constant) so an all-collide workload still terminates in
/// the same number of doublings as the dense table's unbounded (though
/// practically short) triangular chains — pick this variant when a
/// bounded-probe-length read path matters more than raw throughput.
pub struct RobinHoodMap<K, V, H = FxMapHasher> {
    slots: Vec<Slot<K, V>>,
    mask: usize,
    shift: u32,
    len: usize,
    max_psl: u32,
    load_factor: f64,
    hasher: H,
    probe_log: bool,
}

/// Minimum capacity for the Robin-Hood and quadratic variants (spec.md §6:
/// "single-threaded variants accept 8 with internal bump to 8 minimum").
pub const MIN_CAPACITY: u32 = 8;

/// spec.md §4.5 caps PSL at `log2(capacity)`, which fits a well-distributed
/// hash: it bounds worst-case lookup length to a handful of probes. It is
/// the wrong trigger for *growth*, though — a single colliding bucket forms
/// one contiguous chain whose length tracks the live count, not the
/// capacity, so a log2(capacity)-keyed cap forces a fresh doubling for
/// every few colliding keys and blows up exponentially long before the
/// load factor would otherwise call for it. Capacity-indexed instead
/// (spec.md §4.5's parenthetical "or a capacity-indexed table for high
/// load factors"): half the table, so the cap is only ever reached once
/// capacity itself already needs to grow to keep the load factor, same as
/// the dense and quadratic siblings.
#[inline]
fn capacity_to_max_psl(capacity: usize) -> u32 {
    ((capacity / 2).max(4)) as u32
}

impl<K, V> RobinHoodMap<K, V, FxMapHasher>
where
    K: std::hash::Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_config(MapConfig::default().capacity(MIN_CAPACITY))
    }
}

impl<K, V> Default for RobinHoodMap<K, V, FxMapHasher>
where
    K: std::hash::Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> RobinHoodMap<K, V, H>
where
    H: MapHasher<K>,
{
    pub fn with_config(config: MapConfig<H>) -> Self {
        let load_factor = validate_load_factor(config.load_factor_value());
        let capacity = (config.capacity_value() as usize)
            .max(MIN_CAPACITY as usize)
            .next_power_of_two();
        let probe_log = config.probe_log_enabled();
        let hasher = config.into_hasher();
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::empty);
        Self {
            slots,
            mask: capacity - 1,
            shift: 32 - (capacity.trailing_zeros()),
            len: 0,
            max_psl: capacity_to_max_psl(capacity),
            load_factor,
            hasher,
            probe_log,
        }
    }

    #[inline]
    fn home(&self, hash: u32) -> usize {
        crate::index::home(hash, self.shift) & self.mask
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

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::empty();
        }
        self.len = 0;
    }

    /// Inserts `key`/`value` using Robin-Hood displacement, returning any
    /// prior value for `key`. A chain that would exceed `max_psl` grows the
    /// table (doubling capacity) and resumes placing whatever entry is
    /// still in hand — every entry displaced before the overflow has
    /// already been committed to the table, so the retry only ever needs
    /// to find a home for the single entry the probe was carrying when it
    /// hit the cap.
    pub fn emplace(&mut self, key: K, value: V) -> EmplaceResult<V> {
        if self.len + 1 > max_live_before_resize(self.capacity(), self.load_factor) {
            self.grow();
        }
        let mut carry = (key, value);
        loop {
            match self.try_emplace(carry) {
                Ok(result) => return result,
                Err(leftover) => {
                    self.grow();
                    carry = leftover;
                }
            }
        }
    }

    /// One attempt at placing `carry` (and displacing along the way).
    /// Returns `Err(leftover)` if the probe chain would exceed `max_psl`
    /// before finding an empty slot, in which case the caller must grow
    /// the table and retry with `leftover`.
    fn try_emplace(&mut self, carry: (K, V)) -> Result<EmplaceResult<V>, (K, V)> {
        let hash = self.hasher.hash(&carry.0);
        let mut pos = self.home(hash);
        let mut dist: u32 = 0;
        let mut carry = carry;
        loop {
            let psl = self.slots[pos].psl;
            if psl == EMPTY_PSL {
                self.slots[pos] = Slot {
                    psl: dist + 1,
                    entry: Some(carry),
                };
                self.len += 1;
                return Ok(EmplaceResult::Inserted);
            }
            let is_match = {
                let (k, _) = self.slots[pos].entry.as_ref().expect("live slot");
                self.hasher.eq(k, &carry.0)
            };
            if is_match {
                let (_, old_v) = self.slots[pos].entry.as_mut().expect("live slot");
                let prev = std::mem::replace(old_v, carry.1);
                return Ok(EmplaceResult::Updated(prev));
            }
            let existing_dist = psl - 1;
            if existing_dist < dist {
                let displaced = self.slots[pos].entry.take().expect("live slot");
                self.slots[pos] = Slot {
                    psl: dist + 1,
                    entry: Some(carry),
                };
                carry = displaced;
                dist = existing_dist;
            }
            dist += 1;
            if dist >= self.max_psl {
                return Err(carry);
            }
            pos = (pos + 1) & self.mask;
        }
    }

    /// Doubles capacity and reinserts every live entry under the new
    /// shift/mask via `insert_unique`, which never bails on `max_psl` — the
    /// cap only gates `try_emplace`'s ordinary insert path, not the
    /// uniqueness-already-established rebuild.
    fn grow(&mut self) {
        log::debug!(
            "robin-hood table resize: {} -> {} buckets ({} live)",
            self.capacity(),
            self.capacity() * 2,
            self.len
        );
        let new_capacity = self.capacity() * 2;
        let old_slots = std::mem::replace(&mut self.slots, Vec::new());
        self.slots.resize_with(new_capacity, Slot::empty);
        self.mask = new_capacity - 1;
        self.shift = 32 - new_capacity.trailing_zeros();
        self.max_psl = capacity_to_max_psl(new_capacity);
        self.len = 0;
        for slot in old_slots {
            if let Some((k, v)) = slot.entry {
                self.insert_unique(k, v);
            }
        }
    }

    /// Robin-Hood insert without a duplicate check or a `max_psl` bail-out,
    /// used only while rebuilding during `grow()`, where uniqueness already
    /// holds and an empty slot is guaranteed to exist (the new capacity is
    /// double the old one, which already held every entry at the old load
    /// factor). Always terminates by finding that empty slot; never returns
    /// `Err` the way `try_emplace` can.
    fn insert_unique(&mut self, key: K, value: V) {
        let hash = self.hasher.hash(&key);
        let mut pos = self.home(hash);
        let mut dist: u32 = 0;
        let mut carry = (key, value);
        loop {
            let psl = self.slots[pos].psl;
            if psl == EMPTY_PSL {
                self.slots[pos] = Slot {
                    psl: dist + 1,
                    entry: Some(carry),
                };
                self.len += 1;
                return;
            }
            let existing_dist = psl - 1;
            if existing_dist < dist {
                let displaced = self.slots[pos].entry.take().expect("live slot");
                self.slots[pos] = Slot {
                    psl: dist + 1,
                    entry: Some(carry),
                };
                carry = displaced;
                dist = existing_dist;
            }
            dist += 1;
            pos = (pos + 1) & self.mask;
        }
    }

    /// Looks up `key`, exploiting the Robin-Hood invariant that PSLs along
    /// a probe chain are non-decreasing until the key's own slot: once the
    /// slot's displacement is smaller than ours, `key` cannot be present.
    pub fn get(&self, key: &K) -> Option<&V> {
        let pos = self.find_slot(key)?;
        self.slots[pos].entry.as_ref().map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let pos = self.find_slot(key)?;
        self.slots[pos].entry.as_mut().map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find_slot(key).is_some()
    }

    /// Fallible counterpart to `get`/`Index` (spec.md §7's typed-error
    /// channel, alongside the `Option` one).
    pub fn try_get(&self, key: &K) -> crate::error::Result<&V> {
        self.get(key).ok_or(crate::error::MapError::KeyNotFound)
    }

    /// The slot index `key` currently occupies, if present (spec.md §9
    /// Open Question, resolved in favor of exposing it).
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.find_slot(key)
    }

    fn find_slot(&self, key: &K) -> Option<usize> {
        let hash = self.hasher.hash(key);
        if self.probe_log {
            log::trace!("robin-hood get: hash={hash:#x} capacity={}", self.capacity());
        }
        let mut pos = self.home(hash);
        let mut dist: u32 = 0;
        loop {
            let psl = self.slots[pos].psl;
            if psl == EMPTY_PSL {
                return None;
            }
            let existing_dist = psl - 1;
            if existing_dist < dist {
                return None;
            }
            let (k, _) = self.slots[pos].entry.as_ref().expect("live slot");
            if self.hasher.eq(k, key) {
                return Some(pos);
            }
            dist += 1;
            pos = (pos + 1) & self.mask;
        }
    }

    /// Updates the value at an existing `key` in place, returning
    /// `MapError::KeyNotFound` if it is absent.
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
        self.slots[pos].entry.as_mut().map(|(_, v)| v).expect("live slot")
    }

    /// Removes `key`, back-shifting the tail of its probe chain so that no
    /// tombstone is ever left behind (spec.md §4.5).
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let pos = self.find_slot(key)?;
        let (_, value) = self.slots[pos].entry.take().expect("live slot");
        self.slots[pos].psl = EMPTY_PSL;
        self.len -= 1;

        let mut cur = pos;
        loop {
            let next = (cur + 1) & self.mask;
            let next_psl = self.slots[next].psl;
            if next_psl <= 1 {
                break;
            }
            let entry = self.slots[next].entry.take().expect("live slot");
            self.slots[cur].entry = Some(entry);
            self.slots[cur].psl = next_psl - 1;
            self.slots[next].psl = EMPTY_PSL;
            cur = next;
        }
        Some(value)
    }

    /// Iterates over every live entry. Order is unspecified (spec.md
    /// §4.10).
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .map(|(k, v)| (k, v))
    }
}

impl<K, V, H> std::ops::Index<&K> for RobinHoodMap<K, V, H>
where
    H: MapHasher<K>,
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

/// See `SimdMap`'s `IndexMut` impl: updates in place, never inserts.
impl<K, V, H> std::ops::IndexMut<&K> for RobinHoodMap<K, V, H>
where
    H: MapHasher<K>,
{
    fn index_mut(&mut self, key: &K) -> &mut V {
        self.get_mut(key).expect("key not found")
    }
}
