//! `ConcurrentMap`, a lock-free, cooperatively-resized hash map meant for
//! many readers and writers sharing one instance behind a `&ConcurrentMap`
//! (no `&mut` required for any single-key operation).
//!
//! A swappable table sits behind an atomic pointer; each slot carries its
//! own CAS state machine, and table migration happens cooperatively on the
//! fast path of readers and writers rather than on a dedicated resizer
//! thread. The same `home`/triangular-stride probing vocabulary the
//! single-threaded tables use reappears here at slot granularity.
//! Reclamation is `crossbeam_epoch` throughout.

mod resize;
mod slot;

use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Guard, Owned};

use crate::config::MapConfig;
use crate::counter::StripedCounter;
use crate::hash::{FxMapHasher, MapHasher};
use crate::index::{h2, max_live_before_resize, EmplaceResult};

use slot::{Slot, Table};

const MIN_CAPACITY: usize = 16;

/// Clones `key`/`value` into a freshly `CLAIMED` slot and publishes the
/// fingerprint, completing the `EMPTY`/`TOMBSTONE` → `CLAIMED` → `LIVE(h2)`
/// transition (spec.md §4.8). If `K::clone`/`V::clone` panics — the only
/// user-supplied code that can still run after the CAS claims the slot —
/// the slot is reverted to `revert_to` (whichever sentinel it was claimed
/// from) before the panic resumes, so it never gets stuck `CLAIMED`
/// forever nor is mistaken for a live entry with half-written data
/// (spec.md §4.10: "writers catch panics and restore EMPTY").
fn publish_claimed<K, V>(target: &Slot<K, V>, hash: u32, key: &K, value: &V, revert_to: u8)
where
    K: Clone,
    V: Clone,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (key.clone(), value.clone())))
    {
        Ok(pair) => {
            target.entry.store(Owned::new(pair), Ordering::Release);
            target.state.store(h2(hash), Ordering::Release);
        }
        Err(payload) => {
            target.state.store(revert_to, Ordering::Release);
            std::panic::resume_unwind(payload);
        }
    }
}

/// A lock-free hash map safe to share across threads without external
/// locking. Every operation takes `&self`; internal mutation goes through
/// `crossbeam_epoch`-guarded atomics on a swappable `Table<K, V>`.
///
/// Unlike the single-threaded variants this type does not implement
/// `std::ops::Index`: a returned `&V` could be invalidated the instant a
/// concurrent resize migrates its slot, so every read hands back an owned
/// clone instead (see DESIGN.md).
pub struct ConcurrentMap<K, V, H = FxMapHasher> {
    current: epoch::Atomic<Table<K, V>>,
    hasher: H,
    counter: StripedCounter,
    load_factor: f64,
    probe_log: bool,
}

impl<K, V> ConcurrentMap<K, V, FxMapHasher>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }
}

impl<K, V> Default for ConcurrentMap<K, V, FxMapHasher>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> ConcurrentMap<K, V, H>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    H: MapHasher<K> + Send + Sync,
{
    pub fn with_config(config: MapConfig<H>) -> Self {
        let load_factor = crate::config::clamp_load_factor(config.load_factor_value());
        let capacity = (config.capacity_value() as usize)
            .max(MIN_CAPACITY)
            .next_power_of_two();
        let probe_log = config.probe_log_enabled();
        Self {
            current: epoch::Atomic::new(Table::with_capacity(capacity)),
            hasher: config.into_hasher(),
            counter: StripedCounter::new(),
            load_factor,
            probe_log,
        }
    }

    fn guard(&self) -> Guard {
        epoch::pin()
    }

    fn should_grow(&self, table_capacity: usize) -> bool {
        let live = self.counter.sum();
        live >= 0 && live as usize >= max_live_before_resize(table_capacity, self.load_factor)
    }

    /// Resolves the table this call should operate against, helping along
    /// any resize in progress (or starting one) as a side effect.
    fn resolve<'g>(&self, grow_hint: bool, guard: &'g Guard) -> &'g Table<K, V> {
        let shared = resize::resolve_table(&self.hasher, grow_hint, &self.current, guard);
        unsafe { shared.deref() }
    }

    /// Inserts `key -> value`, or overwrites and returns the previous
    /// value if `key` was already present.
    pub fn emplace(&self, key: K, value: V) -> EmplaceResult<V> {
        let hash = self.hasher.hash(&key);
        let guard = self.guard();
        loop {
            let table = self.resolve(self.should_grow(self.approx_capacity()), &guard);
            match self.try_emplace(table, hash, &key, &value, &guard) {
                Some(result) => return result,
                None => continue, // table filled up underneath us; retry against the (now resizing) table
            }
        }
    }

    fn try_emplace(
        &self,
        table: &Table<K, V>,
        hash: u32,
        key: &K,
        value: &V,
        guard: &Guard,
    ) -> Option<EmplaceResult<V>> {
        let mut pos = table.home(hash);
        let mut stride = 0usize;
        let mut probes = 0usize;

        loop {
            if probes > table.capacity() {
                return None;
            }
            let target = &table.slots[pos];
            let state = target.state.load(Ordering::Acquire);

            match state {
                slot::EMPTY => {
                    if target
                        .state
                        .compare_exchange(
                            slot::EMPTY,
                            slot::CLAIMED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        publish_claimed(target, hash, key, value, slot::EMPTY);
                        self.counter.increment();
                        return Some(EmplaceResult::Inserted);
                    }
                    // Lost the race; re-examine the same slot.
                }
                slot::TOMBSTONE => {
                    if target
                        .state
                        .compare_exchange(
                            slot::TOMBSTONE,
                            slot::CLAIMED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        publish_claimed(target, hash, key, value, slot::TOMBSTONE);
                        self.counter.increment();
                        return Some(EmplaceResult::Inserted);
                    }
                }
                slot::CLAIMED => std::hint::spin_loop(),
                slot::MIGRATED => return None,
                fingerprint => {
                    if fingerprint == h2(hash) {
                        let existing = target.entry.load(Ordering::Acquire, guard);
                        if let Some((existing_key, existing_value)) =
                            unsafe { existing.as_ref() }
                        {
                            if self.hasher.eq(existing_key, key) {
                                let previous = existing_value.clone();
                                let fresh = Owned::new((key.clone(), value.clone()));
                                let _ = target.entry.compare_exchange(
                                    existing,
                                    fresh,
                                    Ordering::AcqRel,
                                    Ordering::Acquire,
                                    guard,
                                );
                                unsafe {
                                    guard.defer_destroy(existing);
                                }
                                return Some(EmplaceResult::Updated(previous));
                            }
                        }
                    }
                }
            }

            stride += 1;
            pos = (pos + stride) & table.mask;
            probes += 1;
        }
    }

    /// Returns a clone of the value stored under `key`, if present.
    pub fn get(&self, key: &K) -> Option<V> {
        let hash = self.hasher.hash(key);
        if self.probe_log {
            log::trace!("cmap get: hash={hash:#x} capacity={}", self.approx_capacity());
        }
        let guard = self.guard();
        let mut table = self.resolve(false, &guard);

        loop {
            let mut pos = table.home(hash);
            let mut stride = 0usize;
            let mut probes = 0usize;
            loop {
                if probes > table.capacity() {
                    break;
                }
                let target = &table.slots[pos];
                let state = target.state.load(Ordering::Acquire);
                match state {
                    slot::EMPTY => return None,
                    slot::MIGRATED => break,
                    slot::CLAIMED | slot::TOMBSTONE => {}
                    fingerprint if fingerprint == h2(hash) => {
                        let entry = target.entry.load(Ordering::Acquire, &guard);
                        if let Some((k, v)) = unsafe { entry.as_ref() } {
                            if self.hasher.eq(k, key) {
                                return Some(v.clone());
                            }
                        }
                    }
                    _ => {}
                }
                stride += 1;
                pos = (pos + stride) & table.mask;
                probes += 1;
            }

            let next = table.next.load(Ordering::Acquire, &guard);
            if next.is_null() {
                return None;
            }
            table = unsafe { next.deref() };
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Fallible counterpart to `get` (spec.md §7's typed-error channel,
    /// alongside the `Option` one).
    pub fn try_get(&self, key: &K) -> crate::error::Result<V> {
        self.get(key).ok_or(crate::error::MapError::KeyNotFound)
    }

    /// Applies `f` to the value stored under `key` via an optimistic
    /// compare-and-swap retry loop (spec.md §4.8: "a writer performing an
    /// in-place update uses a value-level write under a release fence"),
    /// without changing the slot's state byte.
    pub fn update(&self, key: &K, f: impl Fn(&V) -> V) -> crate::error::Result<()> {
        let hash = self.hasher.hash(key);
        let guard = self.guard();
        let mut table = self.resolve(false, &guard);

        loop {
            let mut pos = table.home(hash);
            let mut stride = 0usize;
            let mut probes = 0usize;
            loop {
                if probes > table.capacity() {
                    break;
                }
                let target = &table.slots[pos];
                let state = target.state.load(Ordering::Acquire);
                match state {
                    slot::EMPTY => return Err(crate::error::MapError::KeyNotFound),
                    slot::MIGRATED => break,
                    fingerprint if fingerprint == h2(hash) => loop {
                        let existing = target.entry.load(Ordering::Acquire, &guard);
                        match unsafe { existing.as_ref() } {
                            Some((k, v)) if self.hasher.eq(k, key) => {
                                let updated = Owned::new((k.clone(), f(v)));
                                match target.entry.compare_exchange(
                                    existing,
                                    updated,
                                    Ordering::AcqRel,
                                    Ordering::Acquire,
                                    &guard,
                                ) {
                                    Ok(_) => {
                                        unsafe {
                                            guard.defer_destroy(existing);
                                        }
                                        return Ok(());
                                    }
                                    Err(_) => continue, // lost the race, retry against the fresh value
                                }
                            }
                            _ => break,
                        }
                    },
                    _ => {}
                }
                stride += 1;
                pos = (pos + stride) & table.mask;
                probes += 1;
            }

            let next = table.next.load(Ordering::Acquire, &guard);
            if next.is_null() {
                return Err(crate::error::MapError::KeyNotFound);
            }
            table = unsafe { next.deref() };
        }
    }

    /// Removes `key`, returning its value if present. The vacated slot
    /// becomes a `TOMBSTONE`, not `EMPTY` — a concurrent reader mid-probe
    /// past this slot must not see a premature "not found".
    pub fn remove(&self, key: &K) -> Option<V> {
        let hash = self.hasher.hash(key);
        let guard = self.guard();
        let mut table = self.resolve(false, &guard);

        loop {
            let mut pos = table.home(hash);
            let mut stride = 0usize;
            let mut probes = 0usize;
            loop {
                if probes > table.capacity() {
                    break;
                }
                let target = &table.slots[pos];
                let state = target.state.load(Ordering::Acquire);
                match state {
                    slot::EMPTY => return None,
                    slot::MIGRATED => break,
                    fingerprint if fingerprint == h2(hash) => {
                        let existing = target.entry.load(Ordering::Acquire, &guard);
                        if let Some((k, v)) = unsafe { existing.as_ref() } {
                            if self.hasher.eq(k, key) {
                                if target
                                    .state
                                    .compare_exchange(
                                        fingerprint,
                                        slot::TOMBSTONE,
                                        Ordering::AcqRel,
                                        Ordering::Acquire,
                                    )
                                    .is_ok()
                                {
                                    let removed = v.clone();
                                    target
                                        .entry
                                        .store(crossbeam_epoch::Shared::null(), Ordering::Release);
                                    unsafe {
                                        guard.defer_destroy(existing);
                                    }
                                    self.counter.decrement();
                                    return Some(removed);
                                }
                                continue;
                            }
                        }
                    }
                    _ => {}
                }
                stride += 1;
                pos = (pos + stride) & table.mask;
                probes += 1;
            }

            // Hit MIGRATED or exhausted the probe bound without finding
            // `key`: if a successor table has since been installed, `key`
            // (if it exists) has already been copied there — follow it and
            // restart rather than reporting a spurious absence (spec.md
            // §4.9: "readers that find MIGRATED retry in the successor").
            let next = table.next.load(Ordering::Acquire, &guard);
            if next.is_null() {
                return None;
            }
            table = unsafe { next.deref() };
        }
    }

    /// Returns the value under `key`, inserting `f()` first if absent.
    pub fn get_or_insert_with(&self, key: K, f: impl FnOnce() -> V) -> V {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        let value = f();
        match self.emplace(key.clone(), value.clone()) {
            EmplaceResult::Inserted => value,
            EmplaceResult::Updated(_) => self.get(&key).expect("just inserted"),
        }
    }

    /// Approximate live count; may be transiently stale under concurrent
    /// writers (spec.md §7's "weakly consistent" guarantee for aggregate
    /// reads).
    pub fn len(&self) -> usize {
        self.counter.sum().max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of the table currently installed, ignoring any resize in
    /// flight behind it.
    pub fn capacity(&self) -> usize {
        self.approx_capacity()
    }

    fn approx_capacity(&self) -> usize {
        let guard = self.guard();
        let cur = self.current.load(Ordering::Acquire, &guard);
        unsafe { cur.deref() }.capacity()
    }

    /// Replaces the table with a fresh, empty one of minimum capacity.
    /// Requires `&mut self`: unlike every other operation, this is not
    /// meant to be called while other threads may be operating on the map.
    pub fn clear(&mut self) {
        let guard = self.guard();
        let old = self.current.swap(
            Owned::new(Table::with_capacity(MIN_CAPACITY)),
            Ordering::AcqRel,
            &guard,
        );
        unsafe {
            guard.defer_destroy(old);
        }
        self.counter = StripedCounter::new();
    }

    /// A weakly-consistent snapshot of every live entry in the
    /// currently-installed table. Entries migrated out from under this
    /// call mid-iteration may be missed or duplicated across the boundary;
    /// callers that need a stable view should pair this with external
    /// synchronization (spec.md §7).
    pub fn iter(&self) -> Vec<(K, V)> {
        let guard = self.guard();
        let cur = self.current.load(Ordering::Acquire, &guard);
        let table = unsafe { cur.deref() };
        let mut out = Vec::new();
        for target in table.slots.iter() {
            let state = target.state.load(Ordering::Acquire);
            if slot::is_live(state) {
                let entry = target.entry.load(Ordering::Acquire, &guard);
                if let Some((k, v)) = unsafe { entry.as_ref() } {
                    out.push((k.clone(), v.clone()));
                }
            }
        }
        out
    }
}

impl<K, V, H> Drop for ConcurrentMap<K, V, H> {
    fn drop(&mut self) {
        let guard = unsafe { epoch::unprotected() };
        let cur = self.current.swap(epoch::Shared::null(), Ordering::AcqRel, guard);
        if !cur.is_null() {
            unsafe {
                drop(cur.into_owned());
            }
        }
    }
}
