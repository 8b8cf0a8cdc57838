//! C9 — the cooperative resize controller: installing a successor table,
//! draining the current one into it in bounded quanta, and promoting the
//! successor once it is fully populated.
//!
//! Grounded on the `table`/`next_table` pair and `Atomic`-CAS installation
//! style of this pack's `lbl8603-rustuc` `concurrent_hash_map` reference
//! (there, a `size_ctl` stamp negotiates exactly one resizer and a
//! `transfer_index` hands out migration strides to helpers); this module
//! plays the same two roles — `maybe_start_resize` is the single-winner
//! CAS, `migrate_quantum`'s `migrate_cursor` fetch-add is the stride
//! handout — adapted to spec.md's per-slot state machine instead of
//! per-bin linked lists, and to `crossbeam_epoch` reclamation instead of a
//! hand-rolled `Atomic<Arc<...>>`.

use std::sync::atomic::Ordering;

use crossbeam_epoch::{Guard, Owned, Shared};

use crate::hash::MapHasher;
use crate::index::h2;

use super::slot;
use super::slot::Table;

/// How many not-yet-migrated slots a single caller helps drain per call
/// (spec.md §4.9: "some bounded quantity of slots (e.g., one group)").
pub(crate) const MIGRATION_QUANTUM: usize = 8;

/// Resolves the table a writer or reader should operate against: helps
/// along an in-flight resize until no resize is in progress, installing a
/// doubled-capacity successor first if `should_grow` says the load factor
/// calls for one. `should_grow` is the caller's business (it owns the live
/// count via its `StripedCounter`, which this module has no access to) —
/// see `ConcurrentMap::emplace`, the only caller that ever passes `true`.
pub(crate) fn resolve_table<'g, K, V, H>(
    hasher: &H,
    should_grow: bool,
    current: &crossbeam_epoch::Atomic<Table<K, V>>,
    guard: &'g Guard,
) -> Shared<'g, Table<K, V>>
where
    K: Clone,
    V: Clone,
    H: MapHasher<K>,
{
    loop {
        let cur = current.load(Ordering::Acquire, guard);
        let table = unsafe { cur.deref() };
        let next = table.next.load(Ordering::Acquire, guard);

        if next.is_null() {
            if should_grow {
                maybe_start_resize(table, guard);
            }
            let next_after = table.next.load(Ordering::Acquire, guard);
            if next_after.is_null() {
                return cur;
            }
            continue;
        }

        let next_table = unsafe { next.deref() };
        migrate_quantum(table, next_table, hasher, guard, MIGRATION_QUANTUM);

        if table.is_fully_migrated() {
            promote(current, cur, next, guard);
        }
        // Loop again: `current` may now point at the promoted successor,
        // or another resize may already be queued behind it.
    }
}

/// Installs a successor table of double capacity if none is installed yet.
/// Exactly one caller's CAS wins; losers' `Owned` successor is dropped
/// (and freed) automatically since it's never used.
fn maybe_start_resize<K, V>(table: &Table<K, V>, guard: &Guard) {
    let new_capacity = table.capacity() * 2;
    let successor: Owned<Table<K, V>> = Owned::new(Table::with_capacity(new_capacity));
    let _ = table
        .next
        .compare_exchange(
            Shared::null(),
            successor,
            Ordering::AcqRel,
            Ordering::Relaxed,
            guard,
        );
    log::debug!(
        "cmap resize: installing successor {} -> {} buckets",
        table.capacity(),
        new_capacity
    );
}

/// Migrates up to `quantum` not-yet-claimed slots from `table` into
/// `next_table`.
fn migrate_quantum<K, V, H>(
    table: &Table<K, V>,
    next_table: &Table<K, V>,
    hasher: &H,
    guard: &Guard,
    quantum: usize,
) where
    K: Clone,
    V: Clone,
    H: MapHasher<K>,
{
    for _ in 0..quantum {
        let idx = table.migrate_cursor.fetch_add(1, Ordering::AcqRel);
        if idx >= table.slots.len() {
            return;
        }
        migrate_slot(table, next_table, idx, hasher, guard);
    }
}

/// Migrates one slot: `EMPTY`/`TOMBSTONE` are retired directly (nothing to
/// copy); a live slot is claimed (`LIVE(h2) -> MIGRATED`) then its entry is
/// cloned into `next_table` via a uniqueness-assuming raw insert — the
/// same "skip the equality check, first empty slot wins" shortcut
/// `dense::table::resize` uses, valid here because every key the old
/// table holds is, by construction, still unique.
fn migrate_slot<K, V, H>(
    table: &Table<K, V>,
    next_table: &Table<K, V>,
    idx: usize,
    hasher: &H,
    guard: &Guard,
) where
    K: Clone,
    V: Clone,
    H: MapHasher<K>,
{
    let target = &table.slots[idx];
    loop {
        let state = target.state.load(Ordering::Acquire);
        match state {
            slot::EMPTY => {
                if target
                    .state
                    .compare_exchange(
                        slot::EMPTY,
                        slot::MIGRATED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    table.migrated_count.fetch_add(1, Ordering::AcqRel);
                    return;
                }
            }
            slot::TOMBSTONE => {
                if target
                    .state
                    .compare_exchange(
                        slot::TOMBSTONE,
                        slot::MIGRATED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    table.migrated_count.fetch_add(1, Ordering::AcqRel);
                    return;
                }
            }
            slot::MIGRATED => return,
            slot::CLAIMED => std::hint::spin_loop(),
            live_h2 => {
                if target
                    .state
                    .compare_exchange(
                        live_h2,
                        slot::MIGRATED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_err()
                {
                    continue;
                }
                let entry_shared = target.entry.load(Ordering::Acquire, guard);
                if let Some((k, v)) = unsafe { entry_shared.as_ref() } {
                    let hash = hasher.hash(k);
                    raw_insert_unique(next_table, hash, k.clone(), v.clone());
                }
                table.migrated_count.fetch_add(1, Ordering::AcqRel);
                return;
            }
        }
    }
}

/// Inserts `(key, value)` into `table` assuming no equal key can already
/// be present. Used only for migration, where that assumption is an
/// invariant rather than a race to guard against.
pub(crate) fn raw_insert_unique<K, V>(table: &Table<K, V>, hash: u32, key: K, value: V) {
    let mut pos = table.home(hash);
    let mut stride = 0usize;
    loop {
        let target = &table.slots[pos];
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
            target.entry.store(Owned::new((key, value)), Ordering::Release);
            target.state.store(h2(hash), Ordering::Release);
            return;
        }
        stride += 1;
        pos = (pos + stride) & table.mask;
    }
}

/// Attempts to publish `next` as the map's current table once fully
/// migrated. If another helper already won the race, this is a no-op —
/// the loser's `next`/`old` are just borrowed `Shared`s, nothing to free.
fn promote<K, V>(
    current: &crossbeam_epoch::Atomic<Table<K, V>>,
    old: Shared<'_, Table<K, V>>,
    next: Shared<'_, Table<K, V>>,
    guard: &Guard,
) {
    if current
        .compare_exchange(old, next, Ordering::AcqRel, Ordering::Relaxed, guard)
        .is_ok()
    {
        log::debug!("cmap resize: promoted successor table");
        unsafe {
            guard.defer_destroy(old);
        }
    }
}
