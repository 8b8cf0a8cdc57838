//! C8 — the per-slot atomic state machine, plus the `Table<K, V>` storage
//! it lives in.
//!
//! The state byte is the same "high bit set = special" layout `dense::table`
//! uses for its control bytes, extended with two more sentinels so a single
//! byte can also represent the writer-visible lifecycle spec.md §4.8 names
//! (`CLAIMED`, `MIGRATED`) alongside `EMPTY`/`TOMBSTONE`/`LIVE(h2)`. This is
//! the byte-tagged adaptation of the pointer-tagged node-state encoding in
//! this pack's `lbl8603-rustuc` `concurrent_hash_map` (`MOVED`/`TREEBIN`/
//! `RESERVED` sentinel hash values layered over an `Atomic<NodeEnums<K,V>>`)
//! — here the "node" is a plain `(K, V)` behind a `crossbeam_epoch::Atomic`
//! slot rather than a linked bin, since spec.md's data model is one entry
//! per slot, not a chain.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crossbeam_epoch::Atomic;

/// Never occupied since the last rebuild. Terminal for readers.
pub(crate) const EMPTY: u8 = 0xFF;
/// Logically removed; does not terminate a lookup probe. Reclaimable by a
/// writer via `TOMBSTONE -> CLAIMED`.
pub(crate) const TOMBSTONE: u8 = 0xFE;
/// A writer has reserved this slot but has not yet published an entry.
/// Readers must treat this as opaque: skip it, but never conclude absence
/// from it alone.
pub(crate) const CLAIMED: u8 = 0xFD;
/// This slot's entry (if any) has already been copied to the successor
/// table installed by a resize; readers and writers must follow `next`.
pub(crate) const MIGRATED: u8 = 0xFC;

/// Whether `state` represents a live, readable slot — i.e. is a
/// fingerprint byte rather than one of the four sentinels above. Mirrors
/// `dense::table::is_full`'s "top bit clear" predicate; the sentinels all
/// occupy the top of the byte range (`0xFC..=0xFF`) so they're
/// distinguishable from any 7-bit fingerprint under a single equality
/// compare, exactly as spec.md §3 requires.
#[inline]
pub(crate) fn is_live(state: u8) -> bool {
    state & 0x80 == 0
}

/// One table slot: an atomic state byte plus an epoch-managed pointer to
/// the `(K, V)` it (may) hold. The entry is boxed behind
/// `crossbeam_epoch::Atomic` rather than stored inline so that publishing
/// a fresh value (duplicate-key update) and retiring an old one (remove,
/// migration) can both be expressed as a single pointer swap under a
/// release fence, with safe reclamation handled by the epoch guard rather
/// than hand-rolled hazard pointers.
pub(crate) struct Slot<K, V> {
    pub(crate) state: AtomicU8,
    pub(crate) entry: Atomic<(K, V)>,
}

impl<K, V> Slot<K, V> {
    fn empty() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            entry: Atomic::null(),
        }
    }
}

/// One generation of the concurrent table's backing storage. `next` is
/// null until a resize is in flight (§4.9); once non-null every writer
/// that touches this table helps migrate slots into it before proceeding.
pub(crate) struct Table<K, V> {
    pub(crate) slots: Box<[Slot<K, V>]>,
    pub(crate) mask: usize,
    pub(crate) shift: u32,
    pub(crate) next: Atomic<Table<K, V>>,
    /// Next not-yet-claimed slot index for a migration helper to work on
    /// (§4.9's "bounded quantum of slots"). Claimed via `fetch_add`, so two
    /// helpers never migrate the same index.
    pub(crate) migrate_cursor: AtomicUsize,
    /// Count of slots that have *completed* migration (claimed and
    /// written into the successor, or found empty/tombstone and skipped).
    /// The helper whose increment makes this equal to `slots.len()`
    /// promotes the successor.
    pub(crate) migrated_count: AtomicUsize,
}

impl<K, V> Table<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::empty);
        Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
            shift: 32 - capacity.trailing_zeros(),
            next: Atomic::null(),
            migrate_cursor: AtomicUsize::new(0),
            migrated_count: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn home(&self, hash: u32) -> usize {
        crate::index::home(hash, self.shift) & self.mask
    }

    #[inline]
    pub(crate) fn is_fully_migrated(&self) -> bool {
        self.migrated_count.load(Ordering::Acquire) >= self.slots.len()
    }
}

/// Frees every live entry still referenced by this table (and any
/// not-yet-promoted successor chained off it). Called only when no thread
/// can possibly still be reading the table — either via
/// `crossbeam_epoch::Guard::defer_destroy` scheduling this drop once the
/// epoch has advanced, or, for the final table an owning `ConcurrentMap`
/// drops, via `epoch::unprotected()` (sound here because dropping `&mut
/// self` already proves exclusive access).
impl<K, V> Drop for Table<K, V> {
    fn drop(&mut self) {
        let guard = unsafe { crossbeam_epoch::unprotected() };
        for slot in self.slots.iter() {
            let shared = slot.entry.load(Ordering::Relaxed, guard);
            if !shared.is_null() {
                unsafe {
                    drop(shared.into_owned());
                }
            }
        }
        let next = self.next.load(Ordering::Relaxed, guard);
        if !next.is_null() {
            unsafe {
                drop(next.into_owned());
            }
        }
    }
}

unsafe impl<K: Send, V: Send> Send for Table<K, V> {}
unsafe impl<K: Send, V: Send> Sync for Table<K, V> {}


/// Loom-gated model of the slot state machine's CAS transitions alone
/// (§5's testing note: loom cannot model `crossbeam_epoch` reclamation, so
/// only the CAS protocol — not the full resize/reclaim path — is checked
/// exhaustively here; ordinary threaded stress tests in
/// `tests/cmap_concurrent.rs` cover the rest).
#[cfg(all(test, feature = "loom"))]
mod loom_tests {
    use loom::sync::atomic::{AtomicU8, Ordering};
    use loom::thread;
    use std::sync::Arc;

    use super::{CLAIMED, EMPTY, TOMBSTONE};

    #[test]
    fn concurrent_claim_has_exactly_one_winner() {
        loom::model(|| {
            let state = Arc::new(AtomicU8::new(EMPTY));
            let winners: Arc<AtomicU8> = Arc::new(AtomicU8::new(0));
            let mut handles = Vec::new();
            for _ in 0..2 {
                let state = state.clone();
                let winners = winners.clone();
                handles.push(thread::spawn(move || {
                    if state
                        .compare_exchange(EMPTY, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(winners.load(Ordering::Relaxed), 1);
        });
    }

    #[test]
    fn reclaim_then_claim_never_resurrects_tombstone() {
        loom::model(|| {
            let state = Arc::new(AtomicU8::new(TOMBSTONE));
            let state2 = state.clone();
            let claimer = thread::spawn(move || {
                state2
                    .compare_exchange(TOMBSTONE, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
            });
            let result = claimer.join().unwrap();
            if result.is_ok() {
                assert_eq!(state.load(Ordering::Acquire), CLAIMED);
            }
        });
    }
}
