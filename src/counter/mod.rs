//! C7 — the striped counter.
//!
//! A single `AtomicUsize` tracking CMap's live-entry count would serialize
//! every writer on one cache line. Instead we shard the count over
//! `next_pow2(cpus * 4)` lanes, each padded out to a full cache line, and
//! let each thread pick a lane and hammer on it alone. `sum()` — used by
//! `len()` — reads every lane with relaxed loads; the result is only exact
//! once all in-flight mutations have quiesced, which is the approximation
//! spec.md §4.7 and §5 call for.
//!
//! The padding width follows the table used by this pack's
//! `ibraheemdev-cliff-map` (`raw/utils.rs`): 128 bytes on x86_64/aarch64/
//! ppc64 (Sandy Bridge onward prefetches cache-line pairs), 32 bytes on
//! arm/mips/riscv64, 64 bytes everywhere else.

use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;

use once_cell::sync::Lazy;

#[cfg_attr(
    any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
    ),
    repr(align(128))
)]
#[cfg_attr(
    any(
        target_arch = "arm",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "riscv64",
    ),
    repr(align(32))
)]
#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
        target_arch = "arm",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "riscv64",
    )),
    repr(align(64))
)]
#[derive(Default)]
struct PaddedCounter(AtomicI64);

/// Cached once per process: `next_pow2(available_parallelism() * 4)`.
static LANE_COUNT: Lazy<usize> = Lazy::new(|| {
    let cpus = num_cpus::get().max(1);
    (cpus * 4).next_power_of_two()
});

/// A sharded, approximate counter used by the concurrent map to track
/// `live_count` without a single point of write contention.
pub struct StripedCounter {
    lanes: Box<[PaddedCounter]>,
    mask: usize,
}

impl StripedCounter {
    pub fn new() -> Self {
        let n = *LANE_COUNT;
        let mut lanes = Vec::with_capacity(n);
        lanes.resize_with(n, PaddedCounter::default);
        Self {
            lanes: lanes.into_boxed_slice(),
            mask: n - 1,
        }
    }

    #[inline]
    fn lane(&self) -> &AtomicI64 {
        let tid = thread::current().id();
        let mut hasher = fxhash::FxHasher::default();
        std::hash::Hash::hash(&tid, &mut hasher);
        let idx = (std::hash::Hasher::finish(&hasher) as usize) & self.mask;
        &self.lanes[idx].0
    }

    #[inline]
    pub fn increment(&self) {
        self.lane().fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn decrement(&self) {
        self.lane().fetch_sub(1, Ordering::Relaxed);
    }

    /// Approximate live count. Exact once all mutations have quiesced.
    pub fn sum(&self) -> i64 {
        self.lanes.iter().map(|l| l.0.load(Ordering::Relaxed)).sum()
    }
}

impl Default for StripedCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_threaded_sum_is_exact() {
        let counter = StripedCounter::new();
        for _ in 0..100 {
            counter.increment();
        }
        for _ in 0..37 {
            counter.decrement();
        }
        assert_eq!(counter.sum(), 63);
    }

    #[test]
    fn concurrent_increments_converge_after_join() {
        let counter = Arc::new(StripedCounter::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    counter.increment();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.sum(), 80_000);
    }
}
