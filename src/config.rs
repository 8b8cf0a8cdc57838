//! Shared constructor configuration.
//!
//! Constructor knobs live in a small, separately-built struct consumed by
//! the index constructors rather than as a long argument list: capacity,
//! load factor, and a pluggable hasher, plus an opt-in probe-path log
//! toggle that feeds the resize/rehash trace records emitted elsewhere.

use crate::hash::FxMapHasher;

/// Minimum capacity accepted by the single-threaded table variants.
pub const MIN_CAPACITY_ST: u32 = 8;
/// Minimum capacity accepted by the SIMD dense table and CMap.
pub const MIN_CAPACITY_DENSE: u32 = 16;

/// Constructor configuration shared by every table variant.
///
/// `capacity` is a lower bound, rounded up to the next power of two.
/// `load_factor` must lie in `(0.0, 0.9]`; values above `0.9` are clamped
/// for the SIMD dense table and the concurrent map; the Robin-Hood and
/// quadratic variants honor the value as given since their max-PSL /
/// tombstone-budget formulas are derived directly from it.
#[derive(Clone)]
pub struct MapConfig<H = FxMapHasher> {
    capacity: u32,
    load_factor: f64,
    hasher: H,
    probe_log: bool,
}

impl Default for MapConfig<FxMapHasher> {
    fn default() -> Self {
        Self {
            capacity: MIN_CAPACITY_DENSE,
            load_factor: 0.875,
            hasher: FxMapHasher::default(),
            probe_log: false,
        }
    }
}

impl MapConfig<FxMapHasher> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> MapConfig<H> {
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Emit `log::trace!` records for probe-chain length on every
    /// operation. Off by default — the hot `get` path otherwise pays for a
    /// log-crate dispatch per probe even when no subscriber is installed.
    pub fn probe_log(mut self, enabled: bool) -> Self {
        self.probe_log = enabled;
        self
    }

    pub fn hasher<H2>(self, hasher: H2) -> MapConfig<H2> {
        MapConfig {
            capacity: self.capacity,
            load_factor: self.load_factor,
            hasher,
            probe_log: self.probe_log,
        }
    }

    pub(crate) fn capacity_value(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn load_factor_value(&self) -> f64 {
        self.load_factor
    }

    pub(crate) fn probe_log_enabled(&self) -> bool {
        self.probe_log
    }

    pub(crate) fn into_hasher(self) -> H {
        self.hasher
    }
}

/// Clamps a requested load factor into the `(0.0, 0.9]` range the SIMD
/// dense table and concurrent map enforce. Robin-Hood and quadratic
/// variants call `validate` instead, which panics on an out-of-range value
/// rather than silently clamping, since their probe-length bounds are
/// derived straight from the caller's number.
pub(crate) fn clamp_load_factor(load_factor: f64) -> f64 {
    if load_factor <= 0.0 {
        f64::MIN_POSITIVE
    } else {
        load_factor.min(0.9)
    }
}

pub(crate) fn validate_load_factor(load_factor: f64) -> f64 {
    assert!(
        load_factor > 0.0 && load_factor <= 0.9,
        "load_factor must be in (0.0, 0.9], got {load_factor}"
    );
    load_factor
}
