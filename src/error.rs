use std::alloc::Layout;

use thiserror::Error;

/// Error taxonomy shared by every table variant in this crate.
///
/// `get`/`contains`/`remove` report absence through `bool`/`Option` instead
/// of this type; `MapError` is reserved for the cases that have no natural
/// boolean channel (an indexer-style update on an absent key) or that are
/// fatal and must be observed rather than silently recovered from.
#[derive(Error, Debug)]
pub enum MapError {
    /// `update`/indexer-set on a key that is not present in the table.
    #[error("key not found")]
    KeyNotFound,

    /// The table could not grow: the allocator returned an error or the
    /// requested layout overflowed `isize::MAX`.
    #[error("allocation failure for layout {0:?}")]
    AllocationFailure(Layout),

    /// A caller-supplied hash or equality callback panicked mid-probe.
    /// The table's invariants are preserved (see the `hint` + slot
    /// lifecycle discussion in the dense table), but the operation that
    /// triggered the panic did not complete.
    #[error("hash or equality callback panicked")]
    UserHashPanic,

    /// A single-threaded table variant was used in a way that violates its
    /// exclusive-access contract (e.g. iteration observed concurrently
    /// with mutation). Detection is best-effort.
    #[error("contract violation: {0}")]
    ContractViolation(&'static str),
}

pub type Result<T> = std::result::Result<T, MapError>;
