//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! `EpochGuard` is the production reclamation strategy for
//! [`ConcurrentCollection`](waitless_core::ConcurrentCollection). Every
//! operation pins the calling thread, so a node unlinked by one thread stays
//! allocated until every thread that could have seen it has unpinned:
//!
//! ```text
//! ConcurrentCollection<T, EpochGuard>
//!     │
//!     ├── single removed nodes      ──► defer_destroy(node, dealloc_ptr)
//!     └── chains detached by clear  ──► defer_destroy(sentinel, dealloc_chain)
//! ```
//!
//! # Example
//!
//! ```rust
//! use waitless_crossbeam::EpochCollection;
//!
//! let collection: EpochCollection<i32> = EpochCollection::new();
//! collection.add(42);
//! collection.add(17);
//!
//! if let Some(val) = collection.find(&42) {
//!     assert_eq!(*val, 42);
//! }
//!
//! assert!(collection.remove(&42));
//! ```

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use std::ops::Deref;
use waitless_core::guard::Guard;

/// Epoch-based memory reclamation guard.
///
/// Zero-sized: destruction is scheduled on the global epoch collector, so
/// storing the guard inside a collection keeps it `Send` and `Sync`. A whole
/// detached chain is one deferred closure, which keeps `clear` O(1) here as
/// well.
///
#[derive(Clone, Copy, Default)]
pub struct EpochGuard {}

impl EpochGuard {
    pub fn new() -> Self {
        EpochGuard {}
    }
}

/// A reference protected by its own epoch pin.
///
/// The value stays readable for as long as the `EpochRef` lives, even if it is
/// removed from the collection meanwhile.
///
pub struct EpochRef<'a, T> {
    _guard: CrossbeamGuard,
    reference: &'a T,
}

impl<'a, T> EpochRef<'a, T> {
    /// # Safety
    ///
    /// `reference` must point into memory whose destruction is deferred through
    /// the epoch collector, and must have been valid when `guard` was pinned.
    pub(crate) unsafe fn new(guard: CrossbeamGuard, reference: &'a T) -> Self {
        EpochRef {
            _guard: guard,
            reference,
        }
    }

    pub fn get(&self) -> &T {
        self.reference
    }
}

impl<T> Deref for EpochRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.reference
    }
}

impl<T: std::fmt::Display> std::fmt::Display for EpochRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reference)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for EpochRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EpochRef({:?})", self.reference)
    }
}

impl Guard for EpochGuard {
    type GuardedRef<'a, T: 'a> = EpochRef<'a, T>;

    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N: 'static>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || {
                dealloc(node);
            });
        }
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        // The caller is pinned, so a nested pin taken here covers the same epoch.
        let new_guard = epoch::pin();
        unsafe { EpochRef::new(new_guard, &*ptr) }
    }
}
