//! Guard trait for memory reclamation strategies.
//!
//! A node removed from a [`ConcurrentCollection`] cannot be freed on the spot:
//! another thread may be halfway through a traversal and still hold a pointer
//! to it. The `Guard` trait abstracts over how freeing is postponed until no
//! reader can reach the node anymore.
//!
//! # Design
//!
//! ```text
//! ConcurrentCollection<T, G: Guard>
//!     │
//!     ├── ConcurrentCollection<T, EpochGuard>      (production, waitless-crossbeam)
//!     └── ConcurrentCollection<T, DeferredGuard>   (testing)
//! ```
//!
//! Two kinds of garbage are handed to a guard:
//!
//! - single value nodes retired by `remove` or iterator removal;
//! - whole detached chains produced by `clear`, handed over as their old
//!   sentinel together with a deallocator that walks the chain.
//!
//! [`ConcurrentCollection`]: crate::data_structures::ConcurrentCollection

mod deferred_guard;

use std::ops::Deref;

pub use deferred_guard::{DeferredGuard, DeferredRef};

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. Memory passed to `defer_destroy` is not freed while any thread that
///    could have observed it is still inside a `ReadGuard`.
/// 2. A `GuardedRef` keeps the referenced value valid for its own lifetime,
///    independently of the `ReadGuard` it was created under.
///
/// The guard stored inside a collection is only used to schedule
/// destruction. Protection of reads comes from [`Guard::pin`], called once
/// per operation and held for the whole lifetime of an iterator.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// A reference protected by a guard of this type.
    type GuardedRef<'a, T: 'a>: Deref<Target = T>;

    /// An active pin that protects every node read until dropped.
    ///
    /// For epoch-based reclamation this is a pinned `crossbeam_epoch::Guard`;
    /// for [`DeferredGuard`] it is `()` because nothing is freed before the
    /// collection itself drops.
    type ReadGuard: Sized;

    /// Pin the current thread for the duration of a read or a mutation.
    fn pin() -> Self::ReadGuard;

    /// Schedule memory for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `node` must have been allocated by the collection and not yet freed
    /// - `node` must be unreachable from the collection's `head` and must not
    ///   be referenced by its `tail` hint
    /// - `node` must not be handed to any guard a second time
    /// - `dealloc` must be the matching deallocation function for `node`
    ///
    /// `N` is `'static` because `dealloc` may run after the collection and
    /// anything it borrowed are gone.
    unsafe fn defer_destroy<N: 'static>(&self, node: *mut N, dealloc: unsafe fn(*mut N));

    /// Create a guarded reference from a raw pointer.
    ///
    /// # Safety
    ///
    /// - `ptr` must point to a value protected by a live `ReadGuard` of this
    ///   type at the time of the call
    /// - the value must not be freed for lifetime `'a` other than through the
    ///   protection the returned reference carries
    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T>;
}
