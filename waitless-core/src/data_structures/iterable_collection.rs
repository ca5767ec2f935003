//! Iteration trait for collections.
//!
//! Lets code that only reads a collection (snapshots, assertions, debug
//! dumps) stay generic over the reclamation strategy.

use std::ops::Deref;

use super::linked::{ConcurrentCollection, Iter};
use crate::guard::Guard;

// ============================================================================
// IterableCollection - Base trait for any iterable collection
// ============================================================================

/// Trait for collections that support safe iteration.
///
pub trait IterableCollection<T> {
    /// The type of guarded reference returned during iteration.
    /// This ensures memory safety for lock-free structures.
    type GuardedRef<'a>: Deref<Target = T>
    where
        Self: 'a;

    /// Iterator type that yields guarded references.
    type Iter<'a>: Iterator<Item = Self::GuardedRef<'a>>
    where
        Self: 'a;

    /// Returns an iterator over all elements in the collection.
    fn iter(&self) -> Self::Iter<'_>;

    /// Collects all elements into a Vec (convenience method).
    fn to_vec(&self) -> Vec<T>
    where
        T: Clone;

    /// Returns the number of elements in the collection.
    fn len(&self) -> usize;

    /// Returns true if the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static, G: Guard> IterableCollection<T> for ConcurrentCollection<T, G> {
    type GuardedRef<'a>
        = G::GuardedRef<'a, T>
    where
        Self: 'a;

    type Iter<'a>
        = Iter<'a, T, G>
    where
        Self: 'a;

    fn iter(&self) -> Self::Iter<'_> {
        ConcurrentCollection::iter(self)
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        ConcurrentCollection::to_vec(self)
    }

    fn len(&self) -> usize {
        ConcurrentCollection::len(self)
    }

    fn is_empty(&self) -> bool {
        ConcurrentCollection::is_empty(self)
    }
}
