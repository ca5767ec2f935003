use std::iter::FusedIterator;
use std::mem;
use std::ptr;

use super::concurrent_collection::ConcurrentCollection;
use crate::data_structures::internal::NodePtr;
use crate::error::CollectionError;
use crate::guard::Guard;

/// Lazy iterator over the live values of a [`ConcurrentCollection`].
///
/// The iterator is weakly consistent: it never fails because of concurrent
/// modification, it yields each node at most once, and it may or may not
/// observe values added or removed after it was created. Removed nodes are
/// skipped. After a `clear` it keeps walking the detached chain, which stays
/// valid for as long as the iterator holds its pin. Once `next` has returned
/// `None` it keeps returning `None`, even if values are appended later.
///
/// [`Iter::remove`] deletes exactly the node last yielded, not merely some
/// node with an equal value.
pub struct Iter<'a, T, G: Guard> {
    _guard: G::ReadGuard,
    collection: &'a ConcurrentCollection<T, G>,
    /// Last live node the cursor stepped from; start point for locating the
    /// predecessor of `last`.
    prev: NodePtr<T>,
    /// Node last yielded; null before the first `next` and after `remove`.
    last: NodePtr<T>,
    cursor: NodePtr<T>,
    done: bool,
}

impl<'a, T: 'static, G: Guard> Iter<'a, T, G> {
    pub(super) fn new(collection: &'a ConcurrentCollection<T, G>) -> Self {
        let guard = G::pin();
        let head = collection.head_ptr();
        Iter {
            _guard: guard,
            collection,
            prev: head,
            last: ptr::null_mut(),
            cursor: head,
            done: false,
        }
    }

    /// Remove the value last returned by `next`.
    ///
    /// Returns `Ok(false)` if a concurrent operation already removed that
    /// node. Calling this before `next`, or twice for one value, is an
    /// [`CollectionError::InvalidState`].
    pub fn remove(&mut self) -> Result<bool, CollectionError> {
        let target = mem::replace(&mut self.last, ptr::null_mut());
        if target.is_null() {
            return Err(CollectionError::InvalidState(
                "no value to remove: next has not been called since the last removal",
            ));
        }
        Ok(self.collection.unlink_exact(self.prev, target))
    }
}

impl<'a, T: 'static, G: Guard> Iterator for Iter<'a, T, G> {
    type Item = G::GuardedRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(node) = ConcurrentCollection::<T, G>::next_live(self.cursor) else {
            self.done = true;
            return None;
        };

        // A zombie cursor is the node we just removed; keep the older predecessor.
        if !unsafe { (*self.cursor).is_zombie() } {
            self.prev = self.cursor;
        }
        self.last = node;
        self.cursor = node;

        let data = unsafe { (*node).value()? } as *const T;

        // Safety: the iterator's pin keeps the node alive for 'a
        unsafe { Some(G::make_ref(data)) }
    }
}

impl<T: 'static, G: Guard> FusedIterator for Iter<'_, T, G> {}
