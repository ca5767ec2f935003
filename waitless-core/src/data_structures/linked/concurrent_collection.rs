use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam::utils::{Backoff, CachePadded};

use super::iter::Iter;
use crate::data_structures::internal::{Marker, Node, NodePtr};
use crate::error::CollectionError;
use crate::guard::Guard;

///
/// Unordered concurrent collection backed by a singly linked chain, with
/// per-node advisory locks instead of a structure-wide lock.
///
/// Removed values may be dropped by the reclamation backend after the
/// collection itself, so every operation requires `T: 'static`:
///
/// ```compile_fail
/// use waitless_core::{ConcurrentCollection, DeferredGuard};
///
/// let owner = String::from("borrowed");
/// let collection = ConcurrentCollection::<&String, DeferredGuard>::new();
/// collection.add(&owner);
/// drop(collection);
/// ```
///
// =============================================================================
// LAYOUT
// =============================================================================
//
// ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
// │ HEAD │───►│  a   │───►│  b   │───►│  c   │───► NULL
// │(sent)│    │      │    │      │    │      │
// └──────┘    └──────┘    └──────┘    └──────┘
//    ▲                                   ▲
//   head                               tail (hint)
//
// Contents: every value reachable from `head` whose node is not ZOMBIE.
// `head` always refers to a valueless sentinel and is replaced wholesale by
// clear. `tail` is a hint that may lag or point at a zombie.
//
// =============================================================================
// APPEND
// =============================================================================
//
// new node is created MUTATING, so nobody can append after it early.
//
//   1. lock tail            (AVAILABLE → MUTATING)
//   2. CAS tail.next        (null → new)
//   3. CAS hint             (tail → new)
//   4. unlock tail, unlock new
//
// If step 2 fails the hint lags: push it to tail.next and retry.
// If step 1 sees ZOMBIE the hint points at a removed node. Once that node is
// out of the chain, claim it (ZOMBIE → MUTATING), walk from head to the real
// end, move the hint there, give the node back (→ ZOMBIE), retry. While it is
// still linked its remover is about to move the hint itself, so just back off.
//
// =============================================================================
// UNLINK (remove by value and remove through iterator)
// =============================================================================
//
// Before:  pred ──────► node ──────► succ
//
//   1. lock pred
//   2. re-check pred.next == node
//   3. retire node          (AVAILABLE → ZOMBIE, logical delete)
//   4. pred.next = succ     (physical unlink)
//   5. CAS hint node → pred
//   6. unlock pred, defer destruction of node
//
// After:   pred ────────────────────► succ
//                       node ──╳───► succ   (ZOMBIE, freed once no reader can see it)
//
// Any failure in 1-3 restarts the scan from head.
//
// =============================================================================
// TAIL HINT WRITERS
// =============================================================================
//
// The hint must never reference a node that has been handed to the guard, so
// it is only ever set to a node that cannot be retired at that moment:
//
//   append publish     the new node, still MUTATING
//   lagging hint       the successor of the locked old tail
//   repair             the real last node, locked and re-checked
//   unlink             pred, locked
//   clear              its fresh sentinel, locked until the hint points at it
//
// All writers except clear use CAS from the node they observed as the hint,
// so once clear has moved the hint onto its fresh sentinel nothing can drag
// it back into the detached chain.
//
pub struct ConcurrentCollection<T, G: Guard> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
    /// Shared guard instance for deferred destruction.
    guard: G,
    _marker: PhantomData<*mut Node<T>>,
}

/// Outcome of one attempt at the unlink protocol.
enum Unlink {
    Removed,
    /// Lock or re-check failed; the caller backs off and rescans.
    Contended,
    /// The node was already logically deleted by someone else.
    Gone,
}

impl<T: 'static, G: Guard> ConcurrentCollection<T, G> {
    pub fn new() -> Self {
        let sentinel = Box::into_raw(Box::new(Node::new_sentinel()));
        ConcurrentCollection {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            guard: G::default(),
            _marker: PhantomData,
        }
    }

    /// Get the shared guard instance for this collection.
    pub fn guard(&self) -> &G {
        &self.guard
    }

    /// Append a value.
    ///
    /// Always returns `true`: appending cannot fail, it can only retry.
    pub fn add(&self, value: T) -> bool {
        let _guard = G::pin();
        let node = Box::into_raw(Box::new(Node::new_locked(value)));
        let backoff = Backoff::new();

        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let tail_ref = unsafe { &*tail };

            match tail_ref.try_lock() {
                Ok(()) => {
                    if tail_ref.cas_next(ptr::null_mut(), node).is_ok() {
                        // Fails only when a concurrent clear already moved the
                        // hint away; the value then went out with the old chain.
                        let _ = self.tail.compare_exchange(
                            tail,
                            node,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                        tail_ref.unlock();
                        unsafe { (*node).unlock() };
                        return true;
                    }

                    // Lagging hint. The successor cannot be retired while we
                    // hold its predecessor's lock.
                    let next = tail_ref.get_next();
                    let _ =
                        self.tail
                            .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Acquire);
                    tail_ref.unlock();
                    continue;
                }
                Err(Marker::Zombie) => {
                    if self.try_repair_tail(tail) {
                        continue;
                    }
                }
                Err(_) => {}
            }

            backoff.snooze();
        }
    }

    /// Claim `dead`, a zombie the hint points at, and move the hint off it.
    ///
    /// Declines while `dead` is still reachable from head: a claimed zombie
    /// reads as locked, and readers would count it. Unlinked zombies are never
    /// linked again, so the check cannot go stale.
    fn try_repair_tail(&self, dead: NodePtr<T>) -> bool {
        if self.is_linked(dead) {
            return false;
        }

        let dead_ref = unsafe { &*dead };
        if !dead_ref.try_claim_zombie() {
            return false;
        }
        self.repair_tail(dead);
        dead_ref.restore_zombie();
        true
    }

    /// Move the hint off `dead`, a zombie this thread has claimed.
    fn repair_tail(&self, dead: NodePtr<T>) {
        tracing::debug!(?dead, "tail hint points at a removed node, repairing");
        let backoff = Backoff::new();

        while self.tail.load(Ordering::Acquire) == dead {
            let last = self.last_node();
            let last_ref = unsafe { &*last };

            if last_ref.try_lock().is_ok() {
                let is_last = last_ref.get_next().is_null();
                if is_last {
                    let _ =
                        self.tail
                            .compare_exchange(dead, last, Ordering::AcqRel, Ordering::Acquire);
                }
                last_ref.unlock();
                if is_last {
                    return;
                }
            }

            backoff.snooze();
        }
    }

    fn is_linked(&self, node: NodePtr<T>) -> bool {
        let mut curr = self.head.load(Ordering::Acquire);
        while !curr.is_null() {
            if curr == node {
                return true;
            }
            curr = unsafe { (*curr).get_next() };
        }
        false
    }

    /// Walk from head to the node without a successor.
    fn last_node(&self) -> NodePtr<T> {
        let mut curr = self.head.load(Ordering::Acquire);
        loop {
            let next = unsafe { (*curr).get_next() };
            if next.is_null() {
                return curr;
            }
            curr = next;
        }
    }

    /// Remove the first live node holding a value equal to `value`.
    ///
    /// Returns `true` if a node was removed, `false` if no equal value was found.
    ///
    pub fn remove(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let _guard = G::pin();
        let backoff = Backoff::new();

        'scan: loop {
            let mut prev = self.head.load(Ordering::Acquire);
            let mut curr = unsafe { (*prev).get_next() };

            while !curr.is_null() {
                let node = unsafe { &*curr };

                if !node.is_zombie() && node.value() == Some(value) {
                    match self.unlink(prev, curr) {
                        Unlink::Removed => return true,
                        Unlink::Contended | Unlink::Gone => {
                            backoff.spin();
                            continue 'scan;
                        }
                    }
                }

                prev = curr;
                curr = node.get_next();
            }

            return false;
        }
    }

    /// One attempt at the unlink protocol for `node`, presumed successor of `pred`.
    fn unlink(&self, pred: NodePtr<T>, node: NodePtr<T>) -> Unlink {
        let pred_ref = unsafe { &*pred };
        if pred_ref.try_lock().is_err() {
            return Unlink::Contended;
        }

        if pred_ref.get_next() != node {
            pred_ref.unlock();
            return Unlink::Contended;
        }

        let node_ref = unsafe { &*node };
        match node_ref.try_retire() {
            Ok(()) => {}
            Err(Marker::Zombie) => {
                pred_ref.unlock();
                return Unlink::Gone;
            }
            Err(_) => {
                pred_ref.unlock();
                return Unlink::Contended;
            }
        }

        // Stable: a zombie can no longer be locked by an appender.
        pred_ref.set_next(node_ref.get_next());
        let _ = self
            .tail
            .compare_exchange(node, pred, Ordering::AcqRel, Ordering::Acquire);
        pred_ref.unlock();

        // Safety: node is unreachable from head and the hint has been moved off it.
        unsafe {
            self.guard.defer_destroy(node, Node::dealloc_ptr);
        }
        Unlink::Removed
    }

    /// Remove exactly `target`, the node an iterator last yielded.
    ///
    /// `hint` is the last known predecessor. Returns `false` if the node was
    /// already removed or is no longer reachable.
    pub(super) fn unlink_exact(&self, hint: NodePtr<T>, target: NodePtr<T>) -> bool {
        let backoff = Backoff::new();

        loop {
            if unsafe { (*target).is_zombie() } {
                return false;
            }

            let pred = match Self::predecessor_from(hint, target) {
                Some(pred) => pred,
                None => {
                    tracing::trace!(?target, "predecessor not found from cursor, rescanning from head");
                    match Self::predecessor_from(self.head.load(Ordering::Acquire), target) {
                        Some(pred) => pred,
                        None => return false,
                    }
                }
            };

            match self.unlink(pred, target) {
                Unlink::Removed => return true,
                Unlink::Gone => return false,
                Unlink::Contended => backoff.spin(),
            }
        }
    }

    /// Forward scan from `start` for the node whose link points at `target`.
    ///
    /// A zombie `start` is not authoritative and yields `None`.
    fn predecessor_from(start: NodePtr<T>, target: NodePtr<T>) -> Option<NodePtr<T>> {
        if unsafe { (*start).is_zombie() } {
            return None;
        }

        let mut curr = start;
        while !curr.is_null() {
            let next = unsafe { (*curr).get_next() };
            if next == target {
                return Some(curr);
            }
            curr = next;
        }
        None
    }

    /// Replace the whole chain with a fresh sentinel.
    ///
    /// Returns `true` if the detached chain held at least one live value.
    /// O(1): the old chain is handed to the guard as a single unit.
    ///
    pub fn clear(&self) -> bool {
        let _guard = G::pin();
        let fresh = Box::into_raw(Box::new(Node::new_locked_sentinel()));
        let backoff = Backoff::new();

        let detached = loop {
            let head = self.head.load(Ordering::Acquire);
            let head_ref = unsafe { &*head };

            if head_ref.try_lock().is_ok() {
                match self
                    .head
                    .compare_exchange(head, fresh, Ordering::AcqRel, Ordering::Acquire)
                {
                    Ok(_) => break head,
                    Err(_) => head_ref.unlock(),
                }
            }

            backoff.snooze();
        };

        let mut tail = self.tail.load(Ordering::Acquire);
        while let Err(actual) =
            self.tail
                .compare_exchange_weak(tail, fresh, Ordering::AcqRel, Ordering::Acquire)
        {
            tail = actual;
        }

        let changed = Self::next_live(detached).is_some();

        // The detached sentinel never accepts a lock again.
        unsafe {
            (*detached).retire_locked();
            (*fresh).unlock();
        }

        tracing::debug!(changed, "collection cleared");

        // Safety: unreachable from head, and the hint now sits on `fresh`.
        unsafe {
            self.guard.defer_destroy(detached, Node::dealloc_chain);
        }
        changed
    }

    /// Check if an equal value is present.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let _guard = G::pin();
        self.find_live(value).is_some()
    }

    /// Find and return a guarded reference to the first equal value.
    pub fn find(&self, value: &T) -> Option<G::GuardedRef<'_, T>>
    where
        T: PartialEq,
    {
        let _guard = G::pin();
        let node = self.find_live(value)?;
        let data = unsafe { (*node).value()? } as *const T;

        // Safety: the pin above protects the node; make_ref carries its own protection
        unsafe { Some(G::make_ref(data)) }
    }

    /// Number of live values.
    ///
    /// A point-in-time approximation under concurrent mutation. Zombies are
    /// not counted, as for `contains` and iteration.
    pub fn len(&self) -> usize {
        let _guard = G::pin();
        let mut count = 0;
        let mut current = Self::next_live(self.head.load(Ordering::Acquire));
        while let Some(node) = current {
            count += 1;
            current = Self::next_live(node);
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        let _guard = G::pin();
        Self::next_live(self.head.load(Ordering::Acquire)).is_none()
    }

    /// Collect all live values into a Vec, in chain order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().map(|value| T::clone(&value)).collect()
    }

    /// Lazy, live view of the collection. See [`Iter`].
    pub fn iter(&self) -> Iter<'_, T, G> {
        Iter::new(self)
    }

    // =========================================================================
    // Bulk operations (element-wise, not atomic as a whole)
    // =========================================================================

    /// Append a copy of every value of `other`.
    ///
    /// Returns `Ok(true)` if anything was appended. Passing the collection
    /// itself is rejected.
    pub fn add_all(&self, other: &Self) -> Result<bool, CollectionError>
    where
        T: Clone,
    {
        if ptr::eq(self, other) {
            return Err(CollectionError::InvalidArgument(
                "a collection cannot add all of its own values to itself",
            ));
        }
        Ok(self.extend_from(other.iter().map(|value| T::clone(&value))))
    }

    /// Append every value of `values`. Returns `true` if anything was appended.
    pub fn extend_from<I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        let mut changed = false;
        for value in values {
            changed |= self.add(value);
        }
        changed
    }

    /// Remove one occurrence for every value of `other`.
    ///
    /// On itself this is `clear`.
    pub fn remove_all(&self, other: &Self) -> bool
    where
        T: PartialEq,
    {
        if ptr::eq(self, other) {
            return self.clear();
        }

        let mut changed = false;
        for value in other.iter() {
            changed |= self.remove(&*value);
        }
        changed
    }

    /// Keep only values that `other` contains.
    ///
    /// On itself this is a no-op; with an empty `other` it is `clear`.
    pub fn retain_all(&self, other: &Self) -> bool
    where
        T: PartialEq,
    {
        if ptr::eq(self, other) {
            return false;
        }
        if other.is_empty() {
            return self.clear();
        }
        self.retain(|value| other.contains(value))
    }

    /// Remove every node whose value fails `keep`.
    ///
    /// Removal goes through the iterator, so the exact node visited is removed
    /// even when equal values exist elsewhere in the chain.
    pub fn retain<F>(&self, mut keep: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        let mut changed = false;
        let mut iter = self.iter();
        while let Some(value) = iter.next() {
            if !keep(&value) {
                // Ok(false): a concurrent remove got there first
                changed |= iter.remove().unwrap_or(false);
            }
        }
        changed
    }

    pub fn contains_all(&self, other: &Self) -> bool
    where
        T: PartialEq,
    {
        if ptr::eq(self, other) {
            return true;
        }
        other.iter().all(|value| self.contains(&*value))
    }

    // =========================================================================
    // Traversal helpers (caller must be pinned)
    // =========================================================================

    pub(super) fn head_ptr(&self) -> NodePtr<T> {
        self.head.load(Ordering::Acquire)
    }

    /// First live node strictly after `from`.
    pub(super) fn next_live(from: NodePtr<T>) -> Option<NodePtr<T>> {
        let mut curr = unsafe { (*from).get_next() };
        while !curr.is_null() {
            if !unsafe { (*curr).is_zombie() } {
                return Some(curr);
            }
            curr = unsafe { (*curr).get_next() };
        }
        None
    }

    fn find_live(&self, value: &T) -> Option<NodePtr<T>>
    where
        T: PartialEq,
    {
        let mut current = Self::next_live(self.head.load(Ordering::Acquire));
        while let Some(node) = current {
            if unsafe { (*node).value() } == Some(value) {
                return Some(node);
            }
            current = Self::next_live(node);
        }
        None
    }
}

impl<T: 'static, G: Guard> Default for ConcurrentCollection<T, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, G: Guard> FromIterator<T> for ConcurrentCollection<T, G> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let collection = Self::new();
        collection.extend_from(iter);
        collection
    }
}

impl<T: 'static, G: Guard> Extend<T> for ConcurrentCollection<T, G> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.extend_from(iter);
    }
}

impl<'a, T: 'static, G: Guard> IntoIterator for &'a ConcurrentCollection<T, G> {
    type Item = G::GuardedRef<'a, T>;
    type IntoIter = Iter<'a, T, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug + 'static, G: Guard> fmt::Debug for ConcurrentCollection<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for value in self.iter() {
            list.entry(&*value);
        }
        list.finish()
    }
}

impl<T, G: Guard> Drop for ConcurrentCollection<T, G> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        debug_assert!(unsafe { (*head).is_sentinel() });

        // Zombies are unlinked before the removing call returns.
        debug_assert!({
            let mut curr = unsafe { (*head).get_next() };
            let mut clean = true;
            while !curr.is_null() {
                clean &= unsafe { !(*curr).is_zombie() };
                curr = unsafe { (*curr).get_next() };
            }
            clean
        });

        // Safety: exclusive access; retired nodes and detached chains belong to the guard.
        unsafe {
            Node::dealloc_chain(head);
        }
    }
}

// Values are dropped on whichever thread frees their node.
unsafe impl<T: Send, G: Guard> Send for ConcurrentCollection<T, G> {}
unsafe impl<T: Send + Sync, G: Guard> Sync for ConcurrentCollection<T, G> {}

// ============================================================================
// Tests - internal state of the chain and the tail hint
// ============================================================================
// Note: behavioural tests are in common_tests and run against every guard
