// Node of the concurrent linked collection.
//
// Every node carries a three-state marker that doubles as a per-node advisory
// lock guarding the node's *outgoing* link:
//
//   AVAILABLE ──try_lock──► MUTATING ──unlock──► AVAILABLE
//       │
//       └──try_retire──► ZOMBIE ──try_claim_zombie──► MUTATING ──restore_zombie──► ZOMBIE
//
// - MUTATING is held by exactly one thread, which may append after the node or
//   unlink the node's successor.
// - ZOMBIE is terminal for membership: the node is logically deleted. The
//   Zombie→Mutating→Zombie round trip is the tail-repair claim. It is only
//   taken on a zombie already unlinked from the chain, so readers starting
//   from head never see it. A reader that reached the node before the unlink
//   sees it as live while it is claimed.
//
// Writes to `next` happen only while the writer holds this node's lock, so a
// node's successor is stable whenever its marker is AVAILABLE or ZOMBIE.
//
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

pub(crate) type NodePtr<T> = *mut Node<T>;

/// Three-state node marker.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker {
    /// Live and unlocked.
    Available = 0,
    /// Live (or, briefly, a zombie claimed for tail repair) and locked by one thread.
    Mutating = 1,
    /// Logically deleted.
    Zombie = 2,
}

impl Marker {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Marker::Available,
            1 => Marker::Mutating,
            _ => Marker::Zombie,
        }
    }
}

pub(crate) struct Node<T> {
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
    marker: AtomicU8,
}

impl<T> Node<T> {
    /// A value node, pre-locked so nothing can be appended after it before it
    /// is linked in.
    pub(crate) fn new_locked(value: T) -> Self {
        Node {
            value: Some(value),
            next: AtomicPtr::new(ptr::null_mut()),
            marker: AtomicU8::new(Marker::Mutating as u8),
        }
    }

    pub(crate) fn new_sentinel() -> Self {
        Node {
            value: None,
            next: AtomicPtr::new(ptr::null_mut()),
            marker: AtomicU8::new(Marker::Available as u8),
        }
    }

    /// A sentinel that stays locked until the tail hint has been moved onto it.
    pub(crate) fn new_locked_sentinel() -> Self {
        Node {
            value: None,
            next: AtomicPtr::new(ptr::null_mut()),
            marker: AtomicU8::new(Marker::Mutating as u8),
        }
    }

    #[inline]
    pub(crate) fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[inline]
    pub(crate) fn is_sentinel(&self) -> bool {
        self.value.is_none()
    }

    // =========================================================================
    // Next pointer accessors
    // =========================================================================

    #[inline]
    pub(crate) fn get_next(&self) -> NodePtr<T> {
        self.next.load(Ordering::Acquire)
    }

    /// Redirect the link. Caller must hold this node's lock.
    #[inline]
    pub(crate) fn set_next(&self, next: NodePtr<T>) {
        debug_assert_eq!(self.marker(), Marker::Mutating);
        self.next.store(next, Ordering::Release)
    }

    /// CAS the link. Caller must hold this node's lock.
    #[inline]
    pub(crate) fn cas_next(
        &self,
        expected: NodePtr<T>,
        new: NodePtr<T>,
    ) -> Result<NodePtr<T>, NodePtr<T>> {
        debug_assert_eq!(self.marker(), Marker::Mutating);
        self.next
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
    }

    // =========================================================================
    // Marker transitions
    // =========================================================================

    #[inline]
    pub(crate) fn marker(&self) -> Marker {
        Marker::from_u8(self.marker.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn is_zombie(&self) -> bool {
        self.marker() == Marker::Zombie
    }

    /// Acquire the advisory lock. On failure returns the marker that was seen.
    #[inline]
    pub(crate) fn try_lock(&self) -> Result<(), Marker> {
        self.transition(Marker::Available, Marker::Mutating)
    }

    /// Release the advisory lock. Only the lock holder may call this.
    #[inline]
    pub(crate) fn unlock(&self) {
        debug_assert_eq!(self.marker(), Marker::Mutating);
        self.marker
            .store(Marker::Available as u8, Ordering::Release)
    }

    /// Logically delete an unlocked live node.
    #[inline]
    pub(crate) fn try_retire(&self) -> Result<(), Marker> {
        self.transition(Marker::Available, Marker::Zombie)
    }

    /// Claim a zombie for tail-hint repair.
    #[inline]
    pub(crate) fn try_claim_zombie(&self) -> bool {
        self.transition(Marker::Zombie, Marker::Mutating).is_ok()
    }

    /// Hand a claimed zombie back.
    #[inline]
    pub(crate) fn restore_zombie(&self) {
        debug_assert_eq!(self.marker(), Marker::Mutating);
        self.marker.store(Marker::Zombie as u8, Ordering::Release)
    }

    /// Retire a node this thread holds locked, such as a detached sentinel.
    #[inline]
    pub(crate) fn retire_locked(&self) {
        debug_assert_eq!(self.marker(), Marker::Mutating);
        self.marker.store(Marker::Zombie as u8, Ordering::Release)
    }

    #[inline]
    fn transition(&self, from: Marker, to: Marker) -> Result<(), Marker> {
        self.marker
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(Marker::from_u8)
    }

    // =========================================================================
    // Deallocation
    // =========================================================================

    /// Free a single node.
    ///
    /// # Safety
    /// `ptr` must come from `Box::into_raw` and must not be used afterwards.
    pub(crate) unsafe fn dealloc_ptr(ptr: NodePtr<T>) {
        drop(unsafe { Box::from_raw(ptr) });
    }

    /// Free a node and everything reachable from it.
    ///
    /// # Safety
    /// Every node reachable from `ptr` must be owned by this chain alone: no
    /// other thread may still traverse or mutate it, and none of the nodes may
    /// have been handed to a guard separately.
    pub(crate) unsafe fn dealloc_chain(ptr: NodePtr<T>) {
        let mut curr = ptr;
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            unsafe { Self::dealloc_ptr(curr) };
            curr = next;
        }
    }
}
