mod utils;

pub use utils::{CachePadded, Counter};

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use seize::{Collector, Guard};

use self::utils::{AtomicPtrFetchOps, StrictProvenance, Unpack};
use crate::backoff::Backoff;
use crate::cfg::trace;

// A lock-free singly linked chain with front insertion and removal from
// anywhere in the chain.
//
// Removal is two-phase: a node is first logically deleted by setting the
// `DELETED` bit of its own `next` pointer, which freezes that link, and is
// then physically unlinked by a CAS on its predecessor's link. Whichever
// thread wins the unlinking CAS retires the node. A CAS on a link whose
// owner is deleted always fails, as the expected value is untagged.
//
// Every method takes a guard that must belong to the collector the chain's
// nodes are retired into. The public containers own that collector and
// never hand out guards from anywhere else.
pub struct RawList<T> {
    head: AtomicPtr<Node<T>>,
}

// A node in the chain.
pub struct Node<T> {
    pub value: T,

    // The successor, tagged with `DELETED` once this node is logically removed.
    next: AtomicPtr<Node<T>>,
}

impl Node<()> {
    // the node has been logically removed, its `next` link is frozen
    const DELETED: usize = 0b1;
}

impl<T> Unpack for Node<T> {
    const MASK: usize = !Node::DELETED;
}

impl<T> Node<T> {
    fn alloc(value: T) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

// Frees a retired node, dropping its value.
unsafe fn reclaim<T>(node: *mut Node<T>, _collector: &Collector) {
    // Safety: nodes are allocated with `Box` and retired exactly once,
    // by the thread that unlinked them.
    drop(unsafe { Box::from_raw(node) });
}

impl<T> RawList<T> {
    pub const fn new() -> RawList<T> {
        RawList {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    // Links `value` at the front of the chain.
    pub fn push_front<'g>(&'g self, value: T, _guard: &'g impl Guard) -> &'g T {
        let node = Node::alloc(value);
        let backoff = Backoff::new();

        loop {
            // The head is only used as the new node's successor, a recycled
            // address is still the current head.
            let head = self.head.load(Ordering::Relaxed);

            // Safety: the node is not yet shared.
            unsafe { (*node).next.store(head, Ordering::Relaxed) };

            if self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // Safety: the node may be removed concurrently, but cannot be
                // reclaimed before our guard is dropped.
                return unsafe { &(*node).value };
            }

            backoff.spin();
        }
    }

    // Links `value` at the front of the chain, unless a live node is equal to
    // it according to `eq`.
    //
    // All insertions happen at the head, so if the head has not changed since
    // the scan started, no matching node was inserted concurrently.
    pub fn try_push_front<'g>(
        &'g self,
        value: T,
        eq: impl Fn(&T, &T) -> bool,
        guard: &'g impl Guard,
    ) -> Result<&'g T, (&'g T, T)> {
        let node = Node::alloc(value);
        let backoff = Backoff::new();

        loop {
            let head = guard.protect(&self.head, Ordering::Acquire);

            // Safety: the node is not yet shared.
            let new = unsafe { &(*node).value };

            let mut chain = Iter {
                current: head,
                guard,
            };

            if let Some(current) = chain.find(|value| eq(*value, new)) {
                // Safety: the node was never published.
                let node = unsafe { Box::from_raw(node) };
                return Err((current, node.value));
            }

            // Safety: the node is not yet shared.
            unsafe { (*node).next.store(head, Ordering::Relaxed) };

            if self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // Safety: see `push_front`.
                return Ok(unsafe { &(*node).value });
            }

            backoff.spin();
        }
    }

    // Removes the first live node from the chain.
    pub fn pop_front<'g>(&'g self, guard: &'g impl Guard) -> Option<&'g T> {
        let backoff = Backoff::new();

        loop {
            let head = guard.protect(&self.head, Ordering::Acquire);

            if head.is_null() {
                return None;
            }

            // A push landed in front of `head` since we loaded it. The
            // window between this check and the mark below stays open, so a
            // racing push can still make us remove the second node.
            if self.head.load(Ordering::Acquire) != head {
                backoff.spin();
                continue;
            }

            // Safety: `head` was loaded through our guard.
            let next = unsafe { &(*head).next };

            // Logically delete the node.
            let succ = AtomicPtrFetchOps::fetch_or(next, Node::DELETED, Ordering::AcqRel).unpack();

            // Someone else removed this node first, help them unlink it
            // and try the next one.
            if succ.tag() & Node::DELETED != 0 {
                Self::unlink(&self.head, head, succ.ptr, guard);
                backoff.spin();
                continue;
            }

            if !Self::unlink(&self.head, head, succ.ptr, guard) {
                self.purge(guard);
            }

            // Safety: the node cannot be reclaimed before our guard is dropped.
            return Some(unsafe { &(*head).value });
        }
    }

    // Removes the first live node whose value matches `pred`.
    pub fn remove<'g>(
        &'g self,
        mut pred: impl FnMut(&T) -> bool,
        guard: &'g impl Guard,
    ) -> Option<&'g T> {
        loop {
            let (prev, node) = self.search(&mut pred, guard)?;

            // Safety: `node` was reached through our guard.
            let next = unsafe { &(*node).next };
            let succ = AtomicPtrFetchOps::fetch_or(next, Node::DELETED, Ordering::AcqRel).unpack();

            // Lost the race against another remover, look for the next match.
            if succ.tag() & Node::DELETED != 0 {
                continue;
            }

            if !Self::unlink(prev, node, succ.ptr, guard) {
                self.purge(guard);
            }

            // Safety: the node cannot be reclaimed before our guard is dropped.
            return Some(unsafe { &(*node).value });
        }
    }

    // Returns the first live value matching `pred`.
    #[inline]
    pub fn find<'g>(
        &'g self,
        mut pred: impl FnMut(&T) -> bool,
        guard: &'g impl Guard,
    ) -> Option<&'g T> {
        self.iter(guard).find(|value| pred(*value))
    }

    // Returns the first live value in the chain.
    #[inline]
    pub fn front<'g>(&'g self, guard: &'g impl Guard) -> Option<&'g T> {
        self.iter(guard).next()
    }

    // Removes every node, returning how many this thread removed.
    pub fn clear(&self, guard: &impl Guard) -> usize {
        let mut removed = 0;
        while self.pop_front(guard).is_some() {
            removed += 1;
        }
        removed
    }

    #[inline]
    pub fn is_empty(&self, guard: &impl Guard) -> bool {
        self.front(guard).is_none()
    }

    #[inline]
    pub fn iter<'g, G: Guard>(&'g self, guard: &'g G) -> Iter<'g, T, G> {
        Iter {
            current: guard.protect(&self.head, Ordering::Acquire),
            guard,
        }
    }

    // Finds the first live node matching `pred`, unlinking any deleted
    // nodes along the way.
    //
    // Returns the node along with the link that pointed to it.
    fn search<'g>(
        &'g self,
        mut pred: impl FnMut(&T) -> bool,
        guard: &'g impl Guard,
    ) -> Option<(&'g AtomicPtr<Node<T>>, *mut Node<T>)> {
        'retry: loop {
            let mut prev = &self.head;
            let mut curr = guard.protect(prev, Ordering::Acquire);

            while !curr.is_null() {
                // Safety: `curr` was reached through our guard.
                let next = unsafe { guard.protect(&(*curr).next, Ordering::Acquire) }.unpack();

                if next.tag() & Node::DELETED != 0 {
                    // The predecessor was removed or changed under us, restart
                    // from the head.
                    if !Self::unlink(prev, curr, next.ptr, guard) {
                        continue 'retry;
                    }

                    curr = next.ptr;
                    continue;
                }

                // Safety: `curr` was reached through our guard.
                if pred(unsafe { &(*curr).value }) {
                    return Some((prev, curr));
                }

                // Safety: `curr` was reached through our guard.
                prev = unsafe { &(*curr).next };
                curr = next.ptr;
            }

            return None;
        }
    }

    // Swings `prev` from `node` to `next`, retiring `node` on success.
    fn unlink(
        prev: &AtomicPtr<Node<T>>,
        node: *mut Node<T>,
        next: *mut Node<T>,
        guard: &impl Guard,
    ) -> bool {
        match prev.compare_exchange(node, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => {
                // Safety: the node is now unreachable from the head, and only
                // the thread that unlinked it retires it.
                unsafe { guard.defer_retire(node, reclaim::<T>) };
                true
            }
            Err(_) => false,
        }
    }

    // Unlinks every logically deleted node still reachable from the head.
    #[cold]
    fn purge(&self, guard: &impl Guard) {
        trace!("unlink lost a race, purging deleted nodes");
        let _ = self.search(|_| false, guard);
    }
}

impl<T> Drop for RawList<T> {
    fn drop(&mut self) {
        let mut node = *self.head.get_mut();

        // Nodes that were unlinked are owned by the collector. Everything
        // still reachable, deleted or not, is ours.
        while !node.is_null() {
            // Safety: we have `&mut self` and the node is non-null.
            let mut owned = unsafe { Box::from_raw(node) };
            node = owned.next.get_mut().unpack().ptr;
        }
    }
}

// An iterator over the live values of a chain.
pub struct Iter<'g, T, G> {
    current: *mut Node<T>,
    guard: &'g G,
}

impl<'g, T: 'g, G: Guard> Iterator for Iter<'g, T, G> {
    type Item = &'g T;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.current.is_null() {
            let node = self.current;

            // Safety: `node` was reached through our guard.
            let next = unsafe { self.guard.protect(&(*node).next, Ordering::Acquire) }.unpack();
            self.current = next.ptr;

            if next.tag() & Node::DELETED == 0 {
                // Safety: the node cannot be reclaimed before our guard is dropped.
                return Some(unsafe { &(*node).value });
            }
        }

        None
    }
}
