use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use seize::{Collector, Guard, LocalGuard};

use crate::backoff::Backoff;
use crate::raw::{CachePadded, Counter};

/// A lock-free LIFO stack.
///
/// A Treiber stack: `push` and `pop` are single CAS loops on the top
/// pointer. Popped nodes are retired to a [`Collector`] and freed only once
/// no thread can still be reading them, which also rules out ABA on the
/// top pointer, as an address cannot be reused while a thread that loaded it
/// is still active.
///
/// Values stay inside their node until the node is reclaimed. [`pop`] and
/// [`top`] therefore return clones; use [`pin`] to borrow values instead.
///
/// [`pop`]: LockFreeStack::pop
/// [`top`]: LockFreeStack::top
/// [`pin`]: LockFreeStack::pin
///
/// # Examples
///
/// ```
/// use kumquat::LockFreeStack;
///
/// let stack = LockFreeStack::new();
/// stack.push(1);
/// stack.push(2);
///
/// assert_eq!(stack.top(), Some(2));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// ```
pub struct LockFreeStack<T> {
    top: CachePadded<AtomicPtr<Node<T>>>,
    count: Counter,
    collector: Collector,
    _marker: PhantomData<T>,
}

struct Node<T> {
    value: T,
    next: *mut Node<T>,
}

// Safety: values are moved in from and borrowed by any thread, and dropped
// by whichever thread reclaims their node.
unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send + Sync> Sync for LockFreeStack<T> {}

unsafe fn reclaim<T>(node: *mut Node<T>, _collector: &Collector) {
    // Safety: nodes are allocated with `Box` and retired once, by the thread
    // that popped them.
    drop(unsafe { Box::from_raw(node) });
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        LockFreeStack::new()
    }
}

impl<T> LockFreeStack<T> {
    /// Creates an empty stack.
    pub fn new() -> LockFreeStack<T> {
        LockFreeStack::with_collector(Collector::new())
    }

    /// Creates an empty stack that retires nodes to the given collector.
    pub fn with_collector(collector: Collector) -> LockFreeStack<T> {
        LockFreeStack {
            top: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            count: Counter::default(),
            collector,
            _marker: PhantomData,
        }
    }

    /// Returns a pinned reference to the stack.
    ///
    /// The reference holds a reclamation guard for as long as it lives,
    /// and values borrowed through it remain valid until it is dropped, even
    /// if they are popped by another thread in the meantime.
    #[inline]
    pub fn pin(&self) -> StackRef<'_, T, LocalGuard<'_>> {
        StackRef {
            stack: self,
            guard: self.collector.enter(),
        }
    }

    /// Pushes a value onto the stack.
    #[inline]
    pub fn push(&self, value: T) {
        self.push_with(value, &self.collector.enter());
    }

    /// Pops the top value off the stack.
    ///
    /// Returns `None` if the stack is empty.
    #[inline]
    pub fn pop(&self) -> Option<T>
    where
        T: Clone,
    {
        self.pin().pop().cloned()
    }

    /// Returns a copy of the top value without removing it.
    ///
    /// The value may be popped by another thread as soon as this returns.
    #[inline]
    pub fn top(&self) -> Option<T>
    where
        T: Clone,
    {
        self.pin().top().cloned()
    }

    /// Returns the number of values on the stack.
    ///
    /// The count is maintained separately from the node chain, and may be
    /// stale under concurrent modification.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.total()
    }

    /// Returns `true` if the stack is empty.
    ///
    /// Like [`top`](LockFreeStack::top), this is a snapshot.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.top.load(Ordering::Acquire).is_null()
    }

    fn push_with(&self, value: T, guard: &impl Guard) {
        let node = Box::into_raw(Box::new(Node {
            value,
            next: ptr::null_mut(),
        }));

        let backoff = Backoff::new();

        loop {
            // The top is only stored as the new node's successor, never
            // dereferenced.
            let top = self.top.load(Ordering::Relaxed);

            // Safety: the node is not yet shared.
            unsafe { (*node).next = top };

            if self
                .top
                .compare_exchange(top, node, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }

            backoff.spin();
        }

        self.count.increment(guard);
    }

    fn pop_with<'g>(&self, guard: &'g impl Guard) -> Option<&'g T> {
        let backoff = Backoff::new();

        loop {
            let top = guard.protect(&self.top, Ordering::Acquire);

            if top.is_null() {
                return None;
            }

            // Safety: `top` was loaded through our guard, so it has not been
            // reclaimed, and a node's successor never changes once published.
            let next = unsafe { (*top).next };

            if self
                .top
                .compare_exchange(top, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.count.decrement(guard);

                // Safety: we unlinked the node, so we are the only thread
                // retiring it. It is not reclaimed until our guard is dropped.
                unsafe {
                    guard.defer_retire(top, reclaim::<T>);
                    return Some(&(*top).value);
                }
            }

            backoff.spin();
        }
    }

    fn top_with<'g>(&self, guard: &'g impl Guard) -> Option<&'g T> {
        let top = guard.protect(&self.top, Ordering::Acquire);

        // Safety: `top` was loaded through our guard.
        unsafe { top.as_ref().map(|node| &node.value) }
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        let mut node = *self.top.get_mut();

        while !node.is_null() {
            // Safety: we have `&mut self` and the node is non-null.
            let owned = unsafe { Box::from_raw(node) };
            node = owned.next;
        }
    }
}

/// A pinned reference to a [`LockFreeStack`].
///
/// Created by [`LockFreeStack::pin`].
pub struct StackRef<'stack, T, G> {
    stack: &'stack LockFreeStack<T>,
    guard: G,
}

impl<'stack, T, G> StackRef<'stack, T, G>
where
    G: Guard,
{
    /// Pushes a value onto the stack.
    #[inline]
    pub fn push(&self, value: T) {
        self.stack.push_with(value, &self.guard)
    }

    /// Pops the top value off the stack, borrowing it for the lifetime of
    /// this reference.
    #[inline]
    pub fn pop(&self) -> Option<&T> {
        self.stack.pop_with(&self.guard)
    }

    /// Returns the top value without removing it.
    #[inline]
    pub fn top(&self) -> Option<&T> {
        self.stack.top_with(&self.guard)
    }

    /// Returns the number of values on the stack.
    #[inline]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` if the stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Returns an iterator over the stack, from top to bottom.
    ///
    /// The iterator walks the chain as it was when the iterator was
    /// created. Values pushed afterwards are not visited; values popped
    /// afterwards still are.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            current: self.guard.protect(&self.stack.top, Ordering::Acquire),
            _guard: PhantomData,
        }
    }
}

impl<'a, T, G: Guard> IntoIterator for &'a StackRef<'_, T, G> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug, G: Guard> fmt::Debug for StackRef<'_, T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// An iterator over a [`LockFreeStack`], from top to bottom.
///
/// Created by [`StackRef::iter`].
pub struct Iter<'g, T> {
    current: *mut Node<T>,
    _guard: PhantomData<&'g T>,
}

impl<'g, T: 'g> Iterator for Iter<'g, T> {
    type Item = &'g T;

    fn next(&mut self) -> Option<Self::Item> {
        // Safety: every node reachable from a protected top stays allocated
        // while the guard lives, and a node's successor never changes.
        let node = unsafe { self.current.as_ref()? };
        self.current = node.next;
        Some(&node.value)
    }
}

/// An owning iterator over a [`LockFreeStack`], from top to bottom.
///
/// Created by the [`IntoIterator`] implementation of [`LockFreeStack`].
pub struct IntoIter<T> {
    stack: LockFreeStack<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let top = self.stack.top.get_mut();

        if top.is_null() {
            return None;
        }

        // Safety: we own the stack, so the node is exclusively ours.
        let node = unsafe { Box::from_raw(*top) };
        *top = node.next;
        Some(node.value)
    }
}

impl<T> IntoIterator for LockFreeStack<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { stack: self }
    }
}

impl<T> Extend<T> for &LockFreeStack<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let guard = self.collector.enter();
        for value in iter {
            self.push_with(value, &guard);
        }
    }
}

impl<T> Extend<T> for LockFreeStack<T> {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        (&*self).extend(iter);
    }
}

impl<T> FromIterator<T> for LockFreeStack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut stack = LockFreeStack::new();
        stack.extend(iter);
        stack
    }
}

impl<T: fmt::Debug> fmt::Debug for LockFreeStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.pin(), f)
    }
}
