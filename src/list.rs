use std::fmt;
use std::marker::PhantomData;

use seize::{Collector, Guard, LocalGuard};

use crate::raw;

/// A lock-free singly linked list with insertion and removal at the front.
///
/// Values can also be removed from anywhere in the list with
/// [`remove`](LockFreeList::remove). Removal first marks a node as deleted
/// and then unlinks it, so removals of neighbouring nodes and insertions at
/// the front never lose each other's updates.
///
/// As with [`LockFreeStack`](crate::LockFreeStack), values live in their
/// node until it is reclaimed. The convenience accessors clone; borrow
/// through [`pin`](LockFreeList::pin) to avoid that.
///
/// # Examples
///
/// ```
/// use kumquat::LockFreeList;
///
/// let list = LockFreeList::new();
/// list.push_front("b");
/// list.push_front("a");
///
/// let values: Vec<_> = list.pin().iter().copied().collect();
/// assert_eq!(values, ["a", "b"]);
///
/// assert_eq!(list.pop_front(), Some("a"));
/// assert!(!list.is_empty());
/// ```
pub struct LockFreeList<T> {
    raw: raw::RawList<T>,
    collector: Collector,
    _marker: PhantomData<T>,
}

// Safety: see `LockFreeStack`.
unsafe impl<T: Send> Send for LockFreeList<T> {}
unsafe impl<T: Send + Sync> Sync for LockFreeList<T> {}

impl<T> Default for LockFreeList<T> {
    fn default() -> Self {
        LockFreeList::new()
    }
}

impl<T> LockFreeList<T> {
    /// Creates an empty list.
    pub fn new() -> LockFreeList<T> {
        LockFreeList::with_collector(Collector::new())
    }

    /// Creates an empty list that retires nodes to the given collector.
    pub fn with_collector(collector: Collector) -> LockFreeList<T> {
        LockFreeList {
            raw: raw::RawList::new(),
            collector,
            _marker: PhantomData,
        }
    }

    /// Returns a pinned reference to the list.
    ///
    /// Values borrowed through the reference stay valid until it is dropped.
    #[inline]
    pub fn pin(&self) -> ListRef<'_, T, LocalGuard<'_>> {
        ListRef {
            list: self,
            guard: self.collector.enter(),
        }
    }

    /// Inserts a value at the front of the list.
    #[inline]
    pub fn push_front(&self, value: T) {
        self.pin().push_front(value);
    }

    /// Removes the value at the front of the list.
    ///
    /// Each value is popped at most once. A `push_front` racing with the pop
    /// can land in front of the value being removed, in which case the popped
    /// value is the one just behind the new front. A third thread calling
    /// [`contains`](LockFreeList::contains) during that race may observe the
    /// new front and miss the popped value at the same time.
    #[inline]
    pub fn pop_front(&self) -> Option<T>
    where
        T: Clone,
    {
        self.pin().pop_front().cloned()
    }

    /// Returns a copy of the value at the front of the list.
    #[inline]
    pub fn front(&self) -> Option<T>
    where
        T: Clone,
    {
        self.pin().front().cloned()
    }

    /// Returns `true` if the list contains a value equal to `value`.
    #[inline]
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.pin().find(|x| x == value).is_some()
    }

    /// Removes the first value equal to `value`, returning whether one was
    /// found.
    #[inline]
    pub fn remove(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.pin().remove(|x| x == value).is_some()
    }

    /// Returns `true` if the list contains no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pin().is_empty()
    }

    /// Returns the number of values in the list.
    ///
    /// This walks the whole list, and is only exact when no other thread
    /// is modifying it.
    #[inline]
    pub fn len(&self) -> usize {
        self.pin().len()
    }

    /// Removes every value from the list.
    #[inline]
    pub fn clear(&self) {
        self.pin().clear();
    }
}

/// A pinned reference to a [`LockFreeList`].
///
/// Created by [`LockFreeList::pin`].
pub struct ListRef<'list, T, G> {
    list: &'list LockFreeList<T>,
    guard: G,
}

impl<'list, T, G> ListRef<'list, T, G>
where
    G: Guard,
{
    /// Inserts a value at the front of the list, returning a reference to it.
    #[inline]
    pub fn push_front(&self, value: T) -> &T {
        self.list.raw.push_front(value, &self.guard)
    }

    /// Removes the value at the front of the list.
    ///
    /// See [`LockFreeList::pop_front`] for how this orders against racing
    /// pushes.
    #[inline]
    pub fn pop_front(&self) -> Option<&T> {
        self.list.raw.pop_front(&self.guard)
    }

    /// Returns the value at the front of the list.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.list.raw.front(&self.guard)
    }

    /// Returns the first value matching the predicate.
    #[inline]
    pub fn find(&self, pred: impl FnMut(&T) -> bool) -> Option<&T> {
        self.list.raw.find(pred, &self.guard)
    }

    /// Removes the first value matching the predicate.
    #[inline]
    pub fn remove(&self, pred: impl FnMut(&T) -> bool) -> Option<&T> {
        self.list.raw.remove(pred, &self.guard)
    }

    /// Returns `true` if the list contains no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.raw.is_empty(&self.guard)
    }

    /// Returns the number of values in the list.
    #[inline]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Removes every value from the list.
    #[inline]
    pub fn clear(&self) {
        self.list.raw.clear(&self.guard);
    }

    /// Returns an iterator over the list, from front to back.
    ///
    /// The iterator is not a snapshot: values inserted at the front after it
    /// was created are not visited, and values removed before the iterator
    /// reaches them are skipped. No value is visited twice.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T, G> {
        Iter {
            raw: self.list.raw.iter(&self.guard),
        }
    }
}

impl<'a, T, G: Guard> IntoIterator for &'a ListRef<'_, T, G> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug, G: Guard> fmt::Debug for ListRef<'_, T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// An iterator over a [`LockFreeList`].
///
/// Created by [`ListRef::iter`].
pub struct Iter<'g, T, G> {
    raw: raw::Iter<'g, T, G>,
}

impl<'g, T: 'g, G: Guard> Iterator for Iter<'g, T, G> {
    type Item = &'g T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.raw.next()
    }
}

impl<T> Extend<T> for &LockFreeList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let list = self.pin();
        for value in iter {
            list.push_front(value);
        }
    }
}

impl<T> Extend<T> for LockFreeList<T> {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        (&*self).extend(iter);
    }
}

impl<T> FromIterator<T> for LockFreeList<T> {
    /// Builds a list by pushing each value to the front, so the list ends
    /// up in reverse iteration order.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = LockFreeList::new();
        list.extend(iter);
        list
    }
}

impl<T: fmt::Debug> fmt::Debug for LockFreeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.pin(), f)
    }
}
