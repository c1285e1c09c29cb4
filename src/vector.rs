use std::cell::UnsafeCell;
use std::fmt;
use std::mem;

use crate::cfg::trace;
use crate::error::AccessError;
use crate::lock::{RawLock, ScopedLock, Spinlock};

/// The capacity of a vector created with [`ThreadSafeVector::new`].
pub const DEFAULT_CAPACITY: usize = 16;

/// A growable array guarded by a spinlock.
///
/// Unlike the node-based containers this is not lock-free: every operation,
/// reads included, runs while holding the vector's lock `L`. The lock is a
/// [`Spinlock`] by default and can be any [`RawLock`], for example a
/// [`TicketSpinlock`](crate::TicketSpinlock) for FIFO access.
///
/// When full, the buffer doubles in capacity.
///
/// Accessors return clones. To work with the elements in place, use
/// [`with_slice`](ThreadSafeVector::with_slice) or
/// [`with_mut`](ThreadSafeVector::with_mut). The lock is not reentrant, so
/// the closures passed to them must not access the same vector.
///
/// # Examples
///
/// ```
/// use kumquat::{AccessError, ThreadSafeVector};
///
/// let vector: ThreadSafeVector<_> = ThreadSafeVector::with_capacity(2);
/// vector.push_back(1);
/// vector.push_back(2);
/// vector.push_back(3);
///
/// assert_eq!(vector.len(), 3);
/// assert_eq!(vector.capacity(), 4);
/// assert_eq!(vector.at(5), None);
/// assert_eq!(vector.get(5), Err(AccessError::OutOfRange { index: 5, len: 3 }));
/// assert_eq!(vector.back(), Ok(3));
/// ```
pub struct ThreadSafeVector<T, L = Spinlock> {
    lock: L,
    data: UnsafeCell<Vec<T>>,
}

// Safety: the buffer is only accessed while holding the lock.
unsafe impl<T: Send, L: RawLock + Sync> Sync for ThreadSafeVector<T, L> {}

impl<T, L> Default for ThreadSafeVector<T, L>
where
    L: RawLock + Default,
{
    fn default() -> Self {
        ThreadSafeVector::new()
    }
}

impl<T, L> ThreadSafeVector<T, L>
where
    L: RawLock + Default,
{
    /// Creates an empty vector with the default capacity.
    pub fn new() -> ThreadSafeVector<T, L> {
        ThreadSafeVector::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty vector with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> ThreadSafeVector<T, L> {
        ThreadSafeVector::from_vec(Vec::with_capacity(capacity))
    }

    fn from_vec(data: Vec<T>) -> ThreadSafeVector<T, L> {
        ThreadSafeVector {
            lock: L::default(),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T, L> ThreadSafeVector<T, L>
where
    L: RawLock,
{
    // Runs `f` on the buffer while holding the lock.
    #[inline]
    fn locked<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        let _guard = ScopedLock::new(&self.lock);

        // Safety: we hold the lock, and the reference does not escape `f`.
        f(unsafe { &mut *self.data.get() })
    }

    /// Appends an element, doubling the capacity if the vector is full.
    pub fn push_back(&self, value: T) {
        self.locked(|data| {
            if data.len() == data.capacity() {
                let additional = data.capacity().max(1);
                trace!(
                    "growing vector from {} to {} elements",
                    data.capacity(),
                    data.capacity() + additional
                );
                data.reserve_exact(additional);
            }

            data.push(value);
        })
    }

    /// Removes the last element and returns it.
    #[inline]
    pub fn pop_back(&self) -> Option<T> {
        self.locked(Vec::pop)
    }

    /// Returns a copy of the element at `index`, or `None` if out of range.
    #[inline]
    pub fn at(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.locked(|data| data.get(index).cloned())
    }

    /// Returns a copy of the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::OutOfRange`] if `index` is not less than the
    /// length.
    #[inline]
    pub fn get(&self, index: usize) -> Result<T, AccessError>
    where
        T: Clone,
    {
        self.locked(|data| {
            data.get(index).cloned().ok_or(AccessError::OutOfRange {
                index,
                len: data.len(),
            })
        })
    }

    /// Replaces the element at `index`, returning the old one.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::OutOfRange`] if `index` is not less than the
    /// length, dropping `value`.
    pub fn set(&self, index: usize, value: T) -> Result<T, AccessError> {
        self.locked(|data| {
            let len = data.len();
            match data.get_mut(index) {
                Some(slot) => Ok(mem::replace(slot, value)),
                None => Err(AccessError::OutOfRange { index, len }),
            }
        })
    }

    /// Returns a copy of the first element.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Empty`] if the vector is empty.
    #[inline]
    pub fn front(&self) -> Result<T, AccessError>
    where
        T: Clone,
    {
        self.locked(|data| data.first().cloned().ok_or(AccessError::Empty))
    }

    /// Returns a copy of the last element.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Empty`] if the vector is empty.
    #[inline]
    pub fn back(&self) -> Result<T, AccessError>
    where
        T: Clone,
    {
        self.locked(|data| data.last().cloned().ok_or(AccessError::Empty))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.locked(|data| data.len())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.locked(|data| data.capacity())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locked(|data| data.is_empty())
    }

    /// Removes every element, keeping the allocated capacity.
    #[inline]
    pub fn clear(&self) {
        self.locked(Vec::clear)
    }

    /// Shrinks the capacity to the current length.
    ///
    /// Zero-sized types never allocate, so for them the capacity stays at
    /// `usize::MAX`.
    pub fn shrink_to_fit(&self) {
        self.locked(|data| {
            trace!("shrinking vector from {} to {} elements", data.capacity(), data.len());
            data.shrink_to_fit();
        })
    }

    /// Reserves room for at least `additional` more elements.
    #[inline]
    pub fn reserve(&self, additional: usize) {
        self.locked(|data| data.reserve(additional))
    }

    /// Returns a copy of the current contents.
    #[inline]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.locked(|data| data.clone())
    }

    /// Runs `f` on the contents while holding the lock.
    #[inline]
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.locked(|data| f(data))
    }

    /// Runs `f` on the underlying `Vec` while holding the lock.
    ///
    /// ```
    /// use kumquat::ThreadSafeVector;
    ///
    /// let vector: ThreadSafeVector<_> = vec![3, 1, 2].into();
    /// vector.with_mut(|data| data.sort());
    /// assert_eq!(vector.to_vec(), [1, 2, 3]);
    /// ```
    #[inline]
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        self.locked(f)
    }

    /// Consumes the vector, returning the underlying `Vec`.
    #[inline]
    pub fn into_inner(self) -> Vec<T> {
        self.data.into_inner()
    }
}

impl<T, L> From<Vec<T>> for ThreadSafeVector<T, L>
where
    L: RawLock + Default,
{
    fn from(data: Vec<T>) -> Self {
        ThreadSafeVector::from_vec(data)
    }
}

impl<T, L: RawLock> Extend<T> for &ThreadSafeVector<T, L> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T, L: RawLock> Extend<T> for ThreadSafeVector<T, L> {
    #[inline]
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        // Exclusive access, no need to lock.
        self.data.get_mut().extend(iter);
    }
}

impl<T, L> FromIterator<T> for ThreadSafeVector<T, L>
where
    L: RawLock + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ThreadSafeVector::from_vec(iter.into_iter().collect())
    }
}

impl<T: fmt::Debug, L: RawLock> fmt::Debug for ThreadSafeVector<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_slice(|data| f.debug_list().entries(data).finish())
    }
}
