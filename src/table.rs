use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::slice;

use seize::{Collector, Guard, LocalGuard};

use crate::cfg::trace;
use crate::error::OccupiedError;
use crate::raw::{self, CachePadded, Counter, RawList};

/// The number of buckets used when none is configured.
pub const DEFAULT_BUCKETS: usize = 16;

/// A lock-free hash table with a fixed number of buckets.
///
/// Each bucket is an independent lock-free chain, and an entry lives in
/// bucket `hash(key) % buckets`. The bucket count is chosen at construction
/// and never changes, so it should be sized for the expected load.
///
/// [`insert`](LockFreeHashTable::insert) always adds a new entry, even if
/// the key is already present. Lookups see the most recently inserted entry
/// for a key, and [`erase`](LockFreeHashTable::erase) removes that one,
/// uncovering the previous entry if there was one. Use
/// [`TableRef::try_insert`] to insert only if the key is absent.
///
/// # Examples
///
/// ```
/// use kumquat::LockFreeHashTable;
///
/// let table = LockFreeHashTable::with_buckets(16);
/// table.insert("a", 1);
/// table.insert("b", 2);
///
/// assert_eq!(table.find("a"), Some(1));
/// assert_eq!(table.find("c"), None);
///
/// assert!(table.erase("a"));
/// assert_eq!(table.find("a"), None);
/// assert_eq!(table.len(), 1);
/// ```
pub struct LockFreeHashTable<K, V, S = RandomState> {
    buckets: Box<[CachePadded<RawList<(K, V)>>]>,
    count: Counter,
    collector: Collector,
    build_hasher: S,
}

// Safety: entries are moved in from and borrowed by any thread, and dropped
// by whichever thread reclaims their node.
unsafe impl<K: Send, V: Send, S: Send> Send for LockFreeHashTable<K, V, S> {}
unsafe impl<K, V, S> Sync for LockFreeHashTable<K, V, S>
where
    K: Send + Sync,
    V: Send + Sync,
    S: Sync,
{
}

/// A builder for a [`LockFreeHashTable`].
///
/// # Examples
///
/// ```
/// use kumquat::{Collector, LockFreeHashTable};
/// use std::collections::hash_map::RandomState;
///
/// let table: LockFreeHashTable<u32, u32> = LockFreeHashTable::builder()
///     .buckets(64)
///     .hasher(RandomState::new())
///     .collector(Collector::new().batch_size(32))
///     .build();
///
/// assert_eq!(table.bucket_count(), 64);
/// ```
pub struct LockFreeHashTableBuilder<K, V, S = RandomState> {
    hasher: S,
    buckets: usize,
    collector: Collector,
    _kv: PhantomData<(K, V)>,
}

impl<K, V> LockFreeHashTableBuilder<K, V> {
    /// Set the hash builder used to hash keys.
    pub fn hasher<S>(self, hasher: S) -> LockFreeHashTableBuilder<K, V, S> {
        LockFreeHashTableBuilder {
            hasher,
            buckets: self.buckets,
            collector: self.collector,
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> LockFreeHashTableBuilder<K, V, S> {
    /// Set the number of buckets.
    ///
    /// A bucket count of zero is treated as one.
    pub fn buckets(self, buckets: usize) -> Self {
        LockFreeHashTableBuilder { buckets, ..self }
    }

    /// Set the collector that removed entries are retired to.
    pub fn collector(self, collector: Collector) -> Self {
        LockFreeHashTableBuilder { collector, ..self }
    }

    /// Construct a [`LockFreeHashTable`] from the builder.
    pub fn build(self) -> LockFreeHashTable<K, V, S> {
        let buckets = self.buckets.max(1);
        trace!("allocating hash table with {buckets} buckets");

        LockFreeHashTable {
            buckets: (0..buckets)
                .map(|_| CachePadded::new(RawList::new()))
                .collect(),
            count: Counter::default(),
            collector: self.collector,
            build_hasher: self.hasher,
        }
    }
}

impl<K, V, S> fmt::Debug for LockFreeHashTableBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeHashTableBuilder")
            .field("buckets", &self.buckets)
            .finish()
    }
}

impl<K, V> Default for LockFreeHashTable<K, V> {
    fn default() -> Self {
        LockFreeHashTable::new()
    }
}

impl<K, V> LockFreeHashTable<K, V> {
    /// Creates an empty table with the default number of buckets.
    pub fn new() -> LockFreeHashTable<K, V> {
        LockFreeHashTable::with_buckets(DEFAULT_BUCKETS)
    }

    /// Creates an empty table with the given number of buckets.
    pub fn with_buckets(buckets: usize) -> LockFreeHashTable<K, V> {
        LockFreeHashTable::builder().buckets(buckets).build()
    }

    /// Returns a builder for a table.
    pub fn builder() -> LockFreeHashTableBuilder<K, V> {
        LockFreeHashTableBuilder {
            hasher: RandomState::default(),
            buckets: DEFAULT_BUCKETS,
            collector: Collector::new(),
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> LockFreeHashTable<K, V, S> {
    /// Creates an empty table with the default number of buckets, hashing
    /// keys with `build_hasher`.
    pub fn with_hasher(build_hasher: S) -> LockFreeHashTable<K, V, S> {
        LockFreeHashTable::with_buckets_and_hasher(DEFAULT_BUCKETS, build_hasher)
    }

    /// Creates an empty table with the given number of buckets, hashing
    /// keys with `build_hasher`.
    pub fn with_buckets_and_hasher(buckets: usize, build_hasher: S) -> LockFreeHashTable<K, V, S> {
        LockFreeHashTable::builder()
            .hasher(build_hasher)
            .buckets(buckets)
            .build()
    }

    /// Returns a pinned reference to the table.
    ///
    /// Entries borrowed through the reference stay valid until it is
    /// dropped, even if they are erased by another thread.
    #[inline]
    pub fn pin(&self) -> TableRef<'_, K, V, S, LocalGuard<'_>> {
        TableRef {
            table: self,
            guard: self.collector.enter(),
        }
    }

    /// Returns the number of buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns a reference to the table's hash builder.
    #[inline]
    pub fn hasher(&self) -> &S {
        &self.build_hasher
    }

    /// Returns the number of entries in the table.
    ///
    /// Counted on the side, so it may be stale under concurrent
    /// modification.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.total()
    }

    /// Returns `true` if no bucket holds an entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pin().is_empty()
    }

    /// Removes every entry from the table.
    #[inline]
    pub fn clear(&self) {
        self.pin().clear()
    }
}

impl<K, V, S> LockFreeHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts an entry.
    ///
    /// An existing entry with the same key is shadowed, not replaced.
    #[inline]
    pub fn insert(&self, key: K, value: V) {
        self.pin().insert(key, value);
    }

    /// Returns a copy of the value most recently inserted under `key`.
    #[inline]
    pub fn find<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.pin().get(key).cloned()
    }

    /// Returns `true` if the table contains an entry for `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.pin().contains_key(key)
    }

    /// Removes the entry most recently inserted under `key`, returning
    /// whether there was one.
    #[inline]
    pub fn erase<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.pin().remove(key).is_some()
    }

    #[inline]
    fn bucket<Q>(&self, key: &Q) -> &RawList<(K, V)>
    where
        Q: Hash + ?Sized,
    {
        let hash = self.build_hasher.hash_one(key);
        &self.buckets[(hash % self.buckets.len() as u64) as usize]
    }
}

/// A pinned reference to a [`LockFreeHashTable`].
///
/// Created by [`LockFreeHashTable::pin`].
pub struct TableRef<'table, K, V, S, G> {
    table: &'table LockFreeHashTable<K, V, S>,
    guard: G,
}

impl<'table, K, V, S, G> TableRef<'table, K, V, S, G>
where
    G: Guard,
{
    /// Returns the number of entries in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no bucket holds an entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table
            .buckets
            .iter()
            .all(|bucket| bucket.is_empty(&self.guard))
    }

    /// Removes every entry from the table.
    pub fn clear(&self) {
        let removed: usize = self
            .table
            .buckets
            .iter()
            .map(|bucket| bucket.clear(&self.guard))
            .sum();

        self.table.count.add(-(removed as isize), &self.guard);
    }

    /// Returns an iterator over the entries of the table, bucket by bucket.
    ///
    /// Like list iteration, this is not a snapshot: entries inserted or
    /// removed concurrently may or may not be visited, but no entry is
    /// visited twice.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V, G> {
        Iter {
            buckets: self.table.buckets.iter(),
            current: None,
            guard: &self.guard,
        }
    }

    /// Returns an iterator over the keys of the table.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V, G> {
        Keys { iter: self.iter() }
    }

    /// Returns an iterator over the values of the table.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V, G> {
        Values { iter: self.iter() }
    }
}

impl<'table, K, V, S, G> TableRef<'table, K, V, S, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    G: Guard,
{
    /// Inserts an entry, returning a reference to the inserted value.
    ///
    /// An existing entry with the same key is shadowed, not replaced.
    #[inline]
    pub fn insert(&self, key: K, value: V) -> &V {
        let (_, value) = self
            .table
            .bucket(&key)
            .push_front((key, value), &self.guard);

        self.table.count.increment(&self.guard);

        value
    }

    /// Inserts an entry if the key is not present.
    ///
    /// If the key is present, the current value and the value that was not
    /// inserted are returned in the error. The check and the insertion are a
    /// single atomic step with respect to other insertions.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumquat::{LockFreeHashTable, OccupiedError};
    ///
    /// let table = LockFreeHashTable::new();
    /// let table = table.pin();
    ///
    /// assert_eq!(table.try_insert(1, "a"), Ok(&"a"));
    /// assert_eq!(
    ///     table.try_insert(1, "b"),
    ///     Err(OccupiedError { current: &"a", not_inserted: "b" })
    /// );
    /// ```
    pub fn try_insert(&self, key: K, value: V) -> Result<&V, OccupiedError<'_, V>> {
        let bucket = self.table.bucket(&key);

        match bucket.try_push_front((key, value), |a, b| a.0 == b.0, &self.guard) {
            Ok((_, value)) => {
                self.table.count.increment(&self.guard);

                Ok(value)
            }
            Err(((_, current), (_, not_inserted))) => Err(OccupiedError {
                current,
                not_inserted,
            }),
        }
    }

    /// Returns the value most recently inserted under `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the key-value pair most recently inserted under `key`.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table
            .bucket(key)
            .find(|(k, _)| key.eq(k.borrow()), &self.guard)
            .map(|(k, v)| (k, v))
    }

    /// Returns `true` if the table contains an entry for `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Removes the entry most recently inserted under `key`, returning its
    /// value.
    #[inline]
    pub fn remove<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (_, value) = self
            .table
            .bucket(key)
            .remove(|(k, _)| key.eq(k.borrow()), &self.guard)?;

        self.table.count.decrement(&self.guard);

        Some(value)
    }
}

impl<'a, K, V, S, G: Guard> IntoIterator for &'a TableRef<'_, K, V, S, G> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S, G> fmt::Debug for TableRef<'_, K, V, S, G>
where
    K: fmt::Debug,
    V: fmt::Debug,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An iterator over the entries of a [`LockFreeHashTable`].
///
/// Created by [`TableRef::iter`].
pub struct Iter<'g, K, V, G> {
    buckets: slice::Iter<'g, CachePadded<RawList<(K, V)>>>,
    current: Option<raw::Iter<'g, (K, V), G>>,
    guard: &'g G,
}

impl<'g, K: 'g, V: 'g, G: Guard> Iterator for Iter<'g, K, V, G> {
    type Item = (&'g K, &'g V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, value)) = self.current.as_mut().and_then(Iterator::next) {
                return Some((key, value));
            }

            let bucket = self.buckets.next()?;
            self.current = Some(bucket.iter(self.guard));
        }
    }
}

/// An iterator over the keys of a [`LockFreeHashTable`].
///
/// Created by [`TableRef::keys`].
pub struct Keys<'g, K, V, G> {
    iter: Iter<'g, K, V, G>,
}

impl<'g, K: 'g, V: 'g, G: Guard> Iterator for Keys<'g, K, V, G> {
    type Item = &'g K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (key, _) = self.iter.next()?;
        Some(key)
    }
}

/// An iterator over the values of a [`LockFreeHashTable`].
///
/// Created by [`TableRef::values`].
pub struct Values<'g, K, V, G> {
    iter: Iter<'g, K, V, G>,
}

impl<'g, K: 'g, V: 'g, G: Guard> Iterator for Values<'g, K, V, G> {
    type Item = &'g V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (_, value) = self.iter.next()?;
        Some(value)
    }
}

impl<K, V, S> Extend<(K, V)> for &LockFreeHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let table = self.pin();
        for (key, value) in iter {
            table.insert(key, value);
        }
    }
}

impl<K, V, S> Extend<(K, V)> for LockFreeHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        (&*self).extend(iter);
    }
}

impl<K, V, S> FromIterator<(K, V)> for LockFreeHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = LockFreeHashTable::with_hasher(S::default());
        table.extend(iter);
        table
    }
}

impl<K, V, S> fmt::Debug for LockFreeHashTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.pin(), f)
    }
}
