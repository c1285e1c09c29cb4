use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt::{self, Formatter};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use seize::Guard;

use crate::lock::RawLock;
use crate::{
    ListRef, LockFreeHashTable, LockFreeList, LockFreeStack, StackRef, TableRef, ThreadSafeVector,
};

impl<T, G> Serialize for StackRef<'_, T, G>
where
    T: Serialize,
    G: Guard,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self)
    }
}

impl<T: Serialize> Serialize for LockFreeStack<T> {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        self.pin().serialize(serializer)
    }
}

// Stacks and lists serialize from the top (front) down, so they are rebuilt
// by pushing the elements in reverse.
impl<'de, T> Deserialize<'de> for LockFreeStack<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<T>::deserialize(deserializer)?;
        Ok(values.into_iter().rev().collect())
    }
}

impl<T, G> Serialize for ListRef<'_, T, G>
where
    T: Serialize,
    G: Guard,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self)
    }
}

impl<T: Serialize> Serialize for LockFreeList<T> {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        self.pin().serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for LockFreeList<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<T>::deserialize(deserializer)?;
        Ok(values.into_iter().rev().collect())
    }
}

struct TableVisitor<K, V, S> {
    _marker: PhantomData<LockFreeHashTable<K, V, S>>,
}

impl<K, V, S, G> Serialize for TableRef<'_, K, V, S, G>
where
    K: Serialize,
    V: Serialize,
    G: Guard,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_map(self)
    }
}

impl<K, V, S> Serialize for LockFreeHashTable<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        self.pin().serialize(serializer)
    }
}

impl<'de, K, V, S> Deserialize<'de> for LockFreeHashTable<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TableVisitor::new())
    }
}

impl<K, V, S> TableVisitor<K, V, S> {
    pub(crate) fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<'de, K, V, S> Visitor<'de> for TableVisitor<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    type Value = LockFreeHashTable<K, V, S>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(entry) = access.next_entry()? {
            entries.push(entry);
        }

        // Entries of a bucket are serialized newest first. Inserting them in
        // reverse keeps shadowed entries behind the ones that shadow them.
        Ok(entries.into_iter().rev().collect())
    }
}

impl<T, L> Serialize for ThreadSafeVector<T, L>
where
    T: Serialize,
    L: RawLock,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        self.with_slice(|data| serializer.collect_seq(data))
    }
}

impl<'de, T, L> Deserialize<'de> for ThreadSafeVector<T, L>
where
    T: Deserialize<'de>,
    L: RawLock + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<T>::deserialize(deserializer).map(ThreadSafeVector::from)
    }
}
