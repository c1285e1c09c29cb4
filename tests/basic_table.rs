use kumquat::{LockFreeHashTable, OccupiedError};

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, BuildHasherDefault, Hasher};

mod common;
use common::with_table;

#[test]
fn new() {
    with_table::<usize, usize>(|table| drop(table()));
}

#[test]
fn default_buckets() {
    let table: LockFreeHashTable<usize, usize> = LockFreeHashTable::new();
    assert_eq!(table.bucket_count(), 16);

    let table: LockFreeHashTable<usize, usize> = LockFreeHashTable::with_buckets(0);
    assert_eq!(table.bucket_count(), 1);
}

#[test]
fn insert_find_erase() {
    with_table::<&str, i32>(|table| {
        let table = table();
        table.insert("a", 1);
        table.insert("b", 2);

        assert_eq!(table.find("a"), Some(1));
        assert_eq!(table.find("c"), None);

        assert!(table.erase("a"));
        assert_eq!(table.find("a"), None);
        assert_eq!(table.len(), 1);
        assert!(!table.erase("a"));
    });
}

#[test]
fn get_empty() {
    with_table::<usize, usize>(|table| {
        let table = table();
        assert!(table.is_empty());
        assert_eq!(table.find(&42), None);
        assert!(!table.contains_key(&42));
        assert!(!table.erase(&42));
    });
}

#[test]
fn insert_shadows() {
    with_table::<usize, &str>(|table| {
        let table = table();
        table.insert(1, "old");
        table.insert(1, "new");

        assert_eq!(table.len(), 2);
        assert_eq!(table.find(&1), Some("new"));

        assert!(table.erase(&1));
        assert_eq!(table.find(&1), Some("old"));

        assert!(table.erase(&1));
        assert_eq!(table.find(&1), None);
        assert!(table.is_empty());
    });
}

#[test]
fn try_insert() {
    with_table::<usize, usize>(|table| {
        let table = table();
        let table = table.pin();

        assert_eq!(table.try_insert(7, 1), Ok(&1));
        assert_eq!(
            table.try_insert(7, 2),
            Err(OccupiedError {
                current: &1,
                not_inserted: 2
            })
        );
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove(&7), Some(&1));
        assert_eq!(table.try_insert(7, 3), Ok(&3));
    });
}

#[test]
fn borrowed_keys() {
    with_table::<String, usize>(|table| {
        let table = table();
        table.insert("kumquat".to_owned(), 1);

        assert_eq!(table.find("kumquat"), Some(1));
        assert!(table.contains_key("kumquat"));

        let pinned = table.pin();
        assert_eq!(
            pinned.get_key_value("kumquat"),
            Some((&"kumquat".to_owned(), &1))
        );
    });
}

#[test]
fn pinned_values_outlive_removal() {
    with_table::<usize, String>(|table| {
        let table = table();
        let pinned = table.pin();

        let value = pinned.insert(1, "one".to_owned());
        assert_eq!(pinned.remove(&1), Some(&"one".to_owned()));
        assert_eq!(value, "one");
        assert_eq!(pinned.get(&1), None);
    });
}

#[test]
fn clear() {
    with_table::<usize, usize>(|table| {
        let table = table();
        for i in 0..64 {
            table.insert(i, i);
        }

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert_eq!(table.find(&0), None);
    });
}

#[test]
fn iter() {
    with_table::<usize, usize>(|table| {
        let table = table();
        for i in 0..100 {
            table.insert(i, i * 2);
        }

        let pinned = table.pin();

        let mut entries: Vec<_> = pinned.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_unstable();
        assert_eq!(entries, (0..100).map(|i| (i, i * 2)).collect::<Vec<_>>());

        let mut keys: Vec<_> = pinned.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..100).collect::<Vec<_>>());

        let sum: usize = pinned.values().sum();
        assert_eq!(sum, (0..100).map(|i| i * 2).sum());
    });
}

#[test]
fn from_iter_and_extend() {
    let mut table: LockFreeHashTable<usize, usize> = (0..10).map(|i| (i, i)).collect();
    table.extend((10..20).map(|i| (i, i)));
    (&table).extend((20..30).map(|i| (i, i)));

    assert_eq!(table.len(), 30);
    for i in 0..30 {
        assert_eq!(table.find(&i), Some(i));
    }
}

#[test]
fn debug() {
    let table: LockFreeHashTable<usize, &str> = LockFreeHashTable::with_buckets(1);
    table.insert(1, "a");
    table.insert(2, "b");

    assert_eq!(format!("{table:?}"), r#"{2: "b", 1: "a"}"#);
}

#[derive(Default)]
struct ZeroHasher;

impl Hasher for ZeroHasher {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _: &[u8]) {}
}

#[test]
fn colliding_hasher() {
    let table: LockFreeHashTable<usize, usize, BuildHasherDefault<ZeroHasher>> =
        LockFreeHashTable::with_hasher(BuildHasherDefault::default());

    for i in 0..32 {
        table.insert(i, i);
    }

    for i in (0..32).step_by(2) {
        assert!(table.erase(&i));
    }

    for i in 0..32 {
        assert_eq!(table.find(&i), (i % 2 == 1).then_some(i));
    }
}

#[test]
fn custom_hasher() {
    let hasher = RandomState::new();
    let table: LockFreeHashTable<usize, usize> = LockFreeHashTable::builder()
        .hasher(hasher.clone())
        .buckets(8)
        .build();

    assert_eq!(table.bucket_count(), 8);
    assert_eq!(table.hasher().hash_one(1), hasher.hash_one(1));
}
