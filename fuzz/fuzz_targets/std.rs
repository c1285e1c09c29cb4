#![no_main]

use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use kumquat::{AccessError, LockFreeHashTable, ThreadSafeVector, TicketSpinlock};
use std::collections::HashMap as StdHashMap;

#[derive(Debug, Arbitrary)]
enum TableOperation<K, V> {
    Insert(K, V),
    TryInsert(K, V),
    Erase(K),
    Find(K),
    Contains(K),
    Clear,
    Len,
    IsEmpty,
}

#[derive(Debug, Arbitrary)]
enum VectorOperation<T> {
    PushBack(T),
    PopBack,
    At(u8),
    Get(u8),
    Set(u8, T),
    Front,
    Back,
    Clear,
    ShrinkToFit,
    Len,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    buckets: u8,
    capacity: u8,
    table: Vec<TableOperation<u8, u32>>,
    vector: Vec<VectorOperation<u32>>,
}

// Duplicate inserts shadow older entries, which the model keeps as a stack
// per key.
fn fuzz_table(buckets: usize, operations: Vec<TableOperation<u8, u32>>) {
    let mut model: StdHashMap<u8, Vec<u32>> = StdHashMap::new();
    let table = LockFreeHashTable::with_buckets(buckets);
    let pinned = table.pin();

    for op in operations {
        match op {
            TableOperation::Insert(k, v) => {
                model.entry(k).or_default().push(v);
                pinned.insert(k, v);
            }
            TableOperation::TryInsert(k, v) => {
                let entries = model.entry(k).or_default();
                match entries.last() {
                    Some(current) => {
                        let err = pinned.try_insert(k, v).unwrap_err();
                        assert_eq!(err.current, current);
                        assert_eq!(err.not_inserted, v);
                    }
                    None => {
                        assert_eq!(pinned.try_insert(k, v), Ok(&v));
                        entries.push(v);
                    }
                }
            }
            TableOperation::Erase(k) => {
                let expected = model.get_mut(&k).and_then(Vec::pop);
                assert_eq!(pinned.remove(&k).copied(), expected);
            }
            TableOperation::Find(k) => {
                let expected = model.get(&k).and_then(|entries| entries.last());
                assert_eq!(pinned.get(&k), expected);
            }
            TableOperation::Contains(k) => {
                let expected = model.get(&k).is_some_and(|entries| !entries.is_empty());
                assert_eq!(pinned.contains_key(&k), expected);
            }
            TableOperation::Clear => {
                model.clear();
                pinned.clear();
            }
            TableOperation::Len => {
                let expected: usize = model.values().map(Vec::len).sum();
                assert_eq!(pinned.len(), expected);
            }
            TableOperation::IsEmpty => {
                let expected = model.values().all(Vec::is_empty);
                assert_eq!(pinned.is_empty(), expected);
            }
        }
    }

    // Final consistency checks
    for (k, entries) in model.iter() {
        assert_eq!(pinned.get(k), entries.last());
    }
    assert_eq!(pinned.iter().count(), model.values().map(Vec::len).sum());
}

fn fuzz_vector(capacity: usize, operations: Vec<VectorOperation<u32>>) {
    let mut model = Vec::new();
    let vector: ThreadSafeVector<u32, TicketSpinlock> = ThreadSafeVector::with_capacity(capacity);

    for op in operations {
        match op {
            VectorOperation::PushBack(v) => {
                model.push(v);
                vector.push_back(v);
                assert!(vector.capacity() >= vector.len());
            }
            VectorOperation::PopBack => assert_eq!(vector.pop_back(), model.pop()),
            VectorOperation::At(i) => assert_eq!(vector.at(i.into()), model.get(usize::from(i)).copied()),
            VectorOperation::Get(i) => {
                let index = usize::from(i);
                let expected = model.get(index).copied().ok_or(AccessError::OutOfRange {
                    index,
                    len: model.len(),
                });
                assert_eq!(vector.get(index), expected);
            }
            VectorOperation::Set(i, v) => {
                let index = usize::from(i);
                let expected = match model.get_mut(index) {
                    Some(slot) => Ok(std::mem::replace(slot, v)),
                    None => Err(AccessError::OutOfRange {
                        index,
                        len: model.len(),
                    }),
                };
                assert_eq!(vector.set(index, v), expected);
            }
            VectorOperation::Front => {
                assert_eq!(vector.front(), model.first().copied().ok_or(AccessError::Empty));
            }
            VectorOperation::Back => {
                assert_eq!(vector.back(), model.last().copied().ok_or(AccessError::Empty));
            }
            VectorOperation::Clear => {
                model.clear();
                vector.clear();
            }
            VectorOperation::ShrinkToFit => {
                vector.shrink_to_fit();
                assert_eq!(vector.capacity(), model.len());
            }
            VectorOperation::Len => assert_eq!(vector.len(), model.len()),
        }
    }

    assert_eq!(vector.into_inner(), model);
}

fuzz_target!(|data: FuzzInput| {
    fuzz_table(data.buckets.into(), data.table);
    fuzz_vector(data.capacity.into(), data.vector);
});
