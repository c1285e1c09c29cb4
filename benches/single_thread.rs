use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kumquat::{LockFreeHashTable, LockFreeList, LockFreeStack, ThreadSafeVector};

const SIZE: usize = 10_000;

#[derive(Clone, Copy)]
struct RandomKeys {
    state: usize,
}

impl RandomKeys {
    fn new() -> Self {
        RandomKeys { state: 0 }
    }
}

impl Iterator for RandomKeys {
    type Item = usize;
    fn next(&mut self) -> Option<usize> {
        // Add 1 then multiply by some 32 bit prime.
        self.state = self.state.wrapping_add(1).wrapping_mul(3_787_392_781);
        Some(self.state)
    }
}

fn read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    // Chains get long with the default bucket count, size the table for the
    // load instead.
    group.bench_function("kumquat", |b| {
        let m = LockFreeHashTable::<usize, usize>::with_buckets(SIZE);
        for i in RandomKeys::new().take(SIZE) {
            m.insert(i, i);
        }

        b.iter(|| {
            let m = m.pin();
            for i in RandomKeys::new().take(SIZE) {
                black_box(assert_eq!(m.get(&i), Some(&i)));
            }
        });
    });

    group.bench_function("std", |b| {
        let mut m = HashMap::<usize, usize>::default();
        for i in RandomKeys::new().take(SIZE) {
            m.insert(i, i);
        }

        b.iter(|| {
            for i in RandomKeys::new().take(SIZE) {
                black_box(assert_eq!(m.get(&i), Some(&i)));
            }
        });
    });

    group.bench_function("dashmap", |b| {
        let m = dashmap::DashMap::<usize, usize>::default();
        for i in RandomKeys::new().take(SIZE) {
            m.insert(i, i);
        }

        b.iter(|| {
            for i in RandomKeys::new().take(SIZE) {
                black_box(assert_eq!(*m.get(&i).unwrap(), i));
            }
        });
    });

    group.finish();
}

fn push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop");

    group.bench_function("stack", |b| {
        let stack = LockFreeStack::new();
        b.iter(|| {
            for i in 0..SIZE {
                stack.push(i);
            }
            while let Some(i) = stack.pop() {
                black_box(i);
            }
        });
    });

    group.bench_function("list", |b| {
        let list = LockFreeList::new();
        b.iter(|| {
            for i in 0..SIZE {
                list.push_front(i);
            }
            while let Some(i) = list.pop_front() {
                black_box(i);
            }
        });
    });

    group.bench_function("vector", |b| {
        let vector: ThreadSafeVector<usize> = ThreadSafeVector::new();
        b.iter(|| {
            for i in 0..SIZE {
                vector.push_back(i);
            }
            while let Some(i) = vector.pop_back() {
                black_box(i);
            }
        });
    });

    group.bench_function("std", |b| {
        let mut vec = Vec::new();
        b.iter(|| {
            for i in 0..SIZE {
                vec.push(i);
            }
            while let Some(i) = vec.pop() {
                black_box(i);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, read, push_pop);
criterion_main!(benches);
