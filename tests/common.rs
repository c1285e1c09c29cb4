#![allow(dead_code)]

use kumquat::{Collector, LockFreeHashTable};

// Run the test on different configurations of a `LockFreeHashTable`.
pub fn with_table<K, V>(mut test: impl FnMut(&dyn Fn() -> LockFreeHashTable<K, V>)) {
    // The default bucket count.
    if !cfg!(kumquat_stress) {
        test(&(|| LockFreeHashTable::new()));
    }

    // A single bucket, every entry shares one chain.
    test(&(|| LockFreeHashTable::with_buckets(1)));

    // Many buckets, with nodes reclaimed as soon as possible to shake out
    // use-after-free.
    test(
        &(|| {
            LockFreeHashTable::builder()
                .buckets(1024)
                .collector(Collector::new().batch_size(1))
                .build()
        }),
    );
}

// Returns a collector that reclaims retired nodes as eagerly as possible.
pub fn eager_collector() -> Collector {
    Collector::new().batch_size(1)
}

// Prints a log message if `RUST_LOG=debug` is set.
#[macro_export]
macro_rules! debug {
    ($($x:tt)*) => {
        if std::env::var("RUST_LOG").as_deref() == Ok("debug") {
            println!($($x)*);
        }
    };
}

// Returns the number of threads to use for stress testing.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two()
    }
}
