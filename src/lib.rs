#![allow(unstable_name_collisions)]
#![deny(unsafe_op_in_unsafe_fn)]
#![doc = include_str!("../README.md")]

mod backoff;
mod cfg;
mod error;
mod list;
mod raw;
mod stack;
mod table;
mod vector;

#[cfg(feature = "serde")]
mod serde_impls;

pub mod lock;

pub use backoff::{cpu_relax, Backoff};
pub use error::{AccessError, OccupiedError};
pub use list::{ListRef, LockFreeList};
pub use lock::{
    RawLock, ScopedLock, ScopedSpinLock, ScopedTicketLock, ScopedUnfairLock, Spinlock, Ticket,
    TicketSpinlock, UnfairSpinlock,
};
pub use stack::{LockFreeStack, StackRef};
pub use table::{LockFreeHashTable, LockFreeHashTableBuilder, TableRef, DEFAULT_BUCKETS};
pub use vector::{ThreadSafeVector, DEFAULT_CAPACITY};

pub use seize::{Collector, Guard};

/// Iterators over the containers.
pub mod iter {
    pub use crate::list::Iter as ListIter;
    pub use crate::stack::{IntoIter as StackIntoIter, Iter as StackIter};
    pub use crate::table::{Iter as TableIter, Keys, Values};
}
