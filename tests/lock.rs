use kumquat::{
    RawLock, ScopedLock, ScopedSpinLock, ScopedTicketLock, ScopedUnfairLock, Spinlock,
    TicketSpinlock, UnfairSpinlock,
};

use std::cell::UnsafeCell;
use std::sync::Mutex;
use std::thread;

mod common;
use common::threads;

// A vector guarded by an arbitrary raw lock.
struct Guarded<L> {
    lock: L,
    data: UnsafeCell<Vec<usize>>,
}

unsafe impl<L: Sync> Sync for Guarded<L> {}

impl<L: RawLock + Default> Guarded<L> {
    fn new() -> Self {
        Guarded {
            lock: L::default(),
            data: UnsafeCell::new(Vec::new()),
        }
    }

    fn push(&self, value: usize) {
        let _guard = ScopedLock::new(&self.lock);
        // Safety: we hold the lock.
        unsafe { (*self.data.get()).push(value) }
    }
}

fn no_lost_updates<L: RawLock + Default + Sync>() {
    const ITEMS: usize = if cfg!(miri) { 32 } else { 1 << 12 };

    let threads = threads();
    let guarded = Guarded::<L>::new();

    thread::scope(|s| {
        for t in 0..threads {
            let guarded = &guarded;
            s.spawn(move || {
                for i in 0..ITEMS {
                    guarded.push(t * ITEMS + i);
                }
            });
        }
    });

    assert!(!guarded.lock.is_locked());

    let mut values = guarded.data.into_inner();
    values.sort_unstable();
    assert_eq!(values, (0..threads * ITEMS).collect::<Vec<_>>());
}

#[test]
fn spinlock() {
    no_lost_updates::<Spinlock>();
}

#[test]
fn ticket_spinlock() {
    no_lost_updates::<TicketSpinlock>();
}

#[test]
fn unfair_spinlock() {
    no_lost_updates::<UnfairSpinlock>();
}

#[test]
fn flag_locks() {
    let lock = Spinlock::new();
    assert!(lock.try_lock());
    assert!(!lock.try_lock());
    assert!(lock.is_locked());
    unsafe { lock.unlock() };
    assert!(!lock.is_locked());

    let lock = UnfairSpinlock::new();
    lock.lock();
    assert!(!lock.try_lock());
    unsafe { lock.unlock() };
    assert!(lock.try_lock());
    unsafe { lock.unlock() };
}

#[test]
fn scoped_guards() {
    let spin = Spinlock::new();
    let ticket = TicketSpinlock::new();
    let unfair = UnfairSpinlock::new();

    {
        let _spin = ScopedSpinLock::new(&spin);
        let ticket = ScopedTicketLock::new(&ticket);
        let _unfair = ScopedUnfairLock::new(&unfair);

        assert_eq!(ticket.ticket().value(), 0);
        assert!(spin.is_locked());
        assert!(unfair.is_locked());
        assert!(ScopedSpinLock::try_new(&spin).is_none());
    }

    assert!(!spin.is_locked());
    assert!(!ticket.is_locked());
    assert!(!unfair.is_locked());

    let guard = ScopedTicketLock::new(&ticket);
    assert_eq!(guard.ticket().value(), 1);
}

// Ticket holders are admitted in the order they drew their tickets.
#[test]
fn ticket_fifo() {
    const WAITERS: usize = if cfg!(miri) { 3 } else { 8 };

    let lock = TicketSpinlock::new();
    let order = Mutex::new(Vec::new());

    thread::scope(|s| {
        let held = ScopedTicketLock::new(&lock);

        for i in 0..WAITERS {
            let (lock, order) = (&lock, &order);
            s.spawn(move || {
                let guard = ScopedTicketLock::new(lock);
                order.lock().unwrap().push((i, guard.ticket().value()));
            });

            // Wait for the waiter to draw its ticket before starting the next.
            while lock.queue_len() != i + 2 {
                thread::yield_now();
            }
        }

        drop(held);
    });

    let order = order.into_inner().unwrap();
    assert_eq!(order, (0..WAITERS).map(|i| (i, i + 1)).collect::<Vec<_>>());
    assert!(!lock.is_locked());
}
