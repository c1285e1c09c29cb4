//! Spin-based mutual exclusion.
//!
//! Three raw locks share the [`RawLock`] interface:
//!
//! - [`Spinlock`]: a single atomic flag with exponential backoff between
//!   attempts. No fairness.
//! - [`TicketSpinlock`]: FIFO admission through a pair of ticket counters.
//!   Waiters are admitted in the order they called `lock`.
//! - [`UnfairSpinlock`]: the flag lock without backoff, retrying as fast as
//!   the cache line allows. Highest throughput, no starvation bound.
//!
//! None of them protect any data on their own. [`ScopedLock`] acquires a
//! lock on construction and releases it when dropped, including when the
//! scope is left by unwinding.
//!
//! ```
//! use kumquat::{ScopedTicketLock, TicketSpinlock};
//!
//! let lock = TicketSpinlock::new();
//! {
//!     let guard = ScopedTicketLock::new(&lock);
//!     assert_eq!(guard.ticket().value(), 0);
//!     assert!(lock.is_locked());
//! }
//! assert!(!lock.is_locked());
//! ```

mod spin;
mod ticket;
mod unfair;

pub use spin::Spinlock;
pub use ticket::{Ticket, TicketSpinlock};
pub use unfair::UnfairSpinlock;

use std::fmt;
use std::mem::ManuallyDrop;

/// A raw mutual exclusion primitive.
///
/// # Safety
///
/// Implementations must guarantee that between a `lock` (or successful
/// `try_lock`) and the matching `unlock`, no other call to `lock` or
/// `try_lock` returns. Acquisition must have `Acquire` semantics and release
/// `Release` semantics.
pub unsafe trait RawLock {
    /// A proof of acquisition, handed back to [`unlock`](RawLock::unlock).
    type Token;

    /// Acquires the lock, spinning until it is available.
    fn lock(&self) -> Self::Token;

    /// Attempts to acquire the lock without waiting.
    fn try_lock(&self) -> Option<Self::Token>;

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The lock must be held by the caller, and `token` must be the one
    /// returned when it was acquired.
    unsafe fn unlock(&self, token: Self::Token);

    /// Returns `true` if the lock is currently held.
    ///
    /// The answer may be stale by the time the caller acts on it.
    fn is_locked(&self) -> bool;
}

/// An RAII guard that holds a lock for as long as it is alive.
///
/// The token returned by the lock on acquisition is stored in the guard and
/// handed back when it is dropped.
#[must_use = "if unused the lock will be released immediately"]
pub struct ScopedLock<'a, L: RawLock> {
    lock: &'a L,
    token: ManuallyDrop<L::Token>,
}

/// A [`ScopedLock`] over a [`Spinlock`].
pub type ScopedSpinLock<'a> = ScopedLock<'a, Spinlock>;

/// A [`ScopedLock`] over a [`TicketSpinlock`].
pub type ScopedTicketLock<'a> = ScopedLock<'a, TicketSpinlock>;

/// A [`ScopedLock`] over an [`UnfairSpinlock`].
pub type ScopedUnfairLock<'a> = ScopedLock<'a, UnfairSpinlock>;

impl<'a, L: RawLock> ScopedLock<'a, L> {
    /// Acquires `lock`, spinning until it is available.
    #[inline]
    pub fn new(lock: &'a L) -> ScopedLock<'a, L> {
        let token = lock.lock();
        ScopedLock {
            lock,
            token: ManuallyDrop::new(token),
        }
    }

    /// Acquires `lock` if it is free.
    #[inline]
    pub fn try_new(lock: &'a L) -> Option<ScopedLock<'a, L>> {
        lock.try_lock().map(|token| ScopedLock {
            lock,
            token: ManuallyDrop::new(token),
        })
    }

    /// Returns the lock this guard holds.
    #[inline]
    pub fn lock(&self) -> &'a L {
        self.lock
    }
}

impl<'a> ScopedLock<'a, TicketSpinlock> {
    /// The ticket this guard was admitted with.
    #[inline]
    pub fn ticket(&self) -> &Ticket {
        &self.token
    }
}

impl<L: RawLock> Drop for ScopedLock<'_, L> {
    #[inline]
    fn drop(&mut self) {
        // Safety: the token is taken exactly once, and we hold the lock it
        // was returned from.
        unsafe {
            let token = ManuallyDrop::take(&mut self.token);
            self.lock.unlock(token);
        }
    }
}

impl<L: RawLock> fmt::Debug for ScopedLock<'_, L>
where
    L::Token: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedLock")
            .field("token", &*self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::UnsafeCell;
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;

    // A counter guarded by an arbitrary raw lock.
    struct Guarded<L> {
        lock: L,
        value: UnsafeCell<usize>,
    }

    unsafe impl<L: Sync> Sync for Guarded<L> {}

    impl<L: RawLock> Guarded<L> {
        fn increment(&self) {
            let _guard = ScopedLock::new(&self.lock);
            // Safety: we hold the lock.
            unsafe { *self.value.get() += 1 };
        }
    }

    fn mutual_exclusion<L: RawLock + Default + Sync>() {
        const THREADS: usize = 4;
        const ITERATIONS: usize = if cfg!(miri) { 50 } else { 10_000 };

        let guarded = Guarded {
            lock: L::default(),
            value: UnsafeCell::new(0),
        };

        thread::scope(|s| {
            for _ in 0..THREADS {
                // Capture the whole guarded value, not its non-`Sync` cell.
                let guarded = &guarded;
                s.spawn(move || {
                    for _ in 0..ITERATIONS {
                        guarded.increment();
                    }
                });
            }
        });

        assert_eq!(guarded.value.into_inner(), THREADS * ITERATIONS);
        assert!(!guarded.lock.is_locked());
    }

    fn release_on_unwind<L: RawLock + Default>() {
        let lock = L::default();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = ScopedLock::new(&lock);
            panic!("critical section failed");
        }));

        assert!(result.is_err());
        assert!(!lock.is_locked());
        assert!(ScopedLock::try_new(&lock).is_some());
    }

    fn try_new_while_held<L: RawLock + Default>() {
        let lock = L::default();
        let guard = ScopedLock::new(&lock);
        assert!(ScopedLock::try_new(&lock).is_none());
        drop(guard);
        assert!(ScopedLock::try_new(&lock).is_some());
    }

    #[test]
    fn spinlock() {
        mutual_exclusion::<Spinlock>();
        release_on_unwind::<Spinlock>();
        try_new_while_held::<Spinlock>();
    }

    #[test]
    fn ticket() {
        mutual_exclusion::<TicketSpinlock>();
        release_on_unwind::<TicketSpinlock>();
        try_new_while_held::<TicketSpinlock>();
    }

    #[test]
    fn unfair() {
        mutual_exclusion::<UnfairSpinlock>();
        release_on_unwind::<UnfairSpinlock>();
        try_new_while_held::<UnfairSpinlock>();
    }
}
