use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::RawLock;
use crate::backoff::Backoff;

/// A test-and-set spinlock with exponential backoff.
///
/// Waiters back off exponentially between attempts and eventually yield
/// their time slice. There is no fairness: a thread that just released the
/// lock may reacquire it ahead of threads that have waited longer.
#[derive(Default)]
pub struct Spinlock {
    locked: AtomicBool,
}

impl Spinlock {
    /// Creates a new, unlocked `Spinlock`.
    #[inline]
    pub const fn new() -> Spinlock {
        Spinlock {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, spinning until it is available.
    #[inline]
    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }

        self.lock_slow();
    }

    #[cold]
    fn lock_slow(&self) {
        let backoff = Backoff::new();

        loop {
            // Wait until the lock looks free before attempting to take it,
            // so waiters share the cache line instead of bouncing it.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }

            if self.try_lock() {
                return;
            }
        }
    }

    /// Attempts to acquire the lock once, without waiting.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The lock must be held by the caller.
    #[inline]
    pub unsafe fn unlock(&self) {
        debug_assert!(self.is_locked(), "unlocked a free spinlock");
        self.locked.store(false, Ordering::Release);
    }

    /// Returns `true` if the lock is currently held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

unsafe impl RawLock for Spinlock {
    type Token = ();

    #[inline]
    fn lock(&self) {
        Spinlock::lock(self)
    }

    #[inline]
    fn try_lock(&self) -> Option<()> {
        Spinlock::try_lock(self).then_some(())
    }

    #[inline]
    unsafe fn unlock(&self, _token: ()) {
        // Safety: guaranteed by the caller.
        unsafe { Spinlock::unlock(self) }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        Spinlock::is_locked(self)
    }
}

impl fmt::Debug for Spinlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spinlock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
