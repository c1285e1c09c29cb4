use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::RawLock;
use crate::backoff::cpu_relax;

/// A spinlock tuned for raw acquisition throughput.
///
/// Same contract as [`Spinlock`](super::Spinlock), but waiters never back
/// off: they issue a single pause between polls and race for the flag the
/// moment it is released. Under heavy contention the lock moves between
/// threads faster, at the cost of any bound on how long an individual waiter
/// can be starved.
#[derive(Default)]
pub struct UnfairSpinlock {
    locked: AtomicBool,
}

impl UnfairSpinlock {
    /// Creates a new, unlocked `UnfairSpinlock`.
    #[inline]
    pub const fn new() -> UnfairSpinlock {
        UnfairSpinlock {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, spinning until it is available.
    #[inline]
    pub fn lock(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            while self.locked.load(Ordering::Relaxed) {
                cpu_relax();
            }
        }
    }

    /// Attempts to acquire the lock once, without waiting.
    #[inline]
    pub fn try_lock(&self) -> bool {
        !self.locked.load(Ordering::Relaxed) && !self.locked.swap(true, Ordering::Acquire)
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

unsafe impl RawLock for UnfairSpinlock {
    type Token = ();

    #[inline]
    fn lock(&self) {
        UnfairSpinlock::lock(self)
    }

    #[inline]
    fn try_lock(&self) -> Option<()> {
        UnfairSpinlock::try_lock(self).then_some(())
    }

    #[inline]
    unsafe fn unlock(&self, _token: ()) {
        // Safety: guaranteed by the caller.
        unsafe { UnfairSpinlock::unlock(self) }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        UnfairSpinlock::is_locked(self)
    }
}

impl fmt::Debug for UnfairSpinlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnfairSpinlock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
