//! Busy-wait helpers shared by the spinlocks and the lock-free containers.

use std::cell::Cell;
use std::hint;
use std::thread;

/// Exponent limit for pure spinning: at most `1 << SPIN_LIMIT` pause
/// instructions per step.
const SPIN_LIMIT: u32 = 6;

/// Step after which [`Backoff::snooze`] gives up its time slice instead of
/// spinning, and [`Backoff::is_completed`] starts returning `true`.
const YIELD_LIMIT: u32 = 10;

/// Signals the processor that the current thread is busy-waiting.
///
/// Compiles to the architecture's pause/yield instruction (`pause` on x86,
/// `isb`/`yield` on ARM), or nothing where no such instruction exists.
#[inline(always)]
pub fn cpu_relax() {
    hint::spin_loop();
}

/// Exponential backoff for CAS retry loops and lock acquisition.
///
/// Each call to [`spin`](Backoff::spin) or [`snooze`](Backoff::snooze)
/// doubles the number of pause instructions issued, up to a fixed limit.
/// Once the limit is reached `snooze` yields to the OS scheduler rather than
/// burning the core.
///
/// ```
/// use kumquat::Backoff;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// let ready = AtomicBool::new(true);
/// let backoff = Backoff::new();
/// while !ready.load(Ordering::Acquire) {
///     backoff.snooze();
/// }
/// ```
#[derive(Debug, Default)]
pub struct Backoff {
    step: Cell<u32>,
}

impl Backoff {
    /// Creates a new `Backoff` at its first step.
    #[inline]
    pub const fn new() -> Backoff {
        Backoff { step: Cell::new(0) }
    }

    /// Resets to the first step.
    #[inline]
    pub fn reset(&self) {
        self.step.set(0);
    }

    /// Backs off after a failed CAS.
    ///
    /// Never yields: the other thread made progress, so we should retry soon.
    #[inline]
    pub fn spin(&self) {
        for _ in 0..1 << self.step.get().min(SPIN_LIMIT) {
            cpu_relax();
        }

        if self.step.get() <= SPIN_LIMIT {
            self.step.set(self.step.get() + 1);
        }
    }

    /// Backs off while waiting for another thread to make progress.
    #[inline]
    pub fn snooze(&self) {
        if self.step.get() <= SPIN_LIMIT {
            for _ in 0..1 << self.step.get() {
                cpu_relax();
            }
        } else {
            thread::yield_now();
        }

        if self.step.get() <= YIELD_LIMIT {
            self.step.set(self.step.get() + 1);
        }
    }

    /// Returns `true` once backing off has reached the yielding stage.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step.get() > YIELD_LIMIT
    }

    /// The current step.
    #[inline]
    pub fn step(&self) -> u32 {
        self.step.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_saturates() {
        let backoff = Backoff::new();
        for _ in 0..64 {
            backoff.spin();
        }

        assert_eq!(backoff.step(), SPIN_LIMIT + 1);
        assert!(!backoff.is_completed());
    }

    #[test]
    fn snooze_completes() {
        let backoff = Backoff::new();
        while !backoff.is_completed() {
            backoff.snooze();
        }

        assert_eq!(backoff.step(), YIELD_LIMIT + 1);

        backoff.reset();
        assert_eq!(backoff.step(), 0);
        assert!(!backoff.is_completed());
    }
}
