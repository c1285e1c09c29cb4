use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::RawLock;
use crate::backoff::cpu_relax;
use crate::cfg::trace;
use crate::raw::CachePadded;

/// A fair spinlock that admits waiters in the order they arrive.
///
/// Every call to [`lock`](TicketSpinlock::lock) draws the next ticket, and
/// the lock serves tickets strictly in sequence: a thread that drew ticket
/// `t` enters the critical section exactly when the serving counter reaches
/// `t`. With `n` contending threads, a waiter has at most `n - 1` others
/// ahead of it.
///
/// The ticket must be handed back to [`unlock`](TicketSpinlock::unlock),
/// which is what [`ScopedTicketLock`](super::ScopedTicketLock) does.
#[derive(Default)]
pub struct TicketSpinlock {
    next: CachePadded<AtomicUsize>,
    serving: CachePadded<AtomicUsize>,
}

/// Proof of admission to a [`TicketSpinlock`].
///
/// Tickets are deliberately neither `Copy` nor `Clone`: each one is returned
/// to the lock exactly once.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use = "a ticket must be returned to the lock that issued it"]
pub struct Ticket(usize);

impl Ticket {
    /// The position of this ticket in the lock's admission sequence.
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl TicketSpinlock {
    /// Creates a new, unlocked `TicketSpinlock`.
    #[inline]
    pub const fn new() -> TicketSpinlock {
        TicketSpinlock {
            next: CachePadded::new(AtomicUsize::new(0)),
            serving: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Draws a ticket and spins until it is served.
    #[inline]
    pub fn lock(&self) -> Ticket {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);

        let mut serving = self.serving.load(Ordering::Acquire);
        if serving != ticket {
            trace!("queued behind {} holders", ticket.wrapping_sub(serving));
        }

        while serving != ticket {
            // Back off in proportion to our distance from the front of the
            // queue, so waiters far back poll the counter less often.
            for _ in 0..ticket.wrapping_sub(serving) {
                cpu_relax();
            }

            serving = self.serving.load(Ordering::Acquire);
        }

        Ticket(ticket)
    }

    /// Acquires the lock if it is free and nobody is queued for it.
    #[inline]
    pub fn try_lock(&self) -> Option<Ticket> {
        let serving = self.serving.load(Ordering::Acquire);

        // Drawing ticket `serving` is only possible if no ticket has been
        // drawn since the last release.
        self.next
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .ok()
            .map(Ticket)
    }

    /// Releases the lock, admitting the next ticket in line.
    ///
    /// # Safety
    ///
    /// `ticket` must be the ticket returned by the `lock` or `try_lock` call
    /// that acquired the lock.
    #[inline]
    pub unsafe fn unlock(&self, ticket: Ticket) {
        let served = self.serving.fetch_add(1, Ordering::Release);
        debug_assert_eq!(
            served, ticket.0,
            "released a ticket spinlock with a ticket that is not being served"
        );
    }

    /// Returns `true` if the lock is currently held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.queue_len() != 0
    }

    /// The number of threads holding or waiting for the lock.
    #[inline]
    pub fn queue_len(&self) -> usize {
        let serving = self.serving.load(Ordering::Relaxed);
        let next = self.next.load(Ordering::Relaxed);
        next.wrapping_sub(serving)
    }
}

unsafe impl RawLock for TicketSpinlock {
    type Token = Ticket;

    #[inline]
    fn lock(&self) -> Ticket {
        TicketSpinlock::lock(self)
    }

    #[inline]
    fn try_lock(&self) -> Option<Ticket> {
        TicketSpinlock::try_lock(self)
    }

    #[inline]
    unsafe fn unlock(&self, ticket: Ticket) {
        // Safety: guaranteed by the caller.
        unsafe { TicketSpinlock::unlock(self, ticket) }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        TicketSpinlock::is_locked(self)
    }
}

impl fmt::Debug for TicketSpinlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketSpinlock")
            .field("next", &self.next.load(Ordering::Relaxed))
            .field("serving", &self.serving.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_sequential() {
        let lock = TicketSpinlock::new();

        for expected in 0..4 {
            let ticket = lock.lock();
            assert_eq!(ticket.value(), expected);
            assert_eq!(lock.queue_len(), 1);
            unsafe { lock.unlock(ticket) };
        }

        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_refuses_when_held() {
        let lock = TicketSpinlock::new();

        let ticket = lock.try_lock().unwrap();
        assert_eq!(ticket.value(), 0);
        assert!(lock.try_lock().is_none());
        assert_eq!(lock.queue_len(), 1);

        unsafe { lock.unlock(ticket) };
        assert_eq!(lock.try_lock().map(|ticket| ticket.value()), Some(1));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not being served")]
    fn mismatched_ticket() {
        let lock = TicketSpinlock::new();
        let _held = lock.lock();
        unsafe { lock.unlock(Ticket(7)) };
    }
}
