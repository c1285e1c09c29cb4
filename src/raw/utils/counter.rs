use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::OnceLock;
use std::thread;

use seize::Guard;

use super::CachePadded;

// An element count split across cache-padded cells.
//
// A writer only touches the cell selected by its guard's thread id, so
// pushes and pops on different threads do not fight over one cache line.
// The total is read by walking every cell, and is only exact while no
// writer is active.
pub struct Counter {
    cells: Box<[CachePadded<AtomicIsize>]>,
    mask: usize,
}

// One cell per available CPU, rounded up to a power of two.
fn cell_count() -> usize {
    // Querying the CPU count takes microseconds.
    static CELLS: OnceLock<usize> = OnceLock::new();

    *CELLS.get_or_init(|| {
        thread::available_parallelism()
            .map_or(1, usize::from)
            .next_power_of_two()
    })
}

impl Default for Counter {
    fn default() -> Counter {
        Counter::with_cells(cell_count())
    }
}

impl Counter {
    fn with_cells(cells: usize) -> Counter {
        debug_assert!(cells.is_power_of_two());

        Counter {
            cells: (0..cells)
                .map(|_| CachePadded::new(AtomicIsize::new(0)))
                .collect(),
            mask: cells - 1,
        }
    }

    #[inline]
    pub fn increment(&self, guard: &impl Guard) {
        self.add(1, guard);
    }

    #[inline]
    pub fn decrement(&self, guard: &impl Guard) {
        self.add(-1, guard);
    }

    #[inline]
    pub fn add(&self, delta: isize, guard: &impl Guard) {
        // Seize hands out dense thread ids, so masking spreads writers evenly.
        let cell = &self.cells[guard.thread_id() & self.mask];
        cell.fetch_add(delta, Ordering::Relaxed);
    }

    // A decrement can reach one cell before the matching increment is
    // visible in another, so a negative total reads as empty.
    pub fn total(&self) -> usize {
        let total = self
            .cells
            .iter()
            .fold(0isize, |acc, cell| acc.wrapping_add(cell.load(Ordering::Relaxed)));

        usize::try_from(total).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use seize::Collector;

    #[test]
    fn totals_across_threads() {
        const THREADS: usize = 4;
        const ITEMS: usize = if cfg!(miri) { 16 } else { 1 << 12 };

        let collector = Collector::new();
        let counter = Counter::with_cells(2);

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                let (collector, counter) = (&collector, &counter);
                s.spawn(move || {
                    let guard = collector.enter();
                    for i in 0..ITEMS {
                        counter.increment(&guard);
                        if i % 2 == 0 {
                            counter.decrement(&guard);
                        }
                    }
                });
            }
        });

        assert_eq!(counter.total(), THREADS * ITEMS / 2);

        let guard = collector.enter();
        counter.add(-((THREADS * ITEMS / 2) as isize), &guard);
        assert_eq!(counter.total(), 0);
    }

    #[test]
    fn negative_total_reads_as_empty() {
        let collector = Collector::new();
        let counter = Counter::default();
        let guard = collector.enter();

        counter.decrement(&guard);
        assert_eq!(counter.total(), 0);

        counter.add(3, &guard);
        assert_eq!(counter.total(), 2);
    }
}
