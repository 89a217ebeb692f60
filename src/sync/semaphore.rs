// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

use super::{StrictCondvar, StrictMutex};

/// A counting semaphore built from [`StrictMutex`] + [`StrictCondvar`], since the
/// standard library has no built-in equivalent. `acquire` blocks while the count is
/// zero; `release` increments the count and wakes one waiter.
#[derive(Debug)]
pub struct Semaphore {
    count: StrictMutex<usize>,
    cv: StrictCondvar,
}

impl Semaphore {
    #[must_use]
    pub fn new(initial: usize) -> Self {
        Self {
            count: StrictMutex::new(initial),
            cv: StrictCondvar::new(),
        }
    }

    /// Blocks until a permit is available, then takes it.
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            count = self.cv.wait(count);
        }
        *count -= 1;
    }

    /// Returns a permit to the pool, waking one blocked acquirer if any.
    pub fn release(&self) {
        *self.count.lock() += 1;
        self.cv.notify_one();
    }

    #[must_use]
    pub fn available(&self) -> usize {
        *self.count.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn acquire_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = sem.clone();

        let handle = std::thread::spawn(move || {
            sem2.acquire();
        });

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sem.available(), 0);
        sem.release();
        handle.join().unwrap();
    }

    #[test]
    fn available_permits_are_consumed() {
        let sem = Semaphore::new(2);
        sem.acquire();
        assert_eq!(sem.available(), 1);
        sem.acquire();
        assert_eq!(sem.available(), 0);
        sem.release();
        assert_eq!(sem.available(), 1);
    }
}
