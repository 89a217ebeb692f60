// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

use std::sync::{Mutex, MutexGuard};

/// A mutex whose lock operation aborts the process on poison rather than returning a
/// `Result`. A poisoned lock means a prior holder panicked mid-critical-section, which
/// the original library treats as a fatal programming error, not a recoverable one.
#[derive(Debug, Default)]
pub struct StrictMutex<T> {
    inner: Mutex<T>,
}

impl<T> StrictMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquires the lock, blocking the calling thread.
    ///
    /// # Panics
    ///
    /// Aborts (via panic, with no poison to recover from) if the mutex is poisoned.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().expect("StrictMutex poisoned: a prior holder panicked")
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut().expect("StrictMutex poisoned: a prior holder panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_round_trips_value() {
        let m = StrictMutex::new(5);
        *m.lock() += 1;
        assert_eq!(*m.lock(), 6);
    }

    #[test]
    #[should_panic(expected = "poisoned")]
    fn lock_aborts_on_poison() {
        let m = std::sync::Arc::new(StrictMutex::new(0));
        let m2 = m.clone();
        let _ = std::thread::spawn(move || {
            let _guard = m2.lock();
            panic!("simulated critical-section panic");
        })
        .join();
        m.lock();
    }
}
