// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

use std::{
    sync::{Condvar, MutexGuard},
    time::Duration,
};

/// Thin wrapper over [`std::sync::Condvar`] that aborts on poison instead of
/// propagating a `Result`, matching [`super::StrictMutex`]'s policy.
#[derive(Debug, Default)]
pub struct StrictCondvar {
    inner: Condvar,
}

impl StrictCondvar {
    pub fn new() -> Self {
        Self {
            inner: Condvar::new(),
        }
    }

    /// Blocks until notified.
    ///
    /// # Panics
    ///
    /// Aborts if the associated mutex is poisoned.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.inner.wait(guard).expect("StrictCondvar poisoned: a prior holder panicked")
    }

    /// Blocks until notified or `timeout` elapses, whichever comes first.
    ///
    /// # Panics
    ///
    /// Aborts if the associated mutex is poisoned.
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, bool) {
        let (guard, result) = self
            .inner
            .wait_timeout(guard, timeout)
            .expect("StrictCondvar poisoned: a prior holder panicked");
        (guard, result.timed_out())
    }

    pub fn notify_one(&self) {
        self.inner.notify_one();
    }

    pub fn notify_all(&self) {
        self.inner.notify_all();
    }
}
