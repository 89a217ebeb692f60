// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

use std::thread::{self, ThreadId};

/// A joinable thread wrapper that forbids joining the calling thread.
///
/// `spec.md` §9 notes that on the original's Windows backend `thread_destroy` closes
/// the handle while on POSIX it's a no-op, and that joining an already-destroyed
/// thread is undefined behavior the original never forbids explicitly. Rust's
/// [`std::thread::JoinHandle::join`] already consumes `self`, so a handle can't be
/// joined twice at the type level; what it doesn't forbid is a thread joining itself,
/// which deadlocks rather than panicking cleanly. [`JoinHandle::join`] checks for that
/// case and aborts with a clear message instead.
#[derive(Debug)]
pub struct JoinHandle<T> {
    id: ThreadId,
    inner: thread::JoinHandle<T>,
}

impl<T: Send + 'static> JoinHandle<T> {
    pub fn spawn<F>(name: &str, f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let inner = thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .expect("thread spawn failed: treated as a fatal resource exhaustion");
        Self {
            id: inner.thread().id(),
            inner,
        }
    }

    /// Blocks until the thread terminates.
    ///
    /// # Panics
    ///
    /// Aborts if called from the thread being joined (self-join), and propagates the
    /// joined thread's panic if it panicked.
    pub fn join(self) -> T {
        assert!(
            thread::current().id() != self.id,
            "a thread must not join itself"
        );
        self.inner.join().expect("joined thread panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_returns_closure_result() {
        let handle = JoinHandle::spawn("test-worker", || 1 + 1);
        assert_eq!(handle.join(), 2);
    }

    #[test]
    #[should_panic(expected = "must not join itself")]
    fn self_join_aborts() {
        // Can't literally hand a handle to its own closure before it exists, so this
        // exercises the guard directly via a handle whose id matches the current
        // thread (the simplest faithful reproduction without unsafe id forgery).
        let current = thread::current().id();
        let handle: JoinHandle<()> = JoinHandle {
            id: current,
            inner: thread::spawn(|| ()),
        };
        handle.join();
    }
}
