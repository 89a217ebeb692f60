// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! The readiness-multiplexing event loop.
//!
//! [`EventLoop::run`] solves the usual chicken-and-egg problem of a `mio::Waker`
//! needing a `Poll`'s registry to exist before the `Poll` itself is handed to the
//! run loop: build the `Poll`, pull a `Waker` out of its registry, then run. On top
//! of that sits a source table with a stable-index contract: added sources get a
//! key that survives reordering, removal during dispatch is deferred to the next
//! cleanup pass, and each source carries independent read/write callbacks.

mod registry;
mod source;

pub use registry::SourceTable;
pub use source::{Callback, Direction, EventSource, HandleType, PendingMutations, SourceKey, SourceState};

use source::PendingOp;

use crate::error::{Error, Result};
use crate::io_handle::IoHandle;
use mio::{Events, Poll, Token, Waker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Token reserved for the loop's own wake-up `mio::Waker`, never assigned to a caller
/// source (the signal bridge gets a real registered handle instead; this token
/// exists purely so `stop()` can interrupt a blocked `poll()` call).
const WAKER_TOKEN: Token = Token(usize::MAX);

/// The single-threaded readiness loop.
///
/// Must be driven from one thread; `stop()` is the one operation safe to call from
/// any other thread.
pub struct EventLoop {
    poll: Poll,
    waker: Arc<Waker>,
    table: SourceTable,
    running: Arc<AtomicBool>,
}

impl EventLoop {
    /// Builds the loop and its wake-up handle in one step, mirroring the RRT
    /// factory's `setup()` — the `Waker` must be carved out of the `Poll`'s registry
    /// before the `Poll` is moved into blocking use.
    pub fn new() -> Result<Self> {
        let poll = Poll::new().map_err(Error::Io)?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN).map_err(Error::Io)?;
        Ok(Self {
            poll,
            waker: Arc::new(waker),
            table: SourceTable::new(),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A cloneable handle whose only purpose is calling [`EventLoop::stop`] from
    /// another thread.
    #[must_use]
    pub fn stopper(&self) -> Stopper {
        Stopper {
            waker: self.waker.clone(),
            running: self.running.clone(),
        }
    }

    /// Registers a new source in state `added` (§4.2). Resurrects a `removed` entry
    /// for the same `(handle, type)` into `readded` if one exists.
    pub fn add_source(
        &mut self,
        handle: Box<dyn IoHandle>,
        handle_type: HandleType,
        events: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    ) -> Result<SourceKey> {
        self.table.add(handle, handle_type, events, read_cb, write_cb)
    }

    /// Updates the requested-events bitmask and/or callbacks for an existing source
    /// (§4.2). Marks the entry `modified` unless it is still `added`, in which case it
    /// remains `added`.
    pub fn modify_source(
        &mut self,
        key: SourceKey,
        remove: Direction,
        add: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    ) -> Result<()> {
        self.table.modify(key, remove, add, read_cb, write_cb)
    }

    /// Transitions an entry to `removed`; physical removal is deferred to the next
    /// [`EventLoop::cleanup_sources`] call. A no-op if the key is unknown.
    pub fn remove_source(&mut self, key: SourceKey) {
        self.table.remove(key);
    }

    /// Applies all pending `added`/`readded`/`modified`/`removed` transitions to the
    /// OS multiplexor, in that fixed order, then runs `cleanup_cb`.
    pub fn cleanup_sources(&mut self, mut cleanup_cb: impl FnMut()) -> Result<()> {
        self.table.cleanup(self.poll.registry())?;
        cleanup_cb();
        Ok(())
    }

    /// Enters the loop. Blocks the calling thread until [`Stopper::stop`] is called
    /// (from this or another thread) or `run_once` returns an unrecoverable I/O error.
    pub fn run(&mut self, mut cleanup_cb: impl FnMut()) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let mut events = Events::with_capacity(256);
        let mut pending = PendingMutations::new();

        while self.running.load(Ordering::SeqCst) {
            self.cleanup_sources(&mut cleanup_cb)?;

            self.poll.poll(&mut events, None).map_err(Error::Io)?;

            for event in events.iter() {
                if event.token() == WAKER_TOKEN {
                    continue;
                }
                // Tie-break (§4.2): read before write. Deferred removal is enforced by
                // re-checking `is_removed`/the direction bit right before dispatch, so
                // a callback earlier in this same batch that removed or modified the
                // source takes effect immediately for every later event in the batch.
                if event.is_readable() {
                    self.table.dispatch_read(event.token(), &mut pending);
                }
                if event.is_writable() {
                    self.table.dispatch_write(event.token(), &mut pending);
                }
            }

            // §4.2: a callback may call `add_source`/`modify_source`/`remove_source`
            // on the loop it's running inside of. Those requests were queued in
            // `pending` (dispatch can't hand a callback `&mut EventLoop` directly —
            // see `event_loop::Callback`'s doc comment); apply them now, after dispatch
            // for this batch and before the next `cleanup_sources` pass picks them up.
            self.apply_pending(&mut pending)?;
        }

        self.cleanup_sources(&mut cleanup_cb)?;
        Ok(())
    }

    /// Applies every mutation a dispatch callback queued via [`PendingMutations`].
    /// [`EventLoop::run`] calls this itself between dispatch and the next
    /// `cleanup_sources` pass; a caller driving the loop by hand (e.g. calling
    /// `Writer::write`/`drain` outside of `run`) can call it directly too.
    pub fn apply_pending(&mut self, pending: &mut PendingMutations) -> Result<()> {
        for op in pending.take() {
            match op {
                PendingOp::Add {
                    handle,
                    handle_type,
                    events,
                    read_cb,
                    write_cb,
                } => {
                    self.table.add(handle, handle_type, events, read_cb, write_cb)?;
                }
                PendingOp::Modify {
                    key,
                    remove,
                    add,
                    read_cb,
                    write_cb,
                } => {
                    self.table.modify(key, remove, add, read_cb, write_cb)?;
                }
                PendingOp::Remove(key) => {
                    self.table.remove(key);
                }
            }
        }
        Ok(())
    }

    /// Clears the running flag and wakes a blocked `poll()` call. Safe from any
    /// thread.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // A spurious wake error here means the waker's fd was somehow torn down
        // already; the loop will still observe `running == false` on its next
        // iteration through another readiness event, so this is not fatal.
        let _ = self.waker.wake();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Cross-thread handle that can interrupt a blocked [`EventLoop::run`].
#[derive(Clone)]
pub struct Stopper {
    waker: Arc<Waker>,
    running: Arc<AtomicBool>,
}

impl Stopper {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.waker.wake();
    }
}

/// How long [`EventLoop::run`] may block between readiness checks when a caller wants
/// a bounded-latency variant for tests. Not used by the production `run` loop, which
/// blocks indefinitely until woken.
pub const TEST_POLL_TIMEOUT: Duration = Duration::from_millis(50);
