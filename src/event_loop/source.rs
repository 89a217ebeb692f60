// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

use crate::io_handle::IoHandle;
use std::fmt;

/// Which direction(s) a source is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub read: bool,
    pub write: bool,
}

impl Direction {
    pub const NONE: Direction = Direction { read: false, write: false };
    pub const READ: Direction = Direction { read: true, write: false };
    pub const WRITE: Direction = Direction { read: false, write: true };
    pub const BOTH: Direction = Direction { read: true, write: true };

    #[must_use]
    pub fn union(self, other: Direction) -> Direction {
        Direction {
            read: self.read || other.read,
            write: self.write || other.write,
        }
    }

    #[must_use]
    pub fn subtract(self, other: Direction) -> Direction {
        Direction {
            read: self.read && !other.read,
            write: self.write && !other.write,
        }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        !self.read && !self.write
    }
}

/// What kind of handle a source wraps, for diagnostics and for the §4.2
/// `(handle, type)` identity pair — two sources over the same underlying fd but
/// different logical roles are distinct entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    Signal,
    Timer,
    Socket,
    Pipe,
    Generic,
}

/// Stable identity for a registered source, valid from `add_source` until the entry
/// is physically removed by `cleanup_sources`. Safe to retain across `modify_source`
/// calls; callbacks receive their own key so they can call `remove_source`/
/// `modify_source` on themselves without capturing anything extra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey(pub(crate) usize);

/// A user callback, invoked with the key of the source that fired, a mutable
/// reference to the handle itself, and a queue for any `add_source`/`modify_source`/
/// `remove_source` the callback wants to request.
///
/// Dispatch holds `SourceTable`'s own table mutably for the duration of the call (see
/// `SourceTable::dispatch_read`/`dispatch_write`), so a callback cannot also reach a
/// `&mut EventLoop` from inside itself — that would be two overlapping mutable
/// borrows of the same table. [`PendingMutations`] is the side channel `spec.md`
/// §4.2 requires instead: a callback pushes the mutation it wants, and
/// [`super::EventLoop::run`] applies every queued mutation once dispatch for the
/// current readiness batch finishes, before the next `cleanup_sources` pass.
/// `stop()` needs no such channel; it already works from any thread via `Stopper`.
pub type Callback = Box<dyn FnMut(SourceKey, &mut dyn IoHandle, &mut PendingMutations) + Send>;

/// A mutation a callback asked for while running inside dispatch, queued until the
/// current readiness batch finishes.
pub(crate) enum PendingOp {
    Add {
        handle: Box<dyn IoHandle>,
        handle_type: HandleType,
        events: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    },
    Modify {
        key: SourceKey,
        remove: Direction,
        add: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    },
    Remove(SourceKey),
}

/// The side channel a dispatch callback uses to request `add_source`/
/// `modify_source`/`remove_source` without needing simultaneous mutable access to
/// the `EventLoop` that is already dispatching it (see [`Callback`]'s doc comment).
///
/// Built fresh per `EventLoop::run` readiness batch; [`super::EventLoop`] drains it
/// right after dispatch and before the next `cleanup_sources` pass.
#[derive(Default)]
pub struct PendingMutations {
    ops: Vec<PendingOp>,
}

impl PendingMutations {
    pub(crate) fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Queues an `add_source` equivalent, applied once the current batch finishes.
    /// The new source's key cannot be handed back synchronously (it doesn't exist in
    /// the table yet); a caller that needs it back should look it up once the source
    /// itself starts firing, or mint its own externally-tracked correlation id.
    pub fn add_source(
        &mut self,
        handle: Box<dyn IoHandle>,
        handle_type: HandleType,
        events: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    ) {
        self.ops.push(PendingOp::Add {
            handle,
            handle_type,
            events,
            read_cb,
            write_cb,
        });
    }

    /// Queues a `modify_source` equivalent, applied once the current batch finishes.
    pub fn modify_source(
        &mut self,
        key: SourceKey,
        remove: Direction,
        add: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    ) {
        self.ops.push(PendingOp::Modify {
            key,
            remove,
            add,
            read_cb,
            write_cb,
        });
    }

    /// Queues a `remove_source` equivalent, applied once the current batch finishes.
    pub fn remove_source(&mut self, key: SourceKey) {
        self.ops.push(PendingOp::Remove(key));
    }

    pub(crate) fn take(&mut self) -> Vec<PendingOp> {
        std::mem::take(&mut self.ops)
    }
}

/// Lifecycle state of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Newly added; not yet registered with the OS multiplexor.
    Added,
    /// Was `removed`, then re-added before cleanup ran; resurrected with new
    /// callbacks.
    ReAdded,
    /// Registered and current; the steady state between cleanup passes.
    Normal,
    /// Events-to-watch or callbacks changed since the last cleanup.
    Modified,
    /// Logically gone; still occupies its table slot until cleanup deregisters and
    /// frees it.
    Removed,
}

pub(crate) struct EventSourceEntry {
    pub(crate) handle: Box<dyn IoHandle>,
    pub(crate) handle_type: HandleType,
    pub(crate) events: Direction,
    pub(crate) read_cb: Option<Callback>,
    pub(crate) write_cb: Option<Callback>,
    pub(crate) state: SourceState,
    /// Whether this entry currently holds a live `mio` registration, independent of
    /// `state`: an entry can be `Removed` or `Modified` without ever having reached a
    /// `cleanup` pass that actually called `register()`. Cleanup uses this, not
    /// `state`, to decide between `register()` and `reregister()`.
    pub(crate) registered: bool,
}

impl fmt::Debug for EventSourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSourceEntry")
            .field("handle_type", &self.handle_type)
            .field("events", &self.events)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Public, read-only view of a registered source, returned by [`super::SourceTable`]
/// lookups for diagnostics.
#[derive(Debug)]
pub struct EventSource {
    pub key: SourceKey,
    pub handle_type: HandleType,
    pub events: Direction,
    pub state: SourceState,
}
