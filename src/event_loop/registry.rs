// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

use super::source::{
    Callback, Direction, EventSourceEntry, HandleType, PendingMutations, PendingOp, SourceKey, SourceState,
};
use crate::error::{Error, Result};
use crate::io_handle::IoHandle;
use mio::{Interest, Registry, Token};

fn interest_for(events: Direction) -> Interest {
    match (events.read, events.write) {
        (true, true) => Interest::READABLE.add(Interest::WRITABLE),
        (true, false) => Interest::READABLE,
        (false, true) => Interest::WRITABLE,
        // mio requires a non-empty Interest; a source with neither direction set
        // shouldn't reach registration (`add_source` always supplies at least one
        // callback), but fall back to READABLE rather than panic if it does.
        (false, false) => Interest::READABLE,
    }
}

/// The stable-index source table backing [`super::EventLoop`].
///
/// Slots are reused only after `cleanup` physically removes an entry: as long as a
/// slot is merely `removed` (not yet cleaned up), its index is still reserved and
/// every earlier slot keeps its position, so a poll-backend index never shifts out
/// from under a caller mid-batch.
pub struct SourceTable {
    slots: Vec<Option<EventSourceEntry>>,
    free: Vec<usize>,
}

impl SourceTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn add(
        &mut self,
        handle: Box<dyn IoHandle>,
        handle_type: HandleType,
        events: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    ) -> Result<SourceKey> {
        // Adding over a `removed` entry for the same `(handle, type)` resurrects it
        // into `readded` with the new callbacks, rather than allocating a new slot.
        // Identity is the underlying fd plus logical handle type, since two
        // different handles can legitimately share a raw fd value over time (a
        // closed-and-reopened descriptor) but never concurrently.
        let raw_fd = handle.raw_fd();
        if let Some(existing_idx) = self.slots.iter().position(|slot| {
            slot.as_ref().is_some_and(|e| {
                e.state == SourceState::Removed
                    && e.handle_type == handle_type
                    && e.handle.raw_fd() == raw_fd
            })
        }) {
            let entry = self.slots[existing_idx].as_mut().expect("checked Some above");
            entry.handle = handle;
            entry.events = events;
            entry.read_cb = read_cb;
            entry.write_cb = write_cb;
            entry.state = SourceState::ReAdded;
            return Ok(SourceKey(existing_idx));
        }

        // §4.2: "otherwise adding a duplicate is an error" — a live (non-removed)
        // entry already occupies this `(handle, type)` identity.
        if self.slots.iter().any(|slot| {
            slot.as_ref()
                .is_some_and(|e| e.handle_type == handle_type && e.handle.raw_fd() == raw_fd)
        }) {
            return Err(Error::Setup(format!(
                "duplicate source for handle_type {handle_type:?} fd {raw_fd}"
            )));
        }

        let entry = EventSourceEntry {
            handle,
            handle_type,
            events,
            read_cb,
            write_cb,
            state: SourceState::Added,
            registered: false,
        };

        let idx = if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(entry);
            idx
        } else {
            self.slots.push(Some(entry));
            self.slots.len() - 1
        };

        Ok(SourceKey(idx))
    }

    pub(crate) fn modify(
        &mut self,
        key: SourceKey,
        remove: Direction,
        add: Direction,
        read_cb: Option<Callback>,
        write_cb: Option<Callback>,
    ) -> Result<()> {
        let entry = self
            .slots
            .get_mut(key.0)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| Error::NotFound(format!("no source for key {:?}", key)))?;

        entry.events = entry.events.subtract(remove).union(add);

        if add.read {
            entry.read_cb = read_cb;
        } else if remove.read {
            entry.read_cb = None;
        }
        if add.write {
            entry.write_cb = write_cb;
        } else if remove.write {
            entry.write_cb = None;
        }

        if entry.state == SourceState::Normal || entry.state == SourceState::Removed {
            entry.state = SourceState::Modified;
        }
        // `Added`/`ReAdded`/already-`Modified` entries stay as they are (§4.2: "it is
        // legal to modify a source whose state is added; in that case it remains
        // added").
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: SourceKey) {
        if let Some(Some(entry)) = self.slots.get_mut(key.0) {
            entry.state = SourceState::Removed;
        }
        // Unknown key: no-op, per §4.2.
    }

    pub(crate) fn dispatch_read(&mut self, token: Token, pending: &mut PendingMutations) {
        let idx = token.0;
        let Some(Some(entry)) = self.slots.get_mut(idx) else {
            return;
        };
        if entry.state == SourceState::Removed || !entry.events.read {
            return;
        }
        if let Some(cb) = entry.read_cb.as_mut() {
            cb(SourceKey(idx), entry.handle.as_mut(), pending);
        }
    }

    pub(crate) fn dispatch_write(&mut self, token: Token, pending: &mut PendingMutations) {
        let idx = token.0;
        let Some(Some(entry)) = self.slots.get_mut(idx) else {
            return;
        };
        if entry.state == SourceState::Removed || !entry.events.write {
            return;
        }
        if let Some(cb) = entry.write_cb.as_mut() {
            cb(SourceKey(idx), entry.handle.as_mut(), pending);
        }
    }

    /// Applies pending transitions in the fixed order §4.2 mandates: `added`/
    /// `readded` first, then `modified`, then `removed`.
    pub(crate) fn cleanup(&mut self, registry: &Registry) -> Result<()> {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let Some(entry) = slot else { continue };
            if matches!(entry.state, SourceState::Added | SourceState::ReAdded) {
                // `registered` (not `state`) decides `register()` vs `reregister()`: a
                // `ReAdded` entry can still hold a live OS registration from before it
                // was logically removed, if removal and re-add both happened in the
                // same cleanup window.
                if entry.registered {
                    entry.handle.reregister(registry, Token(idx), interest_for(entry.events)).map_err(Error::Io)?;
                } else {
                    entry.handle.register(registry, Token(idx), interest_for(entry.events)).map_err(Error::Io)?;
                }
                entry.registered = true;
                entry.state = SourceState::Normal;
            }
        }

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let Some(entry) = slot else { continue };
            if entry.state == SourceState::Modified {
                // Same reasoning: a `Modified` entry reached by `Added -> remove_source
                // -> modify_source` before any cleanup ran was never actually
                // registered with the OS, so `reregister()` would fail against a
                // fd/token mio has never seen.
                if entry.registered {
                    entry.handle.reregister(registry, Token(idx), interest_for(entry.events)).map_err(Error::Io)?;
                } else {
                    entry.handle.register(registry, Token(idx), interest_for(entry.events)).map_err(Error::Io)?;
                }
                entry.registered = true;
                entry.state = SourceState::Normal;
            }
        }

        for idx in 0..self.slots.len() {
            let should_free = matches!(
                self.slots[idx].as_ref().map(|e| e.state),
                Some(SourceState::Removed)
            );
            if should_free {
                if let Some(mut entry) = self.slots[idx].take() {
                    if entry.registered {
                        let _ = entry.handle.deregister(registry);
                    }
                }
                self.free.push(idx);
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
