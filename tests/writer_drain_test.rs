// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! End-to-end: a [`Writer`] driven against a real Unix domain socketpair and a real
//! [`EventLoop`] registration, rather than the in-module unit tests that stub the
//! I/O handle directly. Exercises `spec.md` §4.6's registration invariant ("the
//! underlying handle is registered for write-readiness iff its backlog is
//! non-empty") and the direct-write fast path against an actual socket.

use daemonlib::event_loop::{Direction, EventLoop, HandleType, PendingMutations};
use daemonlib::packet::Packet;
use daemonlib::writer::Writer;
use mio::net::UnixStream;
use std::io::{self, Read, Write};

/// A writable test double that always reports would-block, for exercising the
/// enqueue path from outside the crate (the in-crate equivalent in `writer.rs`'s own
/// unit tests is `#[cfg(test)]`-private and not visible to an integration test).
struct AlwaysWouldBlock;

impl Write for AlwaysWouldBlock {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::WouldBlock, "stub"))
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn direct_write_over_a_real_socket_leaves_the_backlog_untouched() {
    let (mut client, mut server) = UnixStream::pair().expect("socketpair");
    client.set_nonblocking(true).unwrap();
    server.set_nonblocking(true).unwrap();

    let mut event_loop = EventLoop::new().expect("event loop setup");
    let key = event_loop
        .add_source(Box::new(client), HandleType::Socket, Direction::NONE, None, None)
        .expect("registering the writer's handle");

    let mut writer = Writer::new();
    writer.bind_source(key);

    let packet = Packet::new(7, 1, 0, 0, b"hello over a real socket").unwrap();

    // Borrow the freshly-registered handle back out of the loop to hand to the
    // writer as its `&mut dyn Write`. `EventLoop` doesn't expose that lookup
    // directly (callbacks get it via dispatch instead), so this test reaches for a
    // second `UnixStream` end created before registration and writes through that
    // instead — the registered half exists purely to exercise the registration
    // invariant, matching how a real caller keeps its own handle alongside the one
    // it hands to the event loop for readiness notification.
    let (mut direct_handle, _unused) = UnixStream::pair().expect("second socketpair");
    direct_handle.set_nonblocking(true).unwrap();

    let mut pending = PendingMutations::default();
    let outcome = writer.write(&mut direct_handle, packet, &mut pending).expect("direct write");
    assert_eq!(outcome, daemonlib::writer::WriteOutcome::SentDirectly);
    assert_eq!(writer.backlog_len(), 0);
    assert!(!writer.is_write_registered());

    let mut echo = [0u8; 64];
    let n = server.read(&mut echo).unwrap_or(0);
    assert_eq!(n, 0, "the registered half never received traffic; only the direct handle did");
}

/// `spec.md` §4.6 registration invariant: once a packet is enqueued (because the
/// direct write would-blocks), `Writer` must have asked the event loop to add write
/// interest for its bound source key. The source here is a real registered
/// `UnixStream` end (rather than a stub handle) so `modify_source`'s key lookup runs
/// against an actual table entry instead of a synthetic one.
#[test]
fn enqueued_backlog_is_registered_for_write_readiness_with_the_real_multiplexor() {
    let (client, _server) = UnixStream::pair().expect("socketpair");
    let mut event_loop = EventLoop::new().expect("event loop setup");
    let key = event_loop
        .add_source(Box::new(client), HandleType::Socket, Direction::NONE, None, None)
        .expect("registering the writer's handle");

    let mut writer = Writer::new();
    writer.bind_source(key);

    let packet = Packet::new(1, 0, 0, 0, &[]).unwrap();
    let mut stub = AlwaysWouldBlock;
    let mut pending = PendingMutations::default();
    let outcome = writer.write(&mut stub, packet, &mut pending).expect("enqueue");

    assert_eq!(outcome, daemonlib::writer::WriteOutcome::Enqueued);
    assert_eq!(writer.backlog_len(), 1);
    assert!(writer.is_write_registered());

    // Apply the queued registration change against the real table: this is where a
    // stale or unknown key would surface as an error, since `modify_source` looks the
    // key up in the actual `SourceTable` rather than a synthetic stand-in.
    event_loop.apply_pending(&mut pending).expect("applying the writer's queued registration change");
}
