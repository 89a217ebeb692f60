// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! Uniform read/write/status surface over the concrete OS handles an event source can
//! wrap (`spec.md` §4.2's "any readiness-capable OS handle"). Grounded on the teacher's
//! [`crate::core::terminal_io::output_device::OutputDevice`], which wraps a
//! `Box<dyn Write + Send>` behind a small struct so callers don't match on the
//! concrete stream type; here the same idea is extended to both directions and to
//! `mio`'s `event::Source` registration requirement.

use mio::event::Source as MioSource;
use mio::{Interest, Registry, Token};
use std::any::Any;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};

/// A pollable OS handle: readable and/or writable, and registrable with the event
/// loop's backend.
///
/// The blanket impl below covers any mio type that is genuinely bidirectional, such
/// as `mio::net::TcpStream`. One-directional types like `mio::unix::pipe::Sender`/
/// `Receiver` only implement one of `Read`/`Write` and so never satisfy the blanket
/// impl's bound; wrap those in [`ReadOnly`]/[`WriteOnly`] to bridge them in. Either
/// way, `daemonlib` provides this trait so `event_loop` code can speak of "a handle"
/// without committing to one concrete mio type, matching the original's
/// `EventHandler` being handed an opaque descriptor.
///
/// [`IoHandle::as_any_mut`] lets a read/write callback recover the concrete type it
/// was registered with (`handle.as_any_mut().downcast_mut::<Timer>()`), since the
/// event loop stores handles behind `Box<dyn IoHandle>` and a callback otherwise has
/// no way back to, say, `Timer::drain_expirations` or `SignalBridge::pending`.
pub trait IoHandle: Read + Write + Send + Any {
    fn raw_fd(&self) -> RawFd;

    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()>;

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()>;

    fn deregister(&mut self, registry: &Registry) -> io::Result<()>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Blanket impl for any concrete mio I/O type that is also `Read + Write`.
///
/// Covers `mio::net::TcpStream` and test doubles built the same way. One-directional
/// handles (pipe halves, [`crate::signal::SignalBridge`]) do not satisfy this bound
/// and go through [`ReadOnly`]/[`WriteOnly`] instead.
impl<S> IoHandle for S
where
    S: MioSource + Read + Write + Send + AsRawFd + 'static,
{
    fn raw_fd(&self) -> RawFd {
        self.as_raw_fd()
    }

    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        MioSource::register(self, registry, token, interests)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        MioSource::reregister(self, registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        MioSource::deregister(self, registry)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Adapts a foreign handle that is genuinely one-directional (`mio::unix::pipe::Sender`
/// is write-only) to satisfy [`IoHandle`]'s `Read + Write` supertraits. A type this
/// crate owns outright, like [`crate::signal::SignalBridge`], instead implements the
/// stub direction itself and needs no wrapper. The stubbed direction always reports
/// [`io::ErrorKind::Unsupported`], the same convention [`crate::timer::Timer`] uses
/// for its own (genuinely unsupported) `Write` side.
///
/// Orphan rules forbid implementing `std::io::Read`/`Write` directly on a foreign
/// mio type from here, so this local wrapper is the idiomatic way to bridge a
/// foreign one-directional type into a local trait that needs both directions.
pub struct ReadOnly<T>(pub T);

impl<T> ReadOnly<T> {
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Read> Read for ReadOnly<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<T> Write for ReadOnly<T> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "read-only handle"))
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: MioSource> MioSource for ReadOnly<T> {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.0.register(registry, token, interests)
    }
    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.0.reregister(registry, token, interests)
    }
    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        self.0.deregister(registry)
    }
}

impl<T: AsRawFd> AsRawFd for ReadOnly<T> {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

/// The write-only mirror of [`ReadOnly`], for handles like `mio::unix::pipe::Sender`.
pub struct WriteOnly<T>(pub T);

impl<T> WriteOnly<T> {
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> Read for WriteOnly<T> {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "write-only handle"))
    }
}

impl<T: Write> Write for WriteOnly<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<T: MioSource> MioSource for WriteOnly<T> {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.0.register(registry, token, interests)
    }
    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        self.0.reregister(registry, token, interests)
    }
    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        self.0.deregister(registry)
    }
}

impl<T: AsRawFd> AsRawFd for WriteOnly<T> {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::{TcpListener, TcpStream};

    #[test]
    fn tcp_stream_exposes_a_stable_raw_fd() {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        assert!(IoHandle::raw_fd(&stream) >= 0);
    }
}
