// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! Bounded, blocking-or-non-blocking, shutdown-aware ring buffer (`spec.md` §4.1).
//!
//! This is the logger's transport: a byte-oriented SPSC/MPSC ring with one slot
//! sacrificed to disambiguate full from empty, exactly as `spec.md` §3 describes.
//! Grounded on the teacher's [`crate::core::common::ring_buffer`]-family naming
//! (`add`/`remove`, `is_full`/`is_empty`) but reworked into a byte ring with explicit
//! blocking semantics, since the teacher's ring buffers are generic item queues with
//! no blocking/shutdown contract to draw on for that half of the design.

use crate::error::{Error, Result};
use crate::sync::{StrictCondvar, StrictMutex};
use std::time::{Duration, Instant};

/// Whether a read/write call should block until it can make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    Block,
    NonBlock,
}

struct Ring {
    buffer: Vec<u8>,
    begin: usize,
    end: usize,
    shutdown: bool,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.buffer.len() - 1
    }

    fn readable(&self) -> usize {
        (self.end + self.buffer.len() - self.begin) % self.buffer.len()
    }

    fn writable(&self) -> usize {
        self.capacity() - self.readable()
    }
}

/// A bounded byte ring buffer shared between one or more writers and a single reader.
///
/// Capacity is `L - 1` bytes for a backing buffer of length `L` (`spec.md` §3
/// invariant). Created with an explicit length so the caller controls the backing
/// allocation the way the original's externally-supplied-storage contract intends.
pub struct Fifo {
    ring: StrictMutex<Ring>,
    writable_cv: StrictCondvar,
    readable_cv: StrictCondvar,
}

impl Fifo {
    /// Creates a FIFO backed by `length` bytes, for a usable capacity of
    /// `length - 1` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `length` is less than 2 (a capacity of zero is never useful).
    #[must_use]
    pub fn new(length: usize) -> Self {
        assert!(length >= 2, "FIFO backing length must be at least 2 bytes");
        Self {
            ring: StrictMutex::new(Ring {
                buffer: vec![0u8; length],
                begin: 0,
                end: 0,
                shutdown: false,
            }),
            writable_cv: StrictCondvar::new(),
            readable_cv: StrictCondvar::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    #[must_use]
    pub fn readable_len(&self) -> usize {
        self.ring.lock().readable()
    }

    /// Writes `buf` in full, or not at all.
    ///
    /// In [`Blocking::NonBlock`] mode, fails with [`Error::TooBig`] if `buf` can never
    /// fit the capacity, or [`Error::WouldBlock`] if there isn't room right now.
    ///
    /// In [`Blocking::Block`] mode, waits for room to accumulate, copying bytes as
    /// space frees up and broadcasting the readable condition whenever any bytes are
    /// copied. Fails with [`Error::BrokenPipe`] if the FIFO shuts down while waiting.
    pub fn write(&self, buf: &[u8], mode: Blocking) -> Result<()> {
        let mut ring = self.ring.lock();
        let capacity = ring.capacity();

        if buf.len() > capacity {
            return Err(Error::TooBig {
                len: buf.len(),
                capacity,
            });
        }

        match mode {
            Blocking::NonBlock => {
                if ring.shutdown {
                    return Err(Error::BrokenPipe);
                }
                if ring.writable() < buf.len() {
                    return Err(Error::WouldBlock);
                }
                self.copy_in(&mut ring, buf);
                drop(ring);
                self.readable_cv.notify_all();
                Ok(())
            }
            Blocking::Block => {
                let mut written = 0;
                loop {
                    if ring.shutdown {
                        return Err(Error::BrokenPipe);
                    }

                    let available = ring.writable().min(buf.len() - written);
                    if available > 0 {
                        self.copy_in(&mut ring, &buf[written..written + available]);
                        written += available;
                        drop(ring);
                        self.readable_cv.notify_all();
                        if written == buf.len() {
                            return Ok(());
                        }
                        ring = self.ring.lock();
                        continue;
                    }

                    ring = self.writable_cv.wait(ring);
                }
            }
        }
    }

    /// Reads up to `buf.len()` bytes, short-reading if less is available.
    ///
    /// In [`Blocking::NonBlock`] mode, returns [`Error::WouldBlock`] if the FIFO is
    /// empty and not shut down.
    ///
    /// In [`Blocking::Block`] mode, waits for data; returns `Ok(0)` once the FIFO is
    /// both empty and shut down (end-of-stream), matching §4.1.
    pub fn read(&self, buf: &mut [u8], mode: Blocking) -> Result<usize> {
        let mut ring = self.ring.lock();

        match mode {
            Blocking::NonBlock => {
                if ring.readable() == 0 {
                    if ring.shutdown {
                        return Ok(0);
                    }
                    return Err(Error::WouldBlock);
                }
                let n = self.copy_out(&mut ring, buf);
                drop(ring);
                self.writable_cv.notify_all();
                Ok(n)
            }
            Blocking::Block => loop {
                let readable = ring.readable();
                if readable > 0 {
                    let n = self.copy_out(&mut ring, buf);
                    drop(ring);
                    self.writable_cv.notify_all();
                    return Ok(n);
                }
                if ring.shutdown {
                    return Ok(0);
                }
                ring = self.readable_cv.wait(ring);
            },
        }
    }

    /// Like [`Fifo::read`] in blocking mode, but gives up after `timeout` and returns
    /// [`Error::WouldBlock`]. Used by tests that assert a bounded wait (`spec.md` §8
    /// S3's "within 100ms") without risking an indefinite hang on failure.
    pub fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut ring = self.ring.lock();
        loop {
            let readable = ring.readable();
            if readable > 0 {
                let n = self.copy_out(&mut ring, buf);
                drop(ring);
                self.writable_cv.notify_all();
                return Ok(n);
            }
            if ring.shutdown {
                return Ok(0);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::WouldBlock);
            }
            let (guard, timed_out) = self.readable_cv.wait_timeout(ring, remaining);
            ring = guard;
            if timed_out && ring.readable() == 0 && !ring.shutdown {
                return Err(Error::WouldBlock);
            }
        }
    }

    /// Marks the FIFO shut down and wakes every blocked reader and writer.
    pub fn shutdown(&self) {
        self.ring.lock().shutdown = true;
        self.readable_cv.notify_all();
        self.writable_cv.notify_all();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.ring.lock().shutdown
    }

    fn copy_in(&self, ring: &mut Ring, buf: &[u8]) {
        let len = ring.buffer.len();
        for &byte in buf {
            ring.buffer[ring.end] = byte;
            ring.end = (ring.end + 1) % len;
        }
    }

    fn copy_out(&self, ring: &mut Ring, buf: &mut [u8]) -> usize {
        let len = ring.buffer.len();
        let n = ring.readable().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = ring.buffer[ring.begin];
            ring.begin = (ring.begin + 1) % len;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn round_trip_nonblocking() {
        let fifo = Fifo::new(16);
        let payload = b"hello world";
        fifo.write(payload, Blocking::NonBlock).unwrap();

        let mut out = [0u8; 32];
        let n = fifo.read(&mut out, Blocking::NonBlock).unwrap();
        assert_eq!(&out[..n], payload);
    }

    #[test]
    fn nonblocking_write_too_big_fails() {
        let fifo = Fifo::new(8); // capacity 7
        let err = fifo.write(&[0u8; 8], Blocking::NonBlock).unwrap_err();
        assert!(matches!(err, Error::TooBig { .. }));
    }

    #[test]
    fn nonblocking_write_would_block_when_full() {
        let fifo = Fifo::new(8); // capacity 7
        fifo.write(&[1u8; 7], Blocking::NonBlock).unwrap();
        let err = fifo.write(&[2u8], Blocking::NonBlock).unwrap_err();
        assert!(matches!(err, Error::WouldBlock));
    }

    #[test]
    fn nonblocking_read_would_block_when_empty() {
        let fifo = Fifo::new(8);
        let mut buf = [0u8; 4];
        let err = fifo.read(&mut buf, Blocking::NonBlock).unwrap_err();
        assert!(matches!(err, Error::WouldBlock));
    }

    #[test]
    fn shutdown_write_is_broken_pipe() {
        let fifo = Fifo::new(8);
        fifo.shutdown();
        let err = fifo.write(b"x", Blocking::NonBlock).unwrap_err();
        assert!(matches!(err, Error::BrokenPipe));
    }

    #[test]
    fn blocking_read_returns_zero_on_shutdown_when_empty() {
        let fifo = Fifo::new(8);
        fifo.shutdown();
        let mut buf = [0u8; 4];
        let n = fifo.read(&mut buf, Blocking::Block).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn blocking_reader_is_released_by_writer() {
        let fifo = Arc::new(Fifo::new(64));
        let reader_fifo = fifo.clone();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 32];
            let n = reader_fifo.read(&mut buf, Blocking::Block).unwrap();
            buf[..n].to_vec()
        });

        std::thread::sleep(Duration::from_millis(20));
        fifo.write(b"woke up", Blocking::Block).unwrap();

        let received = handle.join().unwrap();
        assert_eq!(received, b"woke up");
    }

    #[test]
    fn blocking_reader_is_released_by_shutdown() {
        let fifo = Arc::new(Fifo::new(64));
        let reader_fifo = fifo.clone();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 32];
            reader_fifo.read(&mut buf, Blocking::Block).unwrap()
        });

        std::thread::sleep(Duration::from_millis(20));
        fifo.shutdown();

        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    fn blocking_write_fails_after_shutdown() {
        let fifo = Arc::new(Fifo::new(8)); // capacity 7
        fifo.write(&[1u8; 7], Blocking::NonBlock).unwrap(); // fill it up

        let writer_fifo = fifo.clone();
        let handle = std::thread::spawn(move || writer_fifo.write(&[2u8; 3], Blocking::Block));

        std::thread::sleep(Duration::from_millis(20));
        fifo.shutdown();

        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::BrokenPipe));
    }

    /// `spec.md` §8 S6: wrap-around correctness.
    #[test]
    fn wrap_around_two_region_copy_is_correct() {
        let fifo = Fifo::new(8); // capacity 7
        fifo.write(&[1, 2, 3, 4, 5], Blocking::NonBlock).unwrap();

        let mut out = [0u8; 5];
        let n = fifo.read(&mut out, Blocking::NonBlock).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&out, &[1, 2, 3, 4, 5]);

        // Second write straddles the wrap point (begin=5, end=5 after drain, so the
        // ring has reset to empty at a non-zero offset).
        let err = fifo.write(&[10, 20, 30, 40, 50, 60], Blocking::NonBlock);
        assert!(err.is_ok(), "6 bytes must fit in a 7-byte capacity ring");

        let mut out2 = [0u8; 6];
        let n2 = fifo.read(&mut out2, Blocking::NonBlock).unwrap();
        assert_eq!(n2, 6);
        assert_eq!(&out2, &[10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn short_read_across_multiple_calls_reassembles_payload() {
        let fifo = Fifo::new(32);
        let payload = b"a longer payload than one read() call will return";
        fifo.write(payload, Blocking::NonBlock).unwrap();

        let mut reassembled = Vec::new();
        let mut chunk = [0u8; 3];
        loop {
            let n = fifo.read(&mut chunk, Blocking::NonBlock).unwrap_or(0);
            if n == 0 {
                break;
            }
            reassembled.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(reassembled, payload);
    }
}
