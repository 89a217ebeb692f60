// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! The forward thread: the sole reader of the logger's FIFO, sole writer of the
//! configured output sink.

use super::entry::{LogEntry, ENTRY_LEN};
use super::format;
use super::source::NameTable;
use crate::error::Result;
use crate::fifo::{Blocking, Fifo};
use crate::sync::StrictMutex;
use std::sync::Arc;

/// 5 MiB, per §4.5 step 5.
pub const MAX_OUTPUT_SIZE: u64 = 5 * 1024 * 1024;
/// Countdown value a rotation resets to, per §8 S5.
pub const ROTATE_COUNTDOWN_RESET: u32 = 50;

use super::sink::OutputSink;

/// Invoked when the rotate countdown reaches zero with the sink over the size
/// threshold. Returns the replacement sink and an optional informational message to
/// emit through the normal formatting path before resuming.
pub type RotateFn = Box<dyn FnMut() -> (Box<dyn OutputSink>, Option<String>) + Send>;

struct ForwardState {
    sink: Box<dyn OutputSink>,
    rotate: Option<RotateFn>,
    rotate_countdown: u32,
}

/// Owns the output sink and rotate hook; shared between the forward thread (which
/// writes through it) and the logger's public API (which may swap the sink).
pub struct OutputState {
    inner: StrictMutex<ForwardState>,
}

impl OutputState {
    #[must_use]
    pub fn new(sink: Box<dyn OutputSink>, rotate: Option<RotateFn>) -> Self {
        Self {
            inner: StrictMutex::new(ForwardState {
                sink,
                rotate,
                rotate_countdown: 0,
            }),
        }
    }

    fn write_line(&self, line: &str) {
        let mut state = self.inner.lock();
        // Log-sink write failures are silently tolerated (§7), to avoid a feedback
        // loop where a failing sink generates more log traffic about itself.
        let _ = state.sink.write(line.as_bytes());

        let Some(status) = state.sink.status() else {
            return;
        };

        if state.rotate_countdown > 0 {
            state.rotate_countdown -= 1;
        }

        if state.rotate_countdown == 0 && status.size > MAX_OUTPUT_SIZE {
            if let Some(rotate) = state.rotate.as_mut() {
                let (new_sink, info) = rotate();
                state.sink = new_sink;
                state.rotate_countdown = ROTATE_COUNTDOWN_RESET;
                if let Some(info) = info {
                    // Emitted through the same write path rather than recursing back
                    // into the public `log` API, which would require re-acquiring
                    // `common_mutex` from inside the forward thread itself.
                    let _ = state.sink.write(info.as_bytes());
                }
            } else {
                // No rotate hook registered: per §7, "rotate callback failures
                // disable output until re-set" — with no hook at all there's nothing
                // to disable; leave the countdown at zero so every subsequent write
                // keeps re-checking in case a hook is installed later.
            }
        }
    }
}

fn read_exact_blocking(fifo: &Fifo, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = fifo.read(&mut buf[filled..], Blocking::Block)?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

/// Runs the forward loop until the FIFO shuts down and drains empty. Intended to be
/// the body of the dedicated forward thread spawned by
/// [`super::public_api::Logger::new`].
pub fn run(fifo: Arc<Fifo>, output: Arc<OutputState>, names: Arc<NameTable>) {
    let mut header_buf = [0u8; ENTRY_LEN];
    let mut message_buf = vec![0u8; 1024];

    loop {
        match read_exact_blocking(&fifo, &mut header_buf) {
            Ok(true) => {}
            Ok(false) | Err(_) => break,
        }

        let entry = LogEntry::decode(&header_buf);
        let total = entry.message_len as usize + 1; // + trailing NUL
        if message_buf.len() < total {
            message_buf.resize(total, 0);
        }

        match read_exact_blocking(&fifo, &mut message_buf[..total]) {
            Ok(true) => {}
            Ok(false) | Err(_) => break,
        }

        let message = String::from_utf8_lossy(&message_buf[..total - 1]).into_owned();
        let line = format::format(&entry, &message, &names);
        output.write_line(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::entry::{Level, Qualifier};
    use crate::logger::sink::SinkStatus;

    struct CountingSink {
        size: u64,
        writes: Vec<String>,
    }

    impl OutputSink for CountingSink {
        fn write(&mut self, buffer: &[u8]) -> std::io::Result<usize> {
            self.size += buffer.len() as u64;
            self.writes.push(String::from_utf8_lossy(buffer).into_owned());
            Ok(buffer.len())
        }
        fn status(&self) -> Option<SinkStatus> {
            Some(SinkStatus { size: self.size })
        }
    }

    #[test]
    fn forward_thread_reassembles_header_and_message() {
        let fifo = Arc::new(Fifo::new(4096));
        let names = Arc::new(NameTable::new());
        let source = names.intern("foo.c");

        let entry = LogEntry::new(
            Level::Info,
            crate::logger::source::GroupMask::COMMON,
            source,
            Qualifier::Line(10),
            1,
            5,
        );
        let mut payload = entry.encode().to_vec();
        payload.extend_from_slice(b"hello\0");
        fifo.write(&payload, Blocking::NonBlock).unwrap();
        fifo.shutdown();

        let output = Arc::new(OutputState::new(Box::new(CountingSink { size: 0, writes: Vec::new() }), None));
        run(fifo, output.clone(), names);

        let state = output.inner.lock();
        assert_eq!(state.sink.status().unwrap().size > 0, true);
    }

    /// Rotate triggers exactly once at the threshold, countdown resets to 50, next
    /// 49 writes don't re-trigger.
    #[test]
    fn rotation_trigger_scenario() {
        let rotated = Arc::new(StrictMutex::new(0u32));
        let rotated_clone = rotated.clone();

        let output = OutputState::new(
            Box::new(CountingSink { size: 0, writes: Vec::new() }),
            Some(Box::new(move || {
                *rotated_clone.lock() += 1;
                (Box::new(CountingSink { size: 0, writes: Vec::new() }) as Box<dyn OutputSink>, None)
            })),
        );

        // One write big enough to cross the 5 MiB threshold immediately (countdown
        // starts at 0, so the very first write is eligible to trigger).
        let big_line = "x".repeat(MAX_OUTPUT_SIZE as usize + 1);
        output.write_line(&big_line);
        assert_eq!(*rotated.lock(), 1);

        for _ in 0..49 {
            output.write_line("small");
        }
        assert_eq!(*rotated.lock(), 1);
    }
}
