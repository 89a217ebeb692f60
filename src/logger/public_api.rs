// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! The logger's public entry point: `log()`, source registration, and
//! `log_enable_debug_override`.

use super::entry::{Level, LogEntry, Qualifier};
use super::filter::{self, Rule};
use super::forward::{self, OutputState, RotateFn};
use super::sink::OutputSink;
use super::source::{GroupMask, LogSource, NameId, NameTable, SharedLogSource};
use crate::error::Result;
use crate::fifo::{Blocking, Fifo};
use crate::sync::{JoinHandle, StrictMutex};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-call stack buffer size for message formatting: a message that doesn't fit is
/// truncated safely rather than allocating.
const MESSAGE_BUFFER_LEN: usize = 1024;

/// FIFO backing size; large enough to hold several maximally-sized entries so bursts
/// don't immediately block producers.
const FIFO_LEN: usize = 64 * 1024;

struct SharedState {
    effective_level: Level,
    debug_override: bool,
    debug_filter_version: u64,
    rules: Vec<Rule>,
}

/// The logger's process-wide (or test-scoped) shared state, guarded by one mutex
/// shared across every caller thread.
pub struct Logger {
    fifo: Arc<Fifo>,
    names: Arc<NameTable>,
    sources: StrictMutex<HashMap<String, SharedLogSource>>,
    shared: StrictMutex<SharedState>,
    output: Arc<OutputState>,
    forward_thread: StrictMutex<Option<JoinHandle<()>>>,
    /// §5's `common_mutex`: serializes the two-part `(LogEntry, message)` FIFO write
    /// in `log()` so concurrent callers can never interleave a header from one call
    /// with the message from another. `Fifo::write` only holds its own internal lock
    /// for the duration of a single call, so without this, two threads racing `log()`
    /// can produce `header_a, header_b, message_a, message_b` in the ring.
    common_mutex: StrictMutex<()>,
}

impl Logger {
    /// Starts the logger: creates the FIFO, spawns the forward thread reading from
    /// it, and installs `sink` as the initial output device.
    pub fn new(level: Level, sink: Box<dyn OutputSink>, rotate: Option<RotateFn>) -> Self {
        let fifo = Arc::new(Fifo::new(FIFO_LEN));
        let names = Arc::new(NameTable::new());
        let output = Arc::new(OutputState::new(sink, rotate));

        let forward_fifo = fifo.clone();
        let forward_output = output.clone();
        let forward_names = names.clone();
        let handle = JoinHandle::spawn("daemonlib-log-forward", move || {
            forward::run(forward_fifo, forward_output, forward_names);
        });

        Self {
            fifo,
            names,
            sources: StrictMutex::new(HashMap::new()),
            shared: StrictMutex::new(SharedState {
                effective_level: level,
                debug_override: false,
                debug_filter_version: 0,
                rules: Vec::new(),
            }),
            output,
            forward_thread: StrictMutex::new(Some(handle)),
            common_mutex: StrictMutex::new(()),
        }
    }

    /// Returns the (lazily created) source for `basename`, matching §5's "`common_
    /// mutex` protects `LogSource` lazy initialization".
    fn source_for(&self, basename: &str) -> SharedLogSource {
        let key = basename.to_ascii_lowercase();
        let mut sources = self.sources.lock();
        if let Some(existing) = sources.get(&key) {
            return existing.clone();
        }
        let name_id = self.names.intern(basename);
        let source = Arc::new(LogSource::new(name_id));
        sources.insert(key, source.clone());
        source
    }

    fn refresh_source_if_stale(&self, basename: &str, source: &LogSource) {
        let current_version = self.shared.lock().debug_filter_version;
        if source.cached_version() >= current_version {
            return;
        }
        let rules = self.shared.lock().rules.clone();
        let key = basename.to_ascii_lowercase();
        filter::apply_to_source(&rules, &key, source, current_version);
    }

    /// The fast-path inclusion check (§4.5). Returns `true` if the call site should
    /// proceed to format and emit.
    fn should_include(&self, level: Level, source: &LogSource, group: GroupMask, line: u32) -> bool {
        let (effective_level, debug_override) = {
            let shared = self.shared.lock();
            (shared.effective_level, shared.debug_override)
        };

        let primary = level <= effective_level || (debug_override && level == Level::Debug);
        if !primary {
            return false;
        }

        if level == Level::Debug {
            return source.group_included(group, line);
        }
        true
    }

    /// `log(level, source, group, line, fmt, …)`. `args` is the already-formatted
    /// message text; Rust's `format!` plays the role of the original's varargs
    /// formatting, so callers are expected to build `message` with `format!` (or a
    /// logging macro built on top of this function) before calling in.
    pub fn log(&self, level: Level, source_basename: &str, group: GroupMask, qualifier: Qualifier, message: &str) {
        let source = self.source_for(source_basename);
        self.refresh_source_if_stale(source_basename, &source);

        let line_for_check = match qualifier {
            Qualifier::Line(n) => n,
            Qualifier::Function(_) => 0,
        };
        if !self.should_include(level, &source, group, line_for_check) {
            return;
        }

        // Per-call 1024-byte stack buffer, truncating safely (§4.5).
        let mut truncated = message;
        if truncated.len() > MESSAGE_BUFFER_LEN - 1 {
            let mut end = MESSAGE_BUFFER_LEN - 1;
            while !truncated.is_char_boundary(end) {
                end -= 1;
            }
            truncated = &truncated[..end];
        }

        let timestamp_micros = timestamp_now_micros();
        let entry = LogEntry::new(
            level,
            group,
            source.name,
            qualifier,
            timestamp_micros,
            truncated.len() as u32 + 1,
        );

        let mut message_with_nul = Vec::with_capacity(truncated.len() + 1);
        message_with_nul.extend_from_slice(truncated.as_bytes());
        message_with_nul.push(0);

        // Two fifo_writes under `common_mutex`, both blocking: header, then message
        // including the trailing NUL (§4.5). Every application thread calling `log`
        // shares this same FIFO, so the lock must span both writes, not just each one
        // individually — `Fifo::write`'s own internal lock only covers a single call.
        let _guard = self.common_mutex.lock();
        let _ = self.fifo.write(&entry.encode(), Blocking::Block);
        let _ = self.fifo.write(&message_with_nul, Blocking::Block);
    }

    /// Sets the effective level and debug filter from the configuration surface
    /// (§6). Bumps `debug_filter_version` so every source lazily reprocesses its
    /// cached mask on next use (§8 property 8).
    pub fn configure(&self, level: Level, debug_filter: &str) -> Result<()> {
        let rules = filter::parse(debug_filter).map_err(|e| crate::error::Error::NotFound(e.to_string()))?;
        let mut shared = self.shared.lock();
        shared.effective_level = level;
        shared.rules = rules;
        shared.debug_filter_version += 1;
        Ok(())
    }

    /// `log_enable_debug_override`: flips the secondary "debug always included"
    /// latch, typically toggled by `SIGUSR1` (§4.3).
    pub fn set_debug_override(&self, enabled: bool) {
        self.shared.lock().debug_override = enabled;
    }

    /// `log_exit`: shuts down the FIFO (releasing the forward thread from its
    /// blocking read) and joins it.
    pub fn shutdown(&self) {
        self.fifo.shutdown();
        if let Some(handle) = self.forward_thread.lock().take() {
            handle.join();
        }
    }
}

fn timestamp_now_micros() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_micros() as u64
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::sink::SinkStatus;

    struct CapturingSink {
        lines: Arc<StrictMutex<Vec<String>>>,
    }

    impl OutputSink for CapturingSink {
        fn write(&mut self, buffer: &[u8]) -> std::io::Result<usize> {
            self.lines.lock().push(String::from_utf8_lossy(buffer).into_owned());
            Ok(buffer.len())
        }
        fn status(&self) -> Option<SinkStatus> {
            None
        }
    }

    #[test]
    fn inclusion_check_respects_effective_level() {
        let lines = Arc::new(StrictMutex::new(Vec::new()));
        let logger = Logger::new(Level::Warn, Box::new(CapturingSink { lines: lines.clone() }), None);

        logger.log(Level::Info, "foo.c", GroupMask::COMMON, Qualifier::Line(1), "should be dropped");
        logger.log(Level::Error, "foo.c", GroupMask::COMMON, Qualifier::Line(2), "should pass");

        std::thread::sleep(std::time::Duration::from_millis(50));
        logger.shutdown();

        let captured = lines.lock();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].contains("should pass"));
    }

    #[test]
    fn debug_filter_precedence_reaches_the_sink() {
        let lines = Arc::new(StrictMutex::new(Vec::new()));
        let logger = Logger::new(Level::Error, Box::new(CapturingSink { lines: lines.clone() }), None);
        logger.configure(Level::Debug, "+all,-packet,+packet:137").unwrap();

        logger.log(Level::Debug, "foo.c", GroupMask::PACKET, Qualifier::Line(137), "included");
        logger.log(Level::Debug, "foo.c", GroupMask::PACKET, Qualifier::Line(138), "excluded");

        std::thread::sleep(std::time::Duration::from_millis(50));
        logger.shutdown();

        let captured = lines.lock();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].contains("included"));
    }

    /// §5's `common_mutex`: several threads hammering `log()` concurrently must never
    /// interleave one call's header with another's message. Each thread writes a
    /// distinct, greppable marker; if the two-part FIFO write ever raced, the forward
    /// thread would either panic on a corrupt level byte or hand back a line whose
    /// marker doesn't match any thread's actual message text.
    #[test]
    fn concurrent_log_calls_never_interleave_header_and_message() {
        let lines = Arc::new(StrictMutex::new(Vec::new()));
        let logger = Arc::new(Logger::new(Level::Info, Box::new(CapturingSink { lines: lines.clone() }), None));

        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        logger.log(
                            Level::Info,
                            "foo.c",
                            GroupMask::COMMON,
                            Qualifier::Line(1),
                            &format!("marker-t{t}-{i}"),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        std::thread::sleep(std::time::Duration::from_millis(200));
        logger.shutdown();

        let captured = lines.lock();
        assert_eq!(captured.len(), THREADS * PER_THREAD);
        for line in captured.iter() {
            assert!(
                line.contains("marker-t") && line.trim_end().ends_with(char::is_numeric),
                "corrupted or truncated log line: {line:?}"
            );
        }
    }
}
