// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! The asynchronous logging pipeline.
//!
//! The call surface — level, source, formatted message — looks like a typical `log`
//! facade, but the pipeline underneath is a from-scratch synchronous-call/
//! async-forward design: a caller's `log()` call does an inclusion check and two
//! FIFO writes, never the output sink's I/O, with its own wire format, filter
//! grammar, and FIFO transport rather than an async-runtime-backed subscriber.
//!
//! Module layout mirrors the data flow: [`entry`] is the wire format, [`source`] is
//! per-source filter state and name interning, [`filter`] parses and applies the
//! `log.debug_filter` grammar, [`sink`] is the pluggable output device, [`forward`]
//! is the single consumer thread, and [`public_api`] ties them together behind
//! [`Logger`].

mod entry;
mod filter;
mod forward;
mod public_api;
mod sink;
mod source;

pub use entry::{Level, LogEntry, Qualifier, ENTRY_LEN};
pub use filter::{parse as parse_debug_filter, ParseError as DebugFilterParseError, Rule as DebugFilterRule};
pub use forward::{OutputState, RotateFn, MAX_OUTPUT_SIZE, ROTATE_COUNTDOWN_RESET};
pub use public_api::Logger;
pub use sink::{FileSink, OutputSink, SinkStatus, StderrSink, TtySink};
pub use source::{GroupMask, LogSource, NameId, NameTable, SharedLogSource, MAX_PER_LINE_ENTRIES};
