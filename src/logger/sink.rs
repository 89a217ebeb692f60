// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! Abstract output sink: `write(buffer) -> bytes_written_or_error`, plus an optional
//! `status()` for byte-count-driven rotation, wrapping a `dyn Write` behind a small
//! struct per implementation.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Stderr, Write};
use std::path::{Path, PathBuf};

/// Byte-count status a sink may optionally report, for the rotate-trigger check in
/// §4.5 step 5.
#[derive(Debug, Clone, Copy)]
pub struct SinkStatus {
    pub size: u64,
}

/// A writable log destination. `status` returns `None` for sinks with no notion of
/// cumulative size (e.g. a TTY).
pub trait OutputSink: Send {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize>;
    fn status(&self) -> Option<SinkStatus> {
        None
    }
}

/// The default sink: process stderr. Carries no size, matching a terminal's lack of
/// a meaningful byte count.
pub struct StderrSink {
    stderr: Stderr,
}

impl StderrSink {
    #[must_use]
    pub fn new() -> Self {
        Self { stderr: io::stderr() }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for StderrSink {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.stderr.write_all(buffer)?;
        Ok(buffer.len())
    }
}

/// A sink backed by a regular file, reporting its cumulative byte count so the
/// forward thread's rotate check (§4.5 step 5) can act on it.
pub struct FileSink {
    file: File,
    path: PathBuf,
    bytes_written: u64,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.parent().is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("can't access parent folder of {}; it might not exist, or daemonlib might not have permission", path.display()),
            ));
        }
        if path.file_name().is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("can't access file name of {}; it might not exist, or daemonlib might not have permission", path.display()),
            ));
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let bytes_written = file.metadata()?.len();
        Ok(Self { file, path, bytes_written })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.file.write_all(buffer)?;
        self.bytes_written += buffer.len() as u64;
        Ok(buffer.len())
    }

    fn status(&self) -> Option<SinkStatus> {
        Some(SinkStatus { size: self.bytes_written })
    }
}

/// Whether `TERM` permits ANSI color on a TTY sink: `TERM=dumb` or an unset `TERM`
/// disables color, anything else allows it. Deliberately narrower than a full
/// 256-color/truecolor detection matrix — just the one on/off signal a log line
/// needs.
fn term_allows_color() -> bool {
    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Picks a color for a formatted line by sniffing its `[LEVEL]` tag, produced by
/// [`super::format::format`]. The sink only ever receives already-formatted lines, so
/// this is the one place color can hook in without threading a `Level` parameter
/// through the entire output path.
fn color_for_line(line: &str) -> &'static str {
    if line.contains("[ERROR]") {
        RED
    } else if line.contains("[WARN]") {
        YELLOW
    } else if line.contains("[DEBUG]") {
        DIM
    } else {
        CYAN
    }
}

/// A sink over a TTY (stdout or stderr), colorizing each line by level when `TERM`
/// permits it. Carries no size, matching [`StderrSink`]'s lack of a meaningful byte
/// count for a terminal destination.
pub struct TtySink {
    out: Box<dyn Write + Send>,
    color: bool,
}

impl TtySink {
    /// Wraps `out`, auto-detecting color support from `TERM` and whether `out` is
    /// actually attached to a terminal.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>, is_terminal: bool) -> Self {
        Self { out, color: is_terminal && term_allows_color() }
    }

    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()), io::stderr().is_terminal())
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()), io::stdout().is_terminal())
    }
}

impl OutputSink for TtySink {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        if !self.color {
            self.out.write_all(buffer)?;
            return Ok(buffer.len());
        }

        let line = String::from_utf8_lossy(buffer);
        let tag = color_for_line(&line);
        self.out.write_all(tag.as_bytes())?;
        self.out.write_all(buffer)?;
        self.out.write_all(RESET.as_bytes())?;
        Ok(buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_sink_reports_no_status() {
        let sink = StderrSink::new();
        assert!(sink.status().is_none());
    }

    #[test]
    fn file_sink_tracks_cumulative_size() {
        let dir = std::env::temp_dir().join(format!("daemonlib-sink-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.log");
        let mut sink = FileSink::open(&path).unwrap();

        sink.write(b"hello").unwrap();
        sink.write(b" world").unwrap();

        assert_eq!(sink.status().unwrap().size, 11);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn file_sink_rejects_a_path_with_no_file_name() {
        let err = FileSink::open("/").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
