// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! The CLI/daemonization consumer seam: the `--check-config`/`--daemon` bootstrap
//! surface a caller builds on top of this crate.
//!
//! `daemonlib` does not fork or detach a process itself — that is process-model
//! plumbing outside a portable library's remit. [`Daemonizer`] is the trait an
//! application's own bootstrap code implements; `demos/daemon_skeleton.rs` wires a
//! stub implementation against a `clap`-derived CLI to show the intended shape end
//! to end.

use crate::logger::OutputSink;
use std::path::{Path, PathBuf};

/// Outcome of a successful `--check-config` run: the effective values a caller
/// should print before exiting 0.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub log_level: String,
    pub debug_filter: String,
    pub pid_file: Option<PathBuf>,
}

/// The fork/setsid/pid-file/stdio-redirection sequence `--daemon` is expected to
/// perform, captured as a trait so this crate can define the *contract* without
/// owning the unsafe process-model operations themselves.
///
/// An implementation is expected to: double-fork and `setsid()`, write `pid_file`,
/// open the log file, redirect `stdin`/`stdout`/`stderr` to `/dev/null` plus the log
/// file, then hand the now-running log output back to the caller as an
/// [`OutputSink`], handing the running log output back over to the caller.
pub trait Daemonizer {
    /// Performs the daemonization sequence, returning the sink the caller should
    /// install on [`crate::logger::Logger`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pid-file cannot be created/locked, the log file
    /// cannot be opened, or the fork/setsid sequence fails.
    fn daemonize(&self, pid_file: &Path, log_file: &Path) -> std::io::Result<Box<dyn OutputSink>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::logger::FileSink;

    /// A `Daemonizer` stub that skips the actual fork/setsid/stdio-redirection
    /// sequence and just opens the log file, for exercising the trait boundary in
    /// tests and in the demo binary without requiring a forked child process.
    pub(crate) struct NoForkDaemonizer;

    impl Daemonizer for NoForkDaemonizer {
        fn daemonize(&self, _pid_file: &Path, log_file: &Path) -> std::io::Result<Box<dyn OutputSink>> {
            let sink = FileSink::open(log_file)?;
            Ok(Box::new(sink))
        }
    }

    #[test]
    fn stub_daemonizer_opens_the_log_file() {
        let dir = std::env::temp_dir().join(format!("daemonlib-bootstrap-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let pid_file = dir.join("daemon.pid");
        let log_file = dir.join("daemon.log");

        let daemonizer = NoForkDaemonizer;
        let sink = daemonizer.daemonize(&pid_file, &log_file);
        assert!(sink.is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }
}
