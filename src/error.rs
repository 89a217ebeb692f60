// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! Crate-wide error kinds (`spec.md` §7).
//!
//! Synchronization primitive failures are deliberately not represented here: per §7's
//! propagation policy they indicate a programming or kernel invariant violation and
//! abort the process instead (see [`crate::sync`]).

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the core (`spec.md` §7 table).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Non-blocking operation found no room / no data.
    #[error("would block")]
    WouldBlock,

    /// Write attempted on a FIFO after `shutdown()`.
    #[error("broken pipe")]
    BrokenPipe,

    /// Non-blocking write larger than the FIFO's capacity.
    #[error("payload of {len} bytes exceeds capacity of {capacity} bytes")]
    TooBig { len: usize, capacity: usize },

    /// Collaborator-owned resource (e.g. a config file) was missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unrecoverable read/write on a sink or handle.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Allocation failure, surfaced to the caller so it can unwind cleanly.
    #[error("allocation failed")]
    Oom,

    /// A platform multiplexor or signal-bridge resource could not be created.
    #[error("setup failed: {0}")]
    Setup(String),
}

impl Error {
    /// True for the two kinds a caller can retry past rather than treat as fatal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::WouldBlock)
    }
}
