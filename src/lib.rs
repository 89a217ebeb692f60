// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! `daemonlib`: a reusable foundation for long-running background services that
//! multiplex many I/O handles, absorb OS signals, run timers, emit structured logs
//! without blocking the hot path, and daemonize cleanly.
//!
//! `daemonlib` is not itself a daemon — it provides the primitives a daemon composes.
//! The core of the crate is four subsystems:
//!
//! - [`event_loop`]: a level-triggered readiness-multiplexing event loop with a
//!   stable indexing contract that tolerates removal during dispatch.
//! - [`logger`]: an asynchronous logging pipeline whose hot path never blocks on the
//!   output sink and whose debug filtering is hot-reconfigurable per source and per
//!   line.
//! - [`fifo`]: a bounded, blocking-or-non-blocking, shutdown-aware ring buffer used
//!   as the logger's transport.
//! - [`writer`]: a per-connection buffered writer that translates would-block into
//!   an event-loop-driven drain with drop policy under backpressure.
//!
//! Everything else ([`sync`], [`io_handle`], [`signal`], [`timer`], [`packet`]) is
//! plumbing these four subsystems are built from or out of. [`config`] and
//! [`bootstrap`] define the seams this crate expects an application to fill in: a
//! `.conf` parser/schema layer and a fork/setsid daemonizer are collaborators, not
//! implementations this crate provides.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod fifo;
pub mod io_handle;
pub mod logger;
pub mod packet;
pub mod signal;
pub mod sync;
pub mod timer;
pub mod writer;

pub use error::{Error, Result};
