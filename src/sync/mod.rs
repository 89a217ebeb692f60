// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! Synchronization primitives (`spec.md` §4.7).
//!
//! The original library's contract is that every primitive operation is infallible
//! from the caller's perspective: an OS-level failure is a programming error and
//! aborts the process. Rust's [`std::sync::Mutex`]/[`std::sync::Condvar`] already model
//! this almost exactly — a poisoned lock means a prior holder panicked while holding
//! it, which is the same "somebody already violated an invariant" situation the
//! original treats as fatal. [`StrictMutex`] and [`StrictCondvar`] thin-wrap the
//! standard types and turn that poison into an abort via `.unwrap()`, matching
//! [`crate::logger::sink::OutputDevice::lock`]'s own "panic on poison" convention.
//!
//! [`Semaphore`] has no standard-library equivalent, so it's built the way systems
//! libraries typically do: a count guarded by a mutex, signaled by a condvar.
//!
//! [`JoinHandle::join`] forbids joining the calling thread, per `spec.md` §9's note
//! that joining an already-destroyed (or self-) thread is undefined in the original
//! and must be forbidden explicitly here.

mod condvar;
mod mutex;
mod semaphore;
mod thread;

pub use condvar::StrictCondvar;
pub use mutex::StrictMutex;
pub use semaphore::Semaphore;
pub use thread::JoinHandle;
