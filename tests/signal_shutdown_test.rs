// Copyright (c) 2026 The daemonlib Authors. Licensed under Apache License, Version 2.0.

//! `spec.md` §8 S3: run the loop with only the signal pipe registered, deliver
//! `SIGTERM`, and expect `run` to return within 100 ms with the running flag cleared.
//!
//! `#[serial]` because installing process-wide signal dispositions races any other
//! test doing the same (`SPEC_FULL.md` §A.6).

use daemonlib::event_loop::{Direction, EventLoop, HandleType};
use daemonlib::signal::{SignalBridge, SignalEvent};
use serial_test::serial;
use std::sync::mpsc;
use std::time::Duration;

#[test]
#[serial]
fn sigterm_stops_the_loop_within_a_bounded_time() {
    let mut event_loop = EventLoop::new().expect("event loop setup");
    let stopper = event_loop.stopper();

    let bridge = SignalBridge::new().expect("signal bridge setup");
    event_loop
        .add_source(
            Box::new(bridge),
            HandleType::Signal,
            Direction::READ,
            Some(Box::new(move |_key, handle, _pending| {
                let Some(bridge) = handle.as_any_mut().downcast_mut::<SignalBridge>() else {
                    return;
                };
                for event in bridge.pending() {
                    if event == SignalEvent::Stop {
                        stopper.stop();
                    }
                }
            })),
            None,
        )
        .expect("signal source registration");

    let (done_tx, done_rx) = mpsc::channel();
    let handle = std::thread::spawn(move || {
        let result = event_loop.run(|| {});
        done_tx.send(result.is_ok()).ok();
        event_loop
    });

    // Give the spawned thread a moment to enter `poll()` before delivering the
    // signal, so the delivery actually has to wake a blocked loop rather than
    // landing before `run` starts.
    std::thread::sleep(Duration::from_millis(20));
    unsafe {
        libc::raise(libc::SIGTERM);
    }

    let ran_ok = done_rx
        .recv_timeout(Duration::from_millis(100))
        .expect("event loop did not stop within the bounded window");
    assert!(ran_ok);

    let event_loop = handle.join().expect("event loop thread panicked");
    assert!(!event_loop.is_running());
}
