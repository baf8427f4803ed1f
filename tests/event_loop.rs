//! Integration-level smoke test for the event loop via the crate's public
//! API (the detailed scenario lives as a unit test alongside the
//! implementation in `src/event_loop.rs`).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use pva_monitor::EventLoop;

#[test]
fn dispatch_runs_in_order_and_sync_drains_queue() {
    let loop_ = EventLoop::start("integration-loop");
    let counter = Arc::new(AtomicU32::new(0));

    for expect in 0..10u32 {
        let counter = counter.clone();
        loop_
            .dispatch(move || {
                let prev = counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(prev, expect);
            })
            .unwrap();
    }
    loop_.sync();
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}
