//! One-shot, reset-on-rearm ack timer.
//!
//! Stands in for `SubscriptionImpl::ackTick` (a libevent timer re-armed via
//! `event_add` on every call) in
//! `examples/original_source/src/clientmon.cpp`. There is no priority queue
//! or timer wheel here: each `arm` spawns a sleeper that checks a
//! generation counter before firing, so a later `arm`/`cancel` silently
//! supersedes it rather than needing to cancel an in-flight OS timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::event_loop::EventLoop;

#[derive(Debug, Default)]
pub struct AckTimer {
    generation: Arc<AtomicU64>,
}

impl AckTimer {
    pub fn new() -> Self {
        AckTimer { generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Arm (or re-arm) the timer to post `on_fire` onto `loop_` after
    /// `delay`, unless superseded by a later `arm`/`cancel` first.
    pub fn arm<F>(&self, loop_: EventLoop, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            if generation.load(Ordering::SeqCst) == gen {
                let _ = loop_.dispatch(on_fire);
            }
        });
    }

    /// Supersede any pending arm so it no longer fires.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration as StdDuration;

    #[test]
    fn fires_after_delay() {
        let loop_ = EventLoop::start("ack-timer-test");
        let timer = AckTimer::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        timer.arm(loop_.clone(), StdDuration::from_millis(10), move || {
            fired2.store(true, Ordering::SeqCst);
        });
        thread::sleep(StdDuration::from_millis(100));
        loop_.sync();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn rearm_supersedes_earlier_arm() {
        let loop_ = EventLoop::start("ack-timer-test-2");
        let timer = AckTimer::new();
        let first_fired = Arc::new(AtomicBool::new(false));
        let second_fired = Arc::new(AtomicBool::new(false));

        let f1 = first_fired.clone();
        timer.arm(loop_.clone(), StdDuration::from_millis(50), move || {
            f1.store(true, Ordering::SeqCst);
        });
        let f2 = second_fired.clone();
        timer.arm(loop_.clone(), StdDuration::from_millis(10), move || {
            f2.store(true, Ordering::SeqCst);
        });

        thread::sleep(StdDuration::from_millis(150));
        loop_.sync();
        assert!(!first_fired.load(Ordering::SeqCst));
        assert!(second_fired.load(Ordering::SeqCst));
    }
}
