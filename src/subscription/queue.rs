//! Bounded delivery queue with squashing and pipeline window accounting,
//! ported from `SubscriptionImpl::queue`/`window`/`unack` in
//! `examples/original_source/src/clientmon.cpp`.

use std::collections::VecDeque;

use crate::subscription::entry::Entry;

/// State guarded by a subscription's queue mutex: the delivery queue
/// itself, plus the pipeline window/unacknowledged-update counters.
#[derive(Debug, Default)]
pub struct QueueState {
    pub queue: VecDeque<Entry>,
    /// Remaining server-side credit (pipeline mode only).
    pub window: u32,
    /// Updates popped but not yet acknowledged (pipeline mode only).
    pub unack: u32,
}

impl QueueState {
    pub fn new() -> Self {
        QueueState::default()
    }

    /// Apply one inbound update under the queue lock. Returns `true` if
    /// the caller should notify the subscriber's
    /// callback (the queue transitioned from empty to non-empty).
    ///
    /// `final_bit` appends a synthetic [`Entry::Finished`] after a
    /// non-error update, matching the final-reply handling in
    /// `Connection::handle_MONITOR`. Window accounting (pipeline credit
    /// decrement) is the caller's responsibility — it happens regardless
    /// of whether this call ends up pushing or squashing.
    pub fn apply_update(&mut self, queue_size: u32, update: Entry, final_bit: bool) -> bool {
        let was_empty = self.queue.is_empty();
        let is_error = update.is_error();
        let tail_is_error = self.queue.back().map(Entry::is_error).unwrap_or(false);

        if is_error || (self.queue.len() as u32) < queue_size || tail_is_error {
            self.queue.push_back(update);
        } else if let Entry::Value(v) = &update {
            if let Some(Entry::Value(tail)) = self.queue.back_mut() {
                tail.assign(v);
            }
        }

        if final_bit && !is_error {
            self.queue.push_back(Entry::Finished);
        }

        // Defensive: mirrors the original's own belt-and-braces check.
        // Unreachable given the branches above always push something when
        // the queue starts empty, but a future caller could in principle
        // invoke this with neither an error nor a value-bearing update.
        if self.queue.is_empty() {
            return false;
        }
        was_empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{TypeDesc, Value};

    fn val(n: u8) -> Entry {
        let proto = TypeDesc::new(1, Vec::new());
        let mut v = Value::clone_empty(&proto);
        v.fields = vec![n];
        Entry::Value(v)
    }

    fn field(e: &Entry) -> u8 {
        match e {
            Entry::Value(v) => v.fields[0],
            _ => panic!("expected value entry"),
        }
    }

    /// queue_size=2, updates 1,2,3,4 arrive with no pops -> final queue is
    /// [3,4] (squash keeps only the latest tail).
    #[test]
    fn squash_keeps_latest_when_full() {
        let mut q = QueueState::new();
        for n in 1u8..=4 {
            q.apply_update(2, val(n), false);
        }
        assert_eq!(q.queue.len(), 2);
        assert_eq!(field(&q.queue[0]), 3);
        assert_eq!(field(&q.queue[1]), 4);
    }

    #[test]
    fn notify_only_on_empty_to_nonempty_transition() {
        let mut q = QueueState::new();
        assert!(q.apply_update(4, val(1), false));
        assert!(!q.apply_update(4, val(2), false));
    }

    #[test]
    fn error_entries_always_push_even_when_full() {
        let mut q = QueueState::new();
        q.apply_update(1, val(1), false);
        q.apply_update(1, Entry::Disconnect, false);
        assert_eq!(q.queue.len(), 2);
    }

    #[test]
    fn final_bit_appends_finished_after_value() {
        let mut q = QueueState::new();
        q.apply_update(4, val(1), true);
        assert_eq!(q.queue.len(), 2);
        assert!(matches!(q.queue[1], Entry::Finished));
    }
}
