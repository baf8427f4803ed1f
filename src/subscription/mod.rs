//! Per-subscription state machine, queue, and pipeline ack accounting.
//!
//! Ported from `SubscriptionImpl` in
//! `examples/original_source/src/clientmon.cpp`: states `{Connecting,
//! Creating, Idle, Running, Done}`, transitioning as the owning channel
//! connects/disconnects and as INIT/START/STOP/data/final frames are
//! exchanged.

pub mod ack_timer;
pub mod entry;
pub mod queue;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::channel::{Channel, Connection, RequestInfo};
use crate::error::MonitorError;
use crate::event_loop::EventLoop;
use crate::wire::monitor_frame;
use crate::wire::{TypeDesc, Value};

pub use ack_timer::AckTimer;
pub use entry::Entry;
pub use queue::QueueState;

/// Subscription lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connecting,
    Creating,
    Idle,
    Running,
    Done,
}

/// Immutable configuration captured at subscribe time.
pub struct SubscriptionConfig {
    pub pipeline: bool,
    pub queue_size: u32,
    pub ack_at: u32,
    pub autostart: bool,
    pub mask_connected: bool,
    pub mask_disconnected: bool,
    /// Invoked on the event loop whenever the queue gains its first entry.
    /// The callback only signals availability; the caller still calls
    /// `pop()` to retrieve values, the way the original's `MonitorSync`
    /// event callback does not hand data directly to the subscriber.
    pub event: Arc<dyn Fn(&Subscription) + Send + Sync>,
}

struct FsmState {
    state: State,
    prototype: Option<TypeDesc>,
}

/// A live monitor subscription.
///
/// All FSM-mutating methods assert they run on the owning event loop
/// (`assert_in_loop`) rather than encoding that invariant in the type
/// system — the queue itself uses its own mutex since `pop()` is called
/// from arbitrary subscriber threads.
pub struct Subscription {
    pub channel_name: String,
    pub sid: u32,
    pub ioid: u32,
    channel: Weak<Channel>,
    self_weak: Weak<Subscription>,
    event_loop: EventLoop,
    config: SubscriptionConfig,
    fsm: Mutex<FsmState>,
    queue: Mutex<QueueState>,
    ack_timer: AckTimer,
}

impl Subscription {
    pub fn new(channel: &Arc<Channel>, sid: u32, ioid: u32, config: SubscriptionConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Subscription {
            channel_name: channel.name.clone(),
            sid,
            ioid,
            channel: Arc::downgrade(channel),
            self_weak: self_weak.clone(),
            event_loop: channel.event_loop.clone(),
            config,
            fsm: Mutex::new(FsmState { state: State::Connecting, prototype: None }),
            queue: Mutex::new(QueueState::new()),
            ack_timer: AckTimer::new(),
        })
    }

    pub fn state(&self) -> State {
        self.fsm.lock().unwrap().state
    }

    /// Invoke the subscriber's event callback, on the event loop, with a
    /// panic caught and logged rather than propagated — one bad callback
    /// must not take down the loop.
    fn notify(&self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| (self.config.event)(self)));
        if result.is_err() {
            tracing::error!(channel = %self.channel_name, ioid = self.ioid, "monitor event callback panicked");
        }
    }

    fn maybe_notify(&self, should_notify: bool) {
        if should_notify {
            self.notify();
        }
    }

    /// Pop the next queued entry, or `Ok(None)` if nothing is queued.
    /// Accounts pipeline unacknowledged updates and may (re)arm the ack
    /// timer.
    pub fn pop(&self) -> Result<Option<Value>, MonitorError> {
        let mut q = self.queue.lock().unwrap();
        let Some(entry) = q.queue.pop_front() else {
            return Ok(None);
        };
        if self.config.pipeline {
            self.account_ack(&mut q);
        }
        drop(q);
        entry.into_result().map(Some)
    }

    /// Pipeline ack bookkeeping for one popped update, ported from
    /// `SubscriptionImpl::pop()`'s `event_add(ackTick, &tick)` dance: the
    /// first pop after a quiet period always (re)arms — immediately if
    /// `ack_at == 1`, otherwise after a 1s delay to batch a slow consumer —
    /// and a pop that pushes `unack` to or past `ack_at` rearms
    /// immediately. Pops in between don't touch the timer.
    fn account_ack(&self, q: &mut QueueState) {
        let old_unack = q.unack;
        let should_arm = old_unack == 0 || old_unack >= self.config.ack_at;
        let delay = if old_unack == 0 && self.config.ack_at != 1 {
            Duration::from_secs(1)
        } else {
            Duration::ZERO
        };
        q.unack = old_unack + 1;

        if should_arm {
            let sub = self.self_weak.clone();
            self.ack_timer.arm(self.event_loop.clone(), delay, move || {
                if let Some(sub) = sub.upgrade() {
                    sub.send_ack();
                }
            });
        }
    }

    fn send_ack(&self) {
        self.event_loop.assert_in_loop();
        let Some(channel) = self.channel.upgrade() else { return };
        let Some(conn) = channel.conn.lock().unwrap().clone() else { return };
        let unack = {
            let mut q = self.queue.lock().unwrap();
            if q.unack == 0 {
                return;
            }
            let unack = q.unack;
            q.unack = 0;
            q.window += unack;
            unack
        };
        let sid = self.sid;
        let ioid = self.ioid;
        conn.send_frame(move |out| monitor_frame::encode_ack(out, sid, ioid, unack));
    }

    /// Connecting -> Creating: the owning channel just became live. Sends
    /// INIT and registers this ioid with the connection.
    pub fn on_channel_live(self: &Arc<Self>, conn: &Arc<Connection>) {
        self.event_loop.assert_in_loop();
        {
            let mut fsm = self.fsm.lock().unwrap();
            if fsm.state != State::Connecting {
                return;
            }
            fsm.state = State::Creating;
        }

        conn.op_by_ioid
            .lock()
            .unwrap()
            .insert(self.ioid, RequestInfo { sub: Arc::downgrade(self), prototype: None });

        if !self.config.mask_connected {
            let notify = {
                let mut q = self.queue.lock().unwrap();
                q.apply_update(self.config.queue_size, Entry::Connected(conn.peer_name.clone()), false)
            };
            self.maybe_notify(notify);
        }

        // The pv_request descriptor/value pair itself (field selection,
        // record options) is opaque at this layer and out of scope here —
        // an empty placeholder stands in for it on the wire.
        let req_desc = TypeDesc::new(0, Vec::new());
        let req_value = Value::clone_empty(&req_desc);
        let sid = self.sid;
        let ioid = self.ioid;
        let pipeline = self.config.pipeline;
        let queue_size = self.config.queue_size;
        conn.send_frame(move |out| {
            monitor_frame::encode_init(out, sid, ioid, pipeline, &req_desc, &req_value, queue_size)
        });
    }

    /// INIT reply arrived with success status: Creating -> Idle, caching
    /// the prototype and auto-starting if configured.
    pub fn on_init_ok(self: &Arc<Self>, conn: &Arc<Connection>, prototype: TypeDesc) {
        self.event_loop.assert_in_loop();
        {
            let mut fsm = self.fsm.lock().unwrap();
            if fsm.state != State::Creating {
                return;
            }
            fsm.state = State::Idle;
            fsm.prototype = Some(prototype.clone());
        }
        if let Some(info) = conn.op_by_ioid.lock().unwrap().get_mut(&self.ioid) {
            info.prototype = Some(prototype);
        }
        if self.config.pipeline {
            self.queue.lock().unwrap().window = self.config.queue_size;
        }
        if self.config.autostart {
            self.pause_locked(conn, false);
        }
    }

    /// INIT (or any) reply arrived with a non-success status: any state ->
    /// Done, surfacing the remote error.
    pub fn on_remote_error(self: &Arc<Self>, message: String) {
        self.event_loop.assert_in_loop();
        self.fsm.lock().unwrap().state = State::Done;
        self.ack_timer.cancel();
        let notify = self.queue.lock().unwrap().apply_update(self.config.queue_size, Entry::RemoteError(message), false);
        self.maybe_notify(notify);
    }

    /// `pause(false)` (resume/start) or `pause(true)` (stop), run
    /// synchronously on the event loop the way the original's
    /// `tcp_loop.call(...)` blocks the caller.
    pub fn pause(self: &Arc<Self>, paused: bool) {
        let this = self.clone();
        self.event_loop.call(move || {
            let Some(channel) = this.channel.upgrade() else { return };
            let Some(conn) = channel.conn.lock().unwrap().clone() else { return };
            this.pause_locked(&conn, paused);
        });
    }

    fn pause_locked(self: &Arc<Self>, conn: &Arc<Connection>, paused: bool) {
        let mut fsm = self.fsm.lock().unwrap();
        let target = if paused { State::Idle } else { State::Running };
        if fsm.state != State::Idle && fsm.state != State::Running {
            return;
        }
        if fsm.state == target {
            return;
        }
        fsm.state = target;
        drop(fsm);
        let sid = self.sid;
        let ioid = self.ioid;
        conn.send_frame(move |out| monitor_frame::encode_start_stop(out, sid, ioid, paused));
    }

    /// Server or client disconnect: Creating/Idle/Running -> Connecting,
    /// re-queuing onto the channel's pending list so it re-subscribes on
    /// reconnect.
    pub fn on_disconnect(self: &Arc<Self>) {
        self.event_loop.assert_in_loop();
        {
            let mut fsm = self.fsm.lock().unwrap();
            if fsm.state == State::Connecting || fsm.state == State::Done {
                return;
            }
            fsm.state = State::Connecting;
            fsm.prototype = None;
        }
        self.ack_timer.cancel();

        if !self.config.mask_disconnected {
            let notify = self.queue.lock().unwrap().apply_update(self.config.queue_size, Entry::Disconnect, false);
            self.maybe_notify(notify);
        }

        if let Some(channel) = self.channel.upgrade() {
            channel.op_by_ioid.lock().unwrap().remove(&self.ioid);
            channel.pending.lock().unwrap().push(self.clone());
        }
    }

    /// Apply one inbound data update: decrement pipeline window, then push
    /// or squash into the queue.
    pub fn apply_update(self: &Arc<Self>, entry: Entry, final_bit: bool) {
        self.event_loop.assert_in_loop();
        let notify = self.push_with_window(entry, final_bit);
        self.maybe_notify(notify);
    }

    fn push_with_window(&self, entry: Entry, final_bit: bool) -> bool {
        let mut q = self.queue.lock().unwrap();
        if self.config.pipeline {
            if q.window > 0 {
                q.window -= 1;
            } else {
                tracing::error!(channel = %self.channel_name, ioid = self.ioid, "pipeline window underflow");
            }
        }
        q.apply_update(self.config.queue_size, entry, final_bit)
    }

    /// A final reply arrived: Done. Enqueues the trailing value (if any)
    /// followed by `Finished`, tears down ioid bookkeeping, and (if the
    /// server didn't already consider the operation destroyed) sends
    /// `DESTROY_REQUEST`.
    pub fn on_final(self: &Arc<Self>, conn: &Arc<Connection>, update: Option<Entry>) {
        self.event_loop.assert_in_loop();
        self.fsm.lock().unwrap().state = State::Done;
        self.ack_timer.cancel();

        let notify = match update {
            Some(entry) => self.push_with_window(entry, true),
            None => self.push_with_window(Entry::Finished, false),
        };
        self.maybe_notify(notify);

        conn.op_by_ioid.lock().unwrap().remove(&self.ioid);
        if let Some(channel) = self.channel.upgrade() {
            channel.op_by_ioid.lock().unwrap().remove(&self.ioid);
        }
    }

    /// Client-initiated cancel. `implicit` means the `Arc` was simply
    /// dropped (no explicit `cancel()` call) — in that case a terminal
    /// state is left alone rather than re-entered, matching
    /// `SubscriptionImpl::_cancel(bool implicit)`.
    pub fn cancel(self: &Arc<Self>, implicit: bool) {
        let this = self.clone();
        let _ = self.event_loop.dispatch(move || this.cancel_in_loop(implicit));
    }

    fn cancel_in_loop(self: &Arc<Self>, implicit: bool) {
        let mut fsm = self.fsm.lock().unwrap();
        if implicit && fsm.state == State::Done {
            return;
        }
        let was_live = fsm.state != State::Connecting && fsm.state != State::Done;
        fsm.state = State::Done;
        drop(fsm);
        self.ack_timer.cancel();

        if let Some(channel) = self.channel.upgrade() {
            channel.op_by_ioid.lock().unwrap().remove(&self.ioid);
            channel.pending.lock().unwrap().retain(|s| !Arc::ptr_eq(s, self));
            if was_live {
                if let Some(conn) = channel.conn.lock().unwrap().clone() {
                    conn.op_by_ioid.lock().unwrap().remove(&self.ioid);
                    conn.send_destroy_request(self.sid, self.ioid);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.ack_timer.cancel();
    }
}

#[cfg(test)]
impl Subscription {
    /// (queue length, window, unack) — test-only introspection of state
    /// otherwise private to the queue mutex.
    fn queue_snapshot(&self) -> (usize, u32, u32) {
        let q = self.queue.lock().unwrap();
        (q.queue.len(), q.window, q.unack)
    }
}

/// The public handle returned to a subscriber. Wraps an `Arc<Subscription>`
/// so that dropping the last handle runs an implicit cancel — the Rust
/// analogue of the original's `shared_ptr<Subscription>` destructor
/// invoking `_cancel(true)`.
pub struct Monitor(Arc<Subscription>);

impl Monitor {
    pub fn new(inner: Arc<Subscription>) -> Self {
        Monitor(inner)
    }

    pub fn pop(&self) -> Result<Option<Value>, MonitorError> {
        self.0.pop()
    }

    pub fn pause(&self, paused: bool) {
        self.0.pause(paused);
    }

    pub fn state(&self) -> State {
        self.0.state()
    }

    /// Explicit cancel. Further `pop()` calls observe `MonitorError::Finished`.
    pub fn cancel(&self) {
        self.0.cancel(false);
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.0.cancel(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration as StdDuration;

    fn value(n: u8) -> Value {
        let proto = TypeDesc::new(1, Vec::new());
        let mut v = Value::clone_empty(&proto);
        v.fields = vec![n];
        v
    }

    fn make(loop_: &EventLoop, pipeline: bool, queue_size: u32, ack_at: u32) -> (Arc<Channel>, Arc<Connection>, Arc<Subscription>) {
        let channel = Channel::new("test:pv", loop_.clone());
        let conn = Connection::new("127.0.0.1:5075");
        *channel.conn.lock().unwrap() = Some(conn.clone());
        let config = SubscriptionConfig {
            pipeline,
            queue_size,
            ack_at,
            autostart: true,
            mask_connected: true,
            mask_disconnected: true,
            event: Arc::new(|_| {}),
        };
        let sub = Subscription::new(&channel, 1, 42, config);
        channel.op_by_ioid.lock().unwrap().insert(42, sub.clone());
        (channel, conn, sub)
    }

    /// queue_size=2, no pops between four inbound updates -> only the last
    /// two survive.
    #[test]
    fn non_pipeline_squash_keeps_latest_two() {
        let loop_ = EventLoop::start("sub-squash-test");
        let (_channel, conn, sub) = make(&loop_, false, 2, 1);
        loop_.call({
            let sub = sub.clone();
            let conn = conn.clone();
            move || {
                sub.on_channel_live(&conn);
                sub.on_init_ok(&conn, TypeDesc::new(1, Vec::new()));
                for n in 1u8..=4 {
                    sub.apply_update(Entry::Value(value(n)), false);
                }
            }
        });
        assert_eq!(sub.pop().unwrap().unwrap().fields, vec![3]);
        assert_eq!(sub.pop().unwrap().unwrap().fields, vec![4]);
        assert!(sub.pop().unwrap().is_none());
    }

    /// queue_size=8, ack_at=4, pipeline=true.
    #[test]
    fn pipeline_window_and_ack_accounting() {
        let loop_ = EventLoop::start("sub-pipeline-test");
        let (_channel, conn, sub) = make(&loop_, true, 8, 4);
        loop_.call({
            let sub = sub.clone();
            let conn = conn.clone();
            move || {
                sub.on_channel_live(&conn);
                sub.on_init_ok(&conn, TypeDesc::new(1, Vec::new()));
                assert_eq!(sub.queue_snapshot(), (0, 8, 0));
                for n in 1u8..=4 {
                    sub.apply_update(Entry::Value(value(n)), false);
                }
                assert_eq!(sub.queue_snapshot(), (4, 4, 0));
            }
        });

        for expect in 1u8..=4 {
            assert_eq!(sub.pop().unwrap().unwrap().fields, vec![expect]);
        }
        assert_eq!(sub.queue_snapshot().2, 4); // unack

        // The first pop armed a 1s-delayed tick (ack_at != 1); it hasn't
        // fired yet, so no ACK was sent and window/unack are unchanged.
        assert!(conn.sent.lock().unwrap().is_empty());

        thread::sleep(StdDuration::from_millis(1100));
        loop_.sync();
        assert_eq!(sub.queue_snapshot(), (0, 8, 0));
        assert_eq!(conn.sent.lock().unwrap().len(), 1);
    }
}
