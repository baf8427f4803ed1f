//! Minimal channel/connection stand-ins.
//!
//! Full channel search, connection setup/teardown, and the byte-framed TCP
//! transport are out of scope. These types carry
//! just enough state — a channel's server id and pending-subscription
//! list, a connection's per-ioid request table and outgoing frame log — to
//! drive the subscription FSM and dispatch layer from tests, the way
//! `Channel`/`Connection` do in `clientmon.cpp` but pared down to this
//! crate's scope.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::event_loop::EventLoop;
use crate::subscription::Subscription;
use crate::wire::buffer::VecOutBuf;
use crate::wire::TypeDesc;

/// Per-ioid bookkeeping a connection keeps for an in-flight operation.
///
/// `prototype` is cached here independently of the subscription's own
/// copy: `Connection::handle_MONITOR` in `clientmon.cpp` decodes using
/// `info->prototype` before even attempting to resolve the subscription's
/// weak reference, so decoding must keep working for any ioid still in
/// this map even after the `Subscription` itself has been dropped.
pub struct RequestInfo {
    pub sub: Weak<Subscription>,
    pub prototype: Option<TypeDesc>,
}

/// Stand-in for a live transport connection.
///
/// Each MONITOR-family message the FSM sends is fully encoded (see
/// `crate::wire::monitor_frame`) and appended here as one frame, rather
/// than framed onto a real socket buffer — the TCP transport itself is
/// out of scope. `DESTROY_REQUEST` is a
/// connection-level command, not a MONITOR subcmd, so it is tracked
/// separately.
pub struct Connection {
    pub peer_name: String,
    pub op_by_ioid: Mutex<HashMap<u32, RequestInfo>>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub destroy_requests: Mutex<Vec<(u32, u32)>>,
}

impl Connection {
    pub fn new(peer_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Connection {
            peer_name: peer_name.into(),
            op_by_ioid: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            destroy_requests: Mutex::new(Vec::new()),
        })
    }

    /// Encode a MONITOR-family frame via `encode` and append the bytes to
    /// the sent log.
    pub fn send_frame(&self, encode: impl FnOnce(&mut VecOutBuf) -> Result<(), crate::error::WireError>) {
        let mut out = VecOutBuf::new(true);
        if let Err(err) = encode(&mut out) {
            tracing::error!(error = %err, "failed to encode outgoing monitor frame");
            return;
        }
        self.sent.lock().unwrap().push(out.into_inner());
    }

    pub fn send_destroy_request(&self, sid: u32, ioid: u32) {
        self.destroy_requests.lock().unwrap().push((sid, ioid));
    }
}

/// Stand-in for a resolved channel: a server-side id plus the
/// subscriptions waiting on it (either for the initial connection, or for
/// reconnection after a drop).
pub struct Channel {
    pub name: String,
    pub event_loop: EventLoop,
    pub sid: Mutex<Option<u32>>,
    pub conn: Mutex<Option<Arc<Connection>>>,
    pub pending: Mutex<Vec<Arc<Subscription>>>,
    pub op_by_ioid: Mutex<HashMap<u32, Arc<Subscription>>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, event_loop: EventLoop) -> Arc<Self> {
        Arc::new(Channel {
            name: name.into(),
            event_loop,
            sid: Mutex::new(None),
            conn: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
            op_by_ioid: Mutex::new(HashMap::new()),
        })
    }

    pub fn is_live(&self) -> bool {
        self.conn.lock().unwrap().is_some()
    }
}
