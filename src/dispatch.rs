//! Inbound MONITOR frame dispatch.
//!
//! Ported from `Connection::handle_MONITOR` in
//! `examples/original_source/src/clientmon.cpp`: resolve the ioid, decode
//! the frame's status/prototype/value tail using the connection's cached
//! per-ioid prototype (which keeps working even if the subscription itself
//! has already been dropped), then route into the matching `Subscription`
//! FSM transition.

use std::sync::Arc;

use crate::channel::Connection;
use crate::error::ProtocolError;
use crate::subscription::{Entry, State};
use crate::wire::buffer::VecInBuf;
use crate::wire::monitor_frame;

/// Handle one already-demuxed MONITOR frame's raw bytes.
///
/// Returns `Ok(())` for anything recoverable at the frame level (unknown
/// ioid, a dropped subscription, a null/undecodable update — all logged
/// and dropped). Returns `Err` for a frame whose (state, subcmd) pairing
/// violates the protocol's legality table — `Creating` only ever accepts
/// an init reply, `Idle`/`Running` only ever accept a non-init frame —
/// which the caller should treat as fatal to the connection, the way
/// `Connection::handle_MONITOR` calls `M.fault()` and resets the socket.
pub fn handle_monitor_frame(conn: &Arc<Connection>, raw: &[u8]) -> Result<(), ProtocolError> {
    let mut inp = VecInBuf::new(true, raw.to_vec());
    let frame = match monitor_frame::decode_header(&mut inp) {
        Ok(f) => f,
        Err(err) => {
            tracing::warn!(error = %err, "malformed monitor frame, dropping");
            return Ok(());
        }
    };

    let sub = {
        let mut table = conn.op_by_ioid.lock().unwrap();
        let Some(info) = table.get_mut(&frame.ioid) else {
            if frame.init {
                tracing::debug!(ioid = frame.ioid, "monitor frame for unknown ioid");
            } else {
                tracing::error!(ioid = frame.ioid, "monitor frame for unknown ioid");
            }
            return Ok(());
        };
        if frame.init {
            info.prototype = frame.prototype.clone();
        }
        info.sub.upgrade()
    };

    let Some(sub) = sub else {
        tracing::debug!(ioid = frame.ioid, "monitor frame for a dropped subscription");
        return Ok(());
    };

    let state = sub.state();
    let legal = matches!(
        (state, frame.init),
        (State::Creating, true) | (State::Idle, false) | (State::Running, false)
    );
    if !legal {
        return Err(ProtocolError::UnexpectedFrame(frame.ioid, state));
    }

    if frame.init {
        let status = frame.status.clone().unwrap_or_else(crate::wire::Status::ok);
        if status.is_success() {
            let prototype = frame.prototype.expect("decode_header always pairs init with a prototype");
            sub.on_init_ok(conn, prototype);
        } else {
            sub.on_remote_error(status.message);
        }
        return Ok(());
    }

    if let Some(status) = &frame.status {
        if !status.is_success() {
            sub.on_remote_error(status.message.clone());
            return Ok(());
        }
    }

    let prototype = conn.op_by_ioid.lock().unwrap().get(&frame.ioid).and_then(|info| info.prototype.clone());

    let value = match prototype {
        Some(proto) => match monitor_frame::decode_update_value(&mut inp, &proto) {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(error = %err, ioid = frame.ioid, "failed to decode monitor update");
                None
            }
        },
        None => {
            tracing::warn!(ioid = frame.ioid, "data frame arrived before a prototype was cached");
            None
        }
    };

    if frame.final_bit {
        sub.on_final(conn, value.map(Entry::Value));
    } else if let Some(v) = value {
        sub.apply_update(Entry::Value(v), false);
    } else {
        tracing::debug!(ioid = frame.ioid, "null update in {:?}, dropped", sub.state());
    }

    Ok(())
}
