//! Error taxonomies for the monitor client core.
//!
//! Two families exist, deliberately kept separate:
//! [`MonitorError`] rides the per-subscription queue and is raised from
//! [`crate::subscription::Subscription::pop`]; [`EventLoopError`] and
//! [`WireError`] are ordinary `Result` errors returned from the loop and
//! codec APIs.

use thiserror::Error;

/// Error raised by [`crate::subscription::Subscription::pop`] when the
/// popped [`crate::subscription::Entry`] is an error variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// INIT was sent and `mask_connected` is false.
    #[error("connected to {0}")]
    Connected(String),
    /// The connection dropped and `mask_disconnected` is false.
    #[error("disconnected")]
    Disconnect,
    /// The server reported a non-success status.
    #[error("remote error: {0}")]
    RemoteError(String),
    /// The server sent a final reply; the subscription is now terminal.
    #[error("monitor finished")]
    Finished,
}

/// Errors from the event loop's `dispatch`/`call` entry points.
#[derive(Debug, Error)]
pub enum EventLoopError {
    /// The loop's work queue could not be armed (the worker thread has
    /// exited, or the underlying primitive rejected the request).
    #[error("unable to queue dispatch onto the event loop")]
    QueueFailed,
    /// A closure run via `call` panicked or returned an error that the
    /// caller's closure chose to propagate.
    #[error("closure posted to event loop failed: {0}")]
    ClosureFailed(String),
}

/// Errors from the wire codec.
#[derive(Debug, Error)]
pub enum WireError {
    /// A decode ran past the end of the available bytes.
    #[error("truncated input")]
    Truncated,
    /// A string or compound value's declared length would not fit `usize`
    /// or exceeded a sanity bound.
    #[error("invalid length prefix: {0}")]
    InvalidLength(u32),
    /// Buffer growth failed (out of memory). Treated as fatal: it
    /// indicates a corrupted output stream, not a recoverable condition.
    #[error("buffer allocation failed")]
    AllocFailed,
}

/// Protocol invariants violated by an inbound frame: a
/// state mismatch between what the server sent and what the subscription's
/// FSM expected. The caller treats this as fatal to the connection, the
/// way `Connection::handle_MONITOR` bails out and closes the socket.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("ioid {0} received a monitor frame while in state {1:?}")]
    UnexpectedFrame(u32, crate::subscription::State),
}

/// Errors from [`crate::builder::MonitorBuilder::exec`] and configuration
/// loading.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("event loop error: {0}")]
    Loop(#[from] EventLoopError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = WireError> = std::result::Result<T, E>;
