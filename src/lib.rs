//! Client-side pvAccess monitor subscription core.
//!
//! Owns the per-subscription state machine, the bounded delivery queue
//! with squashing and pipeline flow control, the wire codec for the
//! MONITOR command family, and the single-threaded dispatch loop that
//! serializes all of it. Channel search, connection setup, and the TCP
//! transport itself live outside this crate's scope; [`channel`] provides
//! just enough of a stand-in to drive the rest from tests.

pub mod builder;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event_loop;
pub mod subscription;
pub mod wire;

pub use builder::{AckAny, MonitorBuilder, PvRequestOptions};
pub use channel::{Channel, Connection};
pub use config::MonitorDefaults;
pub use error::{BuildError, EventLoopError, MonitorError, ProtocolError, WireError};
pub use event_loop::EventLoop;
pub use subscription::{Entry, Monitor, State, Subscription, SubscriptionConfig};
