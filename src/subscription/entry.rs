//! Queue entry variants.

use crate::error::MonitorError;
use crate::wire::Value;

/// One slot in a subscription's delivery queue: either a decoded update or
/// one of the terminal/informational conditions that `pop` surfaces as an
/// error.
#[derive(Debug, Clone)]
pub enum Entry {
    Value(Value),
    Connected(String),
    Disconnect,
    RemoteError(String),
    Finished,
}

impl Entry {
    /// True for every variant except `Value` — these are the ones that
    /// force a push rather than a squash and can never be squash-targets
    /// themselves.
    pub fn is_error(&self) -> bool {
        !matches!(self, Entry::Value(_))
    }

    pub fn into_result(self) -> Result<Value, MonitorError> {
        match self {
            Entry::Value(v) => Ok(v),
            Entry::Connected(peer) => Err(MonitorError::Connected(peer)),
            Entry::Disconnect => Err(MonitorError::Disconnect),
            Entry::RemoteError(msg) => Err(MonitorError::RemoteError(msg)),
            Entry::Finished => Err(MonitorError::Finished),
        }
    }
}
