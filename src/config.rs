//! Crate-level defaults, loaded from an optional TOML file.
//!
//! Grounded on the `Raw*`/public-struct split in
//! `examples/iwismer-rusty-timer/services/forwarder/src/config.rs`: the
//! file is deserialized into a `Raw` shape with everything optional, then
//! validated/defaulted into the public, fully-resolved struct callers use.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::BuildError;

/// Resolved, ready-to-use defaults for subscriptions that don't specify
/// their own queue size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDefaults {
    pub default_queue_size: u32,
}

impl Default for MonitorDefaults {
    fn default() -> Self {
        MonitorDefaults { default_queue_size: 4 }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawMonitorDefaults {
    default_queue_size: Option<u32>,
}

impl MonitorDefaults {
    /// Load from a TOML file, falling back to built-in defaults for any
    /// field the file omits. A missing file is not an error — it just
    /// means "use the defaults".
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let raw: RawMonitorDefaults = match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => RawMonitorDefaults::default(),
            Err(err) => return Err(err.into()),
        };
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawMonitorDefaults) -> Result<Self, BuildError> {
        let default_queue_size = raw.default_queue_size.unwrap_or(4);
        if default_queue_size == 0 {
            return Err(BuildError::InvalidConfig("default_queue_size must be at least 1".into()));
        }
        Ok(MonitorDefaults { default_queue_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let defaults = MonitorDefaults::load("/nonexistent/path/monitor.toml").unwrap();
        assert_eq!(defaults, MonitorDefaults::default());
    }

    #[test]
    fn file_overrides_default_queue_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_queue_size = 16").unwrap();
        let defaults = MonitorDefaults::load(file.path()).unwrap();
        assert_eq!(defaults.default_queue_size, 16);
    }

    #[test]
    fn zero_queue_size_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_queue_size = 0").unwrap();
        assert!(MonitorDefaults::load(file.path()).is_err());
    }
}
