//! `MonitorBuilder`: resolves subscription options and creates the
//! subscription against its channel.
//!
//! `exec()`'s option-resolution order is ported verbatim from
//! `MonitorBuilder::exec()` in
//! `examples/original_source/src/clientmon.cpp`: queue size, then
//! pipeline flag, then `ackAny` (a percentage string or an integer
//! count), defaulting to half the queue and clamped to `[1, queue_size]`.

use std::sync::Arc;

use crate::channel::Channel;
use crate::config::MonitorDefaults;
use crate::error::BuildError;
use crate::subscription::{Monitor, Subscription, SubscriptionConfig};

/// An `ackAny` request value, as it would arrive from a request's options
/// sub-structure (e.g. `record._options.ackAny`).
#[derive(Debug, Clone, PartialEq)]
pub enum AckAny {
    Count(u32),
    /// `0 < percent <= 100`.
    Percent(f64),
}

/// Request options a subscriber supplies at build time, standing in for
/// the introspected `record._options` sub-value of a full `pv_request`
/// (out of scope here).
#[derive(Debug, Clone, Default)]
pub struct PvRequestOptions {
    pub queue_size: Option<u32>,
    pub pipeline: Option<bool>,
    pub ack_any: Option<AckAny>,
}

/// Resolve the effective queue size, pipeline flag, and ack threshold from
/// request options and crate defaults, in the original's exact order.
fn resolve(opts: &PvRequestOptions, defaults: &MonitorDefaults) -> Result<(u32, bool, u32), BuildError> {
    let queue_size = opts.queue_size.filter(|&n| n > 1).unwrap_or(defaults.default_queue_size);
    if queue_size == 0 {
        return Err(BuildError::InvalidConfig("queue_size must be at least 1".into()));
    }
    let pipeline = opts.pipeline.unwrap_or(false);

    let mut ack_at = match &opts.ack_any {
        Some(AckAny::Count(n)) => *n,
        Some(AckAny::Percent(pct)) => {
            if *pct <= 0.0 || *pct > 100.0 {
                return Err(BuildError::InvalidConfig(format!("ackAny percent {pct} out of (0, 100]")));
            }
            ((*pct * queue_size as f64) / 100.0).floor() as u32
        }
        None => 0,
    };
    if ack_at == 0 {
        ack_at = queue_size / 2;
    }
    ack_at = ack_at.clamp(1, queue_size);

    Ok((queue_size, pipeline, ack_at))
}

/// Builds a monitor subscription against a channel.
pub struct MonitorBuilder {
    channel: Arc<Channel>,
    sid: u32,
    opts: PvRequestOptions,
    autostart: bool,
    mask_connected: bool,
    mask_disconnected: bool,
    event: Arc<dyn Fn(&Subscription) + Send + Sync>,
}

impl MonitorBuilder {
    pub fn new(channel: Arc<Channel>, sid: u32, event: impl Fn(&Subscription) + Send + Sync + 'static) -> Self {
        MonitorBuilder {
            channel,
            sid,
            opts: PvRequestOptions::default(),
            autostart: true,
            mask_connected: false,
            mask_disconnected: false,
            event: Arc::new(event),
        }
    }

    pub fn queue_size(mut self, n: u32) -> Self {
        self.opts.queue_size = Some(n);
        self
    }

    pub fn pipeline(mut self, enabled: bool) -> Self {
        self.opts.pipeline = Some(enabled);
        self
    }

    pub fn ack_any(mut self, ack_any: AckAny) -> Self {
        self.opts.ack_any = Some(ack_any);
        self
    }

    pub fn autostart(mut self, enabled: bool) -> Self {
        self.autostart = enabled;
        self
    }

    pub fn mask_connected(mut self, masked: bool) -> Self {
        self.mask_connected = masked;
        self
    }

    pub fn mask_disconnected(mut self, masked: bool) -> Self {
        self.mask_disconnected = masked;
        self
    }

    /// Allocate an ioid, resolve options, create the `Subscription`, and
    /// register it with the channel's pending list so it subscribes as
    /// soon as (or if already) the channel is live.
    pub fn exec(self, ioid: u32, defaults: &MonitorDefaults) -> Result<Monitor, BuildError> {
        let (queue_size, pipeline, ack_at) = resolve(&self.opts, defaults)?;

        let config = SubscriptionConfig {
            pipeline,
            queue_size,
            ack_at,
            autostart: self.autostart,
            mask_connected: self.mask_connected,
            mask_disconnected: self.mask_disconnected,
            event: self.event,
        };
        let sub = Subscription::new(&self.channel, self.sid, ioid, config);

        self.channel.op_by_ioid.lock().unwrap().insert(ioid, sub.clone());
        self.channel.pending.lock().unwrap().push(sub.clone());

        Ok(Monitor::new(sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> MonitorDefaults {
        MonitorDefaults { default_queue_size: 4 }
    }

    #[test]
    fn queue_size_below_two_uses_default() {
        let opts = PvRequestOptions { queue_size: Some(1), ..Default::default() };
        let (qs, _, _) = resolve(&opts, &defaults()).unwrap();
        assert_eq!(qs, 4);
    }

    #[test]
    fn ack_any_percent_resolves_against_queue_size() {
        let opts = PvRequestOptions {
            queue_size: Some(10),
            ack_any: Some(AckAny::Percent(25.0)),
            ..Default::default()
        };
        let (qs, _, ack_at) = resolve(&opts, &defaults()).unwrap();
        assert_eq!(qs, 10);
        assert_eq!(ack_at, 2);
    }

    #[test]
    fn ack_any_defaults_to_half_queue_when_unset() {
        let opts = PvRequestOptions { queue_size: Some(9), ..Default::default() };
        let (_, _, ack_at) = resolve(&opts, &defaults()).unwrap();
        assert_eq!(ack_at, 4);
    }

    #[test]
    fn ack_any_count_is_clamped_to_queue_size() {
        let opts = PvRequestOptions {
            queue_size: Some(5),
            ack_any: Some(AckAny::Count(99)),
            ..Default::default()
        };
        let (qs, _, ack_at) = resolve(&opts, &defaults()).unwrap();
        assert_eq!(ack_at, qs);
    }

    #[test]
    fn ack_any_percent_out_of_range_is_rejected() {
        let opts = PvRequestOptions {
            queue_size: Some(10),
            ack_any: Some(AckAny::Percent(150.0)),
            ..Default::default()
        };
        assert!(resolve(&opts, &defaults()).is_err());
    }
}
