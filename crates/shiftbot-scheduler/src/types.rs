use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use shiftbot_core::config::DispatchConfig;
use shiftbot_core::error::DeliveryError;

/// Timing knobs of the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Longest the loop sleeps between two looks at the clock.
    pub poll_interval: Duration,
    /// Minimum wall-clock gap between two firings.
    pub cooldown: Duration,
    /// Bound on one subscriber delivery.
    pub delivery_timeout: Duration,
    /// Pause between consecutive subscriber deliveries.
    pub delivery_pause: Duration,
}

impl DispatchSettings {
    pub fn from_config(cfg: &DispatchConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            cooldown: Duration::from_secs(cfg.cooldown_secs),
            delivery_timeout: Duration::from_secs(cfg.delivery_timeout_secs),
            delivery_pause: Duration::from_millis(cfg.delivery_pause_millis),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

/// Result of one completed firing.
#[derive(Debug)]
pub struct FireReport {
    /// The schedule occurrence this firing served.
    pub occurrence: DateTime<FixedOffset>,
    /// Reports compiled into the document.
    pub report_count: usize,
    /// Subscribers in the snapshot taken for this firing.
    pub subscribers: usize,
    /// Deliveries actually started.
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryError>,
    /// Cancellation stopped the fan-out before every subscriber was tried.
    pub interrupted: bool,
}
