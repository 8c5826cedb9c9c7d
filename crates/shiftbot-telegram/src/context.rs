//! Shared state handed to every Telegram handler.

use std::sync::Arc;

use shiftbot_core::clock::Clock;
use shiftbot_core::delivery::DocumentRenderer;
use shiftbot_core::intake::ReportIntake;
use shiftbot_core::shift::ShiftCalculator;
use shiftbot_core::store::{ReportStore, SubscriberRegistry};
use shiftbot_scheduler::FireSchedule;

/// Everything the command and text handlers need, injected through dptree.
pub struct BotContext {
    pub clock: Arc<dyn Clock>,
    pub shifts: Arc<ShiftCalculator>,
    pub intake: ReportIntake,
    pub reports: Arc<dyn ReportStore>,
    pub subscribers: Arc<dyn SubscriberRegistry>,
    pub renderer: Arc<dyn DocumentRenderer>,
    /// Used only to answer `/shift` with the next dispatch time.
    pub schedule: FireSchedule,
    /// Number of reports shown by `/list`.
    pub list_limit: usize,
}
