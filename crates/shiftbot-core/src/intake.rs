//! Inbound report tagging.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::shift::ShiftCalculator;
use crate::store::ReportStore;
use crate::types::{Report, ShiftLabel};

/// Outcome of one submission.
///
/// The shift and timestamp are always computed; only `persisted` can fail.
#[derive(Debug)]
pub struct Submission {
    pub shift: ShiftLabel,
    pub timestamp: DateTime<FixedOffset>,
    pub persisted: Result<Report, StoreError>,
}

/// Tags free-text reports with the shift on duty and stores them.
pub struct ReportIntake {
    clock: Arc<dyn Clock>,
    shifts: Arc<ShiftCalculator>,
    store: Arc<dyn ReportStore>,
}

impl ReportIntake {
    pub fn new(
        clock: Arc<dyn Clock>,
        shifts: Arc<ShiftCalculator>,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            clock,
            shifts,
            store,
        }
    }

    pub fn submit(&self, text: &str) -> Submission {
        let now = self.clock.now();
        let shift = self.shifts.current_shift(now);
        let timestamp = self.shifts.resolver().localize(now);
        let persisted = self.store.append(&shift, text, timestamp);
        match &persisted {
            Ok(r) => info!(report_id = r.id, %shift, "report logged"),
            Err(e) => warn!(%shift, error = %e, "report could not be stored"),
        }
        Submission {
            shift,
            timestamp,
            persisted,
        }
    }
}
