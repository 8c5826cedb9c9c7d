//! Persistence seams consumed by the intake path and the dispatch scheduler.
//!
//! Implementations must be safe to share between the chat handler (appends)
//! and the scheduler task (reads).

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::StoreError;
use crate::types::{Destination, Report, ShiftLabel, Subscriber};

pub trait ReportStore: Send + Sync {
    /// Persist one report and return it with its assigned ID.
    fn append(
        &self,
        shift: &ShiftLabel,
        text: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<Report, StoreError>;

    /// Every report, most recent first.
    fn all(&self) -> Result<Vec<Report>, StoreError>;

    /// The `limit` most recent reports, most recent first.
    fn recent(&self, limit: usize) -> Result<Vec<Report>, StoreError>;
}

pub trait SubscriberRegistry: Send + Sync {
    /// Register `destination`. Returns `false` if it was already registered.
    fn add(&self, destination: Destination) -> Result<bool, StoreError>;

    /// Snapshot of all registered subscribers.
    fn all(&self) -> Result<Vec<Subscriber>, StoreError>;
}

/// Durable record of the last schedule occurrence that was fired.
pub trait WatermarkStore: Send + Sync {
    fn load(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn save(&self, occurrence: DateTime<Utc>) -> Result<(), StoreError>;
}
