//! `shiftbot-core`: shift rotation, local time and the collaborator traits
//! shared by the store, scheduler and chat crates.

pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod intake;
pub mod render;
pub mod shift;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock, TimezoneResolver};
pub use delivery::{DeliveryMeta, Document, DocumentRenderer, Transport};
pub use error::{ClockError, DeliveryError, RenderError, ShiftbotError, StoreError};
pub use intake::{ReportIntake, Submission};
pub use shift::{ShiftCalculator, ShiftStatus};
pub use store::{ReportStore, SubscriberRegistry, WatermarkStore};
pub use types::{Destination, Report, Segment, ShiftLabel, Subscriber, TimeOfDay};
