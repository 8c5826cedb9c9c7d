//! `shiftbot-scheduler`: broadcasts the compiled report at fixed local times.
//!
//! # Overview
//!
//! A [`FireSchedule`] holds local times of day. The [`DispatchScheduler`]
//! polls the injected clock and, when the most recent occurrence has not been
//! served yet, renders every stored report into one document and delivers it
//! to each registered subscriber in turn.
//!
//! # Guarantees
//!
//! | Concern        | Behaviour                                                |
//! |----------------|----------------------------------------------------------|
//! | De-duplication | Persisted watermark; an occurrence fires at most once    |
//! | Missed times   | Clock jumps or downtime collapse into one catch-up fire  |
//! | Cool-down      | Two firings are at least `cooldown` apart                |
//! | Isolation      | A failing or slow subscriber never blocks the others     |
//! | Shutdown       | Cancellation stops the loop and the fan-out promptly     |

pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::{DispatchDeps, DispatchScheduler};
pub use error::{Result, SchedulerError};
pub use schedule::FireSchedule;
pub use types::{DispatchSettings, FireReport};
