//! `shiftbot-store`: SQLite implementations of the report store, subscriber
//! registry and dispatch watermark.
//!
//! Every store owns its own `Connection` to the same database file, the same
//! way each subsystem does in the gateway, so the chat handler and the
//! scheduler never contend on one handle.

pub mod db;
pub mod reports;
pub mod subscribers;
pub mod watermark;

pub use reports::SqliteReportStore;
pub use subscribers::SqliteSubscriberRegistry;
pub use watermark::SqliteWatermarkStore;
