use thiserror::Error;

use crate::types::Destination;

#[derive(Debug, Error)]
pub enum ShiftbotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShiftbotError>;

/// The configured offsets could not be turned into a valid UTC offset.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("invalid UTC offset: {minutes} minutes")]
    InvalidOffset { minutes: i32 },
}

/// Persistence failure in a report store, subscriber registry or watermark store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("unreadable {what}: {reason}")]
    Corrupt { what: String, reason: String },
}

impl StoreError {
    pub fn database(e: impl std::fmt::Display) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// The report document could not be produced or cleaned up.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render failed: {0}")]
    Failed(String),
}

/// Delivery of a document to one destination failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery to {destination} failed: {reason}")]
    Failed {
        destination: Destination,
        reason: String,
    },

    #[error("delivery to {destination} timed out after {ms}ms")]
    TimedOut { destination: Destination, ms: u64 },
}

impl DeliveryError {
    pub fn destination(&self) -> Destination {
        match self {
            DeliveryError::Failed { destination, .. } => *destination,
            DeliveryError::TimedOut { destination, .. } => *destination,
        }
    }
}
