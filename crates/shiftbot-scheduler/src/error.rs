use thiserror::Error;

use shiftbot_core::error::{RenderError, StoreError};

/// Reasons a single dispatch occurrence was abandoned.
///
/// None of these stop the engine loop; the occurrence is logged and skipped.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Reports or subscribers could not be read.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The report document could not be produced.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
