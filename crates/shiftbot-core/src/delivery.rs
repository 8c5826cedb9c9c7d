//! Document rendering and delivery seams.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::error::{DeliveryError, RenderError};
use crate::types::{Destination, Report};

/// A rendered report artifact on local disk.
///
/// Must be handed back to [`DocumentRenderer::release`] once delivery is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    /// Name shown to the recipient.
    pub file_name: String,
    pub report_count: usize,
}

/// Per-delivery metadata shown alongside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMeta {
    pub caption: String,
}

pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        reports: &[Report],
        generated_at: DateTime<FixedOffset>,
    ) -> Result<Document, RenderError>;

    /// Remove the artifact behind `document`.
    fn release(&self, document: Document) -> Result<(), RenderError>;
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `document` to one destination. Errors stay scoped to that destination.
    async fn deliver(
        &self,
        destination: Destination,
        document: &Document,
        meta: &DeliveryMeta,
    ) -> Result<(), DeliveryError>;
}
