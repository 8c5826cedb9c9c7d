//! Plain-text report document.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use tracing::debug;
use uuid::Uuid;

use crate::delivery::{Document, DocumentRenderer};
use crate::error::RenderError;
use crate::types::Report;

const TITLE: &str = "Report Log";

/// Writes every report into a UTF-8 text file under `output_dir`.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    output_dir: PathBuf,
}

impl TextRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Render the document body without touching the filesystem.
    pub fn compose(reports: &[Report], generated_at: DateTime<FixedOffset>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{TITLE}");
        let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out);
        if reports.is_empty() {
            let _ = writeln!(out, "No reports recorded.");
            return out;
        }
        let _ = writeln!(out, "Reports ({}):", reports.len());
        let _ = writeln!(out);
        for r in reports {
            let _ = writeln!(
                out,
                "Shift {} - {}",
                r.shift,
                r.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
            let _ = writeln!(out, "{}", r.text);
            let _ = writeln!(out);
        }
        out
    }
}

impl DocumentRenderer for TextRenderer {
    fn render(
        &self,
        reports: &[Report],
        generated_at: DateTime<FixedOffset>,
    ) -> Result<Document, RenderError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let stamp = generated_at.format("%Y%m%d_%H%M%S");
        let unique = Uuid::new_v4().simple().to_string();
        let path = self
            .output_dir
            .join(format!("reports_{stamp}_{}.txt", &unique[..8]));
        std::fs::write(&path, Self::compose(reports, generated_at))?;
        debug!(path = %path.display(), reports = reports.len(), "report document rendered");
        Ok(Document {
            path,
            file_name: format!("reports_{}.txt", generated_at.format("%Y%m%d")),
            report_count: reports.len(),
        })
    }

    fn release(&self, document: Document) -> Result<(), RenderError> {
        match std::fs::remove_file(&document.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RenderError::Io(e)),
        }
    }
}
