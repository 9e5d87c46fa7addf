//! Output types: per-page capture results and the run summary.

use crate::error::PageError;
use crate::pipeline::slug::NamedPage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome class of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    /// Both viewports captured.
    Ok,
    /// Exactly one viewport captured.
    Partial,
    /// Nothing captured (navigation failed, or both captures failed).
    Failed,
}

/// What happened to one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    /// The page, with its run-unique name.
    pub page: NamedPage,
    /// Full-page desktop image, if captured.
    pub desktop_path: Option<PathBuf>,
    /// Full-page mobile image, if captured.
    pub mobile_path: Option<PathBuf>,
    /// Clipped desktop popup image (modal capture only).
    pub desktop_popup_path: Option<PathBuf>,
    /// Clipped mobile popup image (modal capture only).
    pub mobile_popup_path: Option<PathBuf>,
    pub status: CaptureStatus,
    /// First failure on this page; `None` when `status == Ok`.
    pub error: Option<PageError>,
    /// Wall-clock time spent on this page.
    pub duration_ms: u64,
}

impl CaptureResult {
    /// Derive the status from which full-page images exist.
    pub fn status_for(desktop: bool, mobile: bool) -> CaptureStatus {
        match (desktop, mobile) {
            (true, true) => CaptureStatus::Ok,
            (false, false) => CaptureStatus::Failed,
            _ => CaptureStatus::Partial,
        }
    }

    /// Images of this page in document order:
    /// desktop popup, desktop, mobile popup, mobile.
    pub fn images_in_order(&self) -> impl Iterator<Item = &PathBuf> {
        [
            &self.desktop_popup_path,
            &self.desktop_path,
            &self.mobile_popup_path,
            &self.mobile_path,
        ]
        .into_iter()
        .flatten()
    }
}

/// Everything a caller needs after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// "single", "list" or "sitemap".
    pub mode: String,
    /// Entries found in the source before the non-HTML filter.
    pub total_found: usize,
    /// Entries excluded by the non-HTML filter, in source order.
    pub skipped: Vec<String>,
    /// Malformed entries that were dropped while resolving.
    pub warnings: Vec<String>,
    /// One result per captured page, in input order.
    pub results: Vec<CaptureResult>,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    /// The merged document.
    pub document_path: PathBuf,
    pub duration_ms: u64,
}

impl RunSummary {
    /// Pages attempted.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// All images that went into the document, in document order.
    pub fn images(&self) -> Vec<&PathBuf> {
        self.results
            .iter()
            .flat_map(CaptureResult::images_in_order)
            .collect()
    }

    /// Count results by status: (ok, partial, failed).
    pub fn tally(results: &[CaptureResult]) -> (usize, usize, usize) {
        results
            .iter()
            .fold((0, 0, 0), |(ok, partial, failed), r| match r.status {
                CaptureStatus::Ok => (ok + 1, partial, failed),
                CaptureStatus::Partial => (ok, partial + 1, failed),
                CaptureStatus::Failed => (ok, partial, failed + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_viewports() {
        assert_eq!(CaptureResult::status_for(true, true), CaptureStatus::Ok);
        assert_eq!(CaptureResult::status_for(true, false), CaptureStatus::Partial);
        assert_eq!(CaptureResult::status_for(false, true), CaptureStatus::Partial);
        assert_eq!(CaptureResult::status_for(false, false), CaptureStatus::Failed);
    }

    #[test]
    fn status_serialises_lowercase() {
        let s = serde_json::to_string(&CaptureStatus::Partial).unwrap();
        assert_eq!(s, "\"partial\"");
    }
}
