//! Progress reporting for a capture run.
//!
//! Inject an [`Arc<dyn CaptureProgressCallback>`] via
//! [`crate::config::CaptureConfigBuilder::progress_callback`] to receive
//! events as the run moves from page to page. The ETA passed to
//! [`CaptureProgressCallback::on_page_start`] comes from a
//! [`ProgressTracker`] owned by the run driver.
//!
//! # Example
//!
//! ```rust
//! use webshots::{CaptureConfig, CaptureProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use std::time::Duration;
//!
//! struct Counter(AtomicUsize);
//!
//! impl CaptureProgressCallback for Counter {
//!     fn on_page_start(&self, index: usize, total: usize, _eta: Option<Duration>, url: &str, _name: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{index}/{total}] {url}");
//!     }
//! }
//!
//! let config = CaptureConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{CaptureResult, RunSummary};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Called by the run driver as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed one at a time, so calls never
/// overlap, but the trait is `Send + Sync` so it can be shared with other tasks.
pub trait CaptureProgressCallback: Send + Sync {
    /// Called once after the source is resolved, before the first page.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before page `index` (1-based) is navigated.
    ///
    /// `eta` is `None` until at least one page has completed.
    fn on_page_start(
        &self,
        index: usize,
        total_pages: usize,
        eta: Option<Duration>,
        url: &str,
        name: &str,
    ) {
        let _ = (index, total_pages, eta, url, name);
    }

    /// Called after page `index` finished, whatever its status.
    fn on_page_complete(&self, index: usize, total_pages: usize, result: &CaptureResult) {
        let _ = (index, total_pages, result);
    }

    /// Called once after the document has been written.
    fn on_run_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CaptureProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CaptureConfig`].
pub type ProgressCallback = Arc<dyn CaptureProgressCallback>;

/// Counts completed pages and estimates the remaining time.
///
/// The estimate is the mean duration of completed pages multiplied by the
/// number of pages not yet completed. Failed pages count as completed.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    completed: usize,
    elapsed: Duration,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Record one finished page.
    pub fn record(&mut self, took: Duration) {
        self.completed += 1;
        self.elapsed += took;
    }

    /// Record one finished page that started at `started`.
    pub fn record_since(&mut self, started: Instant) {
        self.record(started.elapsed());
    }

    /// Mean duration of completed pages, if any.
    pub fn mean(&self) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        Some(self.elapsed / self.completed as u32)
    }

    /// Estimated time until the remaining pages are done.
    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.total.saturating_sub(self.completed) as u32;
        self.mean().map(|m| m * remaining)
    }

    /// Integer percentage for page `index` (1-based).
    pub fn percent(&self, index: usize) -> usize {
        index * 100 / self.total.max(1)
    }
}

/// Human-readable duration: `estimating…`, `3m 07s`, `1h 02m 09s`.
pub fn format_eta(eta: Option<Duration>) -> String {
    let Some(d) = eta else {
        return "estimating…".to_string();
    };
    let secs = d.as_secs_f64().round() as u64;
    let (h, rem) = (secs / 3600, secs % 3600);
    let (m, s) = (rem / 60, rem % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}
