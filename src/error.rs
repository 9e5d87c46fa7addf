//! Error types for the webshots library.
//!
//! * [`WebshotsError`] is **fatal**: the run cannot proceed. Returned as
//!   `Err(WebshotsError)` from [`crate::run::run`].
//!
//! * [`PageError`] is **non-fatal**: one page, or one viewport of one page,
//!   failed. Stored inside [`crate::output::CaptureResult`] while the run
//!   moves on to the next page.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the webshots library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::CaptureResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum WebshotsError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Builder or source-mode validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Source errors ─────────────────────────────────────────────────────
    /// List or sitemap file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the source file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The source could be read but is not a usable list or sitemap.
    #[error("Malformed input '{source_name}': {detail}")]
    MalformedInput { source_name: String, detail: String },

    /// A remote list/sitemap URL could not be downloaded.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Remote list/sitemap download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The source resolved to zero capturable pages.
    #[error("No pages to capture in '{source_name}' ({skipped} non-HTML entries skipped)")]
    NoPages { source_name: String, skipped: usize },

    // ── Browser errors ────────────────────────────────────────────────────
    /// Chrome/Chromium could not be launched or connected to.
    #[error(
        "Failed to launch the browser: {0}\n\
Install Chrome or Chromium, or point --chrome / WEBSHOTS_CHROME at an executable."
    )]
    BrowserLaunchFailed(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create, clear, or write inside the output directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every page failed; there is nothing to assemble.
    #[error("No screenshots were captured from {total} pages.\nFirst error: {first_error}")]
    NoImagesCaptured { total: usize, first_error: String },

    /// The merge library rejected the captured images.
    #[error("Failed to assemble document '{path}': {detail}")]
    AssemblyFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Place libpdfium next to the binary, install it system-wide,\n\
or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The orchestrator catches these at the page boundary, logs them with the
/// URL and stage, and records them on the [`crate::output::CaptureResult`].
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum PageError {
    /// Navigation did not finish within the configured timeout.
    #[error("{url}: navigation timed out after {ms}ms")]
    NavigationTimeout { url: String, ms: u64 },

    /// Navigation failed (DNS, connection, certificate, …).
    #[error("{url}: navigation failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// A viewport capture failed after the page was reachable.
    #[error("{url}: {viewport} capture failed: {detail}")]
    CaptureFailed {
        url: String,
        viewport: String,
        detail: String,
    },

    /// The captured image could not be persisted.
    #[error("{path}: write failed: {detail}")]
    WriteFailed { path: String, detail: String },

    /// A page script (stabiliser step, modal probe) threw or could not run.
    #[error("script '{step}' failed: {detail}")]
    ScriptFailed { step: String, detail: String },
}

impl PageError {
    /// True for the navigation variants, which fail the whole page.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            PageError::NavigationTimeout { .. } | PageError::NavigationFailed { .. }
        )
    }
}
