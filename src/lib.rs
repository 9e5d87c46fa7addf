//! # webshots
//!
//! Capture full-page desktop and mobile screenshots of many web pages and
//! merge them, in input order, into one timestamped PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL / URL list / sitemap
//!  │
//!  ├─ 1. Source     resolve entries, drop non-HTML, normalise URLs
//!  ├─ 2. Slug       run-unique output names (slug → parent-slug → -N)
//!  ├─ 3. Capture    per page: desktop tab, then mobile tab
//!  │                 navigate → stabilise → [modal] → full-page PNG
//!  ├─ 4. Writer     {out}/desktop/{name}_dt.png, {out}/mobile/{name}_mb.png
//!  └─ 5. Assemble   {out}/screenshots_{YYYYMMDD-HHMMSS}.pdf via pdfium
//! ```
//!
//! One page failing never stops the run; it shows up as `partial` or
//! `failed` in the [`RunSummary`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webshots::{run, CaptureConfig, PageSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = PageSource::Sitemap("https://example.com/sitemap.xml".into());
//!     let config = CaptureConfig::builder()
//!         .out_dir("shots")
//!         .defloat(true)
//!         .hide_selectors(vec!["#onetrust-banner-sdk".into()])
//!         .build()?;
//!     let summary = run(&source, &config).await?;
//!     eprintln!("{} ok, {} partial, {} failed → {}",
//!         summary.succeeded, summary.partial, summary.failed,
//!         summary.document_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Runtime requirements
//!
//! * Chrome or Chromium on `PATH` (or [`CaptureConfig::chrome_path`]).
//! * A pdfium shared library: `PDFIUM_LIB_PATH`, the working directory, or
//!   the system library path.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `webshots` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! webshots = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use browser::ChromeEngine;
pub use config::{
    CaptureConfig, CaptureConfigBuilder, PageSource, StabilizeOptions, ViewportProfile,
};
pub use engine::{BrowserEngine, ClipRect, PageHandle};
pub use error::{PageError, WebshotsError};
pub use output::{CaptureResult, CaptureStatus, RunSummary};
pub use pipeline::assemble::{DocumentMerger, PdfiumMerger};
pub use progress::{CaptureProgressCallback, NoopProgressCallback, ProgressCallback};
pub use run::{run, run_sync, run_with};
