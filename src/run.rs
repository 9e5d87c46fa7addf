//! Run driver: one source in, one merged document out.
//!
//! ```text
//! resolve ─▶ name ─▶ clean output ─▶ capture page 1..n ─▶ assemble ─▶ summary
//! ```
//!
//! Pages are captured one at a time, in source order, by a single worker.
//! The browser session and the [`NamingRegistry`] live exactly as long as the
//! run.

use crate::browser::ChromeEngine;
use crate::config::{CaptureConfig, PageSource};
use crate::engine::BrowserEngine;
use crate::error::WebshotsError;
use crate::output::{CaptureResult, RunSummary};
use crate::pipeline::assemble::{self, DocumentMerger, PdfiumMerger};
use crate::pipeline::capture::capture_page;
use crate::pipeline::slug::{deduplicate, NamingRegistry};
use crate::pipeline::source::{resolve_source, ResolvedSource};
use crate::pipeline::writer::OutputWriter;
use crate::progress::{format_eta, ProgressTracker};
use chrono::{DateTime, Local};
use std::time::Instant;
use tracing::{debug, info};

/// Capture every page of `source` with headless Chrome and merge the images
/// into one PDF.
///
/// # Returns
/// `Ok(RunSummary)` when a document was written, even if some pages failed
/// (check `summary.failed` and `summary.partial`).
///
/// # Errors
/// Returns `Err(WebshotsError)` only for fatal errors:
/// - the source is unreadable, malformed or yields no page
/// - the browser cannot be launched
/// - the output directory cannot be prepared
/// - no page produced a single image
pub async fn run(
    source: &PageSource,
    config: &CaptureConfig,
) -> Result<RunSummary, WebshotsError> {
    let started = (Instant::now(), Local::now());
    info!("Starting {} run: {}", source.mode(), source.location());

    let resolved = resolve_source(source, config).await?;
    let engine = ChromeEngine::launch(config).await?;
    let outcome = capture_resolved(
        source,
        resolved,
        config,
        &engine,
        &PdfiumMerger::default(),
        started,
    )
    .await;
    engine.shutdown().await;
    outcome
}

/// [`run`] against a caller-supplied browser engine and document merger.
pub async fn run_with<E: BrowserEngine>(
    source: &PageSource,
    config: &CaptureConfig,
    engine: &E,
    merger: &dyn DocumentMerger,
) -> Result<RunSummary, WebshotsError> {
    let started = (Instant::now(), Local::now());
    info!("Starting {} run: {}", source.mode(), source.location());

    let resolved = resolve_source(source, config).await?;
    capture_resolved(source, resolved, config, engine, merger, started).await
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    source: &PageSource,
    config: &CaptureConfig,
) -> Result<RunSummary, WebshotsError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| WebshotsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(source, config))
}

async fn capture_resolved<E: BrowserEngine>(
    source: &PageSource,
    resolved: ResolvedSource,
    config: &CaptureConfig,
    engine: &E,
    merger: &dyn DocumentMerger,
    (started, started_at): (Instant, DateTime<Local>),
) -> Result<RunSummary, WebshotsError> {
    let ResolvedSource {
        pages,
        skipped,
        warnings,
        total_found,
    } = resolved;

    // ── Step 1: Name pages ───────────────────────────────────────────────
    let mut registry = NamingRegistry::new();
    let pages = deduplicate(&mut registry, pages);
    let total = pages.len();
    info!("{} pages to capture ({} found in source)", total, total_found);

    // ── Step 2: Prepare output ───────────────────────────────────────────
    let writer = OutputWriter::new(config);
    writer.prepare().await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    // ── Step 3: Capture, one page at a time ──────────────────────────────
    let mut tracker = ProgressTracker::new(total);
    let mut results: Vec<CaptureResult> = Vec::with_capacity(total);

    for (i, page) in pages.into_iter().enumerate() {
        let index = i + 1;
        let eta = tracker.eta();
        info!(
            "[{}/{}] {}% ETA {}  {} → {}",
            index,
            total,
            tracker.percent(index),
            format_eta(eta),
            page.source_url,
            page.final_name
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(index, total, eta, &page.source_url, &page.final_name);
        }

        let page_start = Instant::now();
        let result = capture_page(engine, page, config, &writer).await;
        tracker.record_since(page_start);
        debug!("[{}/{}] {:?} in {}ms", index, total, result.status, result.duration_ms);

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(index, total, &result);
        }
        results.push(result);
    }

    // ── Step 4: Assemble document ────────────────────────────────────────
    let document_path = assemble::assemble(&results, &config.out_dir, &started_at, merger).await?;

    // ── Step 5: Summary ──────────────────────────────────────────────────
    let (succeeded, partial, failed) = RunSummary::tally(&results);
    let summary = RunSummary {
        mode: source.mode().to_string(),
        total_found,
        skipped,
        warnings,
        results,
        succeeded,
        partial,
        failed,
        document_path,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Run complete: {} ok, {} partial, {} failed of {} in {}ms",
        succeeded,
        partial,
        failed,
        summary.total(),
        summary.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&summary);
    }

    Ok(summary)
}
