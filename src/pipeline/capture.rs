//! Per-page orchestration: desktop then mobile, each in its own tab.
//!
//! ```text
//! open tab ─▶ navigate ─▶ stabilise ─▶ [modal] ─▶ full-page PNG ─▶ persist ─▶ close tab
//! ```
//!
//! A desktop navigation failure fails the whole page and skips mobile.
//! Anything else that goes wrong in one viewport only costs that viewport's
//! image, so the page ends up `partial`.

use crate::config::{CaptureConfig, ViewportProfile};
use crate::engine::{BrowserEngine, PageHandle};
use crate::error::PageError;
use crate::output::{CaptureResult, CaptureStatus};
use crate::pipeline::modal;
use crate::pipeline::slug::NamedPage;
use crate::pipeline::stabilize;
use crate::pipeline::writer::{OutputWriter, Shot};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Images produced by one viewport.
#[derive(Debug, Clone, PartialEq)]
struct ViewportShot {
    image: PathBuf,
    popup: Option<PathBuf>,
}

/// Capture `page` in both viewports. Never fails; problems land in the result.
pub async fn capture_page<E: BrowserEngine>(
    engine: &E,
    page: NamedPage,
    config: &CaptureConfig,
    writer: &OutputWriter,
) -> CaptureResult {
    let started = Instant::now();

    let desktop = shoot_viewport(
        engine,
        &page,
        &config.desktop,
        (Shot::Desktop, Shot::DesktopPopup),
        config,
        writer,
    )
    .await;

    if let Err(e) = &desktop {
        if e.is_navigation() {
            warn!(url = %page.source_url, stage = "navigate", "{}", e);
            return CaptureResult {
                error: Some(e.clone()),
                status: CaptureStatus::Failed,
                desktop_path: None,
                mobile_path: None,
                desktop_popup_path: None,
                mobile_popup_path: None,
                duration_ms: started.elapsed().as_millis() as u64,
                page,
            };
        }
    }

    let mobile = shoot_viewport(
        engine,
        &page,
        &config.mobile,
        (Shot::Mobile, Shot::MobilePopup),
        config,
        writer,
    )
    .await
    .map_err(|e| as_capture_failure(e, &page.source_url, &config.mobile.label));

    let (desktop_path, desktop_popup_path, desktop_err) = split(desktop);
    let (mobile_path, mobile_popup_path, mobile_err) = split(mobile);

    for (label, err) in [
        (&config.desktop.label, &desktop_err),
        (&config.mobile.label, &mobile_err),
    ] {
        if let Some(e) = err {
            warn!(url = %page.source_url, stage = %label, "{}", e);
        }
    }

    let status = CaptureResult::status_for(desktop_path.is_some(), mobile_path.is_some());
    let duration_ms = started.elapsed().as_millis() as u64;
    if status == CaptureStatus::Ok {
        info!("Captured {} as '{}' in {}ms", page.source_url, page.final_name, duration_ms);
    }

    CaptureResult {
        page,
        desktop_path,
        mobile_path,
        desktop_popup_path,
        mobile_popup_path,
        status,
        error: desktop_err.or(mobile_err),
        duration_ms,
    }
}

fn split(
    outcome: Result<ViewportShot, PageError>,
) -> (Option<PathBuf>, Option<PathBuf>, Option<PageError>) {
    match outcome {
        Ok(shot) => (Some(shot.image), shot.popup, None),
        Err(e) => (None, None, Some(e)),
    }
}

/// Mobile runs only after desktop reached the page, so a mobile navigation
/// failure is reported as a failed capture of that viewport.
fn as_capture_failure(e: PageError, url: &str, viewport: &str) -> PageError {
    if e.is_navigation() {
        PageError::CaptureFailed {
            url: url.to_string(),
            viewport: viewport.to_string(),
            detail: e.to_string(),
        }
    } else {
        e
    }
}

async fn shoot_viewport<E: BrowserEngine>(
    engine: &E,
    page: &NamedPage,
    profile: &ViewportProfile,
    shots: (Shot, Shot),
    config: &CaptureConfig,
    writer: &OutputWriter,
) -> Result<ViewportShot, PageError> {
    let tab = engine.open_page(profile).await?;
    let outcome = shoot_in_tab(&tab, page, shots, config, writer).await;
    tab.close().await;
    outcome
}

async fn shoot_in_tab(
    tab: &dyn PageHandle,
    page: &NamedPage,
    (full, popup_shot): (Shot, Shot),
    config: &CaptureConfig,
    writer: &OutputWriter,
) -> Result<ViewportShot, PageError> {
    let timeout = Duration::from_millis(config.timeout_ms);
    tab.navigate(&page.source_url, timeout).await?;

    let failures = stabilize::stabilize(tab, &config.stabilize).await;
    if !failures.is_empty() {
        debug!(
            "{} stabiliser step(s) failed on {}; capturing anyway",
            failures.len(),
            page.source_url
        );
    }

    let popup = if config.modal_shot {
        capture_popup(tab, page, popup_shot, writer).await
    } else {
        None
    };

    let image = match tab.capture_full_page().await {
        Ok(bytes) => writer.persist(full, &page.final_name, &bytes).await,
        Err(e) => Err(e),
    };
    match image {
        Ok(image) => Ok(ViewportShot { image, popup }),
        Err(e) => {
            // A popup without its full-page image is not reported; drop it.
            if let Some(orphan) = popup {
                writer.discard(&orphan).await;
            }
            Err(e)
        }
    }
}

/// Popup problems never cost the full-page image.
async fn capture_popup(
    tab: &dyn PageHandle,
    page: &NamedPage,
    shot: Shot,
    writer: &OutputWriter,
) -> Option<PathBuf> {
    match modal::capture_modal(tab).await {
        Ok(Some(bytes)) => match writer.persist(shot, &page.final_name, &bytes).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(url = %page.source_url, stage = "modal", "{}", e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(url = %page.source_url, stage = "modal", "{}", e);
            None
        }
    }
}
