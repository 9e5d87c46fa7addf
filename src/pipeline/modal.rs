//! Optional popup capture: find a visible modal, clip it, then dismiss it.
//!
//! Runs after stabilisation and before the full-page capture, so the
//! full-page image shows the page without the overlay.

use crate::engine::{ClipRect, PageHandle};
use crate::error::PageError;
use tracing::debug;

/// Selectors for open modals across common frameworks.
pub const MODAL_SELECTORS: &[&str] = &[
    "section.modal.open-modal",
    "section.modal.open",
    ".modal.open-modal",
    ".modal.is-open",
    ".modal[open]",
    "[role=\"dialog\"][aria-modal=\"true\"]",
    ".ReactModal__Content--after-open",
    ".c-modal.is-active",
    ".lightbox.open",
    ".overlay[aria-modal=\"true\"]",
];

/// Boxes with a side at or below this (CSS px) are treated as not visible.
const MIN_SIDE: f64 = 50.0;

/// Script returning the largest visible modal in document coordinates, or `null`.
pub fn bbox_js() -> String {
    let list = serde_json::to_string(MODAL_SELECTORS).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"
(() => {{
  const candidates = Array.from(document.querySelectorAll({list}.join(','))).filter(el => {{
    const cs = getComputedStyle(el);
    const r = el.getBoundingClientRect();
    return cs.display !== 'none' && cs.visibility !== 'hidden' && +cs.opacity !== 0
      && r.width > {MIN_SIDE} && r.height > {MIN_SIDE};
  }});
  if (!candidates.length) return null;

  let best = candidates[0], bestArea = 0;
  for (const el of candidates) {{
    const r = el.getBoundingClientRect();
    if (r.width * r.height > bestArea) {{ best = el; bestArea = r.width * r.height; }}
  }}
  const r = best.getBoundingClientRect();
  return {{
    x: Math.max(0, r.x + window.scrollX),
    y: Math.max(0, r.y + window.scrollY),
    width: r.width,
    height: r.height
  }};
}})()
"#
    )
}

/// Click a visible close control; otherwise send Escape and force-hide.
pub const CLOSE_JS: &str = r#"
(() => {
  const closers = [
    '.js-modal-closer', '.modal__close', '.modal-close', '.c-modal__close',
    '[data-dismiss="modal"]', 'button[aria-label="Close"]', 'button[aria-label="close"]'
  ];
  for (const s of closers) {
    const btn = document.querySelector(s);
    if (btn && btn.offsetParent !== null) { btn.click(); return 'clicked'; }
  }
  document.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', keyCode: 27, which: 27, bubbles: true }));
  document.querySelectorAll('.modal, [role="dialog"]').forEach(el => {
    el.classList.remove('open-modal', 'open', 'is-open', 'is-active');
    el.removeAttribute('open');
  });
  document.querySelectorAll('.modal, .overlay, .lightbox, .ReactModal__Content--after-open')
    .forEach(el => { el.style.display = 'none'; });
  return 'forced';
})()
"#;

/// Locate a visible modal on `page`.
pub async fn find_modal(page: &dyn PageHandle) -> Result<Option<ClipRect>, PageError> {
    let Some(value) = page.evaluate(&bbox_js()).await? else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let rect: ClipRect = serde_json::from_value(value).map_err(|e| PageError::ScriptFailed {
        step: "modal-bbox".into(),
        detail: e.to_string(),
    })?;
    if rect.width <= MIN_SIDE || rect.height <= MIN_SIDE {
        return Ok(None);
    }
    Ok(Some(rect))
}

/// Clip and dismiss the modal if one is showing.
///
/// Returns the PNG bytes of the popup, or `None` when nothing was visible.
pub async fn capture_modal(page: &dyn PageHandle) -> Result<Option<Vec<u8>>, PageError> {
    let Some(rect) = find_modal(page).await? else {
        debug!("No visible modal");
        return Ok(None);
    };
    debug!(
        "Modal at {:.0},{:.0} ({:.0}×{:.0})",
        rect.x, rect.y, rect.width, rect.height
    );

    let top = (rect.y - 20.0).max(0.0);
    page.evaluate(&format!("window.scrollTo(0, {top:.0})")).await?;
    page.pause(100).await;

    let bytes = page.capture_clip(rect).await?;

    let how = page.evaluate(CLOSE_JS).await?;
    debug!("Modal closed ({})", how.as_ref().and_then(|v| v.as_str()).unwrap_or("?"));
    page.pause(200).await;
    page.evaluate("window.scrollTo(0, 0)").await?;
    Ok(Some(bytes))
}
