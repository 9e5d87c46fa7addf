//! DOM stabilisation: make a live page look settled before a full-page capture.
//!
//! ## Step order
//!
//! ```text
//! settle ──▶ isi-reached ──▶ defloat ──▶ hide selectors
//! ```
//!
//! 1. **Settle** scrolls top to bottom so lazy images load and scroll-driven
//!    animations fire, then freezes everything in its final state.
//! 2. **ISI-reached** tags Important Safety Information blocks as reached so
//!    they render in flow instead of pinned. Only runs with settle.
//! 3. **Defloat** turns fixed/sticky elements into absolute/static ones so a
//!    full-page image does not repeat a header over every screen height.
//! 4. **Hide selectors** removes caller-named overlays (cookie banners) and
//!    the body offset those banners leave behind.
//!
//! Every step is safe to run twice. A step that throws is logged and the
//! remaining steps still run; finding zero matching elements is not an error.

use crate::config::StabilizeOptions;
use crate::engine::PageHandle;
use crate::error::PageError;
use tracing::{debug, warn};

/// One named stabiliser operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizeStep {
    Settle,
    IsiReached,
    Defloat,
    HideSelectors,
}

impl StabilizeStep {
    pub fn name(self) -> &'static str {
        match self {
            StabilizeStep::Settle => "settle",
            StabilizeStep::IsiReached => "isi-reached",
            StabilizeStep::Defloat => "defloat",
            StabilizeStep::HideSelectors => "hide-selectors",
        }
    }
}

/// The enabled steps, in execution order.
pub fn plan(opts: &StabilizeOptions) -> Vec<StabilizeStep> {
    let mut steps = Vec::with_capacity(4);
    if opts.settle {
        steps.push(StabilizeStep::Settle);
    }
    if opts.isi_enabled() {
        steps.push(StabilizeStep::IsiReached);
    }
    if opts.defloat {
        steps.push(StabilizeStep::Defloat);
    }
    if !opts.hide_selectors.is_empty() {
        steps.push(StabilizeStep::HideSelectors);
    }
    steps
}

/// Run every enabled step against `page`.
///
/// Returns the failures of individual steps; the page is still usable.
pub async fn stabilize(page: &dyn PageHandle, opts: &StabilizeOptions) -> Vec<PageError> {
    let mut failures = Vec::new();
    for step in plan(opts) {
        debug!("Stabiliser step: {}", step.name());
        if let Err(e) = apply(step, page, opts).await {
            let e = match e {
                PageError::ScriptFailed { detail, .. } => PageError::ScriptFailed {
                    step: step.name().to_string(),
                    detail,
                },
                other => other,
            };
            warn!("Stabiliser step '{}' failed: {}", step.name(), e);
            failures.push(e);
        }
    }
    failures
}

/// Run one step.
pub async fn apply(
    step: StabilizeStep,
    page: &dyn PageHandle,
    opts: &StabilizeOptions,
) -> Result<(), PageError> {
    match step {
        StabilizeStep::Settle => settle(page, opts).await,
        StabilizeStep::IsiReached => mark_isi_reached(page).await,
        StabilizeStep::Defloat => defloat(page).await,
        StabilizeStep::HideSelectors => hide_selectors(page, &opts.hide_selectors).await,
    }
}

// ── Settle ───────────────────────────────────────────────────────────────────

const SCROLL_HEIGHT_JS: &str = "document.body ? document.body.scrollHeight : 0";

/// Progressive scroll, freeze, back to top.
async fn settle(page: &dyn PageHandle, opts: &StabilizeOptions) -> Result<(), PageError> {
    let step = u64::from(opts.scroll_step_px);
    let mut y = 0u64;
    let mut steps = 0u32;

    loop {
        page.evaluate(&format!("window.scrollTo(0, {y})")).await?;
        page.pause(opts.scroll_pause_ms).await;
        let height = page
            .evaluate(SCROLL_HEIGHT_JS)
            .await?
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as u64;

        steps += 1;
        if y >= height {
            break;
        }
        if steps >= opts.max_scroll_steps {
            debug!("Settle stopped after {} scroll steps at y={}", steps, y);
            break;
        }
        y += step;
    }

    page.pause(200).await;
    page.evaluate(FREEZE_JS).await?;
    page.evaluate("window.scrollTo(0, 0)").await?;
    Ok(())
}

/// Mark reveal/lazy elements as viewed and stop all motion.
pub const FREEZE_JS: &str = r#"
(() => {
  const addClasses = (sel, cls) => {
    document.querySelectorAll(sel).forEach(el => el.classList.add(...cls));
  };
  addClasses('.js-lte-text', ['reached', 'entered', 'in-view', 'is-visible']);
  addClasses('.lte.js-lte', ['reached', 'entered', 'in-view', 'is-visible']);
  addClasses('[class*="aos"]', ['aos-animate']);
  addClasses('.reveal,.animate,.animated,.in-view,.is-visible', ['in-view', 'is-visible']);

  document.querySelectorAll('.lazy, [data-ll-status]').forEach(el => {
    el.classList.add('entered', 'loaded', 'reached');
    if (el.dataset && el.dataset.src && !el.getAttribute('src')) el.setAttribute('src', el.dataset.src);
    if (el.dataset && el.dataset.srcset && !el.getAttribute('srcset')) el.setAttribute('srcset', el.dataset.srcset);
  });

  if (!document.getElementById('webshots-freeze')) {
    const st = document.createElement('style');
    st.id = 'webshots-freeze';
    st.textContent = `
      *, *::before, *::after { animation: none !important; transition: none !important; }
      .aos-init, .aos-animate, .in-view, .is-visible, .entered, .reached {
        opacity: 1 !important; transform: none !important; filter: none !important;
      }
    `;
    (document.head || document.documentElement).appendChild(st);
  }
})()
"#;

// ── ISI ──────────────────────────────────────────────────────────────────────

/// Selector for Important Safety Information blocks.
pub const ISI_SELECTOR: &str = "section.isi.js-isi";

async fn mark_isi_reached(page: &dyn PageHandle) -> Result<(), PageError> {
    let js = format!(
        "(() => {{ document.querySelectorAll('{ISI_SELECTOR}').forEach(el => el.classList.add('reached')); }})()"
    );
    page.evaluate(&js).await?;
    Ok(())
}

// ── Defloat ──────────────────────────────────────────────────────────────────

/// fixed → absolute at the current document position; sticky → static.
pub const DEFLOAT_JS: &str = r#"
(() => {
  document.querySelectorAll('*').forEach((el) => {
    if (el.hasAttribute('data-defloated') || el.hasAttribute('data-desticky')) return;
    const cs = getComputedStyle(el);
    if (cs.position === 'fixed') {
      const rect = el.getBoundingClientRect();
      el.setAttribute('data-defloated', '1');
      el.style.position = 'absolute';
      el.style.top = (rect.top + window.scrollY) + 'px';
      el.style.left = (rect.left + window.scrollX) + 'px';
      el.style.right = 'auto';
      el.style.bottom = 'auto';
      if (cs.width && cs.width.endsWith('px')) el.style.width = cs.width;
      if (!el.style.zIndex) el.style.zIndex = String(parseInt(cs.zIndex || '1000', 10) || 1000);
    } else if (cs.position === 'sticky') {
      el.setAttribute('data-desticky', '1');
      el.style.position = 'static';
      el.style.top = 'auto';
    }
  });
})()
"#;

async fn defloat(page: &dyn PageHandle) -> Result<(), PageError> {
    page.evaluate(DEFLOAT_JS).await?;
    page.evaluate(CLEAR_BANNER_OFFSETS_JS).await?;
    Ok(())
}

// ── Hide selectors ───────────────────────────────────────────────────────────

/// Script hiding every element matched by `selectors`; bad selectors are ignored.
pub fn hide_selectors_js(selectors: &[String]) -> String {
    let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"
(() => {{
  for (const s of {list}) {{
    try {{
      document.querySelectorAll(s).forEach(el => {{
        el.setAttribute('data-hidden-by-webshots', '1');
        el.style.display = 'none';
      }});
    }} catch (e) {{}}
  }}
}})()
"#
    )
}

/// Zero the top offsets cookie banners (OneTrust) push onto the document.
pub const CLEAR_BANNER_OFFSETS_JS: &str = r#"
(() => {
  const zero = (el) => {
    if (!el) return;
    el.style.top = '0px';
    el.style.marginTop = '0px';
    if (el.style.paddingTop && el.style.paddingTop !== '0px') el.style.paddingTop = '0px';
    if (el.style.position === 'relative') el.style.position = '';
  };
  zero(document.body);
  zero(document.documentElement);

  const rm = (el, ...cls) => { if (el) el.classList.remove(...cls); };
  rm(document.documentElement, 'ot-shown', 'ot-bnr-shown', 'ot-sdk-show-settings');
  rm(document.body, 'ot-shown', 'ot-bnr-shown', 'ot-sdk-show-settings');

  document.querySelectorAll('[id*="onetrust"],[class*="onetrust"],[class*="ot-"]').forEach(el => {
    el.style.top = '0px';
    el.style.marginTop = '0px';
  });

  document.documentElement.style.setProperty('--ot-banner-height', '0px', 'important');
  document.documentElement.style.setProperty('--ot-sdk-cookie-banner-height', '0px', 'important');
})()
"#;

async fn hide_selectors(page: &dyn PageHandle, selectors: &[String]) -> Result<(), PageError> {
    page.evaluate(&hide_selectors_js(selectors)).await?;
    page.evaluate(CLEAR_BANNER_OFFSETS_JS).await?;
    Ok(())
}
