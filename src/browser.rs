//! Headless Chrome over the DevTools Protocol.
//!
//! One [`ChromeEngine`] is launched per run and shared by every page. Each
//! viewport capture gets its own tab, so cookies and scroll state of the
//! desktop pass never leak into the mobile pass's layout.

use crate::config::{CaptureConfig, ViewportProfile};
use crate::engine::{BrowserEngine, ClipRect, PageHandle};
use crate::error::{PageError, WebshotsError};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lower bound on the per-request CDP timeout.
const REQUEST_TIMEOUT_FLOOR: Duration = Duration::from_secs(30);

/// Clip covering the whole document of `width × height` CSS px.
fn full_page_clip(width: f64, height: f64) -> ClipRect {
    ClipRect {
        x: 0.0,
        y: 0.0,
        width: width.ceil().max(1.0),
        height: height.ceil().max(1.0),
    }
}

/// A running Chrome instance plus its event-loop task.
pub struct ChromeEngine {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromeEngine {
    /// Launch headless Chrome configured for `config`.
    pub async fn launch(config: &CaptureConfig) -> Result<Self, WebshotsError> {
        let request_timeout =
            REQUEST_TIMEOUT_FLOOR.max(Duration::from_millis(config.timeout_ms) * 2);

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .viewport(None)
            .request_timeout(request_timeout)
            .arg("--hide-scrollbars")
            .arg("--disable-dev-shm-usage");
        if config.insecure_tls {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(WebshotsError::BrowserLaunchFailed)?;

        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .map_err(|e| WebshotsError::BrowserLaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });

        info!("Browser launched");
        Ok(Self { browser, handler })
    }

    /// Close the browser and wait for the process to exit.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser wait failed: {}", e);
        }
        self.handler.abort();
        let _ = self.handler.await;
        debug!("Browser shut down");
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    type Page = ChromePage;

    async fn open_page(&self, profile: &ViewportProfile) -> Result<ChromePage, PageError> {
        let fail = |detail: String| PageError::CaptureFailed {
            url: "about:blank".into(),
            viewport: profile.label.clone(),
            detail,
        };

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| fail(format!("open tab: {e}")))?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(profile.width))
            .height(i64::from(profile.height))
            .device_scale_factor(profile.device_scale_factor)
            .mobile(profile.mobile)
            .build()
            .map_err(|e| fail(format!("viewport params: {e}")))?;
        page.execute(metrics)
            .await
            .map_err(|e| fail(format!("set viewport: {e}")))?;

        page.execute(SetUserAgentOverrideParams::new(profile.user_agent.clone()))
            .await
            .map_err(|e| fail(format!("set user agent: {e}")))?;

        if profile.touch {
            page.execute(SetTouchEmulationEnabledParams::new(true))
                .await
                .map_err(|e| fail(format!("enable touch: {e}")))?;
        }

        Ok(ChromePage {
            page,
            label: profile.label.clone(),
            url: Mutex::new(String::from("about:blank")),
        })
    }
}

/// One emulated tab.
pub struct ChromePage {
    page: Page,
    label: String,
    /// Last navigation target, for error reports.
    url: Mutex<String>,
}

impl ChromePage {
    fn capture_error(&self, e: CdpError) -> PageError {
        PageError::CaptureFailed {
            url: self.page_url(),
            viewport: self.label.clone(),
            detail: e.to_string(),
        }
    }

    /// PNG of `clip` in document coordinates.
    ///
    /// Goes through `Page.captureScreenshot` directly so the tab's device
    /// metrics (scale factor, mobile layout) stay in force for the capture.
    async fn capture_region(&self, clip: ClipRect) -> Result<Vec<u8>, PageError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(true)
            .clip(Viewport {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            })
            .build();
        let resp = self
            .page
            .execute(params)
            .await
            .map_err(|e| self.capture_error(e))?;

        let data: &str = resp.result.data.as_ref();
        general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| PageError::CaptureFailed {
                url: self.page_url(),
                viewport: self.label.clone(),
                detail: format!("base64 decode failed: {e}"),
            })
    }

    fn page_url(&self) -> String {
        self.url
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError> {
        let ms = timeout.as_millis() as u64;
        if let Ok(mut current) = self.url.lock() {
            *current = url.to_string();
        }
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Err(_) | Ok(Err(CdpError::Timeout)) => Err(PageError::NavigationTimeout {
                url: url.to_string(),
                ms,
            }),
            Ok(Err(e)) => Err(PageError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>, PageError> {
        let result = self
            .page
            .evaluate_expression(script)
            .await
            .map_err(|e| PageError::ScriptFailed {
                step: "evaluate".into(),
                detail: e.to_string(),
            })?;
        Ok(result.value().cloned())
    }

    async fn capture_full_page(&self) -> Result<Vec<u8>, PageError> {
        let metrics = self
            .page
            .layout_metrics()
            .await
            .map_err(|e| self.capture_error(e))?;
        let content = metrics.css_content_size;
        self.capture_region(full_page_clip(content.width, content.height))
            .await
    }

    async fn capture_clip(&self, clip: ClipRect) -> Result<Vec<u8>, PageError> {
        self.capture_region(clip).await
    }

    async fn close(&self) {
        if let Err(e) = self.page.clone().close().await {
            debug!("Closing {} tab failed: {}", self.label, e);
        }
    }
}
