//! The browser capability the pipeline drives.
//!
//! The pipeline never talks to Chrome directly; it opens tabs through a
//! [`BrowserEngine`] and works on them through [`PageHandle`]. The production
//! implementation lives in [`crate::browser`]; tests plug in an in-memory fake.

use crate::config::ViewportProfile;
use crate::error::PageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A region of the document in CSS pixels (document coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One live tab with a fixed device profile.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate and wait for the load event, giving up after `timeout`.
    ///
    /// Must return [`PageError::NavigationTimeout`] or
    /// [`PageError::NavigationFailed`] on failure.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError>;

    /// Evaluate a JavaScript expression; `None` when it yields `undefined`.
    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>, PageError>;

    /// PNG of the whole document, not just the viewport.
    async fn capture_full_page(&self) -> Result<Vec<u8>, PageError>;

    /// PNG of one region of the document.
    async fn capture_clip(&self, clip: ClipRect) -> Result<Vec<u8>, PageError>;

    /// Let the page run for `ms` milliseconds.
    async fn pause(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Close the tab. Errors are logged by the implementation, not returned.
    async fn close(&self);
}

/// Opens tabs in one browser session.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    type Page: PageHandle;

    /// Open a blank tab emulating `profile`.
    async fn open_page(&self, profile: &ViewportProfile) -> Result<Self::Page, PageError>;
}
