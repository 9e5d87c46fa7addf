//! Configuration types for a capture run.
//!
//! All run behaviour is controlled through [`CaptureConfig`], built via its
//! [`CaptureConfigBuilder`]. The page source is kept separate in
//! [`PageSource`] because it is the one input that must be chosen, never
//! defaulted.

use crate::error::WebshotsError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default navigation timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default output directory.
pub const DEFAULT_OUT_DIR: &str = "output";

/// Where the list of pages comes from. Exactly one mode per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSource {
    /// A single page URL (scheme optional).
    Url(String),
    /// A delimited URL-list file, local path or http(s) URL.
    List(String),
    /// A sitemap document, local path or http(s) URL.
    Sitemap(String),
}

impl PageSource {
    /// Pick the source mode from the three optional CLI inputs.
    ///
    /// Supplying none, or more than one, is a configuration error.
    pub fn from_parts(
        url: Option<String>,
        list: Option<String>,
        sitemap: Option<String>,
    ) -> Result<Self, WebshotsError> {
        let url = url.filter(|s| !s.trim().is_empty());
        let list = list.filter(|s| !s.trim().is_empty());
        let sitemap = sitemap.filter(|s| !s.trim().is_empty());

        match (url, list, sitemap) {
            (Some(u), None, None) => Ok(PageSource::Url(u)),
            (None, Some(l), None) => Ok(PageSource::List(l)),
            (None, None, Some(s)) => Ok(PageSource::Sitemap(s)),
            (None, None, None) => Err(WebshotsError::InvalidConfig(
                "provide a URL, --url-list, or --sitemap-file".into(),
            )),
            _ => Err(WebshotsError::InvalidConfig(
                "choose only one of URL, --url-list, --sitemap-file".into(),
            )),
        }
    }

    /// Short mode label used in logs and the run summary.
    pub fn mode(&self) -> &'static str {
        match self {
            PageSource::Url(_) => "single",
            PageSource::List(_) => "list",
            PageSource::Sitemap(_) => "sitemap",
        }
    }

    /// The raw location string (URL, path, or remote document).
    pub fn location(&self) -> &str {
        match self {
            PageSource::Url(s) | PageSource::List(s) | PageSource::Sitemap(s) => s,
        }
    }
}

/// Device emulation for one of the two captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportProfile {
    /// Label used in logs and errors ("desktop", "mobile").
    pub label: String,
    /// CSS viewport width in pixels.
    pub width: u32,
    /// CSS viewport height in pixels.
    pub height: u32,
    /// Device pixel ratio; the captured PNG is `width × dpr` pixels wide.
    pub device_scale_factor: f64,
    /// Emulate a mobile device (meta viewport, overlay scrollbars).
    pub mobile: bool,
    /// Emulate a touch screen.
    pub touch: bool,
    /// User-Agent header and `navigator.userAgent`.
    pub user_agent: String,
}

impl ViewportProfile {
    /// 1024×1080 desktop at 2× density.
    pub fn desktop() -> Self {
        Self {
            label: "desktop".into(),
            width: 1024,
            height: 1080,
            device_scale_factor: 2.0,
            mobile: false,
            touch: false,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome Safari"
                .into(),
        }
    }

    /// iPhone 12: 390×844 at 3× density with touch.
    pub fn mobile() -> Self {
        Self {
            label: "mobile".into(),
            width: 390,
            height: 844,
            device_scale_factor: 3.0,
            mobile: true,
            touch: true,
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) \
                         AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 \
                         Mobile/15E148 Safari/604.1"
                .into(),
        }
    }
}

/// Toggles for the DOM stabiliser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizeOptions {
    /// Scroll through the page and freeze animations. Default: true.
    ///
    /// Turning this off also turns off `isi_reached`.
    pub settle: bool,

    /// Mark `section.isi.js-isi` blocks as reached. Default: false.
    pub isi_reached: bool,

    /// Rewrite fixed/sticky elements so they stay put in a full-page image.
    /// Default: false.
    pub defloat: bool,

    /// CSS selectors hidden before capture, in order. Default: empty.
    pub hide_selectors: Vec<String>,

    /// Scroll increment used while settling. Default: 800.
    pub scroll_step_px: u32,

    /// Pause after each scroll increment. Default: 150.
    pub scroll_pause_ms: u64,

    /// Upper bound on scroll increments, for pages that grow forever. Default: 500.
    pub max_scroll_steps: u32,
}

impl Default for StabilizeOptions {
    fn default() -> Self {
        Self {
            settle: true,
            isi_reached: false,
            defloat: false,
            hide_selectors: Vec::new(),
            scroll_step_px: 800,
            scroll_pause_ms: 150,
            max_scroll_steps: 500,
        }
    }
}

impl StabilizeOptions {
    /// Split a comma-separated `--hide-selectors` value, dropping blanks.
    pub fn parse_selectors(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether the ISI step will actually run.
    pub fn isi_enabled(&self) -> bool {
        self.settle && self.isi_reached
    }
}

/// Configuration for one capture run.
///
/// Built via [`CaptureConfig::builder()`] or [`CaptureConfig::default()`].
///
/// # Example
/// ```rust
/// use webshots::CaptureConfig;
///
/// let config = CaptureConfig::builder()
///     .out_dir("shots")
///     .timeout_ms(30_000)
///     .defloat(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.timeout_ms, 30_000);
/// ```
#[derive(Clone)]
pub struct CaptureConfig {
    /// Root output directory. Default: `./output`.
    pub out_dir: PathBuf,

    /// Ignore TLS certificate errors. Default: false.
    pub insecure_tls: bool,

    /// Per-navigation timeout. Default: 60 000.
    pub timeout_ms: u64,

    /// Keep list/sitemap entries that point at PDFs, images, etc. Default: false.
    pub include_non_html: bool,

    /// DOM stabiliser toggles.
    pub stabilize: StabilizeOptions,

    /// Capture a clipped popup image when a modal is open on load. Default: false.
    pub modal_shot: bool,

    /// Desktop device profile.
    pub desktop: ViewportProfile,

    /// Mobile device profile.
    pub mobile: ViewportProfile,

    /// Timeout for downloading remote list/sitemap documents. Default: 120.
    pub download_timeout_secs: u64,

    /// Chrome/Chromium executable. If None, chromiumoxide searches the usual places.
    pub chrome_path: Option<PathBuf>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            insecure_tls: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            include_non_html: false,
            stabilize: StabilizeOptions::default(),
            modal_shot: false,
            desktop: ViewportProfile::desktop(),
            mobile: ViewportProfile::mobile(),
            download_timeout_secs: 120,
            chrome_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("out_dir", &self.out_dir)
            .field("insecure_tls", &self.insecure_tls)
            .field("timeout_ms", &self.timeout_ms)
            .field("include_non_html", &self.include_non_html)
            .field("stabilize", &self.stabilize)
            .field("modal_shot", &self.modal_shot)
            .field("desktop", &self.desktop.label)
            .field("mobile", &self.mobile.label)
            .field("chrome_path", &self.chrome_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn CaptureProgressCallback>"),
            )
            .finish()
    }
}

impl CaptureConfig {
    /// Create a new builder for `CaptureConfig`.
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder {
            config: Self::default(),
        }
    }

    /// `{out_dir}/desktop`
    pub fn desktop_dir(&self) -> PathBuf {
        self.out_dir.join("desktop")
    }

    /// `{out_dir}/mobile`
    pub fn mobile_dir(&self) -> PathBuf {
        self.out_dir.join("mobile")
    }
}

/// Builder for [`CaptureConfig`].
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl fmt::Debug for CaptureConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl CaptureConfigBuilder {
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.out_dir = dir.into();
        self
    }

    pub fn insecure_tls(mut self, v: bool) -> Self {
        self.config.insecure_tls = v;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn include_non_html(mut self, v: bool) -> Self {
        self.config.include_non_html = v;
        self
    }

    pub fn settle(mut self, v: bool) -> Self {
        self.config.stabilize.settle = v;
        self
    }

    pub fn isi_reached(mut self, v: bool) -> Self {
        self.config.stabilize.isi_reached = v;
        self
    }

    pub fn defloat(mut self, v: bool) -> Self {
        self.config.stabilize.defloat = v;
        self
    }

    pub fn hide_selectors(mut self, selectors: Vec<String>) -> Self {
        self.config.stabilize.hide_selectors = selectors;
        self
    }

    pub fn stabilize(mut self, opts: StabilizeOptions) -> Self {
        self.config.stabilize = opts;
        self
    }

    pub fn modal_shot(mut self, v: bool) -> Self {
        self.config.modal_shot = v;
        self
    }

    pub fn desktop(mut self, profile: ViewportProfile) -> Self {
        self.config.desktop = profile;
        self
    }

    pub fn mobile(mut self, profile: ViewportProfile) -> Self {
        self.config.mobile = profile;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptureConfig, WebshotsError> {
        let c = &self.config;
        if c.timeout_ms == 0 {
            return Err(WebshotsError::InvalidConfig(
                "navigation timeout must be > 0 ms".into(),
            ));
        }
        if c.out_dir.as_os_str().is_empty() {
            return Err(WebshotsError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        if c.stabilize.scroll_step_px == 0 {
            return Err(WebshotsError::InvalidConfig(
                "scroll step must be > 0 px".into(),
            ));
        }
        for p in [&c.desktop, &c.mobile] {
            if p.width == 0 || p.height == 0 || p.device_scale_factor <= 0.0 {
                return Err(WebshotsError::InvalidConfig(format!(
                    "{} viewport must have a positive size and scale",
                    p.label
                )));
            }
        }
        Ok(self.config)
    }
}
