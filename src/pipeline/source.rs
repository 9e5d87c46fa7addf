//! Source resolution: turn a URL, a URL-list file, or a sitemap into an
//! ordered list of [`PageDescriptor`]s.
//!
//! Order is the encounter order of the source, always. Filtering (non-HTML
//! entries, malformed entries) only ever removes items; nothing is sorted or
//! deduplicated here, so a URL listed twice is captured twice.
//!
//! List and sitemap locations may be local paths or `http(s)://` URLs; remote
//! documents are downloaded into memory with the configured timeout.

use crate::config::{CaptureConfig, PageSource};
use crate::error::WebshotsError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

/// What a URL most likely points at, judged from its path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Html,
    Pdf,
    Image,
    Other,
}

/// One page to capture, as resolved from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// Normalised absolute URL.
    pub source_url: String,
    /// Non-empty path segments, in order.
    pub path_segments: Vec<String>,
    /// Sanitised last segment, or `home` for a bare origin.
    pub raw_slug: String,
    /// Sanitised second-to-last segment, if the path has one.
    pub parent_slug: Option<String>,
    pub resource_kind: ResourceKind,
}

/// The outcome of resolving a [`PageSource`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedSource {
    /// Pages to capture, in source order.
    pub pages: Vec<PageDescriptor>,
    /// URLs excluded by the non-HTML filter, in source order.
    pub skipped: Vec<String>,
    /// Malformed entries that were dropped.
    pub warnings: Vec<String>,
    /// Entries found before any filtering.
    pub total_found: usize,
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Resolve the configured source into page descriptors.
///
/// # Errors
/// Unreadable files, failed downloads and malformed sitemaps are fatal, as is
/// a source that yields no capturable page at all.
pub async fn resolve_source(
    source: &PageSource,
    config: &CaptureConfig,
) -> Result<ResolvedSource, WebshotsError> {
    let resolved = match source {
        PageSource::Url(u) => resolve_entries(vec![u.clone()], true),
        PageSource::List(loc) => {
            let text = read_source(loc, config).await?;
            let entries = parse_url_list(&text);
            info!("URL list '{}': {} entries", loc, entries.len());
            resolve_entries(entries, config.include_non_html)
        }
        PageSource::Sitemap(loc) => {
            let text = read_source(loc, config).await?;
            let parsed = parse_sitemap(&text, loc)?;
            info!("Sitemap '{}': {} entries", loc, parsed.locations.len());
            let mut resolved = resolve_entries(parsed.locations, config.include_non_html);
            let mut warnings = parsed.warnings;
            warnings.append(&mut resolved.warnings);
            resolved.warnings = warnings;
            resolved
        }
    };

    for w in &resolved.warnings {
        warn!("Skipping malformed entry: {}", w);
    }
    if !resolved.skipped.is_empty() {
        info!(
            "Skipped {} non-HTML entries (use --include-nonhtml to keep them)",
            resolved.skipped.len()
        );
    }

    if resolved.pages.is_empty() {
        return Err(WebshotsError::NoPages {
            source_name: source.location().to_string(),
            skipped: resolved.skipped.len(),
        });
    }

    Ok(resolved)
}

/// Turn raw entries into descriptors, keeping order.
///
/// With `include_non_html == false`, entries that do not look like HTML
/// pages are moved to [`ResolvedSource::skipped`].
pub fn resolve_entries(entries: Vec<String>, include_non_html: bool) -> ResolvedSource {
    let mut out = ResolvedSource {
        total_found: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        match describe_url(&entry) {
            Ok(page) => {
                if !include_non_html && page.resource_kind != ResourceKind::Html {
                    debug!("Non-HTML entry filtered: {}", page.source_url);
                    out.skipped.push(page.source_url);
                } else {
                    out.pages.push(page);
                }
            }
            Err(reason) => out.warnings.push(format!("'{entry}': {reason}")),
        }
    }

    out
}

// ── URL handling ─────────────────────────────────────────────────────────────

static RE_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").unwrap());
static RE_PAGE_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(html?|aspx|php)$").unwrap());
static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\-_]+").unwrap());
static RE_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Prefix `https://` unless the input already has an http(s) scheme.
pub fn ensure_scheme(raw: &str) -> String {
    let raw = raw.trim();
    if RE_SCHEME.is_match(raw) {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

/// Make a path segment safe for a filename stem.
///
/// Lower-cases, drops a page extension, replaces anything outside
/// `[a-z0-9_-]` with `-`, collapses dashes. Never returns an empty string.
pub fn sanitize_segment(segment: &str) -> String {
    let s = segment.trim().to_lowercase();
    let s = RE_PAGE_EXT.replace(&s, "");
    let s = RE_UNSAFE.replace_all(&s, "-");
    let s = RE_DASHES.replace_all(&s, "-");
    let s = s.trim_matches('-');
    if s.is_empty() {
        "page".to_string()
    } else {
        s.to_string()
    }
}

/// Build a descriptor for one raw entry. The error string is a warning.
pub fn describe_url(raw: &str) -> Result<PageDescriptor, String> {
    let normalised = ensure_scheme(raw);
    let url = Url::parse(&normalised).map_err(|e| e.to_string())?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err("URL has no host".into());
    }

    let path_segments: Vec<String> = url
        .path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let (raw_slug, parent_slug) = match path_segments.as_slice() {
        [] => ("home".to_string(), None),
        [only] => (sanitize_segment(only), None),
        [.., parent, last] => (sanitize_segment(last), Some(sanitize_segment(parent))),
    };

    Ok(PageDescriptor {
        resource_kind: resource_kind(&url),
        source_url: url.to_string(),
        path_segments,
        raw_slug,
        parent_slug,
    })
}

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg", "ico", "webp"];

const OTHER_NON_HTML_EXTS: &[&str] = &[
    "zip", "tar", "gz", "tgz", "bz2", "7z", "rar", "doc", "docx", "ppt", "pptx", "xls", "xlsx",
    "csv", "tsv", "mp4", "mp3", "webm", "mov", "avi", "mkv", "json", "xml", "rss", "atom", "txt",
    "md", "yaml", "yml",
];

/// Classify a URL by scheme and path extension.
pub fn resource_kind(url: &Url) -> ResourceKind {
    if !matches!(url.scheme(), "http" | "https") {
        return ResourceKind::Other;
    }
    let path = url.path().to_lowercase();
    let last = path.rsplit('/').next().unwrap_or("");
    let Some((_, ext)) = last.rsplit_once('.') else {
        return ResourceKind::Html;
    };
    if ext == "pdf" {
        ResourceKind::Pdf
    } else if IMAGE_EXTS.contains(&ext) {
        ResourceKind::Image
    } else if OTHER_NON_HTML_EXTS.contains(&ext) {
        ResourceKind::Other
    } else {
        ResourceKind::Html
    }
}

// ── Parsers ──────────────────────────────────────────────────────────────────

static RE_LIST_DELIMS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,;|]+").unwrap());

/// Split a URL-list document into entries.
///
/// Delimiters: any whitespace, `,`, `;`, `|`. A line whose first non-blank
/// character is `#` is a comment, as is any token starting with `#`.
pub fn parse_url_list(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| RE_LIST_DELIMS.split(line))
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// `<loc>` values of a sitemap plus the warnings for unusable entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapEntries {
    pub locations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Extract `<url><loc>` entries from a sitemap document.
///
/// A document that is not XML at all is read as a plain URL list. XML that
/// fails to parse, or whose root is not `<urlset>`, is malformed.
pub fn parse_sitemap(text: &str, source_name: &str) -> Result<SitemapEntries, WebshotsError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(SitemapEntries::default());
    }
    if !trimmed.starts_with('<') {
        debug!("'{}' is not XML; reading it as a URL list", source_name);
        return Ok(SitemapEntries {
            locations: parse_url_list(trimmed),
            warnings: Vec::new(),
        });
    }

    let doc = roxmltree::Document::parse(trimmed).map_err(|e| WebshotsError::MalformedInput {
        source_name: source_name.to_string(),
        detail: format!("invalid sitemap XML: {e}"),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "urlset" {
        return Err(WebshotsError::MalformedInput {
            source_name: source_name.to_string(),
            detail: format!("expected <urlset>, found <{}>", root.tag_name().name()),
        });
    }

    let mut out = SitemapEntries::default();
    for (i, url_el) in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "url")
        .enumerate()
    {
        let loc = url_el
            .children()
            .find(|c| c.is_element() && c.tag_name().name() == "loc")
            .and_then(|c| c.text())
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match loc {
            Some(loc) => out.locations.push(loc.to_string()),
            None => out
                .warnings
                .push(format!("sitemap entry #{} has no <loc>", i + 1)),
        }
    }
    Ok(out)
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Check if the location looks like a URL.
pub fn is_url(location: &str) -> bool {
    let l = location.trim();
    l.starts_with("http://") || l.starts_with("https://")
}

/// Read a list/sitemap location to a string (lossy UTF-8).
async fn read_source(location: &str, config: &CaptureConfig) -> Result<String, WebshotsError> {
    if is_url(location) {
        download_text(location, config).await
    } else {
        read_local(location).await
    }
}

async fn read_local(path_str: &str) -> Result<String, WebshotsError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => WebshotsError::SourceNotFound { path: path.clone() },
        std::io::ErrorKind::PermissionDenied => {
            WebshotsError::PermissionDenied { path: path.clone() }
        }
        _ => WebshotsError::MalformedInput {
            source_name: path_str.to_string(),
            detail: e.to_string(),
        },
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn download_text(url: &str, config: &CaptureConfig) -> Result<String, WebshotsError> {
    info!("Downloading source document: {}", url);
    let secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(secs))
        .danger_accept_invalid_certs(config.insecure_tls)
        .build()
        .map_err(|e| WebshotsError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            WebshotsError::DownloadTimeout {
                url: url.to_string(),
                secs,
            }
        } else {
            WebshotsError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(WebshotsError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| WebshotsError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
