//! Document assembly: every captured image, in order, as one PDF.
//!
//! Page order follows input order; within a page the order is
//! desktop popup, desktop, mobile popup, mobile. Each image becomes one PDF
//! page sized to the image, so nothing is cropped or letterboxed.
//!
//! The merge runs inside `spawn_blocking`: pdfium is a synchronous C library
//! and a long document would otherwise stall a Tokio worker thread.

use crate::error::WebshotsError;
use crate::output::CaptureResult;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use image::GenericImageView;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Combines captured images into one document.
#[async_trait]
pub trait DocumentMerger: Send + Sync {
    /// File extension of the produced document, without the dot.
    fn extension(&self) -> &'static str {
        "pdf"
    }

    /// Write `images`, in order, to `output`. `images` is never empty.
    async fn merge(&self, images: Vec<PathBuf>, output: &Path) -> Result<(), WebshotsError>;
}

/// `screenshots_YYYYMMDD-HHMMSS.<ext>` for the run that started at `started`.
pub fn document_name(started: &DateTime<Local>, extension: &str) -> String {
    format!("screenshots_{}.{extension}", started.format("%Y%m%d-%H%M%S"))
}

/// All images of `results` in document order.
pub fn ordered_images(results: &[CaptureResult]) -> Vec<PathBuf> {
    results
        .iter()
        .flat_map(|r| r.images_in_order().cloned())
        .collect()
}

/// Merge the run's images into `<out_dir>/screenshots_<ts>.<ext>`.
///
/// Fails with [`WebshotsError::NoImagesCaptured`] when every page failed.
pub async fn assemble(
    results: &[CaptureResult],
    out_dir: &Path,
    started: &DateTime<Local>,
    merger: &dyn DocumentMerger,
) -> Result<PathBuf, WebshotsError> {
    let images = ordered_images(results);
    if images.is_empty() {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no pages were processed".to_string());
        return Err(WebshotsError::NoImagesCaptured {
            total: results.len(),
            first_error,
        });
    }

    let output = out_dir.join(document_name(started, merger.extension()));
    debug!("Merging {} images into {}", images.len(), output.display());
    let count = images.len();
    merger.merge(images, &output).await?;
    info!("Wrote {} ({} pages)", output.display(), count);
    Ok(output)
}

// ── pdfium ───────────────────────────────────────────────────────────────────

/// Largest page side pdfium viewers reliably open, in points.
pub const MAX_PAGE_POINTS: f32 = 14_400.0;

/// Points per captured pixel before clamping.
pub const DEFAULT_POINTS_PER_PIXEL: f32 = 0.5;

/// [`DocumentMerger`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumMerger {
    points_per_pixel: f32,
}

impl Default for PdfiumMerger {
    fn default() -> Self {
        Self {
            points_per_pixel: DEFAULT_POINTS_PER_PIXEL,
        }
    }
}

impl PdfiumMerger {
    pub fn new(points_per_pixel: f32) -> Self {
        Self { points_per_pixel }
    }
}

#[async_trait]
impl DocumentMerger for PdfiumMerger {
    async fn merge(&self, images: Vec<PathBuf>, output: &Path) -> Result<(), WebshotsError> {
        let output = output.to_path_buf();
        let scale = self.points_per_pixel;
        tokio::task::spawn_blocking(move || merge_blocking(&images, &output, scale))
            .await
            .map_err(|e| WebshotsError::Internal(format!("Merge task panicked: {}", e)))?
    }
}

/// Page size in points for a `width × height` pixel image.
///
/// Long screenshots are scaled down so neither side exceeds
/// [`MAX_PAGE_POINTS`].
pub fn page_size_points(width: u32, height: u32, points_per_pixel: f32) -> (f32, f32) {
    let longest = width.max(height).max(1) as f32;
    let scale = points_per_pixel.min(MAX_PAGE_POINTS / longest);
    (width as f32 * scale, height as f32 * scale)
}

fn merge_blocking(images: &[PathBuf], output: &Path, scale: f32) -> Result<(), WebshotsError> {
    let fail = |detail: String| WebshotsError::AssemblyFailed {
        path: output.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium()?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| fail(format!("create document: {e:?}")))?;

    for path in images {
        let img = image::open(path).map_err(|e| fail(format!("{}: {e}", path.display())))?;
        let (w, h) = img.dimensions();
        let (width_pt, height_pt) = page_size_points(w, h, scale);

        let object = PdfPageImageObject::new_with_width(&document, &img, PdfPoints::new(width_pt))
            .map_err(|e| fail(format!("{}: {e:?}", path.display())))?;
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(
                PdfPoints::new(width_pt),
                PdfPoints::new(height_pt),
            ))
            .map_err(|e| fail(format!("add page: {e:?}")))?;
        page.objects_mut()
            .add_image_object(object)
            .map_err(|e| fail(format!("{}: {e:?}", path.display())))?;
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| WebshotsError::OutputWriteFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    document
        .save_to_file(output)
        .map_err(|e| fail(format!("save: {e:?}")))?;
    Ok(())
}

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the system.
pub fn bind_pdfium() -> Result<Pdfium, WebshotsError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| {
                    WebshotsError::PdfiumBindingFailed(format!("{}: {e}", path.display()))
                });
        }
        debug!("PDFIUM_LIB_PATH '{}' not found; trying defaults", path.display());
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| WebshotsError::PdfiumBindingFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use crate::output::CaptureStatus;
    use crate::pipeline::slug::{name_page, NamingRegistry};
    use crate::pipeline::source::describe_url;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Recorder {
        calls: Mutex<Vec<(Vec<PathBuf>, PathBuf)>>,
    }

    #[async_trait]
    impl DocumentMerger for Recorder {
        async fn merge(&self, images: Vec<PathBuf>, output: &Path) -> Result<(), WebshotsError> {
            self.calls
                .lock()
                .unwrap()
                .push((images, output.to_path_buf()));
            Ok(())
        }
    }

    fn result(url: &str, dt: bool, mb: bool, popup: bool) -> CaptureResult {
        let page = name_page(&mut NamingRegistry::new(), describe_url(url).unwrap());
        let n = page.final_name.clone();
        CaptureResult {
            desktop_path: dt.then(|| PathBuf::from(format!("d/{n}_dt.png"))),
            mobile_path: mb.then(|| PathBuf::from(format!("m/{n}_mb.png"))),
            desktop_popup_path: (popup && dt).then(|| PathBuf::from(format!("d/{n}_popup_dt.png"))),
            mobile_popup_path: None,
            status: CaptureResult::status_for(dt, mb),
            error: (!dt || !mb).then(|| PageError::NavigationFailed {
                url: url.into(),
                reason: "refused".into(),
            }),
            duration_ms: 1,
            page,
        }
    }

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn name_uses_second_resolution_timestamp() {
        assert_eq!(
            document_name(&started(), "pdf"),
            "screenshots_20260304-050607.pdf"
        );
    }

    #[test]
    fn order_is_popup_desktop_then_mobile_per_page() {
        let results = vec![
            result("a.com/one", true, true, true),
            result("a.com/two", false, false, false),
            result("a.com/three", true, false, false),
        ];
        let names: Vec<String> = ordered_images(&results)
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "d/one_popup_dt.png",
                "d/one_dt.png",
                "m/one_mb.png",
                "d/three_dt.png"
            ]
        );
    }

    #[tokio::test]
    async fn assemble_hands_images_to_merger() {
        let rec = Recorder {
            calls: Mutex::new(Vec::new()),
        };
        let results = vec![result("a.com/x", true, true, false)];
        let path = assemble(&results, Path::new("/out"), &started(), &rec)
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/out/screenshots_20260304-050607.pdf"));
        let calls = rec.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.len(), 2);
    }

    #[tokio::test]
    async fn nothing_captured_is_fatal() {
        let rec = Recorder {
            calls: Mutex::new(Vec::new()),
        };
        let results = vec![result("a.com/x", false, false, false)];
        assert_eq!(results[0].status, CaptureStatus::Failed);
        let err = assemble(&results, Path::new("/out"), &started(), &rec)
            .await
            .unwrap_err();
        match err {
            WebshotsError::NoImagesCaptured { total, first_error } => {
                assert_eq!(total, 1);
                assert!(first_error.contains("refused"));
            }
            other => panic!("unexpected: {other}"),
        }
        assert!(rec.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn page_size_scales_and_clamps() {
        assert_eq!(page_size_points(2048, 4000, 0.5), (1024.0, 2000.0));
        let (w, h) = page_size_points(1170, 60_000, 0.5);
        assert!((h - MAX_PAGE_POINTS).abs() < 0.01);
        assert!(w < 1170.0 * 0.5);
    }
}
