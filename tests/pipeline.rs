//! Full runs against an in-memory browser and a recording merger.
//!
//! No Chrome, no pdfium: the fake engine decides per URL whether navigation
//! or capture fails, and the merger records the images it was handed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webshots::{
    run_with, BrowserEngine, CaptureConfig, CaptureProgressCallback, CaptureResult,
    CaptureStatus, ClipRect, DocumentMerger, PageError, PageHandle, PageSource, RunSummary,
    ViewportProfile, WebshotsError,
};

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Behaviour {
    Ok,
    DesktopTimeout,
    MobileCaptureFails,
    DesktopCaptureFails,
    CaptureAlwaysFails,
    WithModal,
    WithModalDesktopCaptureFails,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    navigations: Mutex<Vec<(String, String)>>,
}

struct FakeEngine {
    behaviour: HashMap<String, Behaviour>,
    counters: Arc<Counters>,
}

impl FakeEngine {
    fn new(rules: &[(&str, Behaviour)]) -> Self {
        Self {
            behaviour: rules
                .iter()
                .map(|(host, b)| (host.to_string(), *b))
                .collect(),
            counters: Arc::new(Counters::default()),
        }
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    type Page = FakePage;

    async fn open_page(&self, profile: &ViewportProfile) -> Result<FakePage, PageError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakePage {
            label: profile.label.clone(),
            rules: self.behaviour.clone(),
            current: Mutex::new(Behaviour::Ok),
            counters: Arc::clone(&self.counters),
        })
    }
}

struct FakePage {
    label: String,
    rules: HashMap<String, Behaviour>,
    current: Mutex<Behaviour>,
    counters: Arc<Counters>,
}

impl FakePage {
    fn behaviour(&self) -> Behaviour {
        *self.current.lock().unwrap()
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError> {
        self.counters
            .navigations
            .lock()
            .unwrap()
            .push((self.label.clone(), url.to_string()));
        let b = self
            .rules
            .iter()
            .find(|(host, _)| url.contains(host.as_str()))
            .map(|(_, b)| *b)
            .unwrap_or(Behaviour::Ok);
        *self.current.lock().unwrap() = b;

        if b == Behaviour::DesktopTimeout {
            return Err(PageError::NavigationTimeout {
                url: url.to_string(),
                ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>, PageError> {
        if script.contains("bestArea") {
            return Ok(Some(match self.behaviour() {
                Behaviour::WithModal | Behaviour::WithModalDesktopCaptureFails => serde_json::json!({
                    "x": 10.0, "y": 10.0, "width": 300.0, "height": 200.0
                }),
                _ => serde_json::Value::Null,
            }));
        }
        Ok(None)
    }

    async fn capture_full_page(&self) -> Result<Vec<u8>, PageError> {
        let fail = match self.behaviour() {
            Behaviour::CaptureAlwaysFails => true,
            Behaviour::MobileCaptureFails => self.label == "mobile",
            Behaviour::DesktopCaptureFails | Behaviour::WithModalDesktopCaptureFails => {
                self.label == "desktop"
            }
            _ => false,
        };
        if fail {
            return Err(PageError::CaptureFailed {
                url: "fake".into(),
                viewport: self.label.clone(),
                detail: "renderer crashed".into(),
            });
        }
        Ok(format!("full-{}", self.label).into_bytes())
    }

    async fn capture_clip(&self, _clip: ClipRect) -> Result<Vec<u8>, PageError> {
        Ok(format!("popup-{}", self.label).into_bytes())
    }

    async fn pause(&self, _ms: u64) {}

    async fn close(&self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingMerger {
    calls: Mutex<Vec<(Vec<PathBuf>, PathBuf)>>,
}

impl RecordingMerger {
    fn images(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .first()
            .map(|(imgs, _)| imgs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentMerger for RecordingMerger {
    async fn merge(&self, images: Vec<PathBuf>, output: &Path) -> Result<(), WebshotsError> {
        for img in &images {
            assert!(img.exists(), "merger received missing image {}", img.display());
        }
        self.calls
            .lock()
            .unwrap()
            .push((images, output.to_path_buf()));
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn config(out: &Path) -> CaptureConfig {
    CaptureConfig::builder()
        .out_dir(out)
        .timeout_ms(5_000)
        .build()
        .unwrap()
}

fn list_source(dir: &Path, body: &str) -> PageSource {
    let path = dir.join("urls.txt");
    std::fs::write(&path, body).unwrap();
    PageSource::List(path.display().to_string())
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn statuses(summary: &RunSummary) -> Vec<CaptureStatus> {
    summary.results.iter().map(|r| r.status).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_images_follow_input_order() {
    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(tmp.path(), "c.test/gamma\na.test/alpha, b.test/beta");
    let engine = FakeEngine::new(&[]);
    let merger = RecordingMerger::default();

    let summary = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();

    assert_eq!(summary.mode, "list");
    assert_eq!(summary.succeeded, 3);
    assert_eq!(
        file_names(&merger.images()),
        vec![
            "gamma_dt.png",
            "gamma_mb.png",
            "alpha_dt.png",
            "alpha_mb.png",
            "beta_dt.png",
            "beta_mb.png"
        ]
    );
    let doc = file_names(&[summary.document_path.clone()]).remove(0);
    assert!(doc.starts_with("screenshots_") && doc.ends_with(".pdf"), "{doc}");
}

#[tokio::test]
async fn test_page_count_is_two_per_ok_one_per_partial() {
    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(
        tmp.path(),
        "ok1.test/a ok2.test/b partial.test/c dead.test/d broken.test/e",
    );
    let engine = FakeEngine::new(&[
        ("partial.test", Behaviour::MobileCaptureFails),
        ("dead.test", Behaviour::DesktopTimeout),
        ("broken.test", Behaviour::CaptureAlwaysFails),
    ]);
    let merger = RecordingMerger::default();

    let summary = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();

    assert_eq!(
        statuses(&summary),
        vec![
            CaptureStatus::Ok,
            CaptureStatus::Ok,
            CaptureStatus::Partial,
            CaptureStatus::Failed,
            CaptureStatus::Failed
        ]
    );
    assert_eq!((summary.succeeded, summary.partial, summary.failed), (2, 1, 2));
    assert_eq!(merger.images().len(), 2 * 2 + 1);
    assert_eq!(summary.images().len(), merger.images().len());
}

#[tokio::test]
async fn test_navigation_timeout_fails_page_and_run_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(tmp.path(), "slow.test/x\nfast.test/y");
    let engine = FakeEngine::new(&[("slow.test", Behaviour::DesktopTimeout)]);
    let merger = RecordingMerger::default();

    let summary = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();

    let first = &summary.results[0];
    assert_eq!(first.status, CaptureStatus::Failed);
    assert!(matches!(
        first.error,
        Some(PageError::NavigationTimeout { ms: 5_000, .. })
    ));
    assert!(first.desktop_path.is_none() && first.mobile_path.is_none());
    assert_eq!(summary.results[1].status, CaptureStatus::Ok);

    // Mobile is never attempted after a desktop navigation failure.
    let navs = engine.counters.navigations.lock().unwrap().clone();
    assert_eq!(
        navs.iter().filter(|(_, u)| u.contains("slow.test")).count(),
        1
    );
}

#[tokio::test]
async fn test_partial_records_mobile_error() {
    let tmp = tempfile::tempdir().unwrap();
    let source = PageSource::Url("half.test/page".into());
    let engine = FakeEngine::new(&[("half.test", Behaviour::MobileCaptureFails)]);
    let merger = RecordingMerger::default();

    let summary = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();

    let r: &CaptureResult = &summary.results[0];
    assert_eq!(r.status, CaptureStatus::Partial);
    assert!(r.desktop_path.is_some());
    assert!(r.mobile_path.is_none());
    assert!(matches!(
        &r.error,
        Some(PageError::CaptureFailed { viewport, .. }) if viewport == "mobile"
    ));
}

#[tokio::test]
async fn test_desktop_capture_failure_is_partial() {
    let tmp = tempfile::tempdir().unwrap();
    let source = PageSource::Url("half.test/p".into());
    let engine = FakeEngine::new(&[("half.test", Behaviour::DesktopCaptureFails)]);
    let merger = RecordingMerger::default();

    let summary = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();

    let r = &summary.results[0];
    assert_eq!(r.status, CaptureStatus::Partial);
    assert!(r.desktop_path.is_none());
    assert!(r.mobile_path.is_some());
    assert!(matches!(
        &r.error,
        Some(PageError::CaptureFailed { viewport, .. }) if viewport == "desktop"
    ));
    assert_eq!(file_names(&merger.images()), vec!["p_mb.png"]);
}

#[tokio::test]
async fn test_popup_is_dropped_with_its_failed_full_page() {
    let tmp = tempfile::tempdir().unwrap();
    let source = PageSource::Url("promo.test/landing".into());
    let engine = FakeEngine::new(&[("promo.test", Behaviour::WithModalDesktopCaptureFails)]);
    let merger = RecordingMerger::default();
    let config = CaptureConfig::builder()
        .out_dir(tmp.path())
        .modal_shot(true)
        .build()
        .unwrap();

    let summary = run_with(&source, &config, &engine, &merger).await.unwrap();

    let r = &summary.results[0];
    assert_eq!(r.status, CaptureStatus::Partial);
    assert!(r.desktop_popup_path.is_none());
    assert!(!tmp.path().join("desktop/landing_popup_dt.png").exists());
    assert_eq!(std::fs::read_dir(tmp.path().join("desktop")).unwrap().count(), 0);
    assert_eq!(
        file_names(&merger.images()),
        vec!["landing_popup_mb.png", "landing_mb.png"]
    );
}

#[tokio::test]
async fn test_every_tab_is_closed() {
    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(tmp.path(), "a.test b.test/x dead.test broken.test");
    let engine = FakeEngine::new(&[
        ("dead.test", Behaviour::DesktopTimeout),
        ("broken.test", Behaviour::CaptureAlwaysFails),
    ]);
    let merger = RecordingMerger::default();

    run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();

    let opened = engine.counters.opened.load(Ordering::SeqCst);
    let closed = engine.counters.closed.load(Ordering::SeqCst);
    // 3 pages × 2 viewports + 1 desktop-only
    assert_eq!(opened, 7);
    assert_eq!(opened, closed);
}

#[tokio::test]
async fn test_cleanup_removes_stale_images() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    std::fs::create_dir_all(out.join("desktop")).unwrap();
    std::fs::create_dir_all(out.join("mobile")).unwrap();
    std::fs::write(out.join("desktop/old_dt.png"), b"stale").unwrap();
    std::fs::write(out.join("mobile/old_mb.jpg"), b"stale").unwrap();
    std::fs::write(out.join("mobile/readme.txt"), b"keep").unwrap();

    let source = PageSource::Url("fresh.test/new".into());
    let engine = FakeEngine::new(&[]);
    let merger = RecordingMerger::default();
    run_with(&source, &config(&out), &engine, &merger)
        .await
        .unwrap();

    assert!(!out.join("desktop/old_dt.png").exists());
    assert!(!out.join("mobile/old_mb.jpg").exists());
    assert!(out.join("mobile/readme.txt").exists());
    assert_eq!(
        std::fs::read(out.join("desktop/new_dt.png")).unwrap(),
        b"full-desktop"
    );
    assert_eq!(
        std::fs::read(out.join("mobile/new_mb.png")).unwrap(),
        b"full-mobile"
    );
}

#[tokio::test]
async fn test_modal_images_precede_full_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let source = PageSource::Url("promo.test/landing".into());
    let engine = FakeEngine::new(&[("promo.test", Behaviour::WithModal)]);
    let merger = RecordingMerger::default();
    let config = CaptureConfig::builder()
        .out_dir(tmp.path())
        .modal_shot(true)
        .build()
        .unwrap();

    let summary = run_with(&source, &config, &engine, &merger).await.unwrap();

    assert_eq!(
        file_names(&merger.images()),
        vec![
            "landing_popup_dt.png",
            "landing_dt.png",
            "landing_popup_mb.png",
            "landing_mb.png"
        ]
    );
    assert_eq!(summary.results[0].status, CaptureStatus::Ok);
}

#[tokio::test]
async fn test_modal_shot_off_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let source = PageSource::Url("promo.test/landing".into());
    let engine = FakeEngine::new(&[("promo.test", Behaviour::WithModal)]);
    let merger = RecordingMerger::default();

    run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();
    assert_eq!(merger.images().len(), 2);
}

#[tokio::test]
async fn test_sitemap_skips_non_html_unless_asked() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("sitemap.xml");
    std::fs::write(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://s.test/x.html</loc></url>
  <url><loc>https://s.test/y.pdf</loc></url>
  <url><loc>https://s.test/z.html</loc></url>
</urlset>"#,
    )
    .unwrap();
    let source = PageSource::Sitemap(path.display().to_string());

    let engine = FakeEngine::new(&[]);
    let merger = RecordingMerger::default();
    let summary = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();
    assert_eq!(summary.mode, "sitemap");
    assert_eq!(summary.total_found, 3);
    assert_eq!(summary.skipped, vec!["https://s.test/y.pdf".to_string()]);
    let names: Vec<&str> = summary
        .results
        .iter()
        .map(|r| r.page.final_name.as_str())
        .collect();
    assert_eq!(names, vec!["x", "z"]);

    let config = CaptureConfig::builder()
        .out_dir(tmp.path())
        .include_non_html(true)
        .build()
        .unwrap();
    let merger = RecordingMerger::default();
    let summary = run_with(&source, &config, &engine, &merger).await.unwrap();
    assert_eq!(summary.total(), 3);
    assert!(summary.skipped.is_empty());
}

#[tokio::test]
async fn test_names_are_unique_per_run() {
    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(
        tmp.path(),
        "a.test/men/shoes\nb.test/women/shoes\nc.test/shoes\nd.test/shoes",
    );
    let engine = FakeEngine::new(&[]);
    let merger = RecordingMerger::default();

    let summary = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();
    let names: Vec<&str> = summary
        .results
        .iter()
        .map(|r| r.page.final_name.as_str())
        .collect();
    assert_eq!(names, vec!["shoes", "women-shoes", "shoes-2", "shoes-3"]);

    // A second run starts with an empty registry.
    let merger = RecordingMerger::default();
    let again = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap();
    assert_eq!(again.results[0].page.final_name, "shoes");
}

#[tokio::test]
async fn test_nothing_captured_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(tmp.path(), "dead.test/a dead.test/b");
    let engine = FakeEngine::new(&[("dead.test", Behaviour::DesktopTimeout)]);
    let merger = RecordingMerger::default();

    let err = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap_err();
    assert!(matches!(err, WebshotsError::NoImagesCaptured { total: 2, .. }));
    assert!(merger.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_list_is_fatal_before_any_tab_opens() {
    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(tmp.path(), "# nothing here\n\n");
    let engine = FakeEngine::new(&[]);
    let merger = RecordingMerger::default();

    let err = run_with(&source, &config(tmp.path()), &engine, &merger)
        .await
        .unwrap_err();
    assert!(matches!(err, WebshotsError::NoPages { .. }));
    assert_eq!(engine.counters.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_progress_events_and_eta() {
    #[derive(Default)]
    struct Recorder {
        total: AtomicUsize,
        etas: Mutex<Vec<Option<Duration>>>,
        completed: AtomicUsize,
        finished: AtomicUsize,
    }

    impl CaptureProgressCallback for Recorder {
        fn on_run_start(&self, total_pages: usize) {
            self.total.store(total_pages, Ordering::SeqCst);
        }
        fn on_page_start(&self, _: usize, _: usize, eta: Option<Duration>, _: &str, _: &str) {
            self.etas.lock().unwrap().push(eta);
        }
        fn on_page_complete(&self, _: usize, _: usize, _: &CaptureResult) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_run_complete(&self, summary: &RunSummary) {
            self.finished.store(summary.total(), Ordering::SeqCst);
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let source = list_source(tmp.path(), "a.test/1 dead.test/2 c.test/3");
    let engine = FakeEngine::new(&[("dead.test", Behaviour::DesktopTimeout)]);
    let merger = RecordingMerger::default();
    let recorder = Arc::new(Recorder::default());
    let config = CaptureConfig::builder()
        .out_dir(tmp.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    run_with(&source, &config, &engine, &merger).await.unwrap();

    assert_eq!(recorder.total.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 3);
    let etas = recorder.etas.lock().unwrap();
    assert_eq!(etas.len(), 3);
    assert!(etas[0].is_none());
    assert!(etas[1].is_some() && etas[2].is_some());
}

#[test]
fn test_summary_is_json_serialisable() {
    let summary = RunSummary {
        mode: "single".into(),
        total_found: 1,
        skipped: vec![],
        warnings: vec![],
        results: vec![],
        succeeded: 0,
        partial: 0,
        failed: 0,
        document_path: PathBuf::from("output/screenshots_20260101-000000.pdf"),
        duration_ms: 12,
    };
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["mode"], "single");
    assert_eq!(json["document_path"], "output/screenshots_20260101-000000.pdf");
}
