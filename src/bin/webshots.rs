//! CLI binary for webshots.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `CaptureConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webshots::progress::format_eta;
use webshots::{
    run, CaptureConfig, CaptureProgressCallback, CaptureResult, CaptureStatus, PageSource,
    ProgressCallback, RunSummary, StabilizeOptions, WebshotsError,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished page.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until the page count is known in `on_run_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Capturing");
    }
}

impl CaptureProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Capturing {total_pages} pages…"))
        ));
    }

    fn on_page_start(
        &self,
        _index: usize,
        _total: usize,
        eta: Option<Duration>,
        _url: &str,
        name: &str,
    ) {
        self.bar
            .set_message(format!("ETA {}  {}", format_eta(eta), name));
    }

    fn on_page_complete(&self, index: usize, total: usize, result: &CaptureResult) {
        let mark = match result.status {
            CaptureStatus::Ok => green("✓"),
            CaptureStatus::Partial => yellow("◐"),
            CaptureStatus::Failed => red("✗"),
        };
        let detail = match &result.error {
            Some(e) => {
                let msg = e.to_string();
                let msg = if msg.chars().count() > 80 {
                    format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
                } else {
                    msg
                };
                red(&msg)
            }
            None => dim(&result.page.final_name),
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            mark,
            index,
            total,
            result.page.source_url,
            detail,
            dim(&format!("{:.1}s", result.duration_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # One page
  webshots https://example.com

  # Every URL in a text file (whitespace, comma, semicolon or pipe separated)
  webshots --url-list urls.txt -o shots

  # A remote sitemap, keeping PDFs and images too
  webshots --sitemap-file https://example.com/sitemap.xml --include-nonhtml

  # Tidy captures: no sticky header, no cookie banner
  webshots --url-list urls.txt --defloat --hide-selectors "#onetrust-banner-sdk,.cookie-bar"

  # Capture first-load popups separately
  webshots https://example.com --modal-shot

  # Machine-readable summary
  webshots --url-list urls.txt --json > summary.json

OUTPUT:
  {out}/desktop/{name}_dt.png         1024×1080 viewport @2x
  {out}/mobile/{name}_mb.png          iPhone 12, 390×844 @3x
  {out}/screenshots_{timestamp}.pdf   every image, in input order

ENVIRONMENT VARIABLES:
  WEBSHOTS_*          Every flag, e.g. WEBSHOTS_OUT_DIR, WEBSHOTS_TIMEOUT_MS
  WEBSHOTS_CHROME     Chrome/Chromium executable
  PDFIUM_LIB_PATH     Path to an existing libpdfium
  RUST_LOG            Override log filtering (e.g. webshots=debug)
"##;

/// Capture desktop and mobile full-page screenshots into one PDF.
#[derive(Parser, Debug)]
#[command(
    name = "webshots",
    version,
    about = "Capture desktop and mobile full-page screenshots into one PDF",
    long_about = "Capture full-page desktop and mobile screenshots of one page, a URL list, \
or a sitemap with headless Chrome, and merge them in input order into a timestamped PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Single page URL (scheme optional).
    #[arg(env = "WEBSHOTS_URL")]
    url: Option<String>,

    /// Output directory.
    #[arg(short, long, env = "WEBSHOTS_OUT_DIR", default_value = "output")]
    out_dir: PathBuf,

    /// URL-list file: local path or http(s) URL.
    #[arg(long, env = "WEBSHOTS_URL_LIST")]
    url_list: Option<String>,

    /// Sitemap XML: local path or http(s) URL.
    #[arg(long, env = "WEBSHOTS_SITEMAP_FILE")]
    sitemap_file: Option<String>,

    /// Keep entries that look like PDFs, images or other non-HTML files.
    #[arg(long, env = "WEBSHOTS_INCLUDE_NONHTML")]
    include_nonhtml: bool,

    /// Ignore TLS certificate errors.
    #[arg(long, env = "WEBSHOTS_INSECURE")]
    insecure: bool,

    /// Navigation timeout per page, in milliseconds.
    #[arg(long, env = "WEBSHOTS_TIMEOUT_MS", default_value_t = 60_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,

    /// Turn fixed/sticky elements into absolute/static before capture.
    #[arg(long, env = "WEBSHOTS_DEFLOAT")]
    defloat: bool,

    /// Comma-separated CSS selectors to hide before capture.
    #[arg(long, env = "WEBSHOTS_HIDE_SELECTORS", default_value = "")]
    hide_selectors: String,

    /// Mark Important Safety Information sections as reached.
    #[arg(long, env = "WEBSHOTS_ISI_REACHED")]
    isi_reached: bool,

    /// Skip the settle scroll (also disables --isi-reached).
    #[arg(long, env = "WEBSHOTS_NO_SETTLE")]
    no_settle: bool,

    /// Capture a visible modal popup as its own image, then close it.
    #[arg(long, env = "WEBSHOTS_MODAL_SHOT")]
    modal_shot: bool,

    /// Chrome/Chromium executable (auto-detected if omitted).
    #[arg(long, env = "WEBSHOTS_CHROME")]
    chrome: Option<PathBuf>,

    /// HTTP download timeout for remote lists and sitemaps, in seconds.
    #[arg(long, env = "WEBSHOTS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "WEBSHOTS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "WEBSHOTS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WEBSHOTS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WEBSHOTS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Source and config ────────────────────────────────────────────────
    let source = PageSource::from_parts(
        cli.url.clone(),
        cli.url_list.clone(),
        cli.sitemap_file.clone(),
    )
    .context("Invalid arguments")?;

    let cli_progress = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn CaptureProgressCallback>);

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let outcome = run(&source, &config).await;
    clear_on_error(&outcome, cli_progress.as_deref());
    let summary = outcome.context("Capture failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Drop the spinner before anyhow prints a fatal error.
fn clear_on_error<T>(outcome: &Result<T, WebshotsError>, progress: Option<&CliProgressCallback>) {
    if let (Err(_), Some(cb)) = (outcome, progress) {
        cb.bar.finish_and_clear();
    }
}

/// Map CLI args to `CaptureConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CaptureConfig> {
    let stabilize = StabilizeOptions {
        settle: !cli.no_settle,
        isi_reached: cli.isi_reached,
        defloat: cli.defloat,
        hide_selectors: StabilizeOptions::parse_selectors(&cli.hide_selectors),
        ..StabilizeOptions::default()
    };

    let mut builder = CaptureConfig::builder()
        .out_dir(&cli.out_dir)
        .insecure_tls(cli.insecure)
        .timeout_ms(cli.timeout_ms)
        .include_non_html(cli.include_nonhtml)
        .stabilize(stabilize)
        .modal_shot(cli.modal_shot)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_path(chrome);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Final totals on stderr.
fn print_summary(summary: &RunSummary) {
    let mark = if summary.failed == 0 && summary.partial == 0 {
        green("✔")
    } else if summary.succeeded == 0 && summary.partial == 0 {
        red("✘")
    } else {
        cyan("⚠")
    };

    eprintln!(
        "{}  {} pages  {} ok  {} partial  {} failed  {}ms",
        mark,
        bold(&summary.total().to_string()),
        green(&summary.succeeded.to_string()),
        yellow(&summary.partial.to_string()),
        red(&summary.failed.to_string()),
        summary.duration_ms,
    );
    if !summary.skipped.is_empty() {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} non-HTML entries skipped (use --include-nonhtml to keep them)",
                summary.skipped.len()
            ))
        );
    }
    if !summary.warnings.is_empty() {
        eprintln!(
            "   {}",
            dim(&format!("{} malformed entries dropped", summary.warnings.len()))
        );
    }
    eprintln!(
        "   →  {}",
        bold(&summary.document_path.display().to_string())
    );
}
