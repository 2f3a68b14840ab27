//! CLI binary for scanlate.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one stage over a directory and prints a summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scanlate::pipeline::render::bind_pdfium;
use scanlate::{BatchReport, Pipeline, PipelineConfig, PipelineProgressCallback, ProgressCallback};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

/// Terminal progress: one bar per document plus a log line per page.
struct CliProgressCallback {
    /// Bar of the document in progress.
    bar: Mutex<Option<ProgressBar>>,
    /// Start time of the page in flight.
    page_started: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            page_started: Mutex::new(HashMap::new()),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            f(bar);
        }
    }

    fn page_elapsed(&self, page_number: usize) -> String {
        let ms = self
            .page_started
            .lock()
            .unwrap()
            .remove(&page_number)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total_pages as u64);
        bar.set_style(style);
        bar.set_prefix(document.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{document}: {total_pages} pages"))
        ));
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn on_page_start(&self, page_number: usize, _total_pages: usize) {
        self.page_started
            .lock()
            .unwrap()
            .insert(page_number, Instant::now());
        self.with_bar(|bar| bar.set_message(format!("page {page_number}")));
    }

    fn on_page_complete(&self, page_number: usize, total_pages: usize, output_len: usize) {
        let elapsed = self.page_elapsed(page_number);
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Page {:>3}/{:<3}  {:<8}  {}",
                green("✓"),
                page_number,
                total_pages,
                dim(&format!("{output_len:>5} chars")),
                elapsed,
            ));
            bar.inc(1);
        });
    }

    fn on_page_error(&self, page_number: usize, total_pages: usize, error: &str) {
        let elapsed = self.page_elapsed(page_number);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}  {}",
                red("✗"),
                page_number,
                total_pages,
                red(&msg),
                elapsed,
            ));
            bar.inc(1);
        });
    }

    fn on_page_resumed(&self, _page_number: usize, _total_pages: usize) {
        self.with_bar(|bar| bar.inc(1));
    }

    fn on_document_complete(&self, total_pages: usize, success_count: usize) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
        let failed = total_pages.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} pages done", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages done  ({} stored with a failure marker)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

/// Plain-text progress for `--no-progress`: one line per page on stderr.
struct PlainProgressCallback;

impl PipelineProgressCallback for PlainProgressCallback {
    fn on_document_start(&self, document: &str, total_pages: usize) {
        eprintln!("Processing {document} ({total_pages} pages)");
    }

    fn on_page_complete(&self, page_number: usize, total_pages: usize, _output_len: usize) {
        eprintln!("  page {page_number}/{total_pages} done");
    }

    fn on_page_error(&self, page_number: usize, total_pages: usize, error: &str) {
        eprintln!("  page {page_number}/{total_pages} FAILED: {error}");
    }

    fn on_page_resumed(&self, page_number: usize, total_pages: usize) {
        eprintln!("  page {page_number}/{total_pages} kept from previous run");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR every PDF in ./pdfs into ./output/<name>_ocr.json
  scanlate ocr

  # Translate all OCR results in ./output to English
  scanlate translate

  # Then to Urdu
  scanlate urdu

  # Continue an interrupted run instead of starting over
  scanlate ocr --resume

  # Faster pacing on a paid tier
  scanlate translate --request-interval 1 --model gemini-2.0-flash

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (required for the default provider)
  SCANLATE_PROVIDER       Override provider (gemini, openai, anthropic, ollama)
  SCANLATE_MODEL          Override model ID
  PDFIUM_LIB_PATH         libpdfium file, or the directory containing it
  RUST_LOG                Log filter, e.g. scanlate=debug

A .env file in the working directory is loaded on startup.
"#;

/// OCR scanned German PDFs and translate them to English and Urdu.
#[derive(Parser, Debug)]
#[command(
    name = "scanlate",
    version,
    about = "OCR scanned German PDFs and translate them to English and Urdu",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR every PDF in a directory into <name>_ocr.json snapshots.
    Ocr {
        /// Directory containing the scanned PDFs.
        #[arg(long, env = "SCANLATE_INPUT_DIR", default_value = "pdfs")]
        input_dir: PathBuf,

        /// Directory receiving the OCR snapshots.
        #[arg(long, env = "SCANLATE_OUTPUT_DIR", default_value = "output")]
        output_dir: PathBuf,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "SCANLATE_PDF_PASSWORD")]
        password: Option<String>,

        /// Longest edge of a rendered page in pixels.
        #[arg(long = "max-pixels", env = "SCANLATE_MAX_PIXELS", default_value_t = 2000)]
        max_pixels: u32,
    },

    /// Translate every <name>_ocr.json into <name>_translated.json (German → English).
    Translate {
        /// Directory holding the OCR snapshots.
        #[arg(long, env = "SCANLATE_DIR", default_value = "output")]
        dir: PathBuf,
    },

    /// Translate every <name>_translated.json into <name>_urdu.json (English → Urdu).
    Urdu {
        /// Directory holding the translated snapshots.
        #[arg(long, env = "SCANLATE_DIR", default_value = "output")]
        dir: PathBuf,
    },
}

/// Settings shared by every subcommand.
#[derive(Args, Debug)]
struct Settings {
    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, global = true, env = "SCANLATE_PROVIDER", default_value = scanlate::config::DEFAULT_PROVIDER)]
    provider: String,

    /// Model ID.
    #[arg(long, global = true, env = "SCANLATE_MODEL", default_value = scanlate::config::DEFAULT_MODEL)]
    model: String,

    /// Seconds between two consecutive requests.
    #[arg(long, global = true, env = "SCANLATE_REQUEST_INTERVAL", default_value_t = 5.0)]
    request_interval: f64,

    /// Attempts per page, the first one included.
    #[arg(long, global = true, env = "SCANLATE_MAX_ATTEMPTS", default_value_t = 12)]
    max_attempts: u32,

    /// First backoff delay in seconds.
    #[arg(long, global = true, env = "SCANLATE_BACKOFF_BASE", default_value_t = 2.0)]
    backoff_base: f64,

    /// Longest backoff delay in seconds.
    #[arg(long, global = true, env = "SCANLATE_BACKOFF_CAP", default_value_t = 60.0)]
    backoff_cap: f64,

    /// Per-attempt timeout in seconds (0 disables it).
    #[arg(long, global = true, env = "SCANLATE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Sampling temperature.
    #[arg(long, global = true, env = "SCANLATE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens per request.
    #[arg(long, global = true, env = "SCANLATE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Keep pages from an existing compatible output file and continue after them.
    #[arg(long, global = true, env = "SCANLATE_RESUME")]
    resume: bool,

    /// Plain log lines instead of a progress bar.
    #[arg(long, global = true, env = "SCANLATE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCANLATE_VERBOSE")]
    verbose: bool,
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("--{flag} must be a non-negative number of seconds"))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: ProgressCallback) -> Result<PipelineConfig> {
    let s = &cli.settings;
    let mut builder = PipelineConfig::builder()
        .provider_name(&s.provider)
        .model(&s.model)
        .request_interval(seconds("request-interval", s.request_interval)?)
        .max_attempts(s.max_attempts)
        .backoff_base(seconds("backoff-base", s.backoff_base)?)
        .backoff_cap(seconds("backoff-cap", s.backoff_cap)?)
        .api_timeout_secs(s.api_timeout)
        .temperature(s.temperature)
        .max_tokens(s.max_tokens)
        .resume(s.resume)
        .progress_callback(progress);

    if let Command::Ocr {
        password,
        max_pixels,
        ..
    } = &cli.command
    {
        builder = builder.max_rendered_pixels(*max_pixels);
        if let Some(pwd) = password {
            builder = builder.password(pwd);
        }
    }

    Ok(builder.build()?)
}

fn print_report(stage: &str, report: &BatchReport) {
    for file in report.files.iter().filter(|f| f.error.is_some()) {
        eprintln!(
            "  {} {}  {}",
            red("✗"),
            file.input.display(),
            red(file.error.as_deref().unwrap_or_default())
        );
    }
    eprintln!(
        "{} {}: {} file(s) done, {} failed, {} page(s) with a failure marker",
        if report.failed() == 0 && report.failed_pages() == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stage,
        report.succeeded(),
        report.failed(),
        report.failed_pages(),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the per-page feedback; keep library logs to
    // errors unless asked otherwise.
    let show_progress = !cli.settings.no_progress;
    let filter = if cli.settings.verbose {
        "debug"
    } else if show_progress {
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

    let progress: ProgressCallback = if show_progress {
        CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>
    } else {
        Arc::new(PlainProgressCallback)
    };

    let config = build_config(&cli, progress).context("Invalid configuration")?;
    let pipeline = Pipeline::from_config(config).context("Cannot start the pipeline")?;

    if matches!(cli.command, Command::Ocr { .. }) {
        bind_pdfium().context("Cannot load pdfium")?;
    }

    // ── Run stage ────────────────────────────────────────────────────────
    let (stage, report) = match &cli.command {
        Command::Ocr {
            input_dir,
            output_dir,
            ..
        } => (
            "ocr",
            pipeline
                .ocr_directory(input_dir, output_dir)
                .await
                .context("OCR failed")?,
        ),
        Command::Translate { dir } => (
            "translate",
            pipeline
                .translate_directory(dir)
                .await
                .context("Translation failed")?,
        ),
        Command::Urdu { dir } => (
            "urdu",
            pipeline
                .urdu_directory(dir)
                .await
                .context("Urdu translation failed")?,
        ),
    };

    print_report(stage, &report);
    Ok(())
}
