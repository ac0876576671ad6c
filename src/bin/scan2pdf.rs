//! CLI binary for scan2pdf.
//!
//! A thin shim over the library crate: the image arguments play the role of
//! the file picker, `--name` is the output-filename field, running the
//! command is the primary action, and the written file is the download.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scan2pdf::{
    assemble, AssemblyConfig, AssemblyObserver, GeminiCleaner, Session, TempFileStore,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal observer: one bar that advances as each photo is cleaned and
/// shows the session's progress text as its message.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_assembly_start
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.green/238}] {pos}/{len}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AssemblyObserver for CliObserver {
    fn on_assembly_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
    }

    fn on_progress(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn on_item_cleaned(&self, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_assembly_complete(&self, page_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages assembled",
            green("✔"),
            bold(&page_count.to_string())
        );
    }

    fn on_assembly_error(&self, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✗"), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Clean two photos and assemble report.pdf in the current directory
  scan2pdf --name report page1.jpg page2.jpg

  # Write to an explicit path
  scan2pdf -o ~/Documents/contract.pdf photo.jpg

  # A different cleanup model
  scan2pdf --model gemini-2.5-flash-image page.png

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY   Google Gemini API key (required)
  SCAN2PDF_MODEL   Override the cleanup model ID

SETUP:
  1. Set the API key:   export GEMINI_API_KEY=...
  2. Assemble:          scan2pdf --name scans photo1.jpg photo2.jpg
"#;

/// Clean up photographed documents and assemble them into a single PDF.
#[derive(Parser, Debug)]
#[command(
    name = "scan2pdf",
    version,
    about = "Clean up photographed documents and assemble them into a single PDF",
    long_about = "Send each photographed page to an image model for cleanup (deskew, shadow \
removal, background whitening, crop) and lay the cleaned results onto A4 pages, one photo \
per page, in argument order.",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JPEG/PNG photos of document pages, in page order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output file name (".pdf" is appended if absent).
    #[arg(short = 'n', long, default_value = "document")]
    name: String,

    /// Write the PDF to this path instead of the resolved name in the
    /// current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cleanup model ID.
    #[arg(long, env = "SCAN2PDF_MODEL", default_value = "gemini-2.5-flash-image-preview")]
    model: String,

    /// Per-cleanup-call timeout in seconds.
    #[arg(long, env = "SCAN2PDF_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Mime type from the file extension; the surface accepts JPEG and PNG only.
fn mime_for(path: &Path) -> Result<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        other => bail!(
            "'{}' is not a JPEG or PNG (extension {:?})",
            path.display(),
            other
        ),
    }
}

/// Modification time in milliseconds since the epoch, 0 when unavailable.
fn modified_ms(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar provides the feedback that matters; keep library logs quiet
    // unless the user asks for them.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Startup configuration ────────────────────────────────────────────
    let mut builder = AssemblyConfig::builder()
        .model(&cli.model)
        .api_timeout_secs(cli.api_timeout);
    if show_progress {
        builder = builder.observer(CliObserver::new());
    }
    let config = builder.build().context("invalid configuration")?;

    // Missing GEMINI_API_KEY is fatal here, before any session exists.
    let cleaner = GeminiCleaner::from_env(&config)?;

    // ── Build the session from the arguments ─────────────────────────────
    let store = Arc::new(TempFileStore::new()?);
    let mut session = Session::new(store);
    session.set_output_name(&cli.name);

    for path in &cli.images {
        let mime = mime_for(path)?;
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        session.add_upload(&file_name, modified_ms(path), bytes, mime)?;
    }

    // ── Run the pipeline ─────────────────────────────────────────────────
    if let Err(e) = assemble(&mut session, &cleaner, &config).await {
        // The session's error text already reached the observer; the exit
        // code and anyhow chain carry the same failure to scripts.
        return Err(e.into());
    }

    let output = session
        .output()
        .expect("assembly returned Ok, output must exist");
    let target = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&output.file_name));
    std::fs::write(&target, &output.bytes)
        .with_context(|| format!("failed to write '{}'", target.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} Wrote {} ({} bytes)",
            green("✔"),
            bold(&target.display().to_string()),
            output.bytes.len()
        );
    }

    session.reset();
    Ok(())
}
