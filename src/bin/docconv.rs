//! CLI binary for edgequake-docconv.
//!
//! A thin shim over the library crate: it validates and stages each input
//! as a scratch copy, converts the batch, then copies the artifacts next to
//! each other in the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docconv::{
    formats_manifest, validate_upload, ConversionConfig, ConversionProgressCallback,
    ConversionRequest, ConversionResult, ConvertError, Converter, DocumentFormat,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the whole batch; strategy attempts show as the message and
/// failed attempts are logged above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, from: DocumentFormat, to: DocumentFormat, strategies: usize) {
        self.bar
            .set_message(format!("{from} → {to}  {}", dim(&format!("{strategies} strategies"))));
    }

    fn on_attempt_start(&self, strategy: &str, attempt: usize, total: usize) {
        if attempt > 1 {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.set_message(format!("{strategy} ({attempt}/{total})"));
    }

    fn on_attempt_failed(&self, strategy: &str, error: &str) {
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            strategy,
            dim(&truncate(error, 80))
        ));
    }

    fn on_conversion_complete(&self, _success: bool) {
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word document to PDF (LibreOffice, then the HTML fallback)
  docconv report.docx --to pdf

  # Several PDFs to spreadsheets, written to ./sheets
  docconv a.pdf b.pdf --to xlsx -o sheets

  # Plain text to PDF, JSON report
  docconv notes.txt --to pdf --json

  # List supported conversions
  docconv --formats

  # Remove scratch files older than 24 hours
  docconv --cleanup-older-than 24

SUPPORTED CONVERSIONS:
  DOC/DOCX → PDF    PDF → DOCX    PDF → XLSX    XLSX → PDF    PDF → PPTX
  PPTX → PDF        PDF → TXT     TXT → PDF     PDF → HTML    HTML → PDF

ENVIRONMENT VARIABLES:
  DOCCONV_SCRATCH_DIR     Scratch root (uploads/ and outputs/)
  DOCCONV_CHROMIUM        Headless Chromium binary for HTML → PDF
  DOCCONV_SOFFICE         LibreOffice binary for DOC/DOCX → PDF
  RUST_LOG                Override the log filter (e.g. edgequake_docconv=debug)

Your input files are never modified: each one is copied into scratch storage
and the copy is what gets consumed by the conversion.
"#;

/// Convert documents between DOC/DOCX, PDF, XLSX, PPTX, TXT and HTML.
#[derive(Parser, Debug)]
#[command(
    name = "docconv",
    version,
    about = "Convert documents between DOC/DOCX, PDF, XLSX, PPTX, TXT and HTML",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to convert.
    inputs: Vec<PathBuf>,

    /// Target format: pdf, docx, xlsx, pptx, txt, html.
    #[arg(short, long, env = "DOCCONV_TO")]
    to: Option<DocumentFormat>,

    /// Directory for converted files.
    #[arg(short, long, env = "DOCCONV_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Scratch root holding uploads/ and outputs/.
    #[arg(long, env = "DOCCONV_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Headless Chromium binary.
    #[arg(long, env = "DOCCONV_CHROMIUM", default_value = "chromium")]
    chromium: PathBuf,

    /// LibreOffice binary.
    #[arg(long, env = "DOCCONV_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// Timeout for one external engine call, in seconds.
    #[arg(long, env = "DOCCONV_ENGINE_TIMEOUT", default_value_t = 120)]
    engine_timeout: u64,

    /// Number of files converted at once.
    #[arg(short, long, env = "DOCCONV_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print a JSON report instead of text.
    #[arg(long, env = "DOCCONV_JSON")]
    json: bool,

    /// Print the supported formats and conversions as JSON, then exit.
    #[arg(long)]
    formats: bool,

    /// Remove scratch files older than this many hours before converting.
    #[arg(long, value_name = "HOURS")]
    cleanup_older_than: Option<u64>,

    /// Disable progress bar.
    #[arg(long, env = "DOCCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCCONV_QUIET")]
    quiet: bool,
}

/// One line of the JSON report.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ConversionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attempted_strategies: Vec<edgequake_docconv::StrategyAttempt>,
}

impl Report {
    fn failed(input: &Path, err: &ConvertError) -> Self {
        Self {
            input: input.to_path_buf(),
            output: None,
            result: None,
            error: Some(err.to_string()),
            attempted_strategies: err
                .failure()
                .map(|f| f.attempted_strategies.clone())
                .unwrap_or_default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    // ── Discovery ────────────────────────────────────────────────────────
    if cli.formats {
        println!(
            "{}",
            serde_json::to_string_pretty(&formats_manifest())
                .context("Failed to serialise formats")?
        );
        return Ok(());
    }

    let progress = if show_progress && !cli.inputs.is_empty() {
        Some(CliProgressCallback::new(cli.inputs.len()))
    } else {
        None
    };
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;
    let converter = Converter::new(config);

    // ── Scratch cleanup ──────────────────────────────────────────────────
    if let Some(hours) = cli.cleanup_older_than {
        let removed = converter
            .storage()
            .cleanup_stale(Duration::from_secs(hours * 3600))
            .await;
        if !cli.quiet && !cli.json {
            eprintln!("{} removed {} stale scratch files", cyan("◆"), removed);
        }
        if cli.inputs.is_empty() {
            return Ok(());
        }
    }

    let target = cli
        .to
        .context("--to is required when converting files")?;
    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;

    // ── Stage inputs ─────────────────────────────────────────────────────
    let start = Instant::now();
    let mut reports: Vec<Option<Report>> = Vec::with_capacity(cli.inputs.len());
    let mut staged: Vec<(usize, ConversionRequest)> = Vec::new();
    for (idx, input) in cli.inputs.iter().enumerate() {
        match stage(&converter, input, target).await {
            Ok(request) => {
                staged.push((idx, request));
                reports.push(None);
            }
            Err(e) => {
                if let Some(ref cb) = progress {
                    cb.bar.inc(1);
                }
                reports.push(Some(Report::failed(input, &e)));
            }
        }
    }

    // ── Convert ──────────────────────────────────────────────────────────
    let (indices, requests): (Vec<usize>, Vec<ConversionRequest>) = staged.into_iter().unzip();
    let results = converter.convert_batch(requests, cli.concurrency).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }

    // ── Collect artifacts ────────────────────────────────────────────────
    let outputs_dir = converter.storage().outputs_dir();
    let mut claimed = HashSet::new();
    for (idx, outcome) in indices.into_iter().zip(results) {
        let input = &cli.inputs[idx];
        let report = match outcome {
            Ok(result) => {
                let scratch = outputs_dir.join(&result.output_file);
                let dest = unique_destination(&cli.output_dir, input, target, &mut claimed);
                deliver(input, &scratch, dest, result).await
            }
            Err(e) => Report::failed(input, &e),
        };
        reports[idx] = Some(report);
    }
    let reports: Vec<Report> = reports.into_iter().flatten().collect();
    let failed = reports.iter().filter(|r| r.error.is_some()).count();

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        for report in &reports {
            print_report(report);
        }
        let fallbacks = progress
            .as_ref()
            .map(|cb| cb.fallbacks.load(Ordering::SeqCst))
            .unwrap_or(0);
        eprintln!(
            "{} {}/{} converted in {}ms{}",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&(reports.len() - failed).to_string()),
            reports.len(),
            start.elapsed().as_millis(),
            if fallbacks > 0 {
                dim(&format!("  ({fallbacks} fallback attempts)"))
            } else {
                String::new()
            },
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", reports.len());
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .chromium_path(&cli.chromium)
        .soffice_path(&cli.soffice)
        .engine_timeout_secs(cli.engine_timeout);

    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Validate `input` and copy it into scratch uploads.
async fn stage(
    converter: &Converter,
    input: &Path,
    target: DocumentFormat,
) -> Result<ConversionRequest, ConvertError> {
    let meta = tokio::fs::metadata(input)
        .await
        .map_err(|_| ConvertError::InputNotFound {
            path: input.to_path_buf(),
        })?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = validate_upload(&name, meta.len(), converter.config().max_upload_bytes)?;

    let bytes = tokio::fs::read(input)
        .await
        .map_err(|_| ConvertError::InputNotFound {
            path: input.to_path_buf(),
        })?;
    let path = converter.storage().stage_upload(format, &bytes).await?;
    converter.storage().request_for(&path, target)
}

/// `dir/{stem}.{ext}` for `input`, suffixed `-1`, `-2`, ... when an earlier
/// input of the batch already claimed that name.
fn unique_destination(
    dir: &Path,
    input: &Path,
    target: DocumentFormat,
    claimed: &mut HashSet<PathBuf>,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let ext = target.extension();
    let mut candidate = dir.join(format!("{stem}.{ext}"));
    let mut n = 1;
    while !claimed.insert(candidate.clone()) {
        candidate = dir.join(format!("{stem}-{n}.{ext}"));
        n += 1;
    }
    candidate
}

/// Copy a finished artifact out of scratch storage and report it.
///
/// The scratch copy is removed whether or not the copy succeeds.
async fn deliver(input: &Path, scratch: &Path, dest: PathBuf, result: ConversionResult) -> Report {
    let copied = tokio::fs::copy(scratch, &dest).await;
    if let Err(e) = tokio::fs::remove_file(scratch).await {
        tracing::warn!("Failed to remove {}: {}", scratch.display(), e);
    }
    match copied {
        Ok(_) => Report {
            input: input.to_path_buf(),
            output: Some(dest),
            result: Some(result),
            error: None,
            attempted_strategies: Vec::new(),
        },
        Err(e) => Report {
            input: input.to_path_buf(),
            output: None,
            result: None,
            error: Some(format!("Failed to write {}: {}", dest.display(), e)),
            attempted_strategies: Vec::new(),
        },
    }
}

fn print_report(report: &Report) {
    match (&report.result, &report.output, &report.error) {
        (Some(result), Some(output), _) => eprintln!(
            "  {} {} → {}  {}",
            green("✓"),
            report.input.display(),
            bold(&output.display().to_string()),
            dim(&format!("{} bytes, {}", result.file_size, result.strategy)),
        ),
        (_, _, Some(error)) => {
            eprintln!("  {} {}  {}", red("✗"), report.input.display(), red(error));
            for attempt in &report.attempted_strategies {
                eprintln!(
                    "      {} {}",
                    dim(&attempt.strategy),
                    dim(&truncate(&attempt.error, 100))
                );
            }
        }
        _ => {}
    }
}
