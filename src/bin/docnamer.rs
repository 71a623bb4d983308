//! CLI binary for docnamer.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, prints the suggestions, and optionally saves a renamed
//! copy.

use anyhow::{Context, Result};
use clap::Parser;
use docnamer::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use docnamer::pipeline::input;
use docnamer::{
    save_as, suggest_names, NamingReport, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner whose message follows the current stage,
/// plus a log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        self.bar
            .set_message(format!("OCR page {page_num}/{total_pages}"));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<22} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        let msg: String = if first_line.chars().count() > 80 {
            let head: String = first_line.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            first_line.to_string()
        };
        self.bar
            .println(format!("  {} {:<22} {}", red("✗"), stage.to_string(), red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Suggest names for a scanned CV
  docnamer scan.pdf

  # Word document, explicit model
  docnamer --model deepseek-ai/DeepSeek-V3 "Document1.docx"

  # Save a renamed copy using the first suggestion
  docnamer --pick 1 --save-dir renamed/ IMG_2041.jpg

  # Save a renamed copy under a hand-edited name in the current directory
  docnamer --save-as Jane_Doe_CV_2024.pdf scan.pdf

  # Machine-readable report
  docnamer --json cv.pdf > report.json

  # Any OpenAI-compatible endpoint
  docnamer --base-url http://localhost:8000/v1 --model local-model cv.pdf

SUPPORTED INPUTS:
  application/pdf       text layer, OCR fallback for scans
  image/png, image/jpeg OCR
  .docx                 body paragraphs

ENVIRONMENT VARIABLES:
  TOGETHER_API_KEY      API key for the classification endpoint
  DOCNAMER_MODEL        Override model ID
  DOCNAMER_BASE_URL     Override API base URL
  PDFIUM_LIB_PATH       Path to libpdfium (file or directory)
  RUST_LOG              Override log filter (e.g. docnamer=debug)

SETUP:
  1. Install tesseract (only needed for scans and images)
  2. Make libpdfium available (only needed for PDFs)
  3. export TOGETHER_API_KEY=...
"#;

/// Suggest descriptive filenames for CVs, cover letters and proposals.
#[derive(Parser, Debug)]
#[command(
    name = "docnamer",
    version,
    about = "Suggest descriptive filenames for documents from their content",
    long_about = "Extract text from a PDF, PNG/JPEG or DOCX document (OCR for scans), \
ask a hosted language model who and what the document is about, and print \
filename suggestions such as Jane_Doe_Engineer_Acme_Resume.pdf.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    input: String,

    /// API key for the classification endpoint.
    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID sent to the chat-completions endpoint.
    #[arg(long, env = "DOCNAMER_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "DOCNAMER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// MIME type of the input (default: from the extension, then magic bytes).
    #[arg(long)]
    mime: Option<String>,

    /// Refuse inputs larger than this many MiB.
    #[arg(long, env = "DOCNAMER_MAX_SIZE_MB", default_value_t = 200)]
    max_size_mb: u64,

    /// Maximum PDF pages sent through OCR.
    #[arg(long, env = "DOCNAMER_MAX_OCR_PAGES", default_value_t = 50)]
    max_ocr_pages: usize,

    /// Wall-clock budget for OCR in seconds.
    #[arg(long, env = "DOCNAMER_OCR_TIMEOUT", default_value_t = 300)]
    ocr_timeout: u64,

    /// Tesseract language(s), e.g. eng or eng+deu.
    #[arg(long, env = "DOCNAMER_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Path to the tesseract executable.
    #[arg(long, env = "DOCNAMER_TESSERACT")]
    tesseract: Option<PathBuf>,

    /// Path to libpdfium (file or directory).
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCNAMER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Name used when classification failed or named no person. Pass an
    /// empty value to disable.
    #[arg(long, env = "DOCNAMER_FALLBACK_NAME", default_value = docnamer::config::DEFAULT_FALLBACK_NAME)]
    fallback_name: String,

    /// Path to a text file with a custom prompt containing {document}.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, default_value_t = 0.1)]
    temperature: f32,

    /// Classification request timeout in seconds.
    #[arg(long, env = "DOCNAMER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "DOCNAMER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output the full report as JSON.
    #[arg(long)]
    json: bool,

    /// Choose the Nth suggestion (1-based) and print only it.
    #[arg(long, group = "target", value_parser = clap::value_parser!(u64).range(1..))]
    pick: Option<u64>,

    /// Save a copy of the input under this name instead of a suggestion
    /// (e.g. an edited one). Goes to the current directory unless
    /// --save-dir is given.
    #[arg(long, group = "target", value_name = "NAME")]
    save_as: Option<String>,

    /// Save a copy of the input under the chosen name in this directory.
    #[arg(long, requires = "target")]
    save_dir: Option<PathBuf>,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCNAMER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCNAMER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "DOCNAMER_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters; keep library logs
    // quiet underneath it unless asked.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )
    .await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let document = input::resolve_input(
        &cli.input,
        cli.mime.as_deref(),
        config.max_input_bytes,
        config.download_timeout_secs,
    )
    .await;
    let document = match document {
        Ok(doc) => doc,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.finish();
            }
            return Err(e).with_context(|| format!("Failed to read '{}'", cli.input));
        }
    };

    let api_key = cli.api_key.clone().unwrap_or_default();
    let result = suggest_names(&document, &api_key, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let report = result.context("Naming failed")?;

    // ── Output ───────────────────────────────────────────────────────────
    let chosen = chosen_name(&cli, &report.variants)?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if chosen.is_none() {
        print_report(&report, cli.quiet);
    }

    if let Some(name) = chosen {
        match save_dir(&cli) {
            Some(dir) => {
                let path = save_as(&document, &name, dir)
                    .await
                    .context("Failed to save renamed copy")?;
                if !cli.json {
                    println!("{}", path.display());
                }
            }
            None if !cli.json => println!("{name}"),
            None => {}
        }
    }

    Ok(())
}

/// The name asked for with `--pick` or `--save-as`, if any.
fn chosen_name(cli: &Cli, variants: &[String]) -> Result<Option<String>> {
    if let Some(ref name) = cli.save_as {
        return Ok(Some(name.trim().to_string()));
    }
    match cli.pick {
        Some(n) => variants
            .get((n - 1) as usize)
            .cloned()
            .map(Some)
            .with_context(|| {
                format!(
                    "--pick {} is out of range: {} suggestion(s) available",
                    n,
                    variants.len()
                )
            }),
        None => Ok(None),
    }
}

/// Where to write the renamed copy; `--save-as` alone means here.
fn save_dir(cli: &Cli) -> Option<PathBuf> {
    match (&cli.save_dir, &cli.save_as) {
        (Some(dir), _) => Some(dir.clone()),
        (None, Some(_)) => Some(PathBuf::from(".")),
        (None, None) => None,
    }
}

/// Human-readable report: record on stderr, suggestions on stdout.
fn print_report(report: &NamingReport, quiet: bool) {
    if !quiet {
        let record = &report.classification.record;
        let show = |v: &str| if v.is_empty() { dim("—") } else { v.to_string() };
        eprintln!(
            "{} {}  {}",
            bold("Document:"),
            report.original_filename,
            dim(&format!(
                "({} chars via {:?}, {}ms)",
                report.extraction.text.chars().count(),
                report.extraction.method,
                report.duration_ms
            )),
        );
        if report.extraction.ocr_truncated {
            eprintln!(
                "  {} OCR stopped after {} pages",
                yellow("⚠"),
                report.extraction.ocr_pages
            );
        }
        eprintln!("  Type:     {}", show(&record.document_type));
        eprintln!("  Name:     {}", show(&record.candidate_name));
        eprintln!("  Position: {}", show(&record.job_title));
        eprintln!("  Company:  {}", show(&record.company));

        if let Some(ref e) = report.classification.error {
            eprintln!("  {} {}", yellow("⚠"), e);
        }
    }

    if report.variants.is_empty() {
        if !quiet {
            eprintln!(
                "{} No filename suggestions (nothing to name the document by)",
                yellow("⚠")
            );
        }
        return;
    }

    if !quiet {
        eprintln!("{}", bold("Suggestions:"));
    }
    for (i, name) in report.variants.iter().enumerate() {
        if quiet {
            println!("{name}");
        } else {
            println!("  {}. {}", i + 1, green(name));
        }
    }
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .model(&cli.model)
        .base_url(&cli.base_url)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .max_ocr_pages(cli.max_ocr_pages)
        .ocr_timeout_secs(cli.ocr_timeout)
        .ocr_language(&cli.ocr_lang)
        .max_input_bytes(cli.max_size_mb.saturating_mul(1024 * 1024))
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(ref path) = cli.tesseract {
        builder = builder.tesseract_path(path);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    builder = if cli.fallback_name.trim().is_empty() {
        builder.without_fallback_name()
    } else {
        builder.fallback_name(cli.fallback_name.trim())
    };
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
