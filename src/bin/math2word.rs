//! CLI binary for edgequake-math2word.
//!
//! A thin shim over the library crate: each input runs through its own
//! `SessionController`, and the resulting `.doc` files land in the output
//! directory.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_math2word::pipeline::input::resolve_input;
use edgequake_math2word::{
    ConversionConfig, ConversionProgressCallback, DirectorySink, HtmlPolicy, ObjectUrlRegistry,
    PreviewAllocator, ProgressCallback, SessionController, SessionSnapshot, SessionState,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner bar counting finished inputs, plus a log
/// line per file. Files may finish out of order when several run at once.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos}/{len} files  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, file_name: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(file_name)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Log a failure that happened before a session accepted the file.
    fn rejected(&self, input: &str, error: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), input, red(&shorten(error))));
    }

    fn input_done(&self) {
        self.bar.inc(1);
    }

    fn finish(&self, failed: usize, total: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} converted successfully",
                green("✔"),
                bold(&plural(total, "file"))
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, file_name: &str, size_bytes: u64) {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(file_name.to_string(), Instant::now());
        self.bar.set_message(format!(
            "{file_name} {}",
            dim(&format!("({})", human_bytes(size_bytes)))
        ));
    }

    fn on_conversion_complete(&self, file_name: &str, html_len: usize) {
        let secs = self.elapsed_secs(file_name);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            file_name,
            dim(&format!("{html_len:>6} chars")),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_conversion_error(&self, file_name: &str, error: &str) {
        let secs = self.elapsed_secs(file_name);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            file_name,
            red(&shorten(error)),
            dim(&format!("{secs:.1}s")),
        ));
    }
}

fn shorten(msg: &str) -> String {
    let first = msg.lines().next().unwrap_or_default();
    if first.chars().count() > 80 {
        format!("{}\u{2026}", first.chars().take(79).collect::<String>())
    } else {
        first.to_string()
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn human_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    let n = n as f64;
    if n < KB {
        format!("{n} B")
    } else if n < KB * KB {
        format!("{:.1} KB", n / KB)
    } else {
        format!("{:.1} MB", n / (KB * KB))
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF; writes notes.doc in the current directory
  math2word notes.pdf

  # Several inputs, written to out/
  math2word scan1.png scan2.jpg lecture.pdf -o out/

  # Print the HTML fragment instead of only writing the .doc
  math2word --html whiteboard.jpg

  # Session snapshot as JSON (state, file, output, error)
  math2word --json notes.pdf > notes.json

  # Standalone HTML preview next to the Word file
  math2word notes.pdf --preview notes.html

  # Strip scripts and event handlers from the model output
  math2word --sanitize notes.pdf

  # Convert from a URL
  math2word https://arxiv.org/pdf/1706.03762

WORD IMPORT:
  The .doc file is HTML with Office namespaces. Word converts the embedded
  MathML into native, editable equations when it opens the file.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (read at conversion time)
  MATH2WORD_MODEL         Override model ID
  MATH2WORD_PROVIDER      Override provider
  RUST_LOG                Override log filter (e.g. debug)

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Convert:         math2word notes.pdf
"#;

/// Convert PDFs and images to Word documents with editable equations.
#[derive(Parser, Debug)]
#[command(
    name = "math2word",
    version,
    about = "Convert PDFs and images to Word documents with editable equations",
    long_about = "Convert PDF documents and images (local files, URLs or data: URLs) to Word \
documents. A Vision Language Model transcribes the document to HTML with MathML, which Word \
turns into native, editable equations.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths, HTTP/HTTPS URLs or data: URLs (PDF or image).
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Directory for the generated .doc files.
    #[arg(short, long, env = "MATH2WORD_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Also print the HTML fragment to stdout.
    #[arg(long, conflicts_with = "json")]
    html: bool,

    /// Print the session snapshot as JSON to stdout.
    #[arg(long, env = "MATH2WORD_JSON")]
    json: bool,

    /// Write a standalone HTML preview to this file (a directory when
    /// several inputs are given).
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Model ID.
    #[arg(long, env = "MATH2WORD_MODEL", default_value = "gemini-2.5-flash")]
    model: String,

    /// LLM provider passed to edgequake-llm.
    #[arg(long, env = "MATH2WORD_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "MATH2WORD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens for the model response.
    #[arg(long, env = "MATH2WORD_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Environment variable holding the API key. For providers other than
    /// gemini, name the variable that provider reads (e.g. OPENAI_API_KEY).
    #[arg(long, env = "MATH2WORD_API_KEY_ENV", default_value = "GEMINI_API_KEY")]
    api_key_env: String,

    /// Path to a text file containing a custom system instruction.
    #[arg(long, env = "MATH2WORD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Remove scripts, embeds and event handlers from the model output.
    #[arg(long, env = "MATH2WORD_SANITIZE")]
    sanitize: bool,

    /// Reject uploads larger than this many megabytes.
    #[arg(long, env = "MATH2WORD_MAX_SIZE_MB")]
    max_size_mb: Option<u64>,

    /// Number of inputs converted at the same time.
    #[arg(short, long, env = "MATH2WORD_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u64).range(1..=32))]
    concurrency: u64,

    /// Model call timeout in seconds.
    #[arg(long, env = "MATH2WORD_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MATH2WORD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "MATH2WORD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MATH2WORD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MATH2WORD_QUIET")]
    quiet: bool,
}

/// Result of one input, as printed with `--json`.
#[derive(Debug, Serialize)]
struct InputReport {
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl InputReport {
    fn failed(input: &str, error: impl ToString) -> Self {
        Self {
            input: input.to_string(),
            session: None,
            document: None,
            preview: None,
            error: Some(error.to_string()),
        }
    }

    fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn html(&self) -> Option<&str> {
        self.session.as_ref()?.output.as_ref().map(|o| o.html())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters, so library INFO logs
    // are hidden while it runs.
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

    let progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|p| p as Arc<dyn ConversionProgressCallback>),
    )
    .await?;

    let previews: Arc<dyn PreviewAllocator> = Arc::new(ObjectUrlRegistry::new());
    // One sink for the whole run, so same-named inputs get distinct files.
    let sink = DirectorySink::new(&cli.output_dir);
    let total = cli.inputs.len();

    // ── Run sessions ─────────────────────────────────────────────────────
    let (cli_ref, config_ref, previews_ref, progress_ref, sink_ref) =
        (&cli, &config, &previews, &progress, &sink);
    let mut reports: Vec<(usize, InputReport)> = stream::iter(cli.inputs.iter().enumerate())
        .map(move |(idx, input)| {
            let config = config_ref.clone();
            let previews = previews_ref.clone();
            let progress = progress_ref.clone();
            let cli = cli_ref;
            async move {
                let report = run_input(input, config, previews, sink_ref, cli).await;
                if let Some(ref p) = progress {
                    if report.session.is_none() {
                        if let Some(ref e) = report.error {
                            p.rejected(input, e);
                        }
                    }
                    p.input_done();
                }
                (idx, report)
            }
        })
        .buffer_unordered(cli.concurrency as usize)
        .collect()
        .await;
    reports.sort_by_key(|(idx, _)| *idx);
    let reports: Vec<InputReport> = reports.into_iter().map(|(_, r)| r).collect();

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if let Some(ref p) = progress {
        p.finish(failed, total);
    }

    // ── Stdout ───────────────────────────────────────────────────────────
    if cli.json {
        let json = if reports.len() == 1 {
            serde_json::to_string_pretty(&reports[0])
        } else {
            serde_json::to_string_pretty(&reports)
        }
        .context("Failed to serialise session report")?;
        println!("{json}");
    } else if cli.html {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for html in reports.iter().filter_map(|r| r.html()) {
            handle
                .write_all(html.as_bytes())
                .context("Failed to write to stdout")?;
            if !html.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet && !cli.json {
        for report in &reports {
            match (&report.document, &report.error) {
                (Some(doc), _) => {
                    if !show_progress {
                        eprintln!("{}  {}", green("✔"), bold(&doc.display().to_string()));
                    }
                    if let Some(stats) = report
                        .session
                        .as_ref()
                        .and_then(|s| s.output.as_ref())
                        .map(|o| o.stats())
                    {
                        eprintln!(
                            "   {} tokens in  /  {} tokens out  —  {}ms",
                            dim(&stats.input_tokens.to_string()),
                            dim(&stats.output_tokens.to_string()),
                            stats.duration_ms,
                        );
                    }
                }
                (None, Some(err)) if !show_progress => {
                    eprintln!("{} {}: {}", red("✘"), report.input, err);
                }
                _ => {}
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} failed", plural(failed, "input"), total);
    }
    Ok(())
}

/// Resolve, convert and export one input in its own session.
async fn run_input(
    input: &str,
    config: ConversionConfig,
    previews: Arc<dyn PreviewAllocator>,
    sink: &DirectorySink,
    cli: &Cli,
) -> InputReport {
    let selected = match resolve_input(input, config.download_timeout_secs).await {
        Ok(s) => s,
        Err(e) => return InputReport::failed(input, e),
    };
    let mut controller = SessionController::new(config, previews);
    let state = match controller.submit(selected).await {
        Ok(state) => state,
        Err(e) => return InputReport::failed(input, e),
    };

    let mut report = InputReport {
        input: input.to_string(),
        session: Some(controller.snapshot()),
        document: None,
        preview: None,
        error: None,
    };

    if state != SessionState::Success {
        report.error = Some(
            controller
                .session()
                .error()
                .unwrap_or("Conversion failed. Please try again.")
                .to_string(),
        );
        return report;
    }

    let doc_path = match controller.download(sink).await {
        Ok(path) => path,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };
    report.document = Some(doc_path.clone());

    if let Some(ref target) = cli.preview {
        let path = preview_path(target, &doc_path, cli.inputs.len());
        if let Some(page) = controller.preview_html() {
            match write_preview(&path, &page).await {
                Ok(()) => report.preview = Some(path),
                Err(e) => report.error = Some(format!("{e:#}")),
            }
        }
    }
    report
}

/// `--preview` names a file for one input and a directory for several.
/// Pages in a directory follow the name of the written `.doc`.
fn preview_path(target: &Path, doc_path: &Path, input_count: usize) -> PathBuf {
    if input_count == 1 {
        return target.to_path_buf();
    }
    target.join(doc_path.with_extension("html").file_name().unwrap_or_default())
}

async fn write_preview(path: &Path, page: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, page)
        .await
        .with_context(|| format!("Failed to write preview to {}", path.display()))
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .model(&cli.model)
        .provider_name(&cli.provider)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_key_env(&cli.api_key_env)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if cli.sanitize {
        builder = builder.html_policy(HtmlPolicy::StripActive);
    }
    if let Some(mb) = cli.max_size_mb {
        builder = builder.max_upload_bytes(mb.saturating_mul(1024 * 1024));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
