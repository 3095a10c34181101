//! CLI binary for report2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, wraps the text model in the retry policy and prints
//! JSON on stdout. Logs and progress go to stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use report2json::pipeline::llm::resolve_provider;
use report2json::{
    extract_batch, load_document, LlmTextModel, NormalizeInput, Pipeline, PipelineConfig,
    PipelineProgressCallback, ProgressCallback, RetryingModel, Stage, VisionRecognizer,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Terminal progress: a spinner showing the current stage, upgraded to a
/// bar with a document counter when a batch starts.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Working");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting extraction of {total} document(s)…"))
        ));
    }

    fn on_stage(&self, filename: &str, stage: Stage) {
        self.bar.set_message(format!("{filename} {}", dim(stage.as_str())));
    }

    fn on_document_complete(&self, filename: &str) {
        self.bar.println(format!("  {} {}", green("✓"), filename));
        self.bar.inc(1);
    }

    fn on_document_error(&self, filename: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = match error.char_indices().nth(100) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), filename, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(succeeded);
        if failed == 0 {
            eprintln!(
                "{} {} document(s) extracted",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) extracted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR + normalisation of several scans, envelopes as a JSON array
  report2json extract card1.pdf card2.jpg -o envelopes.json

  # Text to a validated report card
  report2json normalize --text-file ocr.txt --source ocr --raw-format .png

  # Fields already extracted upstream
  report2json normalize --json-file fields.json

  # Full run from a URL, French card translated first
  report2json --translate process https://school.example/card.png

  # Custom extraction prompt
  report2json --prompt-template prompt.json normalize --stdin < ocr.txt

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY               OpenAI API key
  ANTHROPIC_API_KEY            Anthropic API key
  GEMINI_API_KEY               Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER       Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL              Override model ID
  REPORT2JSON_PROMPT_TEMPLATE  Prompt template override file
  PDFIUM_LIB_PATH              Path to an existing libpdfium (file or directory)
  RUST_LOG                     Log filter, e.g. report2json=debug

PROMPT TEMPLATES:
  A template file is a JSON object with a "prompt" or "template" string, a
  JSON string, or plain text. It must contain the {input_text} placeholder.
"#;

/// Turn scanned report cards into validated JSON records.
#[derive(Parser, Debug)]
#[command(
    name = "report2json",
    version,
    about = "Turn scanned report cards into validated JSON records",
    long_about = "Recognise text on scanned or photographed report cards (PDF, PNG, JPEG, TIFF, BMP), \
normalise it, and extract a schema-conformant ReportCard record with a generative model. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR + normalisation + structuring; prints a JSON array of envelopes.
    Extract {
        /// Local files or HTTP/HTTPS URLs.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Text or structured fields to a validated ReportCard.
    Normalize {
        /// Read free text from this file.
        #[arg(long, conflicts_with_all = ["json_file", "stdin", "text"])]
        text_file: Option<PathBuf>,

        /// Read a JSON object of already-extracted fields from this file.
        #[arg(long, conflicts_with_all = ["stdin", "text"])]
        json_file: Option<PathBuf>,

        /// Read free text from stdin.
        #[arg(long, conflicts_with = "text")]
        stdin: bool,

        /// Free text given inline.
        #[arg(long)]
        text: Option<String>,

        /// `source` tag for the prompt.
        #[arg(long, env = "REPORT2JSON_SOURCE", default_value = "unknown")]
        source: String,

        /// `raw_format` tag for the prompt.
        #[arg(long, env = "REPORT2JSON_RAW_FORMAT", default_value = "text")]
        raw_format: String,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full run: document → envelope → ReportCard.
    Process {
        /// Local file or HTTP/HTTPS URL.
        input: String,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Text model for normalisation (default: gpt-4o-mini).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision model for recognition (default: gpt-4.1-nano).
    #[arg(long, global = true, env = "REPORT2JSON_VISION_MODEL")]
    vision_model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Normalisation temperature (0.0–2.0).
    #[arg(long, global = true, env = "REPORT2JSON_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max output tokens for normalisation.
    #[arg(long, global = true, env = "REPORT2JSON_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// Per-page OCR timeout in seconds.
    #[arg(long, global = true, env = "REPORT2JSON_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Model call timeout in seconds.
    #[arg(long, global = true, env = "REPORT2JSON_MODEL_TIMEOUT", default_value_t = 180)]
    model_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "REPORT2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Prompt template override file.
    #[arg(long, global = true, env = "REPORT2JSON_PROMPT_TEMPLATE")]
    prompt_template: Option<PathBuf>,

    /// Translate free text to English before normalising.
    #[arg(long, global = true, env = "REPORT2JSON_TRANSLATE")]
    translate: bool,

    /// Retries on model failure (exponential backoff).
    #[arg(long, global = true, env = "REPORT2JSON_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Initial retry backoff in milliseconds.
    #[arg(long, global = true, env = "REPORT2JSON_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Rendering DPI for PDF pages (72–600).
    #[arg(long, global = true, env = "REPORT2JSON_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Concurrent page recognitions per document.
    #[arg(long, global = true, env = "REPORT2JSON_PAGE_CONCURRENCY", default_value_t = 4)]
    page_concurrency: usize,

    /// Concurrent documents in `extract`.
    #[arg(short, long, global = true, env = "REPORT2JSON_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "REPORT2JSON_PDF_PASSWORD")]
    password: Option<String>,

    /// Disable progress output.
    #[arg(long, global = true, env = "REPORT2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "REPORT2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "REPORT2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !opts.quiet && !opts.no_progress;
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
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

    let progress = show_progress.then(CliProgressCallback::new);
    let callback = progress.clone().map(|p| p as ProgressCallback);

    let result = run(&cli, callback).await;
    if let Some(p) = progress {
        p.finish();
    }
    result
}

async fn run(cli: &Cli, progress: Option<ProgressCallback>) -> Result<()> {
    let opts = &cli.opts;

    match &cli.command {
        Command::Extract { inputs, output } => {
            let pipeline = build_pipeline(opts, progress)?;
            let envelopes = extract_batch(&pipeline, inputs.clone()).await;
            let succeeded = envelopes.iter().filter(|e| e.is_success()).count();
            emit_json(&envelopes, output.as_deref())?;
            if succeeded == 0 {
                anyhow::bail!("No document could be extracted");
            }
        }

        Command::Normalize {
            text_file,
            json_file,
            stdin,
            text,
            source,
            raw_format,
            output,
        } => {
            let input = read_normalize_input(text_file, json_file, *stdin, text)
                .await?
                .with_source(source.clone())
                .with_raw_format(raw_format.clone());
            let pipeline = build_pipeline(opts, progress)?;
            let card = pipeline
                .normalize(input)
                .await
                .context("Normalization failed")?;
            emit_json(&card, output.as_deref())?;
            if !opts.quiet {
                eprintln!(
                    "{} report card with {} subject(s)",
                    green("✔"),
                    bold(&card.subjects.len().to_string())
                );
            }
        }

        Command::Process { input, output } => {
            let pipeline = build_pipeline(opts, progress)?;
            let doc = load_document(input, opts.download_timeout)
                .await
                .with_context(|| format!("Failed to load '{input}'"))?;
            let processed = pipeline
                .spawn(doc)
                .await
                .context("Processing task failed")?
                .with_context(|| format!("Processing '{input}' failed"))?;
            emit_json(&processed, output.as_deref())?;
            if !opts.quiet {
                eprintln!(
                    "{} {}  confidence {}  {} subject(s)",
                    green("✔"),
                    processed.envelope.filename,
                    processed
                        .envelope
                        .confidence
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                    processed.report_card.subjects.len()
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig` and wire the collaborators.
///
/// The retry policy is applied here, around the text model, so the library
/// pipeline itself never retries.
fn build_pipeline(opts: &GlobalOpts, progress: Option<ProgressCallback>) -> Result<Pipeline> {
    let mut builder = PipelineConfig::builder()
        .temperature(opts.temperature)
        .max_tokens(opts.max_tokens)
        .translate(opts.translate)
        .ocr_timeout_secs(opts.ocr_timeout)
        .model_timeout_secs(opts.model_timeout)
        .download_timeout_secs(opts.download_timeout)
        .dpi(opts.dpi)
        .page_concurrency(opts.page_concurrency)
        .document_concurrency(opts.concurrency);

    if let Some(ref model) = opts.model {
        builder = builder.model(model);
    }
    if let Some(ref model) = opts.vision_model {
        builder = builder.vision_model(model);
    }
    if let Some(ref provider) = opts.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = opts.prompt_template {
        builder = builder.prompt_template_path(path);
    }
    if let Some(ref password) = opts.password {
        builder = builder.pdf_password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build().context("Invalid configuration")?;

    let text_provider = resolve_provider(&config, config.model_name())
        .context("Failed to configure the text model")?;
    let vision_provider = resolve_provider(&config, config.vision_model_name())
        .context("Failed to configure the vision model")?;

    let model = RetryingModel::new(
        LlmTextModel::new(text_provider, config.model_name()),
        opts.max_retries,
        opts.retry_backoff_ms,
    );
    let recognizer = VisionRecognizer::new(vision_provider, config.vision_model_name());

    Ok(Pipeline::new(config, Arc::new(recognizer), Arc::new(model)))
}

async fn read_normalize_input(
    text_file: &Option<PathBuf>,
    json_file: &Option<PathBuf>,
    stdin: bool,
    text: &Option<String>,
) -> Result<NormalizeInput> {
    if let Some(path) = text_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text from {:?}", path))?;
        return Ok(NormalizeInput::text(text));
    }
    if let Some(path) = json_file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read JSON from {:?}", path))?;
        let fields: Map<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("{:?} is not a JSON object", path))?;
        return Ok(NormalizeInput::structured(fields));
    }
    if stdin {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(NormalizeInput::text(buf));
    }
    if let Some(text) = text {
        return Ok(NormalizeInput::text(text.clone()));
    }
    // Nothing given: let the pipeline report the input error with its stage.
    Ok(NormalizeInput::default())
}

fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    match output {
        Some(path) => std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .context("Failed to write to stdout")?;
            handle.write_all(b"\n").ok();
        }
    }
    Ok(())
}
