//! CLI binary for proforma-audit.
//!
//! A thin shim over the library crate that maps CLI flags to `AuditConfig`
//! and prints results, or starts the browser UI.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use proforma_audit::{
    analyze, analyze_to_file, inspect, render_prompt, AnalysisProgressCallback, AnalysisResult,
    AnalysisStage, AuditConfig, InvoiceStatus, ProgressCallback, ReferenceRecipient, Verdict,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal spinner showing the current stage, with one log line per
/// finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: AnalysisStage) {
        self.bar.set_message(format!("{}…", stage.label()));
    }

    fn on_stage_complete(&self, stage: AnalysisStage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<28} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_analysis_complete(&self, _status: InvoiceStatus) {
        self.bar.finish_and_clear();
    }

    fn on_analysis_error(&self, stage: AnalysisStage, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(80) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!("  {} {:<28} {}", red("✗"), stage.label(), red(&msg)));
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse an invoice and print the report and record
  proforma-audit analyze PI-2024-118.pdf

  # Save the record as JSON
  proforma-audit analyze PI-2024-118.pdf -o analisis_factura.json

  # Analyse a PDF from a URL with another model
  proforma-audit analyze --model gemini-2.5-pro https://example.com/pi.pdf

  # Show the exact prompt that would be sent (no API key needed)
  proforma-audit prompt PI-2024-118.pdf

  # Inspect PDF metadata (no API key needed)
  proforma-audit inspect PI-2024-118.pdf

  # Start the browser UI
  proforma-audit serve --bind 0.0.0.0:8080

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY             Google Gemini API key (default provider)
  OPENAI_API_KEY             OpenAI API key (with --provider openai)
  ANTHROPIC_API_KEY          Anthropic API key (with --provider anthropic)
  PROFORMA_MODEL             Model ID
  PROFORMA_PROVIDER          Provider name
  PROFORMA_PROMPT_TEMPLATE   Replacement audit template
  PROFORMA_RECIPIENT_NAME    Expected recipient (also _ADDRESS, _TAX_ID)
  PROFORMA_BIND              Server listen address
  RUST_LOG                   Log filter, overrides --verbose/--quiet
"#;

/// Audit pro-forma invoices (PDF) with a hosted LLM.
#[derive(Parser, Debug)]
#[command(
    name = "proforma-audit",
    version,
    about = "Audit pro-forma invoices (PDF) with a hosted LLM",
    long_about = "Extracts the text of a pro-forma invoice, asks a language model to check it \
against the audit rules, and prints a human-readable report plus a structured JSON record. \
The `serve` subcommand starts a browser UI for the same pipeline.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PROFORMA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PROFORMA_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one invoice.
    Analyze(AnalyzeArgs),
    /// Print the prompt that would be sent for an invoice.
    Prompt(PromptArgs),
    /// Print PDF metadata only, no analysis.
    Inspect(InspectArgs),
    /// Serve the browser UI and JSON API.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

/// Model and prompt settings shared by `analyze` and `serve`.
#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID.
    #[arg(long, env = "PROFORMA_MODEL", default_value = "gemini-2.5-flash")]
    model: String,

    /// LLM provider: gemini, openai, anthropic, ollama, …
    #[arg(long, env = "PROFORMA_PROVIDER", default_value = "gemini")]
    provider: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PROFORMA_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "PROFORMA_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, env = "PROFORMA_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Path to a replacement audit template.
    #[arg(long, env = "PROFORMA_PROMPT_TEMPLATE")]
    prompt_template: Option<PathBuf>,

    /// Keep the model's status even when a critical check failed.
    #[arg(long, env = "PROFORMA_NO_ENFORCE_STATUS")]
    no_enforce_status: bool,

    #[command(flatten)]
    recipient: RecipientArgs,
}

/// The company every invoice must be addressed to. Unset fields keep the
/// built-in reference record.
#[derive(Args, Debug)]
struct RecipientArgs {
    /// Legal name of the expected recipient.
    #[arg(long, env = "PROFORMA_RECIPIENT_NAME")]
    recipient_name: Option<String>,

    /// Address of the expected recipient.
    #[arg(long, env = "PROFORMA_RECIPIENT_ADDRESS")]
    recipient_address: Option<String>,

    /// Tax ID of the expected recipient.
    #[arg(long, env = "PROFORMA_RECIPIENT_TAX_ID")]
    recipient_tax_id: Option<String>,
}

impl RecipientArgs {
    fn to_recipient(&self) -> ReferenceRecipient {
        let mut recipient = ReferenceRecipient::default();
        if let Some(ref name) = self.recipient_name {
            recipient.name = name.clone();
        }
        if let Some(ref address) = self.recipient_address {
            recipient.address = address.clone();
        }
        if let Some(ref tax_id) = self.recipient_tax_id {
            recipient.tax_id = tax_id.clone();
        }
        recipient
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the JSON record to this file.
    #[arg(short, long, env = "PROFORMA_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the full result (report + record) as JSON instead of text.
    #[arg(long, env = "PROFORMA_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PROFORMA_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PROFORMA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Path to a replacement audit template.
    #[arg(long, env = "PROFORMA_PROMPT_TEMPLATE")]
    prompt_template: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PROFORMA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    #[command(flatten)]
    recipient: RecipientArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output metadata as JSON.
    #[arg(long)]
    json: bool,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PROFORMA_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "PROFORMA_MAX_UPLOAD_MB", default_value_t = 20)]
    max_upload_mb: usize,

    /// Minutes an untouched session is kept before it is dropped.
    #[arg(long, env = "PROFORMA_SESSION_TTL_MINS", default_value_t = 30)]
    session_ttl_mins: u64,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress for `analyze`; library INFO logs would
    // only interleave with it.
    let spinner = matches!(
        &cli.command,
        Command::Analyze(a) if !a.no_progress && !a.json && !cli.quiet
    );
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
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

    match cli.command {
        Command::Analyze(args) => run_analyze(args, spinner, cli.quiet).await,
        Command::Prompt(args) => {
            let mut builder = AuditConfig::builder()
                .download_timeout_secs(args.download_timeout)
                .recipient(args.recipient.to_recipient());
            if let Some(path) = args.prompt_template {
                builder = builder.prompt_template(path);
            }
            let config = builder.build().context("Invalid configuration")?;
            let prompt = render_prompt(&args.input, &config)
                .await
                .context("Failed to build prompt")?;
            println!("{prompt}");
            Ok(())
        }
        Command::Inspect(args) => run_inspect(args).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => {
            let config = build_config(&args.model, None)?
                .max_upload_bytes(upload_limit_bytes(args.max_upload_mb))
                .session_idle_ttl_secs(args.session_ttl_mins.max(1).saturating_mul(60))
                .build()
                .context("Invalid configuration")?;
            let auditor =
                proforma_audit::InvoiceAuditor::new(config).context("Failed to start auditor")?;
            if !cli.quiet {
                eprintln!(
                    "{} Serving on {}",
                    cyan("◆"),
                    bold(&format!("http://{}", args.bind))
                );
            }
            proforma_audit::server::serve(auditor, &args.bind)
                .await
                .with_context(|| format!("Server on {} failed", args.bind))
        }
    }
}

async fn run_analyze(args: AnalyzeArgs, spinner: bool, quiet: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if spinner {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args.model, progress)?
        .download_timeout_secs(args.download_timeout)
        .build()
        .context("Invalid configuration")?;

    let result = match args.output {
        Some(ref path) => analyze_to_file(&args.input, path, &config).await,
        None => analyze(&args.input, &config).await,
    }
    .context("Analysis failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else {
        print_report(&result);
        if args.output.is_none() {
            let record = result
                .json_data
                .to_pretty_json()
                .context("Failed to serialise record")?;
            println!("\n{record}");
        }
    }

    if let Some(ref path) = args.output {
        if !quiet {
            eprintln!("{}  record  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }
    Ok(())
}

async fn run_inspect(args: InspectArgs) -> Result<()> {
    let meta = inspect(&args.input).await.context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
    } else {
        println!("File:         {}", args.input);
        if let Some(ref t) = meta.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = meta.author {
            println!("Author:       {}", a);
        }
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        println!("Encrypted:    {}", meta.is_encrypted);
    }
    Ok(())
}

fn print_report(result: &AnalysisResult) {
    let status = result.json_data.status;
    let title = status.title();
    let title = match status {
        InvoiceStatus::Valid => green(&bold(title)),
        InvoiceStatus::ValidWithObservations => yellow(&bold(title)),
        InvoiceStatus::Invalid => red(&bold(title)),
        InvoiceStatus::Undetermined => bold(title),
    };
    println!("{title}\n");

    for item in result.report_items() {
        let text = match item.verdict {
            Some(Verdict::Pass) => green(&format!("{} {}", Verdict::Pass.symbol(), item.text)),
            Some(Verdict::Warning) => {
                yellow(&format!("{} {}", Verdict::Warning.symbol(), item.text))
            }
            Some(Verdict::Fail) => red(&format!("{} {}", Verdict::Fail.symbol(), item.text)),
            None => item.text.clone(),
        };
        if item.label.is_empty() {
            println!("  {text}");
        } else {
            println!("  {:<32} {}", bold(&format!("{}:", item.label)), text);
        }
    }
}

/// `--max-upload-mb` in bytes, at least 1 MiB and saturating on overflow.
fn upload_limit_bytes(mb: usize) -> usize {
    mb.max(1).saturating_mul(1024 * 1024)
}

/// Map shared model flags to an `AuditConfigBuilder`.
fn build_config(
    args: &ModelArgs,
    progress: Option<ProgressCallback>,
) -> Result<proforma_audit::AuditConfigBuilder> {
    let mut builder = AuditConfig::builder()
        .model(args.model.clone())
        .provider_name(args.provider.clone())
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .api_timeout_secs(args.api_timeout)
        .enforce_status_rules(!args.no_enforce_status)
        .recipient(args.recipient.to_recipient());

    if let Some(ref path) = args.prompt_template {
        anyhow::ensure!(path.exists(), "Prompt template {:?} does not exist", path);
        builder = builder.prompt_template(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    Ok(builder)
}
