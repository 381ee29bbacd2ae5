//! CLI binary for pdf-pose-finder.
//!
//! A thin shim over the library crate that maps CLI flags to `PoseConfig`,
//! resolves the caption credential up front, and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_pose_finder::prompts::SUMMARY_INSTRUCTION;
use pdf_pose_finder::{
    describe_records, extract, lookup_in, save_images, ApiKey, CaptionProgressCallback,
    CaptionService, GeminiCaptionService, PoseConfig, ProgressCallback, ProviderCaptionService,
    API_KEY_VARS, DESCRIPTION_UNAVAILABLE, YOGA_POSE_TEMPLATE,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Terminal progress for `describe`: a live bar plus one log line per image.
/// Images may finish out of order when several requests are in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Describing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl CaptionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Describing {total_images} images…"))
        ));
    }

    fn on_image_start(&self, index: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(format!("image {index}"));
    }

    fn on_image_complete(&self, index: usize, total: usize, caption_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{caption_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, error: String) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_images: usize, described: usize) {
        let failed = total_images.saturating_sub(described);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} images described",
                green("✔"),
                bold(&described.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images described  ({} unavailable)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&described.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List every embedded image with its page
  posefind list yoga.pdf

  # Which images mention "warrior"?
  posefind find yoga.pdf warrior

  # Describe the first matching pose (needs GOOGLE_API_KEY or GEMINI_API_KEY)
  posefind show yoga.pdf "tree pose"

  # Use the first PDF in a directory
  posefind list ./books/

  # Save all images as page_001_image_01.jpg, …
  posefind extract yoga.pdf --out-dir images/

  # Summarise every image with another provider
  posefind --provider openai --model gpt-4.1-mini describe yoga.pdf

FALLBACK NAMES:
  Images without an embedded /Name are called "Yoga Pose {page}" by every
  subcommand, so names printed by list are the names find matches. Override
  with --template (e.g. "Image {page}"); {page} and {ordinal} are 1-based.

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY / GEMINI_API_KEY   Gemini key (default caption service)
  OPENAI_API_KEY, ANTHROPIC_API_KEY Used with --provider openai / anthropic
  RUST_LOG                          Override log filter
"#;

/// Find pose images embedded in a PDF and describe them with a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "posefind",
    version,
    about = "Find pose images embedded in a PDF and describe them with a vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fallback name template for images without /Name (e.g. "Yoga Pose {page}").
    #[arg(long, global = true, env = "POSEFIND_TEMPLATE")]
    template: Option<String>,

    /// Caption provider: gemini (default), openai, anthropic, ollama, auto.
    #[arg(long, global = true, env = "POSEFIND_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (default: gemini-2.0-flash for gemini).
    #[arg(long, global = true, env = "POSEFIND_MODEL")]
    model: Option<String>,

    /// Instruction template; {label} is replaced with the query or image name.
    #[arg(long, global = true, env = "POSEFIND_INSTRUCTION")]
    instruction: Option<String>,

    /// Extra prompt sent after the image.
    #[arg(long, global = true, env = "POSEFIND_SECONDARY_PROMPT")]
    secondary_prompt: Option<String>,

    /// Max output tokens per caption.
    #[arg(long, global = true, env = "POSEFIND_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, global = true, env = "POSEFIND_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Per-attempt caption timeout in seconds.
    #[arg(long, global = true, env = "POSEFIND_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Retries after a failed caption attempt.
    #[arg(long, global = true, env = "POSEFIND_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, global = true, env = "POSEFIND_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Concurrent caption calls for `describe`.
    #[arg(short, long, global = true, env = "POSEFIND_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print JSON instead of text.
    #[arg(long, global = true, env = "POSEFIND_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "POSEFIND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true, env = "POSEFIND_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "POSEFIND_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every embedded image with its page and name
    List {
        /// PDF file, directory holding a PDF, or HTTP/HTTPS URL
        input: String,
    },
    /// List the images whose name contains QUERY (case-insensitive)
    Find {
        /// PDF file, directory holding a PDF, or HTTP/HTTPS URL
        input: String,
        /// Pose name or fragment
        query: String,
    },
    /// Describe the first image whose name contains QUERY
    Show {
        /// PDF file, directory holding a PDF, or HTTP/HTTPS URL
        input: String,
        /// Pose name or fragment
        query: String,
    },
    /// Write every embedded image to a directory
    Extract {
        /// PDF file, directory holding a PDF, or HTTP/HTTPS URL
        input: String,
        /// Destination directory (created if missing)
        #[arg(short, long, value_name = "DIR")]
        out_dir: PathBuf,
        /// Only save images whose name contains this text
        #[arg(long)]
        query: Option<String>,
    },
    /// Summarise every embedded image
    Describe {
        /// PDF file, directory holding a PDF, or HTTP/HTTPS URL
        input: String,
        /// Only describe images whose name contains this text
        #[arg(long)]
        query: Option<String>,
    },
}

impl Commands {
    fn needs_caption_service(&self) -> bool {
        matches!(self, Commands::Show { .. } | Commands::Describe { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && matches!(cli.command, Commands::Describe { .. });
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

    // ── Caption service (fail fast before touching the PDF) ─────────────
    let service = if cli.command.needs_caption_service() {
        Some(build_service(&cli)?)
    } else {
        None
    };

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CaptionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;

    match &cli.command {
        Commands::List { input } => {
            let extraction = extract(input, &config).await.context("Extraction failed")?;
            if cli.json {
                print_json(&extraction)?;
            } else {
                for record in &extraction.records {
                    println!(
                        "{:>4}  {:>2}  {}  {}",
                        record.page_number(),
                        record.ordinal() + 1,
                        record.resolved_name(),
                        dim(&format!(
                            "{}x{} {}",
                            record.pixel_data().width(),
                            record.pixel_data().height(),
                            record.pixel_data().encoding().extension()
                        )),
                    );
                }
                report_skipped(&cli, extraction.skipped.len());
                if !cli.quiet {
                    eprintln!(
                        "{} images on {} pages",
                        extraction.records.len(),
                        extraction.page_count
                    );
                }
            }
        }

        Commands::Find { input, query } => {
            let extraction = extract(input, &config).await.context("Extraction failed")?;
            let found = extraction.matching(query);
            if cli.json {
                print_json(&found)?;
            } else if found.is_empty() {
                println!("no pose found for {query}");
            } else {
                for record in found {
                    println!("{:>4}  {}", record.page_number(), record.resolved_name());
                }
            }
        }

        Commands::Show { input, query } => {
            let service = require(&service)?;
            let extraction = extract(input, &config).await.context("Extraction failed")?;
            let lookup = lookup_in(extraction.records, query, service, &config).await;

            if cli.json {
                print_json(&lookup)?;
            } else {
                match (lookup.record(), lookup.caption()) {
                    (Some(record), Some(caption)) => {
                        println!(
                            "{}  {}",
                            bold(record.resolved_name()),
                            dim(&format!("page {}", record.page_number()))
                        );
                        println!();
                        if caption.is_available() {
                            println!("{}", caption.display_text());
                        } else {
                            println!("{}", red(DESCRIPTION_UNAVAILABLE));
                        }
                    }
                    _ => println!("no pose found for {query}"),
                }
            }
        }

        Commands::Extract {
            input,
            out_dir,
            query,
        } => {
            let extraction = extract(input, &config).await.context("Extraction failed")?;
            report_skipped(&cli, extraction.skipped.len());
            let records = match query {
                Some(q) => extraction.into_matching(q),
                None => extraction.records,
            };
            let written = save_images(&records, out_dir)
                .await
                .with_context(|| format!("Failed to write images to {}", out_dir.display()))?;

            if cli.json {
                print_json(&written)?;
            } else {
                for path in &written {
                    println!("{}", path.display());
                }
                if !cli.quiet {
                    eprintln!(
                        "{} {} images → {}",
                        green("✔"),
                        written.len(),
                        bold(&out_dir.display().to_string())
                    );
                }
            }
        }

        Commands::Describe { input, query } => {
            let service = require(&service)?;
            let extraction = extract(input, &config).await.context("Extraction failed")?;
            let records = match query {
                Some(q) => extraction.into_matching(q),
                None => extraction.records,
            };
            let described = describe_records(records, service, &config).await;

            if cli.json {
                print_json(&described)?;
            } else {
                for item in &described {
                    println!(
                        "{}  {}",
                        bold(item.record.resolved_name()),
                        dim(&format!("page {}", item.record.page_number()))
                    );
                    println!("{}", item.caption.display_text());
                    println!();
                }
            }
        }
    }

    Ok(())
}

/// Build the caption service named by `--provider`.
///
/// Gemini needs a key from `GOOGLE_API_KEY` / `GEMINI_API_KEY`; other
/// providers read their own variables when constructed.
fn build_service(cli: &Cli) -> Result<Box<dyn CaptionService>> {
    match cli.provider.as_deref() {
        None | Some("gemini") | Some("google") => {
            let key = ApiKey::from_env(API_KEY_VARS).context("Cannot start caption service")?;
            Ok(Box::new(GeminiCaptionService::new(key)))
        }
        Some("auto") => Ok(Box::new(
            ProviderCaptionService::from_env().context("Cannot start caption service")?,
        )),
        Some(name) => Ok(Box::new(
            ProviderCaptionService::from_name(name, cli.model.as_deref())
                .context("Cannot start caption service")?,
        )),
    }
}

fn require(service: &Option<Box<dyn CaptionService>>) -> Result<&dyn CaptionService> {
    service
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("caption service was not initialised"))
}

/// Map CLI args to `PoseConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PoseConfig> {
    // One fallback template for every subcommand, so `list` and `find`
    // agree on the names they print and match.
    let mut builder = PoseConfig::builder()
        .fallback_template(cli.template.as_deref().unwrap_or(YOGA_POSE_TEMPLATE))
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .concurrency(cli.concurrency);

    match (&cli.instruction, &cli.command) {
        (Some(instruction), _) => builder = builder.instruction_template(instruction.clone()),
        (None, Commands::Describe { .. }) => {
            builder = builder.instruction_template(SUMMARY_INSTRUCTION)
        }
        _ => {}
    }
    if let Some(ref secondary) = cli.secondary_prompt {
        builder = builder.secondary_prompt(secondary.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn report_skipped(cli: &Cli, skipped: usize) {
    if skipped > 0 && !cli.quiet {
        eprintln!(
            "{} {} image(s) could not be decoded (run with --verbose for details)",
            cyan("⚠"),
            skipped
        );
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}
