//! CLI binary for deepdoc-client.
//!
//! A thin shim over the library crate: the path argument is the file picker,
//! `--advanced`/`--email` are the mode toggle and recipient field, stdout is
//! the Markdown preview and `--output` is the download action.

use anyhow::{Context, Result};
use clap::Parser;
use deepdoc_client::{
    check_backend, ClientConfig, FileDetails, FileInfo, Mode, Outcome, Progress, ProgressCallback, RenderPlan,
    SelectedFile, SessionController, SubmitError, SuccessView, UploadProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
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

/// Terminal progress callback: a percentage bar while the size is known, a
/// spinner otherwise.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(Self::spinner_style());
        bar.set_prefix("Preparing");
        Arc::new(Self { bar })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS)
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS)
    }
}

impl UploadProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, file_name: &str, total_bytes: Option<u64>) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Uploading {file_name}…"))
        ));
        match total_bytes {
            Some(n) => {
                self.bar.set_style(Self::bar_style());
                self.bar.set_message(dim(&format!("{n} bytes")));
            }
            None => {
                self.bar.set_style(Self::spinner_style());
                self.bar.set_message("size unknown");
            }
        }
        self.bar.set_prefix("Uploading");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_progress(&self, progress: Progress) {
        match progress {
            Progress::Percent(p) => {
                self.bar.set_position(u64::from(p));
                if p == 100 {
                    self.bar.set_prefix("Converting");
                    self.bar.set_style(Self::spinner_style());
                    self.bar.set_message("waiting for the service…");
                }
            }
            Progress::Indeterminate => {
                self.bar.set_style(Self::spinner_style());
            }
        }
    }

    fn on_settled(&self, outcome: &Outcome) {
        self.bar.finish_and_clear();
        match outcome {
            Outcome::Success(_) => eprintln!("{} {}", green("✔"), bold("Conversion finished")),
            Outcome::Failure(e) => eprintln!("{} {}", red("✘"), dim(e.kind.label())),
            _ => {}
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (Markdown on stdout)
  deepdoc report.pdf

  # Save the result as converted_markdown.md in ./out
  deepdoc report.pdf -o out/

  # Advanced processing, result delivered by email
  deepdoc --advanced --email me@example.com slides.docx

  # Check the service is up
  deepdoc --check

  # Machine-readable result
  deepdoc --json table.csv > result.json

ENVIRONMENT VARIABLES:
  DEEPDOC_HOST     Conversion service host (default: localhost)
  DEEPDOC_PORT     Conversion service port (default: 8000)
  DEEPDOC_TIMEOUT  Request timeout in seconds (default: 30)
  DEEPDOC_EMAIL    Recipient for advanced mode
"#;

/// Convert PDF, DOCX, CSV and HTML files to Markdown through a DeepDoc service.
#[derive(Parser, Debug)]
#[command(
    name = "deepdoc",
    version,
    about = "Convert PDF, DOCX, CSV and HTML files to Markdown through a DeepDoc service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to convert (.pdf, .docx, .csv, .html).
    #[arg(required_unless_present = "check")]
    input: Option<PathBuf>,

    /// Use the advanced processing path (requires --email).
    #[arg(long)]
    advanced: bool,

    /// Recipient address for advanced mode.
    #[arg(long, env = "DEEPDOC_EMAIL")]
    email: Option<String>,

    /// Conversion service host.
    #[arg(long, env = "DEEPDOC_HOST", default_value = "localhost")]
    host: String,

    /// Conversion service port.
    #[arg(long, env = "DEEPDOC_PORT", default_value_t = 8000)]
    port: u16,

    /// Request timeout in seconds.
    #[arg(long, env = "DEEPDOC_TIMEOUT", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Save the Markdown to this file (or into this directory) instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the final render plan as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Only check that the service is reachable.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; keep library
    // INFO logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn UploadProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Health probe ─────────────────────────────────────────────────────
    if cli.check {
        let message = check_backend(&config).await.context("Health check failed")?;
        if cli.json {
            println!("{}", serde_json::json!({ "message": message }));
        } else {
            println!("{} {}", green("✔"), message);
        }
        return Ok(());
    }

    // ── Pick, configure, submit ──────────────────────────────────────────
    let path = cli.input.as_ref().context("No input file given")?;
    let file = SelectedFile::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut controller = SessionController::new(config).context("Failed to set up the client")?;
    controller.select_file(file);
    controller.set_mode(if cli.advanced { Mode::Advanced } else { Mode::Basic });
    controller.set_recipient(cli.email.clone().unwrap_or_default());

    match controller.submit() {
        Ok(_) => {}
        Err(SubmitError::Invalid(e)) => {
            eprintln!("{} {}", red("✘"), e);
            std::process::exit(2);
        }
        Err(e @ (SubmitError::Busy | SubmitError::NoRuntime)) => anyhow::bail!(e),
    }
    controller.wait_for_outcome().await;

    // ── Render ───────────────────────────────────────────────────────────
    let plan = controller.render_plan();
    if cli.json {
        let json = serde_json::to_string_pretty(&plan).context("Failed to serialise result")?;
        println!("{json}");
        if plan.shows_error_banner() {
            std::process::exit(1);
        }
        return Ok(());
    }

    match plan {
        RenderPlan::Success { file_info, view } => {
            if let (Some(info), false) = (&file_info, cli.quiet) {
                print_file_info(info);
            }
            match view {
                SuccessView::Markdown { preview, download } => {
                    if let Some(ref out) = cli.output {
                        let written = download
                            .save_to(out)
                            .await
                            .context("Failed to save the Markdown")?;
                        if !cli.quiet {
                            eprintln!("{}  →  {}", green("✔"), bold(&written.display().to_string()));
                        }
                    } else {
                        let stdout = io::stdout();
                        let mut handle = stdout.lock();
                        handle
                            .write_all(preview.as_bytes())
                            .context("Failed to write to stdout")?;
                        if !preview.ends_with('\n') {
                            handle.write_all(b"\n").ok();
                        }
                    }
                }
                SuccessView::EmailNotice { recipient } => {
                    let to = recipient.unwrap_or_else(|| "your inbox".to_string());
                    eprintln!(
                        "{} Conversion started. The result will be sent to {}; please check your email.",
                        cyan("✉"),
                        bold(&to)
                    );
                }
            }
        }
        RenderPlan::Failure { banner } => {
            eprintln!("{} {}", red("Error:"), banner);
            std::process::exit(1);
        }
        RenderPlan::Idle | RenderPlan::Pending { .. } => {
            anyhow::bail!("Upload ended without a result");
        }
    }

    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .host(cli.host.clone())
        .port(cli.port)
        .timeout_secs(cli.timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn print_file_info(info: &FileInfo) {
    eprintln!("{}", bold("File info"));
    eprintln!("  Name:     {}", info.name);
    eprintln!("  Type:     {}", info.file_type);
    eprintln!("  Size:     {} bytes", info.byte_size);
    match info.details {
        FileDetails::Tabular { row_count, col_count } => {
            eprintln!("  Rows:     {row_count}");
            eprintln!("  Columns:  {col_count}");
        }
        FileDetails::Document { word_count, image_count } => {
            eprintln!("  Words:    {word_count}");
            eprintln!("  Images:   {image_count}");
        }
    }
}
