//! CLI binary for accessmatic.
//!
//! A thin shim over the library crate: load a page, run the widget over it,
//! report the PDF links it found and optionally process them.

use accessmatic::{
    render_view, AccessMatic, AccessibleResult, DiscoveredLink, DiscoveryMode, Page,
    ProcessOutcome, ProcessingError, ProcessingMethod, Presenter, View, WidgetConfig,
};
use anyhow::{Context, Result};
use clap::Parser;
use futures::future;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
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

// ── Terminal presenter using indicatif ───────────────────────────────────────

/// Prints one line per settled document under a live progress bar.
struct CliPresenter {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliPresenter {
    fn new(total: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let total = self.bar.length().unwrap_or(0) as usize;
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} PDFs processed", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} PDFs processed  ({} failed)",
                cyan("⚠"),
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl Presenter for CliPresenter {
    fn render(&self, view: &View) {
        match view {
            View::Processing { file_name, .. } => self.bar.set_message(file_name.clone()),
            View::Document { result, .. } => {
                self.bar.println(format!(
                    "  {} {:<40}  {}  {}",
                    green("✓"),
                    result.source_url,
                    dim(&format!("score {:>3}  WCAG {}", result.accessibility_score, result.compliance_level)),
                    dim(method_label(result.processing_method)),
                ));
                self.bar.inc(1);
            }
            View::Error { url, message, .. } => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                self.bar.println(format!("  {} {:<40}  {}", red("✗"), url, red(message)));
                self.bar.inc(1);
            }
        }
    }
}

fn method_label(method: ProcessingMethod) -> &'static str {
    match method {
        ProcessingMethod::Remote => "remote",
        ProcessingMethod::Local => "local",
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List PDF links on a page
  accessmatic https://city.gov/council/agendas

  # Process every PDF link and save the accessible views
  accessmatic https://city.gov/council/agendas --process -o out/

  # Local file, links resolved against the live site, no network processing
  accessmatic saved.html --base-url https://city.gov/ --local-only --process

  # JSON summary
  accessmatic page.html --process --json > report.json

CONFIGURATION:
  Settings from the page's <script data-accessmatic-key=…> tag are applied
  first; command-line flags and environment variables override them.

ENVIRONMENT VARIABLES:
  ACCESSMATIC_API_KEY     Processing API key (absent → local processing only)
  ACCESSMATIC_API_URL     Processing API base URL
  RUST_LOG                Override the log filter
"#;

/// Find PDF links on a web page and produce accessible HTML renditions.
#[derive(Parser, Debug)]
#[command(
    name = "accessmatic",
    version,
    about = "Find PDF links on a web page and produce accessible HTML renditions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local HTML file or HTTP/HTTPS URL of the page to scan.
    page: String,

    /// Resolve relative links against this URL instead of the page location.
    #[arg(long)]
    base_url: Option<String>,

    /// Processing API key.
    #[arg(long, env = "ACCESSMATIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Processing API base URL.
    #[arg(long, env = "ACCESSMATIC_API_URL")]
    api_url: Option<String>,

    /// Never contact the processing API.
    #[arg(long)]
    local_only: bool,

    /// Process every discovered PDF link.
    #[arg(long)]
    process: bool,

    /// Number of PDFs processed concurrently.
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,

    /// Write each rendered document view to this directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON summary instead of text.
    #[arg(long)]
    json: bool,

    /// Remote processing timeout per PDF, in milliseconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Interval between status polls, in milliseconds.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Delay of the local pipeline, in milliseconds.
    #[arg(long, default_value_t = 0)]
    local_delay: u64,

    /// Log per-link detail and include raw error details in error views.
    #[arg(long)]
    debug: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Page download timeout in seconds.
    #[arg(long, default_value_t = 30)]
    download_timeout: u64,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    page: &'a str,
    network_blocked: bool,
    discovered: Vec<DiscoveredLink>,
    results: Vec<&'a AccessibleResult>,
    failures: Vec<Failure<'a>>,
}

#[derive(Debug, Serialize)]
struct Failure<'a> {
    url: &'a str,
    error: &'a ProcessingError,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let show_progress = cli.process && !cli.quiet && !cli.no_progress && !cli.json;

    // ── Load page and build config ───────────────────────────────────────
    // The page's script tag may turn on debug, so logging waits for the
    // merged config.
    let page = Page::load(&cli.page, cli.base_url.as_deref(), cli.download_timeout)
        .await
        .with_context(|| format!("Failed to load page {}", cli.page))?;
    let page = Arc::new(page);
    let config = build_config(&cli, &page)?;

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = log_filter(&cli, &config, show_progress);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // The presenter needs the link count, which is only known after the
    // scan that `init` performs; a placeholder length is fixed up below.
    let cli_presenter = show_progress.then(|| CliPresenter::new(0));
    let presenter: Arc<dyn Presenter> = match &cli_presenter {
        Some(p) => Arc::clone(p) as Arc<dyn Presenter>,
        None => Arc::new(accessmatic::NoopPresenter),
    };

    let widget = AccessMatic::init_http(config, Arc::clone(&page), presenter)
        .await
        .context("Failed to start widget")?;
    let discovered = widget.discovered();

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {} PDF links on {}  {}",
            cyan("◆"),
            bold(&discovered.len().to_string()),
            page.base_url(),
            dim(if widget.is_network_blocked() {
                "(local processing)"
            } else {
                "(remote processing)"
            }),
        );
        if !cli.process {
            for link in &discovered {
                println!("{}", link.normalized_url);
            }
        }
    }

    if !cli.process {
        if cli.json {
            print_summary(&cli.page, &widget, discovered, &[])?;
        }
        return Ok(());
    }

    // ── Process ──────────────────────────────────────────────────────────
    if let Some(p) = &cli_presenter {
        p.bar.set_length(discovered.len() as u64);
    }

    let urls = discovered
        .iter()
        .map(|l| l.normalized_url.clone())
        .collect::<Vec<_>>();
    let widget_ref = &widget;
    let outcomes: Vec<(String, ProcessOutcome)> = stream::iter(urls.into_iter().map(|url| async move {
        match widget_ref.process_url(&url).await {
            Ok(outcome) => Some((url, outcome)),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                None
            }
        }
    }))
    .buffer_unordered(cli.concurrency.max(1))
    .filter_map(future::ready)
    .collect()
    .await;

    if let Some(p) = &cli_presenter {
        p.finish();
    }

    if let Some(dir) = &cli.output {
        write_views(dir, &outcomes, widget.config().show_branding).await?;
    }

    if cli.json {
        print_summary(&cli.page, &widget, discovered, &outcomes)?;
    } else if !cli.quiet && !show_progress {
        let failed = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ProcessOutcome::Failed(_)))
            .count();
        eprintln!(
            "Processed {}/{} PDFs",
            outcomes.len() - failed,
            outcomes.len()
        );
        for (url, outcome) in &outcomes {
            if let ProcessOutcome::Failed(e) = outcome {
                eprintln!("  {} {}: {}", red("✗"), url, e);
            }
        }
    }

    Ok(())
}

/// Default log level when `RUST_LOG` is unset.
fn log_filter(cli: &Cli, config: &WidgetConfig, show_progress: bool) -> &'static str {
    if cli.verbose || config.debug {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
        "error"
    } else {
        "info"
    }
}

/// Page script-tag settings first, then CLI flags on top.
fn build_config(cli: &Cli, page: &Page) -> Result<WidgetConfig> {
    let mut builder = WidgetConfig::builder();
    if let Some(attrs) = page.script_attributes() {
        builder = builder
            .script_attributes(attrs)
            .context("Invalid configuration in the page's script tag")?;
    }

    builder = builder
        .auto_discover(true)
        .local_delay_ms(cli.local_delay);
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref url) = cli.api_url {
        builder = builder.api_url(url.clone());
    }
    if cli.local_only {
        builder = builder.discovery_mode(DiscoveryMode::LocalOnly);
    }
    if let Some(ms) = cli.timeout {
        builder = builder.timeout_ms(ms);
    }
    if let Some(ms) = cli.poll_interval {
        builder = builder.poll_interval_ms(ms);
    }
    if cli.debug {
        builder = builder.debug(true);
    }

    builder.build().context("Invalid configuration")
}

/// Write one HTML file per completed document.
async fn write_views(dir: &Path, outcomes: &[(String, ProcessOutcome)], branding: bool) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for (i, (_, outcome)) in outcomes.iter().enumerate() {
        let ProcessOutcome::Completed(result) = outcome else {
            continue;
        };
        let name = accessmatic::presentation::file_name_for(&result.source_url);
        let path = dir.join(format!("{:03}-{}.html", i + 1, slug(&name)));
        let html = render_view(&View::Document {
            result: Arc::clone(result),
            show_branding: branding,
        });
        tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Wrote {}", path.display());
    }
    Ok(())
}

fn slug(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let s = s.split('-').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("-");
    if s.is_empty() {
        "document".to_string()
    } else {
        s
    }
}

fn print_summary(
    page: &str,
    widget: &AccessMatic,
    discovered: Vec<DiscoveredLink>,
    outcomes: &[(String, ProcessOutcome)],
) -> Result<()> {
    let summary = Summary {
        page,
        network_blocked: widget.is_network_blocked(),
        discovered,
        results: outcomes
            .iter()
            .filter_map(|(_, o)| o.result().map(|r| r.as_ref()))
            .collect(),
        failures: outcomes
            .iter()
            .filter_map(|(url, o)| match o {
                ProcessOutcome::Failed(error) => Some(Failure { url, error }),
                ProcessOutcome::Completed(_) => None,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
    );
    Ok(())
}
