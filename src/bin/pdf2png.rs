//! CLI binary for pdf2png.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RasterConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2png::server::{self, ServerConfig};
use pdf2png::{
    inspect_with_password, prepare_images, OutputFormat, OverwritePolicy, PageSelection,
    ProgressCallback, RasterConfig, RasterOutput, RasterProgressCallback, DEFAULT_DPI,
    DEFAULT_OUTPUT_DIR, DEFAULT_WIDTH,
};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
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

/// Live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Starts as a spinner; `on_start` switches to a bar once the page
    /// count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn take_elapsed_ms(&self, page_num: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl RasterProgressCallback for CliProgressCallback {
    fn on_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rasterising {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, bytes: u64) {
        let elapsed_ms = self.take_elapsed_ms(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{:>7} KB", bytes / 1024)),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed_ms = self.take_elapsed_ms(page_num);

        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages rendered",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages rendered  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page → image/1.png, image/2.png, … (300 DPI, 600 px wide)
  pdf2png convert document.pdf

  # Different directory and width
  pdf2png convert report.pdf -o thumbs --width 200

  # Native resolution at 150 DPI, pages 1-5 only
  pdf2png convert --dpi 150 --no-resize --pages 1-5 paper.pdf

  # JPEG output, keep files from a previous run
  pdf2png convert --format jpeg --quality 85 --skip-existing book.pdf

  # Convert from URL
  pdf2png convert https://arxiv.org/pdf/1706.03762

  # Document metadata only
  pdf2png inspect document.pdf --json

  # HTTP upload service
  pdf2png serve --bind 0.0.0.0:8080 --output-dir /var/lib/pdf2png

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Log filter, overrides -v / -q
  PDF2PNG_*           Any flag, e.g. PDF2PNG_DPI=150 PDF2PNG_OUTPUT_DIR=out
"#;

/// Rasterise PDF pages into PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png",
    version,
    about = "Rasterise PDF pages into fixed-width PNG images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2PNG_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2PNG_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render pages to image files.
    Convert(ConvertArgs),
    /// Print PDF metadata without rendering.
    Inspect(InspectArgs),
    /// Run the HTTP upload service.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory to write page images to.
    #[arg(short, long, env = "PDF2PNG_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2PNG_DPI", default_value_t = DEFAULT_DPI,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Output width in pixels; height follows the page's aspect ratio.
    #[arg(long, env = "PDF2PNG_WIDTH", default_value_t = DEFAULT_WIDTH,
          conflicts_with = "no_resize")]
    width: u32,

    /// Keep the native size at --dpi instead of resizing.
    #[arg(long, env = "PDF2PNG_NO_RESIZE")]
    no_resize: bool,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2PNG_PAGES", default_value = "all")]
    pages: String,

    /// Text placed before the page number in file names.
    #[arg(long, env = "PDF2PNG_PREFIX", default_value = "")]
    prefix: String,

    /// Output image format.
    #[arg(long, env = "PDF2PNG_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// JPEG quality (1–100).
    #[arg(long, env = "PDF2PNG_QUALITY", default_value_t = 90)]
    quality: u8,

    /// Replace existing images (default).
    #[arg(long, env = "PDF2PNG_OVERWRITE", conflicts_with_all = ["skip_existing", "no_clobber"])]
    overwrite: bool,

    /// Keep existing images and skip those pages.
    #[arg(long, env = "PDF2PNG_SKIP_EXISTING", conflicts_with = "no_clobber")]
    skip_existing: bool,

    /// Fail a page whose image already exists.
    #[arg(long, env = "PDF2PNG_NO_CLOBBER")]
    no_clobber: bool,

    /// Exit with an error if any page failed.
    #[arg(long, env = "PDF2PNG_STRICT")]
    strict: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2PNG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the full result (RasterOutput) as JSON.
    #[arg(long, env = "PDF2PNG_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,

    /// Print metadata as JSON.
    #[arg(long, env = "PDF2PNG_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PDF2PNG_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Root directory; each upload gets its own sub-directory.
    #[arg(long, env = "PDF2PNG_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Default DPI for requests that do not set one.
    #[arg(long, env = "PDF2PNG_DPI", default_value_t = DEFAULT_DPI,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Default width for requests that do not set one.
    #[arg(long, env = "PDF2PNG_WIDTH", default_value_t = DEFAULT_WIDTH)]
    width: u32,

    /// Maximum upload size in MiB.
    #[arg(long, env = "PDF2PNG_BODY_LIMIT_MB", default_value_t = 64)]
    body_limit_mb: usize,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during conversion.
    let json = match &cli.command {
        Command::Convert(a) => a.json,
        Command::Inspect(a) => a.json,
        Command::Serve(_) => false,
    };
    let is_convert = matches!(cli.command, Command::Convert(_));
    let show_progress = is_convert && !cli.quiet && !cli.no_progress && !json;
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

    match cli.command {
        Command::Convert(ref args) => run_convert(args, cli.quiet, show_progress).await,
        Command::Inspect(ref args) => run_inspect(args).await,
        Command::Serve(ref args) => run_serve(args).await,
    }
}

async fn run_convert(args: &ConvertArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RasterProgressCallback>)
    } else {
        None
    };

    let config = build_config(args, progress_cb)?;
    let output = prepare_images(&args.input, &config)
        .await
        .context("Rasterisation failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !quiet {
        print_summary(&output, &args.output_dir, show_progress);
    }

    if args.strict {
        output.into_result().context("Some pages failed")?;
    }
    Ok(())
}

fn print_summary(output: &RasterOutput, dir: &std::path::Path, show_progress: bool) {
    for path in output.paths() {
        println!("{}", path.display());
    }

    let stats = &output.stats;
    if !show_progress {
        for e in output.errors() {
            eprintln!("  {} {}", red("✗"), e);
        }
    }
    eprintln!(
        "{}  {} written, {} skipped, {}/{} selected  {}ms  →  {}",
        if stats.failed_pages == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.written_pages,
        stats.skipped_pages,
        stats.selected_pages - stats.failed_pages,
        stats.selected_pages,
        stats.total_duration_ms,
        bold(&dir.display().to_string()),
    );
    eprintln!(
        "   {}",
        dim(&format!(
            "{} KB on disk  /  {} page document",
            stats.total_bytes / 1024,
            stats.total_pages
        )),
    );
}

async fn run_inspect(args: &InspectArgs) -> Result<()> {
    let meta = inspect_with_password(&args.input, args.password.as_deref())
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", args.input);
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = meta.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", meta.page_count);
    println!("PDF Version:  {}", meta.pdf_version);
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    if let Some(ref d) = meta.creation_date {
        println!("Created:      {}", d);
    }
    Ok(())
}

async fn run_serve(args: &ServeArgs) -> Result<()> {
    let config = ServerConfig {
        bind: args.bind,
        output_root: args.output_dir.clone(),
        body_limit: args.body_limit_mb.max(1) * 1024 * 1024,
        default_dpi: args.dpi,
        default_width: Some(args.width),
    };
    server::serve(config).await.context("Server failed")?;
    Ok(())
}

/// Map CLI args to `RasterConfig`.
fn build_config(args: &ConvertArgs, progress: Option<ProgressCallback>) -> Result<RasterConfig> {
    let pages: PageSelection = args.pages.parse().context("Invalid --pages")?;
    let format = match args.format {
        FormatArg::Png => OutputFormat::Png,
        FormatArg::Jpeg => OutputFormat::Jpeg {
            quality: args.quality,
        },
    };
    let overwrite = if args.skip_existing {
        OverwritePolicy::Skip
    } else if args.no_clobber {
        OverwritePolicy::Fail
    } else {
        OverwritePolicy::Overwrite
    };

    let mut builder = RasterConfig::builder()
        .dpi(args.dpi)
        .width((!args.no_resize).then_some(args.width))
        .pages(pages)
        .output_dir(&args.output_dir)
        .file_prefix(&args.prefix)
        .format(format)
        .overwrite(overwrite)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
