//! # pdf2png
//!
//! Rasterise PDF pages into fixed-width PNG (or JPEG) images on disk.
//!
//! Every selected page is rendered with pdfium at a configurable DPI,
//! resampled to a target width while keeping its aspect ratio, and written as
//! `<output_dir>/<prefix><n>.<ext>` where `n` is the 1-based page number.
//! With the defaults a PDF becomes `image/1.png`, `image/2.png`, … at 600 px
//! wide, rendered at 300 DPI.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input   resolve local file, URL download or in-memory bytes
//!  ├─ 2. Render  rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Resize  Lanczos3 resample to the target width
//!  ├─ 4. Encode  PNG or JPEG
//!  └─ 5. Save    atomic write to <dir>/<n>.<ext>, per-page stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2png::{prepare_images, RasterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let output = prepare_images("document.pdf", &RasterConfig::default()).await?;
//!     for path in output.paths() {
//!         println!("{}", path.display());
//!     }
//!     eprintln!("{} pages written", output.stats.written_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdf2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | HTTP upload service (axum + tower-http + uuid) |
//!
//! Library-only users can skip both:
//! ```toml
//! pdf2png = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! The pdfium shared library is located at runtime: `PDFIUM_LIB_PATH` first,
//! then the working directory, then the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prepare;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    OutputFormat, OverwritePolicy, PageSelection, RasterConfig, RasterConfigBuilder,
    DEFAULT_DPI, DEFAULT_OUTPUT_DIR, DEFAULT_WIDTH,
};
pub use error::{PageError, Pdf2PngError};
pub use output::{DocumentMetadata, PageResult, RasterOutput, RasterStats};
pub use prepare::{
    inspect, inspect_with_password, prepare_images, prepare_images_from_bytes,
    prepare_images_sync,
};
pub use progress::{NoopProgressCallback, ProgressCallback, RasterProgressCallback};
pub use stream::{prepare_stream, PageStream};
