//! Eager (whole-document) entry points.
//!
//! These wait for every selected page and return a single [`RasterOutput`].
//! Use [`crate::stream::prepare_stream`] to receive pages as they are written.

use crate::config::RasterConfig;
use crate::error::Pdf2PngError;
use crate::output::{DocumentMetadata, PageResult, RasterOutput, RasterStats};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render::{self, RenderJob, RunSummary};
use std::time::Instant;
use tracing::info;

/// Rasterise a PDF file or URL into page images on disk.
///
/// This is the primary entry point for the library. With the default
/// configuration every page is rendered at 300 DPI, resized to 600 px wide
/// and written as `image/<n>.png`.
///
/// # Returns
/// `Ok(RasterOutput)` when at least one page was written or kept, even if
/// other pages failed (check `output.stats.failed_pages`).
///
/// # Errors
/// Fatal errors only: missing or unreadable input, not a PDF, wrong
/// password, empty page selection, pdfium unavailable, or every page failed.
///
/// # Example
/// ```rust,no_run
/// use pdf2png::{prepare_images, RasterConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = prepare_images("document.pdf", &RasterConfig::default()).await?;
/// for path in output.paths() {
///     println!("{}", path.display());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn prepare_images(
    input_str: impl AsRef<str>,
    config: &RasterConfig,
) -> Result<RasterOutput, Pdf2PngError> {
    let started = Instant::now();
    let input_str = input_str.as_ref();
    info!("Preparing images: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run(resolved, config, started).await
}

/// Rasterise PDF bytes held in memory.
///
/// The bytes are staged to a managed temp file which is removed on return.
pub async fn prepare_images_from_bytes(
    bytes: &[u8],
    config: &RasterConfig,
) -> Result<RasterOutput, Pdf2PngError> {
    let started = Instant::now();
    let resolved = input::stage_bytes(bytes)?;
    run(resolved, config, started).await
}

/// Synchronous wrapper around [`prepare_images`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn prepare_images_sync(
    input_str: impl AsRef<str>,
    config: &RasterConfig,
) -> Result<RasterOutput, Pdf2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(prepare_images(input_str, config))
}

/// Read PDF metadata without rendering anything.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2PngError> {
    inspect_with_password(input_str, None).await
}

/// [`inspect`] for encrypted documents.
pub async fn inspect_with_password(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2PngError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), password).await
}

/// Drive the blocking renderer and assemble the output.
async fn run(
    resolved: ResolvedInput,
    config: &RasterConfig,
    started: Instant,
) -> Result<RasterOutput, Pdf2PngError> {
    let job = RenderJob::new(resolved.path(), config);
    info!("Rendering {}", resolved.describe());

    let (summary, pages) = tokio::task::spawn_blocking(
        move || -> Result<(RunSummary, Vec<PageResult>), Pdf2PngError> {
            let mut pages = Vec::new();
            let summary = render::run_blocking(&job, |page| {
                pages.push(page);
                true
            })?;
            Ok((summary, pages))
        },
    )
    .await
    .map_err(|e| Pdf2PngError::Internal(format!("Render task panicked: {}", e)))??;

    // The staged or downloaded copy is no longer needed.
    drop(resolved);

    assemble(summary, pages, started)
}

fn assemble(
    summary: RunSummary,
    mut pages: Vec<PageResult>,
    started: Instant,
) -> Result<RasterOutput, Pdf2PngError> {
    pages.sort_by_key(|p| p.page_num);

    if !pages.is_empty() && pages.iter().all(|p| !p.is_ok()) {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Pdf2PngError::AllPagesFailed {
            total: pages.len(),
            first_error,
        });
    }

    let stats = RasterStats::from_pages(
        &pages,
        summary.metadata.page_count,
        started.elapsed().as_millis() as u64,
        summary.render_duration_ms,
    );

    info!(
        "Done: {} written, {} skipped, {} failed of {} selected in {}ms",
        stats.written_pages,
        stats.skipped_pages,
        stats.failed_pages,
        summary.selected_pages,
        stats.total_duration_ms
    );

    Ok(RasterOutput {
        pages,
        metadata: summary.metadata,
        stats,
    })
}
