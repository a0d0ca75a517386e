//! PDF rasterisation: open the document, render each selected page, resize,
//! encode and save it.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and is not async-safe.
//! All document work therefore runs in [`run_blocking`] on tokio's blocking
//! pool. The bound library and the open document are plain locals of that
//! function, so they are released on every exit path, including page errors
//! and a dropped stream.
//!
//! ## DPI, then width
//!
//! The page is rasterised at `dpi` (scale `dpi / 72`) and then resampled to
//! the requested width. Rendering above the target size and downscaling with
//! Lanczos3 keeps thin strokes and small text legible at 600 px.

use crate::config::{OutputFormat, OverwritePolicy, PageSelection, RasterConfig};
use crate::error::{PageError, Pdf2PngError};
use crate::output::{DocumentMetadata, PageResult};
use crate::pipeline::{encode, engine, save};
use crate::progress::ProgressCallback;
use image::imageops::FilterType;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything the blocking render task needs, detached from the async caller.
#[derive(Clone)]
pub struct RenderJob {
    pub pdf_path: PathBuf,
    pub password: Option<String>,
    pub scale: f32,
    pub width: Option<u32>,
    pub max_pixels: u32,
    pub pages: PageSelection,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub format: OutputFormat,
    pub overwrite: OverwritePolicy,
    pub progress: Option<ProgressCallback>,
}

impl RenderJob {
    pub fn new(pdf_path: &Path, config: &RasterConfig) -> Self {
        Self {
            pdf_path: pdf_path.to_path_buf(),
            password: config.password.clone(),
            scale: config.scale_factor(),
            width: config.width,
            max_pixels: config.max_rendered_pixels,
            pages: config.pages.clone(),
            output_dir: config.output_dir.clone(),
            file_prefix: config.file_prefix.clone(),
            format: config.format,
            overwrite: config.overwrite,
            progress: config.progress_callback.clone(),
        }
    }
}

/// Document-level facts gathered while rendering.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub metadata: DocumentMetadata,
    pub selected_pages: usize,
    pub render_duration_ms: u64,
}

/// Render every selected page of `job`, handing each result to `sink`.
///
/// `sink` returns `false` to stop early (the consumer went away). Fatal
/// problems (binding, opening, empty selection, output directory) are
/// returned before any page is produced.
pub fn run_blocking<F>(job: &RenderJob, mut sink: F) -> Result<RunSummary, Pdf2PngError>
where
    F: FnMut(PageResult) -> bool,
{
    let pdfium = engine::bind_pdfium()?;
    let document = open_document(&pdfium, &job.pdf_path, job.password.as_deref())?;
    let metadata = read_metadata(&document);
    let total_pages = metadata.page_count;
    info!("PDF loaded: {} pages", total_pages);

    let indices = job.pages.to_indices(total_pages);
    if indices.is_empty() {
        return Err(Pdf2PngError::PageOutOfRange {
            page: job.pages.first_requested(),
            total: total_pages,
        });
    }
    let selected = indices.len();
    debug!("Selected {} of {} pages", selected, total_pages);

    save::ensure_output_dir(&job.output_dir)?;

    if let Some(ref cb) = job.progress {
        cb.on_start(selected);
    }

    let max_pixels = i32::try_from(job.max_pixels).unwrap_or(i32::MAX);
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(job.scale)
        .set_maximum_width(max_pixels)
        .set_maximum_height(max_pixels);

    let started = Instant::now();
    let mut succeeded = 0;

    for idx in indices {
        let page_num = idx + 1;
        if let Some(ref cb) = job.progress {
            cb.on_page_start(page_num, selected);
        }

        let result = process_page(&document, &render_config, job, idx);

        if let Some(ref cb) = job.progress {
            match &result.error {
                None => cb.on_page_complete(page_num, selected, result.bytes_written),
                Some(e) => cb.on_page_error(page_num, selected, &e.to_string()),
            }
        }
        if result.is_ok() {
            succeeded += 1;
        } else if let Some(ref e) = result.error {
            warn!("{}", e);
        }

        if !sink(result) {
            info!("Consumer dropped; stopping after page {}", page_num);
            break;
        }
    }

    if let Some(ref cb) = job.progress {
        cb.on_complete(selected, succeeded);
    }

    Ok(RunSummary {
        metadata,
        selected_pages: selected,
        render_duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Render, resize, encode and save one page. Never fails the whole run.
fn process_page(
    document: &PdfDocument<'_>,
    render_config: &PdfRenderConfig,
    job: &RenderJob,
    idx: usize,
) -> PageResult {
    let started = Instant::now();
    let page_num = idx + 1;
    let path = save::output_path(&job.output_dir, &job.file_prefix, page_num, job.format);
    let elapsed = |t: Instant| t.elapsed().as_millis() as u64;

    match save::precheck(&path, job.overwrite, page_num) {
        Ok(Some(skipped)) => {
            return PageResult {
                page_num,
                path,
                width: 0,
                height: 0,
                bytes_written: skipped.bytes(),
                skipped: true,
                duration_ms: elapsed(started),
                error: None,
            };
        }
        Ok(None) => {}
        Err(e) => return PageResult::failed(page_num, path, elapsed(started), e),
    }

    let image = match render_page(document, render_config, idx) {
        Ok(img) => fit_width(img, job.width),
        Err(detail) => {
            let e = PageError::RenderFailed {
                page: page_num,
                detail,
            };
            return PageResult::failed(page_num, path, elapsed(started), e);
        }
    };

    let bytes = match encode::encode_page(&image, job.format) {
        Ok(b) => b,
        Err(e) => {
            let e = PageError::EncodeFailed {
                page: page_num,
                detail: e.to_string(),
            };
            return PageResult::failed(page_num, path, elapsed(started), e);
        }
    };

    match save::write_atomic(&path, &bytes, page_num, job.overwrite) {
        Ok(outcome) => PageResult {
            page_num,
            path,
            width: image.width(),
            height: image.height(),
            bytes_written: outcome.bytes(),
            skipped: false,
            duration_ms: elapsed(started),
            error: None,
        },
        Err(e) => PageResult::failed(page_num, path, elapsed(started), e),
    }
}

fn render_page(
    document: &PdfDocument<'_>,
    render_config: &PdfRenderConfig,
    idx: usize,
) -> Result<DynamicImage, String> {
    let page_index = u16::try_from(idx).map_err(|_| format!("page index {} exceeds pdfium range", idx))?;
    let page = document
        .pages()
        .get(page_index)
        .map_err(|e| format!("{:?}", e))?;
    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| format!("{:?}", e))?;
    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        idx + 1,
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Resample to exactly `width` pixels wide, keeping the aspect ratio.
pub fn fit_width(image: DynamicImage, width: Option<u32>) -> DynamicImage {
    let Some(target) = width else {
        return image;
    };
    if target == 0 || image.width() == 0 || image.width() == target {
        return image;
    }
    let height = ((image.height() as f64 * target as f64) / image.width() as f64).round() as u32;
    image.resize_exact(target, height.max(1), FilterType::Lanczos3)
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2PngError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2PngError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Pdf2PngError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Pdf2PngError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn read_metadata(document: &PdfDocument<'_>) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}

/// Read document metadata without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2PngError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || -> Result<DocumentMetadata, Pdf2PngError> {
        let pdfium = engine::bind_pdfium()?;
        let document = open_document(&pdfium, &path, pwd.as_deref())?;
        Ok(read_metadata(&document))
    })
    .await
    .map_err(|e| Pdf2PngError::Internal(format!("Metadata task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn fit_width_keeps_aspect_ratio() {
        // US Letter at 300 DPI.
        let out = fit_width(page(2550, 3300), Some(600));
        assert_eq!(out.width(), 600);
        assert_eq!(out.height(), 776);
    }

    #[test]
    fn fit_width_upscales_small_pages() {
        let out = fit_width(page(100, 50), Some(600));
        assert_eq!((out.width(), out.height()), (600, 300));
    }

    #[test]
    fn fit_width_none_or_equal_is_identity() {
        let out = fit_width(page(123, 45), None);
        assert_eq!((out.width(), out.height()), (123, 45));
        let out = fit_width(page(600, 10), Some(600));
        assert_eq!((out.width(), out.height()), (600, 10));
    }

    #[test]
    fn fit_width_never_produces_zero_height() {
        let out = fit_width(page(5000, 1), Some(10));
        assert_eq!((out.width(), out.height()), (10, 1));
    }

    #[test]
    fn job_copies_config() {
        let config = RasterConfig::builder()
            .dpi(144)
            .output_dir("out")
            .file_prefix("p")
            .build()
            .unwrap();
        let job = RenderJob::new(Path::new("doc.pdf"), &config);
        assert!((job.scale - 2.0).abs() < f32::EPSILON);
        assert_eq!(job.output_dir, PathBuf::from("out"));
        assert_eq!(job.file_prefix, "p");
        assert_eq!(job.width, Some(600));
    }
}
