//! Configuration types for PDF rasterisation.
//!
//! All behaviour is controlled through [`RasterConfig`], built via its
//! [`RasterConfigBuilder`]. Setters store values as given; [`RasterConfigBuilder::build`]
//! validates them so that a bad `--dpi` or `?width=0` surfaces as
//! [`Pdf2PngError::InvalidConfig`] instead of a pdfium failure mid-run.

use crate::error::Pdf2PngError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default rasterisation resolution.
pub const DEFAULT_DPI: u32 = 300;
/// Default output width in pixels.
pub const DEFAULT_WIDTH: u32 = 600;
/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "image";

/// Configuration for rasterising a PDF into page images.
///
/// Built via [`RasterConfig::builder()`] or using [`RasterConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2png::{PageSelection, RasterConfig};
///
/// let config = RasterConfig::builder()
///     .dpi(150)
///     .width(Some(1200))
///     .output_dir("out/pages")
///     .pages(PageSelection::Range(1, 3))
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct RasterConfig {
    /// Rasterisation DPI. Range: 72–600. Default: 300.
    ///
    /// pdfium works in points (1/72 inch), so the page is rendered at a
    /// scale factor of `dpi / 72` before any resize.
    pub dpi: u32,

    /// Final image width in pixels; height follows the page aspect ratio.
    /// `None` keeps the native size at `dpi`. Default: `Some(600)`.
    pub width: Option<u32>,

    /// Upper bound for either edge of the raw pdfium bitmap. Default: 10 000.
    ///
    /// A 600-DPI render of an A0 poster would otherwise allocate gigabytes.
    pub max_rendered_pixels: u32,

    /// Directory the page images are written to. Created when missing.
    /// Default: `image`.
    pub output_dir: PathBuf,

    /// String placed before the page number in each file name. Default: empty.
    pub file_prefix: String,

    /// Encoded image format. Default: PNG.
    pub format: OutputFormat,

    /// What to do when an output file already exists. Default: overwrite.
    pub overwrite: OverwritePolicy,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            width: Some(DEFAULT_WIDTH),
            max_rendered_pixels: 10_000,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_prefix: String::new(),
            format: OutputFormat::default(),
            overwrite: OverwritePolicy::default(),
            pages: PageSelection::default(),
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RasterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterConfig")
            .field("dpi", &self.dpi)
            .field("width", &self.width)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("output_dir", &self.output_dir)
            .field("file_prefix", &self.file_prefix)
            .field("format", &self.format)
            .field("overwrite", &self.overwrite)
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RasterProgressCallback>"),
            )
            .finish()
    }
}

impl RasterConfig {
    /// Create a new builder for `RasterConfig`.
    pub fn builder() -> RasterConfigBuilder {
        RasterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Rendering scale factor relative to pdfium's 72-point unit.
    pub fn scale_factor(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`RasterConfig`].
pub struct RasterConfigBuilder {
    config: RasterConfig,
}

impl fmt::Debug for RasterConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl RasterConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn width(mut self, width: Option<u32>) -> Self {
        self.config.width = width;
        self
    }

    /// Clamped to `100..=i32::MAX`, the range pdfium accepts.
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, i32::MAX as u32);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.config.overwrite = policy;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RasterConfig, Pdf2PngError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.width == Some(0) {
            return Err(Pdf2PngError::InvalidConfig(
                "Width must be ≥ 1 pixel".into(),
            ));
        }
        if let OutputFormat::Jpeg { quality } = c.format {
            if !(1..=100).contains(&quality) {
                return Err(Pdf2PngError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {}",
                    quality
                )));
            }
        }
        if c.file_prefix.contains(['/', '\\']) {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "File prefix must not contain path separators, got '{}'",
                c.file_prefix
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Encoded format of each page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Lossless PNG. (default)
    #[default]
    Png,
    /// JPEG at the given quality (1–100).
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }

    /// Parse `png`, `jpeg`/`jpg`; JPEG uses `quality`.
    pub fn parse(name: &str, quality: u8) -> Result<Self, Pdf2PngError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg { quality }),
            other => Err(Pdf2PngError::InvalidConfig(format!(
                "Unknown output format '{}': expected png or jpeg",
                other
            ))),
        }
    }
}

/// Behaviour when a page's output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverwritePolicy {
    /// Replace the existing file. (default)
    #[default]
    Overwrite,
    /// Keep the existing file and report the page as skipped.
    Skip,
    /// Report the page as failed with [`crate::error::PageError::OutputExists`].
    /// Checked again when the file is moved into place, so a file created
    /// mid-render is never replaced.
    Fail,
}

/// Specifies which pages of the PDF to rasterise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// First 1-indexed page the selection asks for, used in out-of-range errors.
    pub fn first_requested(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
        }
    }
}

/// Parses `all`, `5`, `3-15` and `1,3,5,7`.
impl FromStr for PageSelection {
    type Err = Pdf2PngError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let invalid = |msg: String| Pdf2PngError::InvalidConfig(msg);
        let parse_page = |p: &str| -> Result<usize, Pdf2PngError> {
            let n: usize = p
                .trim()
                .parse()
                .map_err(|_| invalid(format!("Invalid page number: '{}'", p.trim())))?;
            if n < 1 {
                return Err(invalid(format!(
                    "Pages are 1-indexed, minimum is 1 (got {})",
                    n
                )));
            }
            Ok(n)
        };

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            let start = parse_page(start)?;
            let end = parse_page(end)?;
            if start > end {
                return Err(invalid(format!(
                    "Invalid page range '{}-{}': start must be <= end",
                    start, end
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }

        if s.contains(',') {
            let pages = s
                .split(',')
                .map(parse_page)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }

        Ok(PageSelection::Single(parse_page(&s)?))
    }
}
